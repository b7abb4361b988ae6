//! Picsou - password-protected personal finance records
//!
//! A document holds several users. Each user's budgets, accounts and
//! operations are serialized to JSON and encrypted under a per-user master
//! key, which is itself wrapped by a key derived from the user's password.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `crypto`: Secure buffers, hashing, key derivation and key wrapping
//! - `error`: Custom error types
//! - `models`: The document tree and its modification signal
//! - `storage`: Atomic JSON files and the document lifecycle
//! - `transfer`: CSV and JSON-lines import/export of operations
//! - `cli` / `display`: Command handlers and terminal formatting
//!
//! # Example
//!
//! ```rust,ignore
//! use picsou::crypto::KdfCost;
//! use picsou::models::{Document, User};
//!
//! let mut doc = Document::new("Home", "");
//! let alice = User::new("alice", "secret", &KdfCost::default())?;
//! doc.add_user(alice)?;
//! ```

pub mod cli;
pub mod config;
pub mod crypto;
pub mod display;
pub mod error;
pub mod models;
pub mod storage;
pub mod transfer;

pub use error::{PicsouError, PicsouResult};
