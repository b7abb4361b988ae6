//! Storage layer for Picsou
//!
//! Atomic JSON file writes and the document lifecycle service.

pub mod document_service;
pub mod file_io;

pub use document_service::DocumentService;
pub use file_io::{read_json, read_json_required, write_json_atomic};
