//! Cryptographic functions for Picsou
//!
//! Provides AES-256-GCM encryption with Argon2id key derivation, master-key
//! wrapping for per-user protection, and SHA-2/SHA-3 digests.

pub mod encryption;
pub mod key_derivation;
pub mod key_wrap;
pub mod secure_hash;
pub mod secure_memory;

pub use encryption::{decrypt, encrypt, EncryptedData};
pub use key_derivation::{derive_key, KdfCost, KeyDerivationParams};
pub use key_wrap::{open_payload, seal_payload, KeyWrap, MASTER_KEY_LEN};
pub use secure_hash::{HashAlgorithm, HashFlags, SecureHash};
pub use secure_memory::{SecureBuffer, SecureString};
