//! AES-256-GCM encryption/decryption
//!
//! Provides authenticated encryption for wrapped keys and wrapped payloads.
//! Each encryption operation generates a unique nonce.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::error::{PicsouError, PicsouResult};

use super::SecureBuffer;

/// Size of the AES-GCM nonce in bytes (96 bits)
const NONCE_SIZE: usize = 12;

const BLOB_VERSION: u8 = 1;

/// Encrypted data with associated metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncryptedData {
    /// The nonce used for this encryption (base64 encoded)
    pub nonce: String,
    /// The encrypted ciphertext with authentication tag (base64 encoded)
    pub ciphertext: String,
    /// Version for future algorithm upgrades
    #[serde(default = "default_version")]
    pub version: u8,
}

fn default_version() -> u8 {
    BLOB_VERSION
}

impl EncryptedData {
    fn new(nonce: &[u8], ciphertext: &[u8]) -> Self {
        Self {
            nonce: STANDARD.encode(nonce),
            ciphertext: STANDARD.encode(ciphertext),
            version: BLOB_VERSION,
        }
    }

    fn decode_nonce(&self) -> PicsouResult<Vec<u8>> {
        STANDARD
            .decode(&self.nonce)
            .map_err(|e| PicsouError::CorruptData(format!("Invalid nonce encoding: {}", e)))
    }

    fn decode_ciphertext(&self) -> PicsouResult<Vec<u8>> {
        STANDARD
            .decode(&self.ciphertext)
            .map_err(|e| PicsouError::CorruptData(format!("Invalid ciphertext encoding: {}", e)))
    }
}

/// Fill `buf` from the operating system's secure random source
pub fn fill_random(buf: &mut [u8]) -> PicsouResult<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| PicsouError::RandomSourceFailure(e.to_string()))
}

fn cipher(key: &SecureBuffer) -> PicsouResult<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key.as_slice())
        .map_err(|e| PicsouError::CryptoUnavailable(format!("Failed to create cipher: {}", e)))
}

/// Encrypt plaintext data using AES-256-GCM
pub fn encrypt(plaintext: &[u8], key: &SecureBuffer) -> PicsouResult<EncryptedData> {
    let cipher = cipher(key)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    fill_random(&mut nonce_bytes)?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| PicsouError::CryptoUnavailable(format!("Encryption failed: {}", e)))?;

    Ok(EncryptedData::new(&nonce_bytes, &ciphertext))
}

/// Decrypt ciphertext using AES-256-GCM
///
/// Malformed blobs report `CorruptData`; a blob that does not authenticate
/// under `key` reports `InvalidCredential`.
pub fn decrypt(encrypted: &EncryptedData, key: &SecureBuffer) -> PicsouResult<SecureBuffer> {
    if encrypted.version != BLOB_VERSION {
        return Err(PicsouError::CorruptData(format!(
            "Unsupported encryption version: {}",
            encrypted.version
        )));
    }

    let cipher = cipher(key)?;

    let nonce_bytes = encrypted.decode_nonce()?;
    if nonce_bytes.len() != NONCE_SIZE {
        return Err(PicsouError::CorruptData(format!(
            "Invalid nonce size: expected {}, got {}",
            NONCE_SIZE,
            nonce_bytes.len()
        )));
    }
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = encrypted.decode_ciphertext()?;

    let plaintext = cipher.decrypt(nonce, ciphertext.as_ref()).map_err(|_| {
        PicsouError::InvalidCredential("decryption failed: wrong key or tampered data".into())
    })?;

    Ok(SecureBuffer::from_vec(plaintext))
}
