//! Key derivation using Argon2id
//!
//! Derives key-encryption keys from user passwords using Argon2id,
//! a memory-hard key derivation function resistant to GPU/ASIC attacks.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2, Params,
};
use serde::{Deserialize, Serialize};

use crate::error::{PicsouError, PicsouResult};

use super::SecureBuffer;

/// Length of derived keys (AES-256)
pub const KEY_LEN: usize = 32;

/// Tunable cost of the KDF, read from settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfCost {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 3)
    pub time_cost: u32,
    /// Parallelism degree (default: 4)
    pub parallelism: u32,
}

impl Default for KdfCost {
    fn default() -> Self {
        Self {
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl KdfCost {
    /// Minimal cost, for tests only
    pub fn minimal() -> Self {
        Self {
            memory_cost: 8,
            time_cost: 1,
            parallelism: 1,
        }
    }
}

/// Parameters for key derivation, persisted next to the wrapped key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyDerivationParams {
    /// Salt for key derivation (base64 encoded)
    pub salt: String,
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl KeyDerivationParams {
    /// Create new params with a random salt
    pub fn generate(cost: &KdfCost) -> Self {
        let salt = SaltString::generate(&mut OsRng);
        Self {
            salt: salt.to_string(),
            memory_cost: cost.memory_cost,
            time_cost: cost.time_cost,
            parallelism: cost.parallelism,
        }
    }

    pub fn cost(&self) -> KdfCost {
        KdfCost {
            memory_cost: self.memory_cost,
            time_cost: self.time_cost,
            parallelism: self.parallelism,
        }
    }
}

/// Derive a key-encryption key from a password
pub fn derive_key(password: &str, params: &KeyDerivationParams) -> PicsouResult<SecureBuffer> {
    let salt = SaltString::from_b64(&params.salt)
        .map_err(|e| PicsouError::CorruptData(format!("Invalid salt: {}", e)))?;

    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| PicsouError::CorruptData(format!("Invalid Argon2 parameters: {}", e)))?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2_params,
    );

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PicsouError::CryptoUnavailable(format!("Key derivation failed: {}", e)))?;

    let hash_output = hash
        .hash
        .ok_or_else(|| PicsouError::CryptoUnavailable("No hash output generated".to_string()))?;

    let hash_bytes = hash_output.as_bytes();
    if hash_bytes.len() < KEY_LEN {
        return Err(PicsouError::CryptoUnavailable(
            "Hash output too short for AES-256 key".to_string(),
        ));
    }

    Ok(SecureBuffer::from_slice(&hash_bytes[..KEY_LEN]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> KeyDerivationParams {
        KeyDerivationParams::generate(&KdfCost::minimal())
    }

    #[test]
    fn test_derive_key() {
        let key = derive_key("test_password", &params()).unwrap();
        assert_eq!(key.len(), KEY_LEN);
    }

    #[test]
    fn test_same_password_same_key() {
        let params = params();
        let key1 = derive_key("test_password", &params).unwrap();
        let key2 = derive_key("test_password", &params).unwrap();
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_different_password_different_key() {
        let params = params();
        let key1 = derive_key("password1", &params).unwrap();
        let key2 = derive_key("password2", &params).unwrap();
        assert_ne!(key1, key2);
    }

    #[test]
    fn test_different_salt_different_key() {
        let key1 = derive_key("same", &params()).unwrap();
        let key2 = derive_key("same", &params()).unwrap();
        assert_ne!(key1, key2);
    }

    #[test]
    fn test_bad_salt_is_corrupt() {
        let mut params = params();
        params.salt = "!!".to_string();
        assert!(matches!(
            derive_key("pw", &params),
            Err(PicsouError::CorruptData(_))
        ));
    }

    #[test]
    fn test_params_round_trip_cost() {
        let cost = KdfCost::minimal();
        let params = KeyDerivationParams::generate(&cost);
        assert_eq!(params.cost(), cost);
        assert!(!params.salt.is_empty());
    }
}
