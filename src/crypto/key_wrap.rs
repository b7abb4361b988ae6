//! Master-key wrapping
//!
//! Each user owns a random master key. The master key encrypts the user's
//! payload; a key-encryption key derived from the password encrypts the
//! master key. Changing the password only replaces the wrapped master key,
//! the payload blob is never touched.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PicsouError, PicsouResult};

use super::encryption::{decrypt, encrypt, fill_random, EncryptedData};
use super::key_derivation::{derive_key, KdfCost, KeyDerivationParams};
use super::SecureBuffer;

/// Master key length in bytes
pub const MASTER_KEY_LEN: usize = 32;

/// Current wrapped-key format
pub const WRAP_FORMAT: u32 = 1;

/// A master key wrapped under a password-derived key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyWrap {
    format: u32,
    kdf: KeyDerivationParams,
    wrapped: EncryptedData,
}

impl KeyWrap {
    /// Generate a fresh master key and wrap it under `password`
    ///
    /// Returns the wrap together with the plaintext master key, so the caller
    /// can seal an initial payload without paying for a second derivation.
    pub fn init_with_password(
        password: &str,
        cost: &KdfCost,
    ) -> PicsouResult<(Self, SecureBuffer)> {
        let mut master_key = SecureBuffer::allocate(MASTER_KEY_LEN);
        fill_random(master_key.as_mut_slice())?;

        let wrap = Self::wrap(&master_key, password, cost)?;
        debug!("generated and wrapped a new master key");
        Ok((wrap, master_key))
    }

    fn wrap(master_key: &SecureBuffer, password: &str, cost: &KdfCost) -> PicsouResult<Self> {
        let kdf = KeyDerivationParams::generate(cost);
        let kek = derive_key(password, &kdf)?;
        let wrapped = encrypt(master_key.as_slice(), &kek)?;
        Ok(Self {
            format: WRAP_FORMAT,
            kdf,
            wrapped,
        })
    }

    /// Recover the master key with `password`
    ///
    /// A wrong password reports `InvalidCredential`; a malformed wrap reports
    /// `CorruptData`. The wrap is never modified.
    pub fn unwrap(&self, password: &str) -> PicsouResult<SecureBuffer> {
        if self.format != WRAP_FORMAT {
            return Err(PicsouError::CorruptData(format!(
                "Unsupported key wrap format: {}",
                self.format
            )));
        }

        let kek = derive_key(password, &self.kdf)?;
        let master_key = decrypt(&self.wrapped, &kek).inspect_err(|e| {
            warn!("master key unwrap failed: {}", e);
        })?;

        if master_key.len() != MASTER_KEY_LEN {
            return Err(PicsouError::CorruptData(format!(
                "Master key has wrong length: {}",
                master_key.len()
            )));
        }
        Ok(master_key)
    }

    /// Re-wrap the same master key under `new_password`
    ///
    /// All-or-nothing: if `old_password` does not unwrap, or anything fails
    /// while building the new wrap, `self` is left unchanged.
    pub fn rewrap(&mut self, old_password: &str, new_password: &str) -> PicsouResult<()> {
        let master_key = self.unwrap(old_password)?;
        let rewrapped = Self::wrap(&master_key, new_password, &self.kdf.cost())?;
        *self = rewrapped;
        debug!("master key rewrapped under a new password");
        Ok(())
    }

    /// Key derivation parameters of the current wrap
    pub fn kdf(&self) -> &KeyDerivationParams {
        &self.kdf
    }
}

/// Encrypt a serialized payload under the master key
pub fn seal_payload(plaintext: &[u8], master_key: &SecureBuffer) -> PicsouResult<EncryptedData> {
    encrypt(plaintext, master_key)
}

/// Decrypt a payload blob with the master key
///
/// The master key is already authenticated at this point, so any failure
/// here means the payload itself is damaged.
pub fn open_payload(blob: &EncryptedData, master_key: &SecureBuffer) -> PicsouResult<SecureBuffer> {
    decrypt(blob, master_key).map_err(|e| match e {
        PicsouError::InvalidCredential(_) => {
            PicsouError::CorruptData("wrapped payload does not authenticate".into())
        }
        other => other,
    })
}
