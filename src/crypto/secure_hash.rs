//! Incremental message digests and HMACs
//!
//! `SecureHash` wraps a selectable SHA-2 or SHA-3 primitive, optionally keyed
//! as an HMAC. With [`HashFlags::SECURE`] the HMAC key is also kept in a
//! [`SecureBuffer`] owned by the hash and wiped when it is dropped.

use hmac::digest::core_api::BlockSizeUser;
use hmac::digest::KeyInit;
use hmac::{Mac, SimpleHmac};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use sha3::{Sha3_224, Sha3_256, Sha3_384, Sha3_512};

use crate::error::{PicsouError, PicsouResult};

use super::SecureBuffer;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Sha3_224,
    Sha3_256,
    Sha3_384,
    Sha3_512,
}

impl HashAlgorithm {
    /// Digest length in bytes
    pub fn output_len(&self) -> usize {
        match self {
            Self::Sha224 | Self::Sha3_224 => 28,
            Self::Sha256 | Self::Sha3_256 => 32,
            Self::Sha384 | Self::Sha3_384 => 48,
            Self::Sha512 | Self::Sha3_512 => 64,
        }
    }
}

/// Construction flags for [`SecureHash`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HashFlags(u8);

impl HashFlags {
    pub const NONE: Self = Self(0);
    /// Keep a copy of the HMAC key in secure memory for the hash's lifetime;
    /// no effect on unkeyed digests
    pub const SECURE: Self = Self(1);
    /// Key the digest as an HMAC
    pub const HMAC: Self = Self(1 << 1);
    /// Reproduce a legacy implementation bug; not available here
    pub const BUG_COMPAT: Self = Self(1 << 2);

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for HashFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

trait HashEngine {
    fn update(&mut self, data: &[u8]);
    fn reset(&mut self);
    /// Write the digest of the current state without consuming it
    fn extract(&self, out: &mut [u8]);
}

struct PlainEngine<D>(D);

impl<D: Digest + Clone> HashEngine for PlainEngine<D> {
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn reset(&mut self) {
        self.0 = D::new();
    }

    fn extract(&self, out: &mut [u8]) {
        out.copy_from_slice(&self.0.clone().finalize());
    }
}

struct HmacEngine<D: Digest + BlockSizeUser> {
    keyed: SimpleHmac<D>,
    state: SimpleHmac<D>,
}

impl<D: Digest + BlockSizeUser + Clone> HmacEngine<D> {
    fn new(key: &[u8]) -> PicsouResult<Self> {
        let keyed = <SimpleHmac<D> as KeyInit>::new_from_slice(key)
            .map_err(|e| PicsouError::CryptoUnavailable(format!("HMAC keying failed: {}", e)))?;
        Ok(Self {
            state: keyed.clone(),
            keyed,
        })
    }
}

impl<D: Digest + BlockSizeUser + Clone> HashEngine for HmacEngine<D> {
    fn update(&mut self, data: &[u8]) {
        Mac::update(&mut self.state, data);
    }

    fn reset(&mut self) {
        self.state = self.keyed.clone();
    }

    fn extract(&self, out: &mut [u8]) {
        out.copy_from_slice(&self.state.clone().finalize().into_bytes());
    }
}

fn plain_engine(algorithm: HashAlgorithm) -> Box<dyn HashEngine> {
    match algorithm {
        HashAlgorithm::Sha224 => Box::new(PlainEngine(Sha224::new())),
        HashAlgorithm::Sha256 => Box::new(PlainEngine(Sha256::new())),
        HashAlgorithm::Sha384 => Box::new(PlainEngine(Sha384::new())),
        HashAlgorithm::Sha512 => Box::new(PlainEngine(Sha512::new())),
        HashAlgorithm::Sha3_224 => Box::new(PlainEngine(Sha3_224::new())),
        HashAlgorithm::Sha3_256 => Box::new(PlainEngine(Sha3_256::new())),
        HashAlgorithm::Sha3_384 => Box::new(PlainEngine(Sha3_384::new())),
        HashAlgorithm::Sha3_512 => Box::new(PlainEngine(Sha3_512::new())),
    }
}

fn hmac_engine(algorithm: HashAlgorithm, key: &[u8]) -> PicsouResult<Box<dyn HashEngine>> {
    Ok(match algorithm {
        HashAlgorithm::Sha224 => Box::new(HmacEngine::<Sha224>::new(key)?),
        HashAlgorithm::Sha256 => Box::new(HmacEngine::<Sha256>::new(key)?),
        HashAlgorithm::Sha384 => Box::new(HmacEngine::<Sha384>::new(key)?),
        HashAlgorithm::Sha512 => Box::new(HmacEngine::<Sha512>::new(key)?),
        HashAlgorithm::Sha3_224 => Box::new(HmacEngine::<Sha3_224>::new(key)?),
        HashAlgorithm::Sha3_256 => Box::new(HmacEngine::<Sha3_256>::new(key)?),
        HashAlgorithm::Sha3_384 => Box::new(HmacEngine::<Sha3_384>::new(key)?),
        HashAlgorithm::Sha3_512 => Box::new(HmacEngine::<Sha3_512>::new(key)?),
    })
}

/// An incremental digest or HMAC over a chosen algorithm
///
/// State is not reset by [`SecureHash::digest`]; call [`SecureHash::reset`]
/// before reusing the instance for a new message.
pub struct SecureHash {
    algorithm: HashAlgorithm,
    engine: Box<dyn HashEngine>,
    // Only set with `HashFlags::SECURE`
    key: Option<SecureBuffer>,
}

impl SecureHash {
    /// Open a hash instance
    ///
    /// Fails with `CryptoUnavailable` when HMAC is requested without a key,
    /// when keying fails, or when `BUG_COMPAT` is requested.
    pub fn new(
        algorithm: HashAlgorithm,
        flags: HashFlags,
        key: Option<&SecureBuffer>,
    ) -> PicsouResult<Self> {
        if flags.contains(HashFlags::BUG_COMPAT) {
            return Err(PicsouError::CryptoUnavailable(
                "bug-compatible digests are not supported".into(),
            ));
        }

        if flags.contains(HashFlags::HMAC) {
            let key = key.ok_or_else(|| {
                PicsouError::CryptoUnavailable("HMAC requested without a key".into())
            })?;
            let engine = hmac_engine(algorithm, key.as_slice())?;
            let key = flags.contains(HashFlags::SECURE).then(|| key.duplicate());
            return Ok(Self {
                algorithm,
                engine,
                key,
            });
        }

        Ok(Self {
            algorithm,
            engine: plain_engine(algorithm),
            key: None,
        })
    }

    /// Plain, unkeyed digest
    pub fn plain(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            engine: plain_engine(algorithm),
            key: None,
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Whether the hash owns a secure copy of its HMAC key
    pub fn holds_secure_key(&self) -> bool {
        self.key.is_some()
    }

    /// Digest length in bytes
    pub fn output_len(&self) -> usize {
        self.algorithm.output_len()
    }

    /// Clear accumulated state
    pub fn reset(&mut self) {
        self.engine.reset();
    }

    /// Feed more data; may be called any number of times
    pub fn update(&mut self, data: &[u8]) {
        self.engine.update(data);
    }

    /// Write the digest into `out`, which must match the output length
    pub fn digest(&self, out: &mut SecureBuffer) -> PicsouResult<()> {
        if out.len() != self.output_len() {
            return Err(PicsouError::Validation(format!(
                "Digest buffer size mismatch: expected {}, got {}",
                self.output_len(),
                out.len()
            )));
        }
        self.engine.extract(out.as_mut_slice());
        Ok(())
    }

    /// Convenience: digest into a freshly allocated buffer
    pub fn finish(&self) -> SecureBuffer {
        let mut out = SecureBuffer::allocate(self.output_len());
        self.engine.extract(out.as_mut_slice());
        out
    }
}

/// Lowercase hex encoding of a digest
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}
