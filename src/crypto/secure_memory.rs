//! Secure memory handling for sensitive data
//!
//! Provides buffer types that overwrite their contents with zeros on every
//! release path, so key material and passwords do not linger in memory.

use std::fmt;
use std::ops::Deref;

use zeroize::{Zeroize, Zeroizing};

/// A fixed-length byte buffer that zeros its contents before release
///
/// The buffer is never duplicated implicitly: it does not implement `Clone`.
/// Use [`SecureBuffer::duplicate`] when a second copy is really needed.
pub struct SecureBuffer {
    inner: Vec<u8>,
}

impl SecureBuffer {
    /// Allocate a zero-filled buffer of `length` bytes
    pub fn allocate(length: usize) -> Self {
        Self {
            inner: vec![0u8; length],
        }
    }

    /// Build a buffer by copying `bytes` in
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut buffer = Self::allocate(bytes.len());
        buffer.inner.copy_from_slice(bytes);
        buffer
    }

    /// Take ownership of `bytes`, which will be zeroed on release
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self { inner: bytes }
    }

    /// Resize the buffer, discarding its previous contents
    ///
    /// The old storage is zeroed before it is freed and the new storage
    /// starts zero-filled. Nothing is carried across.
    pub fn resize(&mut self, length: usize) {
        self.inner.zeroize();
        self.inner = vec![0u8; length];
    }

    /// Zero and free the backing storage, leaving an empty buffer
    pub fn release(&mut self) {
        self.inner.zeroize();
        self.inner = Vec::new();
    }

    /// Explicit deep copy
    pub fn duplicate(&self) -> Self {
        Self::from_slice(&self.inner)
    }

    /// Get the bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }

    /// Get mutable bytes
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.inner
    }

    /// Get the length
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Drop for SecureBuffer {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

impl Deref for SecureBuffer {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl AsRef<[u8]> for SecureBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.inner
    }
}

impl PartialEq for SecureBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl Eq for SecureBuffer {}

// Don't print the contents in Debug output
impl fmt::Debug for SecureBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureBuffer")
            .field("len", &self.inner.len())
            .finish()
    }
}

/// A string type that zeros its contents on drop
///
/// Use this for passwords read from the terminal.
pub struct SecureString {
    inner: Zeroizing<String>,
}

impl SecureString {
    /// Create a new SecureString
    pub fn new(s: impl Into<String>) -> Self {
        Self {
            inner: Zeroizing::new(s.into()),
        }
    }

    /// Get the string contents
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Deref for SecureString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureString")
            .field("len", &self.inner.len())
            .finish()
    }
}

impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED {} bytes]", self.inner.len())
    }
}
