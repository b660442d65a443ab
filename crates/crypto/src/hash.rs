//! Keccak256 hashing.
//!
//! Every hash in Kestrel (block ids, validator set hashes, addresses) is a
//! Keccak256 digest. Helpers here cover the common shapes: a single slice,
//! several slices hashed as if concatenated, and a streaming hasher for
//! structures serialized field by field.

use sha3::{Digest, Keccak256};

/// Compute the Keccak256 hash of `data`.
///
/// # Example
///
/// ```rust
/// let digest = kestrel_crypto::keccak256(b"kestrel");
/// assert_eq!(digest.len(), 32);
/// ```
#[inline]
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute the Keccak256 hash of `parts` as if they were one contiguous
/// buffer, without allocating the concatenation.
#[inline]
pub fn keccak256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Streaming Keccak256 hasher.
///
/// Used when hashing a structure field by field so that the digest is
/// defined over the canonical field order rather than an intermediate
/// serialization.
#[derive(Clone, Default)]
pub struct Hasher {
    inner: Keccak256,
}

impl Hasher {
    /// Create a fresh hasher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb more input.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    /// Finish and return the digest.
    pub fn finalize(self) -> [u8; 32] {
        self.inner.finalize().into()
    }
}
