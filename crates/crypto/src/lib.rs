//! # Kestrel Crypto
//!
//! Cryptographic primitives for the Kestrel light client:
//!
//! - **Hashing**: Keccak256, one-shot and streaming
//! - **Signatures**: Ed25519 verification for consensus pre-commits, plus a
//!   signing keypair used by fixtures and tooling
//!
//! Consensus code treats keys and signatures as raw bytes; this crate is the
//! single place where they are interpreted.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod ed25519;
pub mod hash;

pub use ed25519::{address_of, verify_signature, Keypair, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};
pub use hash::{keccak256, keccak256_concat, Hasher};

/// Result type alias for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur in cryptographic operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CryptoError {
    /// Public key has the wrong length.
    #[error("invalid public key length: expected {PUBLIC_KEY_LENGTH}, got {0}")]
    InvalidKeyLength(usize),

    /// Signature has the wrong length.
    #[error("invalid signature length: expected {SIGNATURE_LENGTH}, got {0}")]
    InvalidSignatureLength(usize),

    /// Public key bytes do not describe a valid curve point.
    #[error("malformed public key")]
    MalformedKey,

    /// Signature did not verify against the key and message.
    #[error("signature verification failed")]
    Verification,
}
