//! Ed25519 signatures for consensus pre-commits.
//!
//! Validators sign pre-commit votes with Ed25519. The light client only ever
//! *verifies*; [`Keypair`] exists for fixtures and tooling that need to
//! produce test chains.
//!
//! Keys and signatures travel through consensus types as raw byte vectors
//! and are checked for shape here, at the verification boundary. Strict
//! verification is used, which rejects the malleable and mixed-order
//! signatures the relaxed RFC 8032 rules would let through.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use crate::{keccak256, CryptoError, Result};

/// Length of an Ed25519 public key in bytes.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Length of an Ed25519 signature in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Verify an Ed25519 `signature` by `public_key` over `message`.
///
/// Accepts raw bytes as stored in consensus structures and fails with a
/// classified error if either has the wrong shape.
pub fn verify_signature(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
    let key_bytes: [u8; PUBLIC_KEY_LENGTH] = public_key
        .try_into()
        .map_err(|_| CryptoError::InvalidKeyLength(public_key.len()))?;
    let sig_bytes: [u8; SIGNATURE_LENGTH] = signature
        .try_into()
        .map_err(|_| CryptoError::InvalidSignatureLength(signature.len()))?;

    let key = VerifyingKey::from_bytes(&key_bytes).map_err(|_| CryptoError::MalformedKey)?;
    let sig = Signature::from_bytes(&sig_bytes);

    key.verify_strict(message, &sig)
        .map_err(|_| CryptoError::Verification)
}

/// Derive the 20-byte account address for an Ed25519 public key.
///
/// The address is the low 20 bytes of the Keccak256 digest of the key.
pub fn address_of(public_key: &[u8]) -> [u8; 20] {
    let digest = keccak256(public_key);
    let mut address = [0u8; 20];
    address.copy_from_slice(&digest[12..]);
    address
}

/// An Ed25519 signing keypair.
///
/// Not used on the verification path; fixtures and chain tooling sign with
/// it.
#[derive(Clone)]
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Generate a keypair from the system RNG.
    pub fn random() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// Derive a keypair deterministically from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    /// The public key as raw bytes.
    pub fn public_key(&self) -> Vec<u8> {
        self.signing.verifying_key().to_bytes().to_vec()
    }

    /// The account address derived from the public key.
    pub fn address(&self) -> [u8; 20] {
        address_of(&self.public_key())
    }

    /// Sign `message`, returning the raw 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing.sign(message).to_bytes().to_vec()
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &format!("0x{}", hex::encode(self.address())))
            .finish_non_exhaustive()
    }
}
