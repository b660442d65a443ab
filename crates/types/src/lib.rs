//! # Kestrel Types
//!
//! Consensus data types for the Kestrel light client and the verification
//! rules that bind them together:
//!
//! - [`Header`] and [`SignedHeader`] - a block header plus the pre-commit
//!   votes that finalized it
//! - [`Commit`] - the set of pre-commit signatures for one block
//! - [`Validator`] and [`ValidatorSet`] - who may sign, with how much power
//! - [`FullCommit`] - the atomic unit of trust: a signed header together
//!   with the validator sets for its height and the next
//! - [`TrustThreshold`] - the voting-power ratio required to skip-verify
//!
//! ## Verification rules
//!
//! A commit is valid under a validator set when signers holding strictly
//! more than 2/3 of the total voting power produced valid Ed25519
//! signatures over the canonical vote bytes ([`ValidatorSet::verify_commit`]).
//! Skip-verification relaxes the bound to a configurable [`TrustThreshold`]
//! and ignores signers the trusted set does not know
//! ([`ValidatorSet::verify_commit_trusting`]).

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod commit;
pub mod encoding;
pub mod full_commit;
pub mod header;
pub mod validator;

pub use commit::{vote_sign_bytes, Commit, CommitSig};
pub use encoding::{decode, encode};
pub use full_commit::FullCommit;
pub use header::{Header, SignedHeader};
pub use validator::{TrustThreshold, Validator, ValidatorSet};

/// A 32-byte Keccak256 digest.
pub type Hash = [u8; 32];

/// A 20-byte account address.
pub type Address = [u8; 20];

/// Block height.
pub type Height = u64;

/// Voting power of a validator, in consensus units.
pub type Power = u64;

/// Result type alias for operations on consensus types.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while validating consensus data.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Header violates a structural rule.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Header or commit names a different chain.
    #[error("wrong chain id: expected {expected}, got {got}")]
    ChainIdMismatch {
        /// Chain id the verifier is configured for.
        expected: String,
        /// Chain id carried by the data.
        got: String,
    },

    /// Commit violates a structural rule.
    #[error("invalid commit: {0}")]
    InvalidCommit(String),

    /// The same validator signed the commit more than once.
    #[error("duplicate signature from validator 0x{}", hex::encode(.0))]
    DuplicateSigner(Address),

    /// A commit signature names a validator the set does not contain.
    #[error("unknown signer 0x{}", hex::encode(.0))]
    UnknownSigner(Address),

    /// A signature failed cryptographic verification.
    #[error("invalid signature from validator 0x{}", hex::encode(.0))]
    SignatureInvalid(Address),

    /// Signers did not reach the required share of voting power.
    #[error("insufficient voting power: {have} of {total}, needed more than {need}")]
    InsufficientVotingPower {
        /// Power that signed with valid signatures.
        have: Power,
        /// Power the threshold required (exclusive bound).
        need: Power,
        /// Total power of the set the commit was checked against.
        total: Power,
    },

    /// A validator set does not hash to what the header commits to.
    #[error("unexpected validator set: got {got}, want {want}")]
    ValidatorsHashMismatch {
        /// Hash of the supplied set, hex.
        got: String,
        /// Hash the header commits to, hex.
        want: String,
    },

    /// A validator set violates a structural rule.
    #[error("invalid validator set: {0}")]
    InvalidValidatorSet(String),

    /// Binary encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(String),
}
