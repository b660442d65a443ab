//! # Kestrel Light Client
//!
//! A light client lets bandwidth-constrained observers (mobile wallets,
//! embedded devices, inter-chain relayers) decide whether a block header
//! is valid consensus output without downloading every intervening header.
//! It validates the consensus algorithm only, not the state machine
//! transitions inside the blocks.
//!
//! ## Security model
//!
//! Kestrel is a Proof-of-Stake, BFT-style chain, so a client must start
//! from a *weakly subjective* root of trust: a `(height, hash)` pair no
//! older than the unbonding window, obtained out of band. From there the
//! client never trusts any peer, only signatures. Every header commits to
//! the validator set allowed to sign the *next* block, so each change to
//! the set is itself approved by a signed header. When the set changes
//! slowly, the client can skip ahead: a header far in the future is
//! accepted if validators holding enough of the *trusted* set's power
//! signed it ([`TrustThreshold`], default 1/3). When the set drifted too
//! far for one hop, the verifier bisects the height interval until each
//! hop has enough overlap.
//!
//! ## Architecture
//!
//! ```text
//! +---------------------+
//! |     LightClient     |  Bootstrap, verify(), update_to_height()
//! +---------------------+
//!           |
//!           v
//! +---------------------+
//! |      Verifier       |  Skip-verification, bisection, single-flight
//! +---------------------+
//!      |           |
//!      v           v
//! +----------+ +----------------------------+
//! |  source  | |       trusted store        |
//! | Provider | | MultiProvider / DbProvider |
//! +----------+ +----------------------------+
//! ```
//!
//! A [`Provider`] hands out [`FullCommit`]s: a signed header plus the
//! validator sets for its height and the next. The source provider is
//! untrusted transport; only the [`Verifier`] confers trust, by validating
//! a commit against prior trust and writing it through the layered trusted
//! store.
//!
//! ## Modules
//!
//! - [`provider`] - provider traits and the in-memory source
//! - [`multi`] - read-through/write-through provider stack
//! - [`db`] - key-value-backed trusted provider with bounded retention
//! - [`verifier`] - the sequential and bisecting verification engine
//! - [`client`] - the user-facing facade and trust options

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod client;
pub mod db;
pub mod multi;
pub mod provider;
pub mod verifier;

pub use client::{LightClient, TrustOptions};
pub use db::DbProvider;
pub use multi::MultiProvider;
pub use provider::{PersistentProvider, Provider, StaticProvider};
pub use verifier::{AdvanceState, ForkEvidence, Mode, Verifier, VerifierConfig};

// The vocabulary the whole crate is written in.
pub use kestrel_types::{
    FullCommit, Hash, Height, SignedHeader, TrustThreshold, ValidatorSet,
};

use std::time::Duration;

/// Result type alias for light client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the light client.
///
/// `Clone` so that concurrent callers waiting on the same in-flight advance
/// can all observe the leader's outcome.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// No full commit at the requested height (or no commits at all).
    #[error("commit not found")]
    CommitNotFound,

    /// A signed header is stored but its validator set is missing.
    #[error("validators are unknown or missing for height {height}")]
    UnknownValidators {
        /// Height whose validator set is missing.
        height: Height,
    },

    /// A stored validator set does not hash to what the header commits to.
    #[error("unexpected validator set: got {got}, want {want}")]
    UnexpectedValidators {
        /// Hash of the set that was found, hex.
        got: String,
        /// Hash the header commits to, hex.
        want: String,
    },

    /// Skip-verification could not reach the trust threshold and the
    /// interval cannot be bisected further.
    #[error("too much validator change to verify height {height}")]
    TooMuchChange {
        /// Height that could not be verified.
        height: Height,
    },

    /// The trusted anchor is older than the trust period; no forward
    /// progress is possible without re-bootstrapping.
    #[error("trusted state is too old: age {age:?} exceeds trust period {trust_period:?}")]
    TrustExpired {
        /// Age of the trusted anchor.
        age: Duration,
        /// Configured trust period.
        trust_period: Duration,
    },

    /// The configured root of trust is older than the trust period
    /// relative to the source's latest block.
    #[error("trusted height is older than the trust period: age {age:?} exceeds {trust_period:?}")]
    StaleTrust {
        /// Age of the root of trust relative to the latest block.
        age: Duration,
        /// Configured trust period.
        trust_period: Duration,
    },

    /// The header at the configured trust height does not hash to the
    /// configured trust hash.
    #[error("trust hash mismatch: expected {expected}, got {got}")]
    TrustHashMismatch {
        /// Hash the operator configured, hex.
        expected: String,
        /// Hash the source returned, hex.
        got: String,
    },

    /// The bootstrap confirmation callback rejected the source's latest
    /// header.
    #[error("bootstrap declined: {reason}")]
    BootstrapDeclined {
        /// Reason given by the callback.
        reason: String,
    },

    /// Data names a different chain than the client is configured for.
    #[error("wrong chain id: expected {expected}, got {got}")]
    ChainIdMismatch {
        /// Configured chain id.
        expected: String,
        /// Chain id carried by the data.
        got: String,
    },

    /// A header below the verification frontier was offered to `verify`.
    #[error("height {height} is below the last verified height {last_verified}")]
    HeightBelowTrusted {
        /// Height of the offered header.
        height: Height,
        /// Current verification frontier.
        last_verified: Height,
    },

    /// Trust options are malformed.
    #[error("invalid trust options: {0}")]
    InvalidTrustOptions(String),

    /// Cryptographic or structural validation failed.
    #[error(transparent)]
    Validation(#[from] kestrel_types::Error),

    /// The underlying key-value store failed.
    #[error(transparent)]
    Store(#[from] kestrel_store::StoreError),
}

impl Error {
    /// Whether this is the recoverable not-found kind that read-through
    /// stacks and idempotence probes may swallow.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::CommitNotFound)
    }
}
