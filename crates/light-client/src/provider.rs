//! Provider traits: where full commits come from and where trusted ones go.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use kestrel_types::{FullCommit, Height, ValidatorSet};

use crate::{Error, Result};

/// A source of full commits for one chain.
///
/// Providers transport and store; they never verify. The verifier is the
/// only component that confers trust on what a provider returns.
pub trait Provider: Send + Sync {
    /// The chain this provider serves.
    fn chain_id(&self) -> &str;

    /// The highest-height full commit available.
    ///
    /// Fails with [`Error::CommitNotFound`] when the provider has nothing.
    fn latest_full_commit(&self) -> Result<FullCommit>;

    /// The full commit at exactly `height`.
    ///
    /// Fails with [`Error::CommitNotFound`] when absent, and with
    /// [`Error::UnknownValidators`] when the header exists but a validator
    /// set bound to it is missing.
    fn get_full_commit(&self, height: Height) -> Result<FullCommit>;
}

/// A provider that can also persist new full commits.
///
/// Implemented by the trusted store layers. Beyond the plain save, the
/// verifier needs two bounded reads: the highest trusted commit at or
/// below a target height (to pick the anchor for a skip-verify step), and
/// the stored validator set for a height (to check an offered header
/// against).
pub trait PersistentProvider: Provider {
    /// Persist a full commit, without verification.
    ///
    /// Idempotent: saving an identical commit at an existing height is
    /// not an error.
    fn save_full_commit(&self, fc: &FullCommit) -> Result<()>;

    /// The highest-height full commit with height at most `height`.
    fn latest_full_commit_at_most(&self, height: Height) -> Result<FullCommit>;

    /// The validator set stored for `height`.
    fn validator_set(&self, height: Height) -> Result<ValidatorSet>;
}

/// An in-memory source serving a fixed set of full commits.
///
/// Stands in for the network-backed source in tests and tooling: fixture
/// chains are loaded with [`StaticProvider::add_full_commit`] and served
/// unverified, exactly like a remote peer would.
#[derive(Debug)]
pub struct StaticProvider {
    chain_id: String,
    commits: RwLock<BTreeMap<Height, FullCommit>>,
}

impl StaticProvider {
    /// Create an empty provider for `chain_id`.
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            commits: RwLock::new(BTreeMap::new()),
        }
    }

    /// Add a full commit, replacing any previous one at its height.
    pub fn add_full_commit(&self, fc: FullCommit) {
        self.commits.write().insert(fc.height(), fc);
    }

    /// Number of commits held.
    pub fn len(&self) -> usize {
        self.commits.read().len()
    }

    /// Whether the provider holds no commits.
    pub fn is_empty(&self) -> bool {
        self.commits.read().is_empty()
    }
}

impl Provider for StaticProvider {
    fn chain_id(&self) -> &str {
        &self.chain_id
    }

    fn latest_full_commit(&self) -> Result<FullCommit> {
        self.commits
            .read()
            .values()
            .next_back()
            .cloned()
            .ok_or(Error::CommitNotFound)
    }

    fn get_full_commit(&self, height: Height) -> Result<FullCommit> {
        self.commits
            .read()
            .get(&height)
            .cloned()
            .ok_or(Error::CommitNotFound)
    }
}
