//! Deterministic fixture chains for light client tests.
//!
//! Builds properly signed chains over configurable validator schedules so
//! tests exercise the real cryptographic path end to end. All keys derive
//! from fixed seeds; nothing here is random.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use kestrel_crypto::Keypair;
use kestrel_light_client::provider::{PersistentProvider, Provider, StaticProvider};
use kestrel_light_client::Result;
use kestrel_types::{
    vote_sign_bytes, Commit, CommitSig, FullCommit, Hash, Header, Height, SignedHeader, Validator,
    ValidatorSet,
};

/// Chain id used by every fixture.
pub const CHAIN_ID: &str = "test";

/// Trust period used by every fixture: 336 hours.
pub const TRUST_PERIOD: Duration = Duration::from_secs(336 * 3600);

/// Current time as Unix seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The keypair for a fixture validator id.
pub fn keypair(id: u8) -> Keypair {
    Keypair::from_seed([id; 32])
}

/// A validator set over the given fixture ids, one power unit each.
pub fn set_of(ids: &[u8]) -> ValidatorSet {
    ValidatorSet::new(
        ids.iter()
            .map(|&id| {
                let kp = keypair(id);
                Validator::new(kp.address(), kp.public_key(), 1)
            })
            .collect(),
    )
    .unwrap()
}

/// A deterministic chain of full commits, heights `1..=max_height`.
pub struct TestChain {
    commits: BTreeMap<Height, FullCommit>,
}

impl TestChain {
    /// Build a chain where `ids_at(h)` decides who signs height `h` and
    /// `time_of(h)` stamps it.
    pub fn build(
        max_height: Height,
        time_of: impl Fn(Height) -> u64,
        ids_at: impl Fn(Height) -> Vec<u8>,
    ) -> Self {
        let mut commits = BTreeMap::new();
        let mut last_block_id: Hash = [0u8; 32];

        for height in 1..=max_height {
            let signer_ids = ids_at(height);
            let validators = set_of(&signer_ids);
            let next_validators = set_of(&ids_at(height + 1));

            let header = Header {
                chain_id: CHAIN_ID.to_string(),
                height,
                time: time_of(height),
                last_block_id,
                app_hash: [0xab; 32],
                validators_hash: validators.hash(),
                next_validators_hash: next_validators.hash(),
                proposer: keypair(signer_ids[0]).address(),
            };
            let block_id = header.hash();
            last_block_id = block_id;

            let sign_bytes = vote_sign_bytes(CHAIN_ID, &block_id, height);
            let signatures = signer_ids
                .iter()
                .map(|&id| {
                    let kp = keypair(id);
                    CommitSig {
                        validator: kp.address(),
                        signature: kp.sign(&sign_bytes),
                    }
                })
                .collect();
            let commit = Commit::new(height, block_id, signatures);

            commits.insert(
                height,
                FullCommit::new(SignedHeader::new(header, commit), validators, next_validators),
            );
        }

        Self { commits }
    }

    /// A chain with one stable validator set throughout.
    pub fn stable(max_height: Height) -> Self {
        let base = unix_now() - max_height - 600;
        Self::build(max_height, |h| base + h, |_| vec![1, 2, 3, 4])
    }

    /// A chain whose ten-member validator set slides by one every three
    /// heights. Any hop of ten heights or fewer keeps enough overlap to
    /// skip-verify at threshold 1/3; long hops do not and force bisection.
    pub fn churning(max_height: Height) -> Self {
        let base = unix_now() - max_height - 600;
        Self::build(max_height, |h| base + h, |h| {
            let window = (h / 3) as u8;
            (window..window + 10).collect()
        })
    }

    /// The full commit at `height`.
    pub fn full_commit(&self, height: Height) -> FullCommit {
        self.commits[&height].clone()
    }

    /// The signed header at `height`.
    pub fn signed_header(&self, height: Height) -> SignedHeader {
        self.commits[&height].signed_header.clone()
    }

    /// All heights in the chain.
    pub fn heights(&self) -> Vec<Height> {
        self.commits.keys().copied().collect()
    }

    /// A source provider serving the whole chain.
    pub fn provider(&self) -> Arc<StaticProvider> {
        let provider = StaticProvider::new(CHAIN_ID);
        for fc in self.commits.values() {
            provider.add_full_commit(fc.clone());
        }
        Arc::new(provider)
    }

    /// A source provider serving only the given heights.
    pub fn provider_for(&self, heights: &[Height]) -> Arc<StaticProvider> {
        let provider = StaticProvider::new(CHAIN_ID);
        for height in heights {
            provider.add_full_commit(self.full_commit(*height));
        }
        Arc::new(provider)
    }
}

/// A source wrapper counting how often each height is fetched.
pub struct CountingProvider {
    inner: Arc<StaticProvider>,
    fetches: Mutex<BTreeMap<Height, usize>>,
}

impl CountingProvider {
    pub fn new(inner: Arc<StaticProvider>) -> Self {
        Self {
            inner,
            fetches: Mutex::new(BTreeMap::new()),
        }
    }

    /// How often each height was requested via `get_full_commit`.
    pub fn fetch_counts(&self) -> BTreeMap<Height, usize> {
        self.fetches.lock().clone()
    }

    /// Total number of `get_full_commit` calls.
    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().values().sum()
    }
}

impl Provider for CountingProvider {
    fn chain_id(&self) -> &str {
        self.inner.chain_id()
    }

    fn latest_full_commit(&self) -> Result<FullCommit> {
        self.inner.latest_full_commit()
    }

    fn get_full_commit(&self, height: Height) -> Result<FullCommit> {
        *self.fetches.lock().entry(height).or_insert(0) += 1;
        self.inner.get_full_commit(height)
    }
}

/// A trusted-store wrapper counting saves per height.
pub struct CountingStore {
    inner: Arc<dyn PersistentProvider>,
    saves: Mutex<BTreeMap<Height, usize>>,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn PersistentProvider>) -> Self {
        Self {
            inner,
            saves: Mutex::new(BTreeMap::new()),
        }
    }

    /// How often each height was saved.
    pub fn save_counts(&self) -> BTreeMap<Height, usize> {
        self.saves.lock().clone()
    }
}

impl Provider for CountingStore {
    fn chain_id(&self) -> &str {
        self.inner.chain_id()
    }

    fn latest_full_commit(&self) -> Result<FullCommit> {
        self.inner.latest_full_commit()
    }

    fn get_full_commit(&self, height: Height) -> Result<FullCommit> {
        self.inner.get_full_commit(height)
    }
}

impl PersistentProvider for CountingStore {
    fn save_full_commit(&self, fc: &FullCommit) -> Result<()> {
        *self.saves.lock().entry(fc.height()).or_insert(0) += 1;
        self.inner.save_full_commit(fc)
    }

    fn latest_full_commit_at_most(&self, height: Height) -> Result<FullCommit> {
        self.inner.latest_full_commit_at_most(height)
    }

    fn validator_set(&self, height: Height) -> Result<ValidatorSet> {
        self.inner.validator_set(height)
    }
}
