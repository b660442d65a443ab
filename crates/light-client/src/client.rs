//! The user-facing light client: trust options, bootstrap, verification.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use kestrel_store::{KvStore, MemoryKv};
use kestrel_types::{FullCommit, Hash, Height, SignedHeader};

use crate::db::DbProvider;
use crate::multi::MultiProvider;
use crate::provider::{PersistentProvider, Provider};
use crate::verifier::{ForkEvidence, Verifier, VerifierConfig};
use crate::{Error, Result};

/// Retention depth of the in-memory cache layer built by
/// [`LightClient::with_store`].
const CACHE_RETENTION: usize = 100;

/// Confirmation hook invoked when bootstrapping from the source's latest
/// header instead of an explicit root of trust.
pub type ConfirmationCallback =
    Arc<dyn Fn(Height, Hash) -> std::result::Result<(), String> + Send + Sync>;

/// Weak-subjectivity trust configuration.
///
/// A new client, or one that has been offline for longer than the
/// unbonding period, cannot bootstrap from the chain alone: it needs a
/// root of trust obtained out of band, from a validator, a friend, or a
/// secure website. Two options:
///
/// 1. An explicit `(trust_height, trust_hash)` pair, set with
///    [`TrustOptions::with_root_of_trust`]. The client verifies the
///    source's header at that height against the hash.
/// 2. Otherwise the client trusts the source's latest header, invoking
///    the [`TrustOptions::with_callback`] hook (if any) so the operator
///    can confirm interactively.
///
/// `trust_period` should equal the chain's unbonding period minus an
/// evidence-submission synchrony margin.
#[derive(Clone)]
pub struct TrustOptions {
    /// Only trust commits up to this old.
    pub trust_period: Duration,
    /// Height of the explicit root of trust; zero when unset.
    pub trust_height: Height,
    /// Header hash of the explicit root of trust.
    pub trust_hash: Option<Hash>,
    /// Confirmation hook for bootstrapping from the source's latest.
    pub callback: Option<ConfirmationCallback>,
}

impl TrustOptions {
    /// Trust options with only the trust period set.
    pub fn new(trust_period: Duration) -> Self {
        Self {
            trust_period,
            trust_height: 0,
            trust_hash: None,
            callback: None,
        }
    }

    /// Pin an explicit `(height, hash)` root of trust.
    pub fn with_root_of_trust(mut self, height: Height, hash: Hash) -> Self {
        self.trust_height = height;
        self.trust_hash = Some(hash);
        self
    }

    /// Install a confirmation hook for latest-header bootstrap.
    pub fn with_callback(
        mut self,
        callback: impl Fn(Height, Hash) -> std::result::Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Whether an explicit root of trust is configured (option 1).
    pub fn has_root_of_trust(&self) -> bool {
        self.trust_height > 0 && self.trust_hash.is_some()
    }

    /// Check the options are usable.
    pub fn validate(&self) -> Result<()> {
        if self.trust_period.is_zero() {
            return Err(Error::InvalidTrustOptions(
                "trust period must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for TrustOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustOptions")
            .field("trust_period", &self.trust_period)
            .field("trust_height", &self.trust_height)
            .field("trust_hash", &self.trust_hash.map(hex::encode))
            .field("callback", &self.callback.as_ref().map(|_| "<set>"))
            .finish()
    }
}

/// The light client facade.
///
/// Wraps a source provider and a trusted store behind the operations a
/// caller needs: advance trust to a height, and check a header against
/// trust already established. Construction performs the weak-subjectivity
/// bootstrap; a client that constructed successfully always has a trusted
/// anchor.
pub struct LightClient {
    verifier: Verifier,
    trust_options: TrustOptions,
}

impl LightClient {
    /// Create a client over an explicit trusted store and bootstrap it.
    pub fn new(
        chain_id: impl Into<String>,
        trust_options: TrustOptions,
        source: Arc<dyn Provider>,
        trusted: Arc<dyn PersistentProvider>,
    ) -> Result<Self> {
        Self::with_config(
            chain_id,
            trust_options,
            source,
            trusted,
            VerifierConfig::default(),
        )
    }

    /// Create a client with the default layered trusted store: a bounded
    /// in-memory cache in front of the caller's durable key-value store.
    pub fn with_store(
        chain_id: impl Into<String>,
        trust_options: TrustOptions,
        source: Arc<dyn Provider>,
        kv: Arc<dyn KvStore>,
    ) -> Result<Self> {
        let chain_id = chain_id.into();
        let cache = DbProvider::new("trusted.cache", chain_id.as_str(), Arc::new(MemoryKv::new()))
            .with_limit(CACHE_RETENTION);
        let durable = DbProvider::new("trusted.store", chain_id.as_str(), kv);
        let trusted = MultiProvider::new(
            chain_id.as_str(),
            vec![
                Arc::new(cache) as Arc<dyn PersistentProvider>,
                Arc::new(durable),
            ],
        );
        Self::new(chain_id, trust_options, source, Arc::new(trusted))
    }

    /// Create a client with explicit verifier configuration.
    pub fn with_config(
        chain_id: impl Into<String>,
        trust_options: TrustOptions,
        source: Arc<dyn Provider>,
        trusted: Arc<dyn PersistentProvider>,
        config: VerifierConfig,
    ) -> Result<Self> {
        trust_options.validate()?;
        let verifier = Verifier::with_config(
            chain_id,
            trust_options.trust_period,
            source,
            trusted,
            config,
        );
        let client = Self {
            verifier,
            trust_options,
        };
        client.bootstrap()?;
        Ok(client)
    }

    /// Add a source whose commits are cross-checked against the primary
    /// after each successful advance.
    pub fn add_alternative_source(mut self, source: Arc<dyn Provider>) -> Self {
        self.verifier.add_alternative_source(source);
        self
    }

    /// Establish the trusted anchor under weak subjectivity.
    ///
    /// If the trusted store already holds an unexpired commit at or above
    /// the configured trust height, it is resumed as the anchor and the
    /// source is not consulted.
    fn bootstrap(&self) -> Result<()> {
        let chain_id = self.verifier.chain_id().to_string();
        let source = Arc::clone(self.verifier.source());
        let opts = &self.trust_options;

        match self.verifier.trusted().latest_full_commit() {
            Ok(existing)
                if existing.height() >= opts.trust_height
                    && age_of(existing.signed_header.time()) <= opts.trust_period =>
            {
                info!(
                    height = existing.height(),
                    "resuming from existing trusted state"
                );
                self.verifier.record_verified(existing.height());
                return Ok(());
            }
            Ok(stale) => {
                info!(
                    height = stale.height(),
                    "existing trusted state unusable, re-bootstrapping"
                );
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        let latest = source.latest_full_commit()?;

        let root_of_trust = opts.trust_hash.filter(|_| opts.trust_height > 0);
        let anchor = if let Some(expected) = root_of_trust {
            let trust_fc = source.get_full_commit(opts.trust_height)?;

            // The root of trust must still be inside the trust period
            // relative to the chain tip, else we could never leave it.
            let age = Duration::from_secs(
                latest
                    .signed_header
                    .time()
                    .saturating_sub(trust_fc.signed_header.time()),
            );
            if age > opts.trust_period {
                return Err(Error::StaleTrust {
                    age,
                    trust_period: opts.trust_period,
                });
            }

            let got = trust_fc.block_id();
            if got != expected {
                return Err(Error::TrustHashMismatch {
                    expected: hex::encode(expected),
                    got: hex::encode(got),
                });
            }
            trust_fc
        } else {
            let height = latest.height();
            let hash = latest.block_id();
            warn!(
                height,
                hash = %hex::encode(hash),
                "no root of trust configured; trusting source's latest header"
            );
            if let Some(callback) = &opts.callback {
                callback(height, hash).map_err(|reason| Error::BootstrapDeclined { reason })?;
            }
            latest
        };

        anchor.validate_full(&chain_id)?;
        self.verifier.trusted().save_full_commit(&anchor)?;
        self.verifier.record_verified(anchor.height());
        info!(height = anchor.height(), "bootstrapped trusted anchor");
        Ok(())
    }

    /// The chain this client is configured for.
    pub fn chain_id(&self) -> &str {
        self.verifier.chain_id()
    }

    /// Highest height verified so far.
    pub fn last_verified_height(&self) -> Height {
        self.verifier.last_verified_height()
    }

    /// The latest trusted full commit.
    pub fn latest_trusted(&self) -> Result<FullCommit> {
        self.verifier.trusted().latest_full_commit()
    }

    /// Advance trust to `height`. See [`Verifier::update_to_height`].
    pub fn update_to_height(&self, height: Height) -> Result<FullCommit> {
        self.verifier.update_to_height(height)
    }

    /// Advance trust to the source's current latest height.
    pub fn update_to_latest(&self) -> Result<FullCommit> {
        let latest = self.verifier.source().latest_full_commit()?;
        self.verifier.update_to_height(latest.height())
    }

    /// Check a header against trust already established.
    ///
    /// Never advances trust and never writes: it answers whether this
    /// header is valid under the validator set the trusted store holds
    /// for its height. Use [`LightClient::update_to_height`] first if the
    /// height is beyond the frontier.
    pub fn verify(&self, signed_header: &SignedHeader) -> Result<()> {
        let chain_id = self.verifier.chain_id();
        if signed_header.chain_id() != chain_id {
            return Err(Error::ChainIdMismatch {
                expected: chain_id.to_string(),
                got: signed_header.chain_id().to_string(),
            });
        }

        let last_verified = self.verifier.last_verified_height();
        if signed_header.height() < last_verified {
            return Err(Error::HeightBelowTrusted {
                height: signed_header.height(),
                last_verified,
            });
        }

        let valset = self
            .verifier
            .trusted()
            .validator_set(signed_header.height())?;
        let valset_hash = valset.hash();
        if valset_hash != signed_header.header.validators_hash {
            return Err(Error::UnexpectedValidators {
                got: hex::encode(valset_hash),
                want: hex::encode(signed_header.header.validators_hash),
            });
        }

        signed_header.validate_basic(chain_id)?;

        valset.verify_commit(
            chain_id,
            &signed_header.commit.block_id,
            signed_header.height(),
            &signed_header.commit,
        )?;
        Ok(())
    }

    /// Drain fork evidence recorded by alternative-source cross-checks.
    pub fn take_fork_evidence(&self) -> Vec<ForkEvidence> {
        self.verifier.take_fork_evidence()
    }

    /// The underlying verifier, for state inspection.
    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }
}

fn age_of(time: u64) -> Duration {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    Duration::from_secs(now.saturating_sub(time))
}
