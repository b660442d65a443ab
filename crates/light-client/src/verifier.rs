//! The verification engine: skip-verification, bisection, single-flight.
//!
//! The verifier is the only component that confers trust. It pulls
//! unverified full commits from a source provider, validates them
//! cryptographically against the most recent trusted commit, and writes
//! accepted commits through the trusted store.
//!
//! ## Skip-verification
//!
//! To advance from trusted height `t` to target `h`, the verifier checks
//! that validators holding more than the configured [`TrustThreshold`] of
//! the power of the *trusted* next-validator set also signed the commit at
//! `h`. If the validator set drifted too far for that to hold, bisecting
//! mode recurses into the midpoint `(t + h) / 2` and retries, halving the
//! interval until each hop has enough overlap; sequential mode gives up.
//!
//! ## Concurrency
//!
//! `update_to_height` is single-flight per target height: one caller (the
//! leader) runs the algorithm while concurrent callers for the same height
//! wait on a shared gate and observe the leader's result. Bisection
//! recurses through `update_to_height` itself, so concurrent advances
//! share intermediate work too.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use kestrel_types::{FullCommit, Hash, Height, TrustThreshold, ValidatorSet};

use crate::provider::{PersistentProvider, Provider};
use crate::{Error, Result};

/// How the verifier advances trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Advance one height at a time, fetching and validating every
    /// intermediate commit. Slower, but never relies on skip trust.
    Sequential,
    /// Skip ahead using trust-threshold overlap, bisecting the interval
    /// on excessive validator drift.
    #[default]
    Bisecting,
}

/// Tunable verification parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Sequential or bisecting advancement.
    pub mode: Mode,
    /// Minimum trusted-power overlap required to skip-verify.
    pub trust_level: TrustThreshold,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Bisecting,
            trust_level: TrustThreshold::ONE_THIRD,
        }
    }
}

/// Where an in-flight advance for a target height currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvanceState {
    /// Fetching the candidate commit from the source.
    Fetching,
    /// Verifying the candidate against the trusted anchor.
    Verifying,
    /// Waiting on a recursive advance to the midpoint height.
    Bisecting(Height),
    /// The candidate was verified and saved.
    Saved,
    /// The trusted anchor exceeded the trust period.
    Expired,
    /// The advance failed for any other reason.
    Failed,
}

impl std::fmt::Display for AdvanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdvanceState::Fetching => write!(f, "fetching"),
            AdvanceState::Verifying => write!(f, "verifying"),
            AdvanceState::Bisecting(mid) => write!(f, "bisecting via {mid}"),
            AdvanceState::Saved => write!(f, "saved"),
            AdvanceState::Expired => write!(f, "expired"),
            AdvanceState::Failed => write!(f, "failed"),
        }
    }
}

/// A divergent commit observed from an alternative source at a height the
/// verifier had already verified. Evidence of a fork or a lying source;
/// recorded for the caller, never adjudicated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkEvidence {
    /// Height at which the divergence was observed.
    pub height: Height,
    /// Block id the verifier accepted.
    pub verified: Hash,
    /// Block id the alternative source returned.
    pub conflicting: Hash,
}

/// The single-flight gate concurrent callers for one height share.
struct AdvanceGate {
    inner: Mutex<GateInner>,
    done: Condvar,
}

struct GateInner {
    state: AdvanceState,
    result: Option<Result<FullCommit>>,
}

impl AdvanceGate {
    fn new() -> Self {
        Self {
            inner: Mutex::new(GateInner {
                state: AdvanceState::Fetching,
                result: None,
            }),
            done: Condvar::new(),
        }
    }

    fn set_state(&self, state: AdvanceState) {
        self.inner.lock().state = state;
    }

    fn state(&self) -> AdvanceState {
        self.inner.lock().state
    }

    fn publish(&self, result: Result<FullCommit>) {
        let mut inner = self.inner.lock();
        inner.state = match &result {
            Ok(_) => AdvanceState::Saved,
            Err(Error::TrustExpired { .. }) => AdvanceState::Expired,
            Err(_) => AdvanceState::Failed,
        };
        inner.result = Some(result);
        self.done.notify_all();
    }

    fn wait(&self) -> Result<FullCommit> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(result) = &inner.result {
                return result.clone();
            }
            self.done.wait(&mut inner);
        }
    }
}

/// Shared mutable verifier state, behind one short-held lock.
struct Shared {
    pending: HashMap<Height, Arc<AdvanceGate>>,
    last_verified_height: Height,
}

/// The light-client verification engine.
///
/// Holds shared read-only references to its providers; all of its own
/// mutable state lives behind a short-held lock, so one verifier serves
/// any number of concurrent callers. A process may host many verifiers
/// for distinct chains.
pub struct Verifier {
    chain_id: String,
    trust_period: Duration,
    config: VerifierConfig,
    source: Arc<dyn Provider>,
    trusted: Arc<dyn PersistentProvider>,
    alternative_sources: Vec<Arc<dyn Provider>>,
    shared: Mutex<Shared>,
    fork_evidence: Mutex<Vec<ForkEvidence>>,
}

impl Verifier {
    /// Create a verifier with the default bisecting configuration.
    pub fn new(
        chain_id: impl Into<String>,
        trust_period: Duration,
        source: Arc<dyn Provider>,
        trusted: Arc<dyn PersistentProvider>,
    ) -> Self {
        Self::with_config(chain_id, trust_period, source, trusted, VerifierConfig::default())
    }

    /// Create a verifier with explicit configuration.
    pub fn with_config(
        chain_id: impl Into<String>,
        trust_period: Duration,
        source: Arc<dyn Provider>,
        trusted: Arc<dyn PersistentProvider>,
        config: VerifierConfig,
    ) -> Self {
        Self {
            chain_id: chain_id.into(),
            trust_period,
            config,
            source,
            trusted,
            alternative_sources: Vec::new(),
            shared: Mutex::new(Shared {
                pending: HashMap::new(),
                last_verified_height: 0,
            }),
            fork_evidence: Mutex::new(Vec::new()),
        }
    }

    /// Add sources whose answers are cross-checked against the primary
    /// after each successful advance.
    pub fn with_alternative_sources(mut self, sources: Vec<Arc<dyn Provider>>) -> Self {
        self.alternative_sources = sources;
        self
    }

    /// Register one more alternative source.
    pub fn add_alternative_source(&mut self, source: Arc<dyn Provider>) {
        self.alternative_sources.push(source);
    }

    /// The primary source this verifier pulls new commits from.
    pub fn source(&self) -> &Arc<dyn Provider> {
        &self.source
    }

    /// The chain this verifier is configured for.
    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// The trusted store this verifier writes through.
    pub fn trusted(&self) -> &Arc<dyn PersistentProvider> {
        &self.trusted
    }

    /// Highest height this verifier has verified. Never decreases.
    pub fn last_verified_height(&self) -> Height {
        self.shared.lock().last_verified_height
    }

    /// Where the in-flight advance for `height` stands, if there is one.
    pub fn advance_state(&self, height: Height) -> Option<AdvanceState> {
        self.shared.lock().pending.get(&height).map(|g| g.state())
    }

    /// Drain the fork evidence recorded by alternative-source
    /// cross-checks.
    pub fn take_fork_evidence(&self) -> Vec<ForkEvidence> {
        std::mem::take(&mut *self.fork_evidence.lock())
    }

    /// Raise the verification frontier to `height` if it is higher.
    pub(crate) fn record_verified(&self, height: Height) {
        let mut shared = self.shared.lock();
        if height > shared.last_verified_height {
            shared.last_verified_height = height;
        }
    }

    /// Verify and persist the full commit at `height`, advancing trust as
    /// far as the configured mode allows.
    ///
    /// Idempotent: if the trusted store already holds the commit, it is
    /// returned without touching the source. Single-flight per height:
    /// concurrent callers for the same target share one execution and one
    /// result.
    pub fn update_to_height(&self, height: Height) -> Result<FullCommit> {
        let (gate, leader) = {
            let mut shared = self.shared.lock();
            match shared.pending.get(&height) {
                Some(gate) => (Arc::clone(gate), false),
                None => {
                    let gate = Arc::new(AdvanceGate::new());
                    shared.pending.insert(height, Arc::clone(&gate));
                    (gate, true)
                }
            }
        };

        if !leader {
            return gate.wait();
        }

        let result = self.advance(height, &gate);
        gate.publish(result.clone());
        {
            let mut shared = self.shared.lock();
            shared.pending.remove(&height);
            if let Ok(fc) = &result {
                if fc.height() > shared.last_verified_height {
                    shared.last_verified_height = fc.height();
                }
            }
        }
        result
    }

    /// The leader's path for one target height.
    fn advance(&self, height: Height, gate: &AdvanceGate) -> Result<FullCommit> {
        // Already trusted: nothing to do.
        match self.trusted.get_full_commit(height) {
            Ok(fc) => return Ok(fc),
            Err(err) if err.is_not_found() => {}
            Err(err) => {
                warn!(height, %err, "failed to load trusted commit");
                return Err(err);
            }
        }

        let result = match self.config.mode {
            Mode::Bisecting => self.fetch_and_verify_bisecting(height, gate),
            Mode::Sequential => self.fetch_and_verify_sequential(height, gate),
        };
        if let Ok(fc) = &result {
            info!(height = fc.height(), "advanced trust");
            self.cross_check(fc);
        }
        result
    }

    /// Fetch the commit at `height` from the source and validate its
    /// internal consistency. Shared entry step of both modes.
    fn fetch_candidate(&self, height: Height) -> Result<FullCommit> {
        let fc = self.source.get_full_commit(height)?;
        if fc.height() != height {
            return Err(Error::CommitNotFound);
        }
        fc.validate_full(&self.chain_id)?;
        Ok(fc)
    }

    fn fetch_and_verify_bisecting(&self, height: Height, gate: &AdvanceGate) -> Result<FullCommit> {
        gate.set_state(AdvanceState::Fetching);
        let source_fc = self.fetch_candidate(height)?;

        loop {
            gate.set_state(AdvanceState::Verifying);
            let trusted_fc = self.trusted.latest_full_commit_at_most(height)?;
            if trusted_fc.height() == height {
                // A recursive advance landed exactly on the target.
                return Ok(trusted_fc);
            }

            match self.verify_and_save(&trusted_fc, &source_fc) {
                Ok(()) => return Ok(source_fc),
                Err(err) if is_insufficient_overlap(&err) => {
                    let (start, end) = (trusted_fc.height(), source_fc.height());
                    let mid = (start + end) / 2;
                    if mid == start || mid == end {
                        // Adjacent heights: the interval cannot be halved,
                        // the validator set simply changed too much.
                        return Err(Error::TooMuchChange { height });
                    }
                    debug!(start, end, mid, "insufficient overlap, bisecting");
                    gate.set_state(AdvanceState::Bisecting(mid));
                    self.update_to_height(mid)?;
                    // Trust now reaches at least `mid`; retry the hop.
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn fetch_and_verify_sequential(&self, height: Height, gate: &AdvanceGate) -> Result<FullCommit> {
        gate.set_state(AdvanceState::Fetching);
        let target_fc = self.fetch_candidate(height)?;

        loop {
            gate.set_state(AdvanceState::Verifying);
            let trusted_fc = self.trusted.latest_full_commit_at_most(height)?;
            if trusted_fc.height() == height {
                return Ok(trusted_fc);
            }

            let next_height = trusted_fc.height() + 1;
            let step_fc = if next_height == height {
                target_fc.clone()
            } else {
                gate.set_state(AdvanceState::Fetching);
                let fc = self.fetch_candidate(next_height)?;
                gate.set_state(AdvanceState::Verifying);
                fc
            };

            match self.verify_and_save(&trusted_fc, &step_fc) {
                Ok(()) => {
                    if step_fc.height() == height {
                        return Ok(step_fc);
                    }
                }
                Err(err) if is_insufficient_overlap(&err) => {
                    return Err(Error::TooMuchChange {
                        height: step_fc.height(),
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Verify `new_fc` against the best trusted commit below it and
    /// persist it on success.
    ///
    /// The candidate's internal consistency was already established by
    /// `fetch_candidate`; what is decided here is whether prior trust
    /// extends to it.
    ///
    /// Panics if `trusted_fc` is not strictly below `new_fc`; callers
    /// uphold that ordering.
    fn verify_and_save(&self, trusted_fc: &FullCommit, new_fc: &FullCommit) -> Result<()> {
        assert!(
            trusted_fc.height() < new_fc.height(),
            "trusted height {} must be below candidate height {}",
            trusted_fc.height(),
            new_fc.height(),
        );

        // No forward progress across an expired anchor. Saturating: an
        // anchor timestamped slightly in the future (clock skew) has age
        // zero rather than being impossible.
        let age = Duration::from_secs(unix_now().saturating_sub(trusted_fc.signed_header.time()));
        if age > self.trust_period {
            return Err(Error::TrustExpired {
                age,
                trust_period: self.trust_period,
            });
        }

        trusted_fc.next_validators.verify_commit_trusting(
            &self.chain_id,
            &new_fc.signed_header.commit.block_id,
            new_fc.height(),
            &new_fc.signed_header.commit,
            self.config.trust_level,
        )?;

        // Power-share drift between the trusted next set and the new set.
        // Reported for observability; the trusting check above is the
        // acceptance gate.
        let drift = voting_power_drift(&trusted_fc.next_validators, &new_fc.validators);
        debug!(
            trusted_height = trusted_fc.height(),
            new_height = new_fc.height(),
            drift,
            "accepted skip-verify step"
        );

        self.trusted.save_full_commit(new_fc)
    }

    /// Compare each alternative source's commit at the verified height
    /// against the verified one, recording divergence as fork evidence.
    fn cross_check(&self, verified: &FullCommit) {
        if self.alternative_sources.is_empty() {
            return;
        }
        let height = verified.height();
        let verified_id = verified.block_id();
        for source in &self.alternative_sources {
            match source.get_full_commit(height) {
                Ok(other) if other.block_id() != verified_id => {
                    let evidence = ForkEvidence {
                        height,
                        verified: verified_id,
                        conflicting: other.block_id(),
                    };
                    warn!(
                        height,
                        verified = %hex::encode(verified_id),
                        conflicting = %hex::encode(evidence.conflicting),
                        "alternative source diverges from verified commit"
                    );
                    self.fork_evidence.lock().push(evidence);
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(height, %err, "alternative source unavailable for cross-check");
                }
            }
        }
    }
}

/// Whether an error is the trusting-power shortfall that bisection
/// recovers from.
fn is_insufficient_overlap(err: &Error) -> bool {
    matches!(
        err,
        Error::Validation(kestrel_types::Error::InsufficientVotingPower { .. })
    )
}

/// Sum over the new validators of the absolute change in power share
/// relative to the trusted next-validator set. The legacy acceptance
/// metric, kept for observability only.
fn voting_power_drift(trusted_next: &ValidatorSet, new_validators: &ValidatorSet) -> f64 {
    let trusted_total = trusted_next.total_power() as f64;
    let new_total = new_validators.total_power() as f64;
    new_validators
        .validators()
        .iter()
        .map(|v| {
            let new_share = v.voting_power as f64 / new_total;
            let old_share = trusted_next
                .get_by_address(&v.address)
                .map(|t| t.voting_power as f64 / trusted_total)
                .unwrap_or(0.0);
            (new_share - old_share).abs()
        })
        .sum()
}

/// Current time as Unix seconds.
fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
