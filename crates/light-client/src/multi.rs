//! A read-through/write-through stack of persistent providers.

use std::sync::Arc;

use tracing::debug;

use kestrel_types::{FullCommit, Height, ValidatorSet};

use crate::provider::{PersistentProvider, Provider};
use crate::{Error, Result};

/// Places one or more persistent providers behind a single interface.
///
/// The usual arrangement is a bounded in-memory cache in front of a
/// durable store. Reads run through the layers in order and recover from
/// a layer that merely lacks the data; writes fan out to every layer so
/// the layers never diverge.
pub struct MultiProvider {
    chain_id: String,
    providers: Vec<Arc<dyn PersistentProvider>>,
}

impl MultiProvider {
    /// Stack `providers`, consulted in the given order on reads.
    pub fn new(chain_id: impl Into<String>, providers: Vec<Arc<dyn PersistentProvider>>) -> Self {
        Self {
            chain_id: chain_id.into(),
            providers,
        }
    }

    /// Run `read` over the layers, returning the first hit.
    ///
    /// A layer answering "not found" is skipped; any other error is an
    /// I/O fault and propagates immediately rather than being masked by a
    /// lower layer.
    fn first_hit<T>(
        &self,
        read: impl Fn(&dyn PersistentProvider) -> Result<T>,
        recoverable: impl Fn(&Error) -> bool,
        miss: Error,
    ) -> Result<T> {
        for provider in &self.providers {
            match read(provider.as_ref()) {
                Ok(value) => return Ok(value),
                Err(err) if recoverable(&err) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(miss)
    }
}

impl Provider for MultiProvider {
    fn chain_id(&self) -> &str {
        &self.chain_id
    }

    fn latest_full_commit(&self) -> Result<FullCommit> {
        self.latest_full_commit_at_most(Height::MAX)
    }

    fn get_full_commit(&self, height: Height) -> Result<FullCommit> {
        self.first_hit(
            |p| p.get_full_commit(height),
            Error::is_not_found,
            Error::CommitNotFound,
        )
    }
}

impl PersistentProvider for MultiProvider {
    /// Save on every layer in order, aborting on the first failure.
    ///
    /// A partial write is retryable: layers are idempotent on identical
    /// content, so re-running the save converges.
    fn save_full_commit(&self, fc: &FullCommit) -> Result<()> {
        for provider in &self.providers {
            provider.save_full_commit(fc)?;
        }
        Ok(())
    }

    /// Ask every layer and return the commit with the greatest height.
    fn latest_full_commit_at_most(&self, height: Height) -> Result<FullCommit> {
        let mut best: Option<FullCommit> = None;
        for provider in &self.providers {
            match provider.latest_full_commit_at_most(height) {
                Ok(fc) => {
                    if best.as_ref().map_or(true, |b| fc.height() > b.height()) {
                        best = Some(fc);
                    }
                }
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            }
        }
        match best {
            Some(fc) => {
                debug!(height = fc.height(), "multi provider served latest commit");
                Ok(fc)
            }
            None => Err(Error::CommitNotFound),
        }
    }

    fn validator_set(&self, height: Height) -> Result<ValidatorSet> {
        self.first_hit(
            |p| p.validator_set(height),
            |err| matches!(err, Error::UnknownValidators { .. }),
            Error::UnknownValidators { height },
        )
    }
}
