//! Key-value-backed persistent provider.
//!
//! Stores signed headers and validator sets in any [`KvStore`] under a
//! stable, bit-exact key format:
//!
//! ```text
//! {chain_id}/{height:010}/sh    signed header at height
//! {chain_id}/{height:010}/vs    validator set at height
//! ```
//!
//! Heights are zero-padded to ten digits so lexicographic key order equals
//! numeric height order, which lets "latest" be a reverse range scan.
//! Values are the canonical length-prefixed encoding from
//! [`kestrel_types::encoding`].
//!
//! Saving a full commit at height `h` writes three entries in one atomic
//! batch: the next validator set at `h + 1`, the validator set at `h`, and
//! the signed header at `h`. Ordering the header last means any reader
//! that can see a header can also assemble its validator sets.

use std::sync::Arc;

use tracing::{debug, warn};

use kestrel_store::{KvStore, WriteBatch};
use kestrel_types::{decode, encode, FullCommit, Height, SignedHeader, ValidatorSet};

use crate::provider::{PersistentProvider, Provider};
use crate::{Error, Result};

/// Key of the signed header stored for `(chain_id, height)`.
pub fn signed_header_key(chain_id: &str, height: Height) -> Vec<u8> {
    format!("{chain_id}/{height:010}/sh").into_bytes()
}

/// Key of the validator set stored for `(chain_id, height)`.
pub fn validator_set_key(chain_id: &str, height: Height) -> Vec<u8> {
    format!("{chain_id}/{height:010}/vs").into_bytes()
}

/// First height whose decimal form no longer fits the ten-digit padding,
/// after which lexicographic key order stops matching height order.
const PADDED_HEIGHT_LIMIT: Height = 10_000_000_000;

/// The two kinds of entry a [`DbProvider`] stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// A signed header entry.
    SignedHeader,
    /// A validator set entry.
    ValidatorSet,
}

/// Parse a store key back into `(chain_id, height, kind)`.
///
/// Returns `None` for keys that do not match the format; scans skip those
/// so the provider can share a keyspace with other data.
pub fn parse_key(key: &[u8]) -> Option<(&str, Height, KeyKind)> {
    let key = std::str::from_utf8(key).ok()?;
    let mut parts = key.split('/');
    let chain_id = parts.next().filter(|c| !c.is_empty())?;
    let digits = parts.next()?;
    let kind = parts.next()?;
    if parts.next().is_some() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let height: Height = digits.parse().ok()?;
    let kind = match kind {
        "sh" => KeyKind::SignedHeader,
        "vs" => KeyKind::ValidatorSet,
        _ => return None,
    };
    Some((chain_id, height, kind))
}

/// The half-open key range holding every entry of `chain_id`.
///
/// `/` is 0x2f, so bumping the separator to `0` (0x30) yields the least
/// key strictly above the chain's prefix.
fn chain_range(chain_id: &str) -> (Vec<u8>, Vec<u8>) {
    let start = format!("{chain_id}/").into_bytes();
    let end = format!("{chain_id}0").into_bytes();
    (start, end)
}

/// A [`PersistentProvider`] over a key-value store.
///
/// Optionally bounds retention: after each save, only the `limit` highest
/// stored heights survive. One instance over a [`kestrel_store::MemoryKv`]
/// serves as the cache layer of the usual trusted-store stack; another
/// over a durable backend serves as the store of record.
pub struct DbProvider {
    label: String,
    chain_id: String,
    kv: Arc<dyn KvStore>,
    limit: usize,
}

impl DbProvider {
    /// Create a provider for `chain_id` over `kv`. The label only names
    /// the instance in logs.
    pub fn new(label: impl Into<String>, chain_id: impl Into<String>, kv: Arc<dyn KvStore>) -> Self {
        Self {
            label: label.into(),
            chain_id: chain_id.into(),
            kv,
            limit: 0,
        }
    }

    /// Keep only the `limit` highest heights after each save. Zero means
    /// unlimited.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn read_validator_set(&self, height: Height) -> Result<ValidatorSet> {
        let bytes = self
            .kv
            .get(&validator_set_key(&self.chain_id, height))?
            .ok_or(Error::UnknownValidators { height })?;
        let mut valset: ValidatorSet = decode(&bytes).map_err(Error::Validation)?;
        valset.rebuild_index();
        Ok(valset)
    }

    /// Assemble the full commit for a stored signed header by loading the
    /// validator sets at its height and the next.
    fn fill_full_commit(&self, signed_header: SignedHeader) -> Result<FullCommit> {
        let height = signed_header.height();
        let validators = self.read_validator_set(height)?;
        let next_validators = self.read_validator_set(height + 1)?;
        Ok(FullCommit::new(signed_header, validators, next_validators))
    }

    /// Delete every entry below the `limit` highest stored header heights.
    fn trim_old_heights(&self) -> Result<()> {
        let (start, end) = chain_range(&self.chain_id);

        // First pass: find the lowest header height that survives.
        let mut kept = 0usize;
        let mut cutoff: Option<Height> = None;
        let mut last_height: Option<Height> = None;
        for (key, _) in self.kv.reverse_iter(&start, &end) {
            let Some((_, height, KeyKind::SignedHeader)) = parse_key(&key) else {
                continue;
            };
            if last_height == Some(height) {
                continue;
            }
            last_height = Some(height);
            kept += 1;
            if kept == self.limit {
                cutoff = Some(height);
            } else if kept > self.limit {
                break;
            }
        }
        let Some(cutoff) = cutoff else {
            return Ok(());
        };
        if kept <= self.limit {
            return Ok(());
        }

        // Second pass: drop header and validator entries below the cutoff.
        let mut batch = WriteBatch::new();
        for (key, _) in self.kv.reverse_iter(&start, &end) {
            if let Some((_, height, _)) = parse_key(&key) {
                if height < cutoff {
                    batch.delete(key);
                }
            }
        }
        let deleted = batch.len();
        self.kv.write_batch(batch)?;
        debug!(
            provider = %self.label,
            cutoff,
            deleted,
            "trimmed trusted store to retention limit"
        );
        Ok(())
    }
}

impl Provider for DbProvider {
    fn chain_id(&self) -> &str {
        &self.chain_id
    }

    fn latest_full_commit(&self) -> Result<FullCommit> {
        self.latest_full_commit_at_most(Height::MAX)
    }

    fn get_full_commit(&self, height: Height) -> Result<FullCommit> {
        let bytes = self
            .kv
            .get(&signed_header_key(&self.chain_id, height))?
            .ok_or(Error::CommitNotFound)?;
        let signed_header: SignedHeader = decode(&bytes).map_err(Error::Validation)?;
        self.fill_full_commit(signed_header)
    }
}

impl PersistentProvider for DbProvider {
    fn save_full_commit(&self, fc: &FullCommit) -> Result<()> {
        if fc.chain_id() != self.chain_id {
            return Err(Error::ChainIdMismatch {
                expected: self.chain_id.clone(),
                got: fc.chain_id().to_string(),
            });
        }
        let height = fc.height();

        // Next validators first, header last: a visible header implies
        // both validator sets are present.
        let mut batch = WriteBatch::new();
        batch.set(
            validator_set_key(&self.chain_id, height + 1),
            encode(&fc.next_validators).map_err(Error::Validation)?,
        );
        batch.set(
            validator_set_key(&self.chain_id, height),
            encode(&fc.validators).map_err(Error::Validation)?,
        );
        batch.set(
            signed_header_key(&self.chain_id, height),
            encode(&fc.signed_header).map_err(Error::Validation)?,
        );
        self.kv.write_batch(batch)?;
        debug!(provider = %self.label, height, "saved full commit");

        if self.limit > 0 {
            self.trim_old_heights()?;
        }
        Ok(())
    }

    fn latest_full_commit_at_most(&self, height: Height) -> Result<FullCommit> {
        let (start, prefix_end) = chain_range(&self.chain_id);
        // Bounding the scan by the header key is only sound while heights
        // fit the ten-digit padding; beyond it, scan the whole chain
        // prefix and let the height filter below do the bounding.
        let end = if height < PADDED_HEIGHT_LIMIT {
            let mut end = signed_header_key(&self.chain_id, height);
            end.push(0x00);
            end
        } else {
            prefix_end
        };

        for (key, value) in self.kv.reverse_iter(&start, &end) {
            let Some((_, key_height, KeyKind::SignedHeader)) = parse_key(&key) else {
                continue;
            };
            if key_height > height {
                continue;
            }
            let signed_header: SignedHeader = decode(&value).map_err(Error::Validation)?;
            match self.fill_full_commit(signed_header) {
                Ok(fc) => return Ok(fc),
                Err(Error::UnknownValidators { height: missing }) => {
                    // Tolerate a partially written entry and keep
                    // scanning; point reads still surface it.
                    warn!(
                        provider = %self.label,
                        header = key_height,
                        missing,
                        "skipping header with missing validator set"
                    );
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
        Err(Error::CommitNotFound)
    }

    fn validator_set(&self, height: Height) -> Result<ValidatorSet> {
        self.read_validator_set(height)
    }
}
