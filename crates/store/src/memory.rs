//! Ordered in-memory key-value backend.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::trace;

use crate::kv::{BatchOp, KvStore, WriteBatch};
use crate::Result;

/// An in-memory [`KvStore`] over a `BTreeMap`.
///
/// Serves two roles: the bounded cache layer in front of a durable trusted
/// store, and the backend of choice in tests. All operations lock the whole
/// map, which is the right trade for a cache holding at most a few hundred
/// entries.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryKv {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.entries.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn reverse_iter(
        &self,
        start: &[u8],
        end: &[u8],
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_> {
        if start >= end {
            return Box::new(std::iter::empty());
        }
        // Snapshot the range under the read lock, then release it; scans
        // are short (one chain's keys) and callers may write mid-iteration.
        let snapshot: Vec<(Vec<u8>, Vec<u8>)> = self
            .entries
            .read()
            .range(start.to_vec()..end.to_vec())
            .map(|(k, v)| (k.clone(), v.clone()))
            .rev()
            .collect();
        trace!(entries = snapshot.len(), "memory kv reverse scan");
        Box::new(snapshot.into_iter())
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        let mut entries = self.entries.write();
        for op in batch.into_ops() {
            match op {
                BatchOp::Set { key, value } => {
                    entries.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    entries.remove(&key);
                }
            }
        }
        Ok(())
    }
}
