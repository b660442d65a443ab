//! Tests for the read-through/write-through provider stack

mod support;

use std::sync::Arc;

use kestrel_light_client::db::{signed_header_key, DbProvider};
use kestrel_light_client::provider::{PersistentProvider, Provider};
use kestrel_light_client::{Error, MultiProvider, Result};
use kestrel_store::{KvStore, MemoryKv, StoreError};
use kestrel_types::{FullCommit, Height, ValidatorSet};

use support::{TestChain, CHAIN_ID};

struct Layers {
    cache_kv: Arc<MemoryKv>,
    durable_kv: Arc<MemoryKv>,
    cache: Arc<DbProvider>,
    durable: Arc<DbProvider>,
    multi: MultiProvider,
}

fn layers() -> Layers {
    let cache_kv = Arc::new(MemoryKv::new());
    let durable_kv = Arc::new(MemoryKv::new());
    let cache = Arc::new(DbProvider::new("trusted.cache", CHAIN_ID, cache_kv.clone()));
    let durable = Arc::new(DbProvider::new("trusted.store", CHAIN_ID, durable_kv.clone()));
    let multi = MultiProvider::new(
        CHAIN_ID,
        vec![
            cache.clone() as Arc<dyn PersistentProvider>,
            durable.clone(),
        ],
    );
    Layers {
        cache_kv,
        durable_kv,
        cache,
        durable,
        multi,
    }
}

#[test]
fn save_fans_out_to_every_layer() {
    let layers = layers();
    let chain = TestChain::stable(12);

    layers.multi.save_full_commit(&chain.full_commit(10)).unwrap();

    assert!(layers
        .cache_kv
        .get(&signed_header_key(CHAIN_ID, 10))
        .unwrap()
        .is_some());
    assert!(layers
        .durable_kv
        .get(&signed_header_key(CHAIN_ID, 10))
        .unwrap()
        .is_some());
}

#[test]
fn read_falls_through_to_lower_layers() {
    let layers = layers();
    let chain = TestChain::stable(12);

    // Only the durable layer has the commit, as after a restart.
    layers.durable.save_full_commit(&chain.full_commit(10)).unwrap();

    assert_eq!(layers.multi.get_full_commit(10).unwrap().height(), 10);
    assert_eq!(layers.multi.latest_full_commit().unwrap().height(), 10);
    assert!(layers.multi.validator_set(10).is_ok());
}

#[test]
fn latest_takes_the_greatest_height_across_layers() {
    let layers = layers();
    let chain = TestChain::stable(20);

    layers.cache.save_full_commit(&chain.full_commit(10)).unwrap();
    layers.durable.save_full_commit(&chain.full_commit(15)).unwrap();

    assert_eq!(layers.multi.latest_full_commit().unwrap().height(), 15);
    assert_eq!(
        layers.multi.latest_full_commit_at_most(12).unwrap().height(),
        10
    );
}

#[test]
fn empty_stack_reports_not_found() {
    let layers = layers();

    assert!(matches!(
        layers.multi.latest_full_commit(),
        Err(Error::CommitNotFound)
    ));
    assert!(matches!(
        layers.multi.get_full_commit(5),
        Err(Error::CommitNotFound)
    ));
    assert!(matches!(
        layers.multi.validator_set(5),
        Err(Error::UnknownValidators { height: 5 })
    ));
}

/// A provider that fails every operation, for error-propagation tests.
struct BrokenProvider;

impl Provider for BrokenProvider {
    fn chain_id(&self) -> &str {
        CHAIN_ID
    }

    fn latest_full_commit(&self) -> Result<FullCommit> {
        Err(StoreError::Database("disk failure".into()).into())
    }

    fn get_full_commit(&self, _height: Height) -> Result<FullCommit> {
        Err(StoreError::Database("disk failure".into()).into())
    }
}

impl PersistentProvider for BrokenProvider {
    fn save_full_commit(&self, _fc: &FullCommit) -> Result<()> {
        Err(StoreError::Database("disk failure".into()).into())
    }

    fn latest_full_commit_at_most(&self, _height: Height) -> Result<FullCommit> {
        Err(StoreError::Database("disk failure".into()).into())
    }

    fn validator_set(&self, _height: Height) -> Result<ValidatorSet> {
        Err(StoreError::Database("disk failure".into()).into())
    }
}

#[test]
fn io_errors_are_not_masked_by_lower_layers() {
    let chain = TestChain::stable(12);
    let durable = Arc::new(DbProvider::new(
        "trusted.store",
        CHAIN_ID,
        Arc::new(MemoryKv::new()),
    ));
    durable.save_full_commit(&chain.full_commit(10)).unwrap();

    let multi = MultiProvider::new(
        CHAIN_ID,
        vec![Arc::new(BrokenProvider) as Arc<dyn PersistentProvider>, durable],
    );

    // The lower layer has the answer, but the broken layer's fault must
    // surface rather than be read around.
    assert!(matches!(multi.get_full_commit(10), Err(Error::Store(_))));
    assert!(matches!(multi.latest_full_commit(), Err(Error::Store(_))));
}

#[test]
fn save_aborts_on_the_first_failing_layer() {
    let chain = TestChain::stable(12);
    let durable_kv = Arc::new(MemoryKv::new());
    let durable = Arc::new(DbProvider::new("trusted.store", CHAIN_ID, durable_kv.clone()));

    let multi = MultiProvider::new(
        CHAIN_ID,
        vec![Arc::new(BrokenProvider) as Arc<dyn PersistentProvider>, durable],
    );

    let result = multi.save_full_commit(&chain.full_commit(10));
    assert!(matches!(result, Err(Error::Store(_))));
    // Layers after the failing one were never written.
    assert!(durable_kv.is_empty());
}
