//! Tests for the in-memory key-value backend

use kestrel_store::{KvStore, MemoryKv, WriteBatch};

#[test]
fn set_get_delete() {
    let kv = MemoryKv::new();

    kv.set(b"a", b"1").unwrap();
    assert_eq!(kv.get(b"a").unwrap(), Some(b"1".to_vec()));

    kv.set(b"a", b"2").unwrap();
    assert_eq!(kv.get(b"a").unwrap(), Some(b"2".to_vec()));

    kv.delete(b"a").unwrap();
    assert_eq!(kv.get(b"a").unwrap(), None);

    // Deleting an absent key is fine.
    kv.delete(b"a").unwrap();
}

#[test]
fn reverse_iter_is_descending_with_half_open_bounds() {
    let kv = MemoryKv::new();
    for key in [b"k1", b"k2", b"k3", b"k4"] {
        kv.set(key, b"v").unwrap();
    }

    let keys: Vec<Vec<u8>> = kv.reverse_iter(b"k1", b"k4").map(|(k, _)| k).collect();

    // Start inclusive, end exclusive, descending order.
    assert_eq!(keys, vec![b"k3".to_vec(), b"k2".to_vec(), b"k1".to_vec()]);
}

#[test]
fn reverse_iter_skips_keys_outside_range() {
    let kv = MemoryKv::new();
    kv.set(b"a/1", b"v").unwrap();
    kv.set(b"b/1", b"v").unwrap();
    kv.set(b"b/2", b"v").unwrap();
    kv.set(b"c/1", b"v").unwrap();

    let keys: Vec<Vec<u8>> = kv.reverse_iter(b"b/", b"b0").map(|(k, _)| k).collect();
    assert_eq!(keys, vec![b"b/2".to_vec(), b"b/1".to_vec()]);
}

#[test]
fn reverse_iter_empty_and_inverted_ranges() {
    let kv = MemoryKv::new();
    kv.set(b"a", b"v").unwrap();

    assert_eq!(kv.reverse_iter(b"b", b"b").count(), 0);
    assert_eq!(kv.reverse_iter(b"z", b"a").count(), 0);
}

#[test]
fn write_batch_applies_all_ops() {
    let kv = MemoryKv::new();
    kv.set(b"stale", b"old").unwrap();

    let mut batch = WriteBatch::new();
    batch.set(b"x".to_vec(), b"1".to_vec());
    batch.set(b"y".to_vec(), b"2".to_vec());
    batch.delete(b"stale".to_vec());
    assert_eq!(batch.len(), 3);

    kv.write_batch(batch).unwrap();

    assert_eq!(kv.get(b"x").unwrap(), Some(b"1".to_vec()));
    assert_eq!(kv.get(b"y").unwrap(), Some(b"2".to_vec()));
    assert_eq!(kv.get(b"stale").unwrap(), None);
    assert_eq!(kv.len(), 2);
}

#[test]
fn batch_ops_apply_in_order() {
    let kv = MemoryKv::new();

    let mut batch = WriteBatch::new();
    batch.set(b"k".to_vec(), b"first".to_vec());
    batch.delete(b"k".to_vec());
    batch.set(b"k".to_vec(), b"last".to_vec());
    kv.write_batch(batch).unwrap();

    assert_eq!(kv.get(b"k").unwrap(), Some(b"last".to_vec()));
}
