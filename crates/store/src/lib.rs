//! # Kestrel Store
//!
//! The key-value storage abstraction underneath the light client's trusted
//! store:
//!
//! - [`KvStore`] - the interface a backend must provide: point reads and
//!   writes, atomic batches, and a bounded reverse range scan
//! - [`WriteBatch`] - a set of writes applied atomically
//! - [`MemoryKv`] - an ordered in-memory backend, used as the cache layer
//!   in front of a durable store and throughout the tests
//!
//! Durable backends (an embedded database, a remote store) implement
//! [`KvStore`] outside this crate; the light client is written against the
//! trait only.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod kv;
pub mod memory;

pub use kv::{BatchOp, KvStore, WriteBatch};
pub use memory::MemoryKv;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by key-value backends.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The backend failed to serve the request.
    #[error("database error: {0}")]
    Database(String),
}
