//! Engine Module
//!
//! The boundary between the versioned store and the storage engine beneath it.
//!
//! ## Responsibilities
//! - Open/create on-disk state
//! - Run a closure inside one atomic single-key read-modify-write transaction
//! - Read-your-writes inside a transaction
//! - Snapshot-isolated standalone reads
//! - Durable commit
//!
//! The store depends on nothing else: no range scans, no secondary indexes.

mod memory;
mod redb_engine;

pub use memory::MemoryEngine;
pub use redb_engine::RedbEngine;

use crate::error::Result;

/// A transactional key-value engine
///
/// ## Concurrency
/// `update` must serialize conflicting transactions on the same key: either
/// by holding a write lock for the whole closure, or by detecting the race at
/// commit and failing with [`StoreError::Conflict`](crate::StoreError::Conflict).
pub trait Engine: Send + Sync {
    /// Read one key from a consistent snapshot
    fn view(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Run `f` inside a write transaction
    ///
    /// Commits iff `f` returns `Ok`; otherwise every change made through
    /// the transaction is discarded.
    fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn EngineTxn) -> Result<T>;

    /// Flush and release the engine
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Single-key operations available inside a write transaction
pub trait EngineTxn {
    /// Read a key, observing this transaction's own writes
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove a key; removing an absent key is not an error
    fn delete(&mut self, key: &[u8]) -> Result<()>;
}
