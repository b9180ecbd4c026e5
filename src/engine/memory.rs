//! In-memory engine
//!
//! BTreeMap-based engine for tests and diskless embedding. Nothing survives
//! the process.

use std::collections::BTreeMap;

use parking_lot::{Mutex, RwLock};

use crate::error::Result;

use super::{Engine, EngineTxn};

/// Ephemeral engine
///
/// ## Concurrency
/// - `writer`: serializes `update` calls, so a transaction's reads cannot go
///   stale before it commits
/// - `data`: writes are staged in the transaction and applied under one
///   write-lock acquisition; readers see all of a commit or none of it
#[derive(Default)]
pub struct MemoryEngine {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    writer: Mutex<()>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Overwrite raw stored bytes, bypassing transactions
    pub fn insert_raw(&self, key: &[u8], value: &[u8]) {
        self.data.write().insert(key.to_vec(), value.to_vec());
    }
}

impl Engine for MemoryEngine {
    fn view(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn EngineTxn) -> Result<T>,
    {
        let _write_guard = self.writer.lock();

        let mut txn = MemoryTxn {
            base: &self.data,
            staged: BTreeMap::new(),
        };
        let value = f(&mut txn)?;

        let mut data = self.data.write();
        for (key, change) in txn.staged {
            match change {
                Some(v) => {
                    data.insert(key, v);
                }
                None => {
                    data.remove(&key);
                }
            }
        }

        Ok(value)
    }

    fn close(self) -> Result<()> {
        Ok(())
    }
}

/// Staged changes over the committed map; `None` marks a delete
struct MemoryTxn<'a> {
    base: &'a RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    staged: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl EngineTxn for MemoryTxn<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(change) = self.staged.get(key) {
            return Ok(change.clone());
        }
        Ok(self.base.read().get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.staged.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.staged.insert(key.to_vec(), None);
        Ok(())
    }
}
