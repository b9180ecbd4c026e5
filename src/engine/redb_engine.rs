//! redb engine
//!
//! Durable engine backed by a single redb database file.

use std::fs;
use std::path::{Path, PathBuf};

use redb::{Builder, Database, Durability, ReadableTable, Table, TableDefinition};

use crate::config::{StoreConfig, SyncMode};
use crate::error::{Result, StoreError};

use super::{Engine, EngineTxn};

// All envelopes live in one table keyed by the caller's key
const ENVELOPES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("envelopes");

/// Engine over a redb database
///
/// redb admits one write transaction at a time, so the read-compare-write
/// inside `update` cannot interleave with another writer. Readers work
/// from MVCC snapshots and never block writers.
pub struct RedbEngine {
    db: Database,
    path: PathBuf,
    sync_mode: SyncMode,
}

impl std::fmt::Debug for RedbEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbEngine")
            .field("path", &self.path)
            .field("sync_mode", &self.sync_mode)
            .finish_non_exhaustive()
    }
}

impl RedbEngine {
    /// Open or create the database described by `config`
    ///
    /// Creates `data_dir` if needed. Any failure to acquire the file
    /// (permissions, held by another handle, unrecoverable corruption)
    /// is reported as `StorageUnavailable`.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        config.validate()?;

        let path = config.db_path();
        let unavailable = |reason: String| StoreError::StorageUnavailable {
            path: path.clone(),
            reason,
        };

        fs::create_dir_all(&config.data_dir).map_err(|e| unavailable(e.to_string()))?;

        let db = Builder::new()
            .set_cache_size(config.cache_size)
            .create(&path)
            .map_err(|e| unavailable(e.to_string()))?;

        // Create the table up front so read transactions never miss it
        let txn = db.begin_write().map_err(|e| unavailable(e.to_string()))?;
        {
            txn.open_table(ENVELOPES)
                .map_err(|e| unavailable(e.to_string()))?;
        }
        txn.commit().map_err(|e| unavailable(e.to_string()))?;

        tracing::debug!(path = %path.display(), "opened redb engine");

        Ok(Self {
            db,
            path,
            sync_mode: config.sync_mode,
        })
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn durability(&self) -> Durability {
        match self.sync_mode {
            SyncMode::Immediate => Durability::Immediate,
            SyncMode::Eventual => Durability::Eventual,
        }
    }
}

impl Engine for RedbEngine {
    fn view(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ENVELOPES)?;
        let value = table.get(key)?.map(|v| v.value().to_vec());
        Ok(value)
    }

    fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn EngineTxn) -> Result<T>,
    {
        let mut txn = self.db.begin_write()?;
        txn.set_durability(self.durability());

        let result = {
            let table = txn.open_table(ENVELOPES)?;
            let mut scoped = RedbTxn { table };
            f(&mut scoped)
        };

        match result {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort_err) = txn.abort() {
                    tracing::warn!(error = %abort_err, "failed to abort write transaction");
                }
                Err(e)
            }
        }
    }

    fn close(self) -> Result<()> {
        // Eventual commits only become durable with a later immediate one
        if self.sync_mode == SyncMode::Eventual {
            let mut txn = self.db.begin_write()?;
            txn.set_durability(Durability::Immediate);
            txn.commit()?;
        }

        tracing::debug!(path = %self.path.display(), "closed redb engine");
        Ok(())
    }
}

/// Write transaction view over the envelopes table
struct RedbTxn<'txn> {
    table: Table<'txn, &'static [u8], &'static [u8]>,
}

impl EngineTxn for RedbTxn<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.table.get(key)?.map(|v| v.value().to_vec()))
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.table.insert(key, value)?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.table.remove(key)?;
        Ok(())
    }
}
