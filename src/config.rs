//! Configuration for stampkv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, StoreError};

/// Main configuration for a stampkv store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for the engine file
    /// Internal structure:
    ///   {data_dir}/
    ///     └── stampkv.redb     (engine database file)
    pub data_dir: PathBuf,

    /// Engine file name inside `data_dir`
    pub file_name: String,

    /// Engine page cache size (in bytes)
    pub cache_size: usize,

    // -------------------------------------------------------------------------
    // Commit Configuration
    // -------------------------------------------------------------------------
    /// How each write transaction reaches disk
    pub sync_mode: SyncMode,

    /// Times a conditional operation is re-run after a transient conflict
    pub max_conflict_retries: u32,
}

/// Commit durability mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// fsync on every commit (safest, slowest)
    Immediate,

    /// Commit is visible at once and reaches disk with a later immediate
    /// commit or a clean close
    Eventual,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./stampkv_data"),
            file_name: "stampkv.redb".to_string(),
            cache_size: 64 * 1024 * 1024, // 64 MB
            sync_mode: SyncMode::Immediate,
            max_conflict_retries: 3,
        }
    }
}

impl StoreConfig {
    /// Create a new config builder
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    /// Full path of the engine file
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.file_name)
    }

    /// Reject settings the engine cannot open with
    pub fn validate(&self) -> Result<()> {
        if self.file_name.is_empty() {
            return Err(StoreError::Config("file_name must not be empty".into()));
        }
        if self.cache_size == 0 {
            return Err(StoreError::Config("cache_size must be non-zero".into()));
        }
        Ok(())
    }
}

/// Builder for StoreConfig
#[derive(Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Set the data directory
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the engine file name
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.config.file_name = name.into();
        self
    }

    /// Set the engine page cache size (in bytes)
    pub fn cache_size(mut self, bytes: usize) -> Self {
        self.config.cache_size = bytes;
        self
    }

    /// Set the commit durability mode
    pub fn sync_mode(mut self, mode: SyncMode) -> Self {
        self.config.sync_mode = mode;
        self
    }

    /// Set how many times a conflicting conditional operation is re-run
    pub fn max_conflict_retries(mut self, retries: u32) -> Self {
        self.config.max_conflict_retries = retries;
        self
    }

    pub fn build(self) -> StoreConfig {
        self.config
    }
}
