//! Error types for stampkv
//!
//! Provides a unified error type for all store operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for stampkv operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Storage unavailable at {}: {reason}", path.display())]
    StorageUnavailable { path: PathBuf, reason: String },

    #[error("Store is closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Envelope Errors
    // -------------------------------------------------------------------------
    #[error("Envelope encode error: {0}")]
    Encode(String),

    #[error("Envelope decode error: {0}")]
    Decode(String),

    // -------------------------------------------------------------------------
    // Engine Errors
    // -------------------------------------------------------------------------
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Another writer raced this transaction; re-running it may succeed.
    #[error("Transaction conflict: {0}")]
    Conflict(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Whether re-running the whole operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

// =============================================================================
// Engine error conversions
// =============================================================================

impl From<redb::TransactionError> for StoreError {
    fn from(e: redb::TransactionError) -> Self {
        StoreError::Transaction(e.to_string())
    }
}

impl From<redb::TableError> for StoreError {
    fn from(e: redb::TableError) -> Self {
        StoreError::Transaction(e.to_string())
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(e: redb::StorageError) -> Self {
        StoreError::Transaction(e.to_string())
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(e: redb::CommitError) -> Self {
        StoreError::Transaction(e.to_string())
    }
}
