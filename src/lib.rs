//! # stampkv
//!
//! A versioned key-value store over an embedded transactional engine:
//! - Every write carries a 128-bit version stamp
//! - Concurrent writers are resolved by stamp, not by arrival order
//!   (last-writer-wins, incumbent wins ties)
//! - Each read-compare-write runs as one engine transaction
//! - Writes report whether they were applied or superseded
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Caller                                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ conditional_set / get / conditional_delete
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  VersionedStore                             │
//! │        (stamp comparison, envelope encode/decode)           │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//!   ┌─────────────────┐               ┌──────────────────┐
//!   │ StampGenerator  │               │  Engine (trait)  │
//!   │ (per process)   │               │  one txn per op  │
//!   └─────────────────┘               └────────┬─────────┘
//!                                      ┌───────┴────────┐
//!                                      ▼                ▼
//!                               ┌────────────┐   ┌─────────────┐
//!                               │ RedbEngine │   │MemoryEngine │
//!                               │ (durable)  │   │ (ephemeral) │
//!                               └────────────┘   └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use stampkv::{VersionedStore, WriteOutcome};
//!
//! # fn main() -> stampkv::Result<()> {
//! let store = VersionedStore::open_path("./data")?;
//!
//! let older = store.new_stamp();
//! let newer = store.new_stamp();
//!
//! store.conditional_set(b"user:1", "bob", newer)?;
//! let outcome = store.conditional_set(b"user:1", "alice", older)?;
//! assert_eq!(outcome, WriteOutcome::Superseded);
//!
//! store.close()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod stamp;
pub mod envelope;
pub mod engine;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{StoreError, Result};
pub use config::{StoreConfig, SyncMode};
pub use stamp::{new_stamp, Stamp, StampGenerator};
pub use envelope::Envelope;
pub use engine::{Engine, EngineTxn, MemoryEngine, RedbEngine};
pub use store::{Lookup, VersionedStore, WriteOutcome};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of stampkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
