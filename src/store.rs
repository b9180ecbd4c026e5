//! Store Module
//!
//! The versioned store: last-writer-wins over an injected engine.
//!
//! ## Responsibilities
//! - Attach a stamp to every write and compare it with the stored one
//! - Run each read-compare-write as one engine transaction
//! - Report whether a write was applied or lost to a newer stamp
//! - Tell corrupt entries apart from absent ones
//!
//! ## Per-key state machine
//! ```text
//!            set (any stamp)              set s' > s
//!   ABSENT ─────────────────▶ PRESENT(s) ───────────▶ PRESENT(s')
//!     ▲                           │
//!     └───────────────────────────┘
//!            delete s' > s
//! ```
//! Every other operation leaves the key as it is.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use crossbeam::utils::Backoff;
use parking_lot::RwLock;

use crate::config::StoreConfig;
use crate::engine::{Engine, RedbEngine};
use crate::envelope::Envelope;
use crate::error::{Result, StoreError};
use crate::stamp::{Stamp, StampGenerator};

/// Result of a conditional set or delete that reached the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write (or delete) took effect
    Applied,

    /// The stored stamp was equal or newer; nothing changed
    Superseded,
}

impl WriteOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, WriteOutcome::Applied)
    }
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOutcome::Applied => f.write_str("applied"),
            WriteOutcome::Superseded => f.write_str("superseded"),
        }
    }
}

/// Result of a read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Envelope),

    NotFound,

    /// An entry exists but its bytes do not decode
    Corrupt(String),
}

impl Lookup {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            Lookup::Found(envelope) => Some(envelope),
            _ => None,
        }
    }

    pub fn payload(&self) -> Option<&Bytes> {
        self.envelope().map(Envelope::payload)
    }

    pub fn into_envelope(self) -> Option<Envelope> {
        match self {
            Lookup::Found(envelope) => Some(envelope),
            _ => None,
        }
    }
}

/// Versioned key-value store
///
/// ## Concurrency Model
///
/// The store adds no locking of its own around data. Each conditional
/// operation is a single `Engine::update`, and the engine guarantees that
/// two writers of the same key cannot both compare against the same
/// incumbent. `get` is a snapshot read and sees either the old or the new
/// envelope.
///
/// `engine` sits behind an `RwLock<Option<_>>` only so `close` can wait for
/// in-flight operations and later calls fail with `StoreError::Closed`.
pub struct VersionedStore<E: Engine = RedbEngine> {
    engine: RwLock<Option<E>>,
    stamps: Arc<StampGenerator>,
    max_conflict_retries: u32,
}

impl VersionedStore<RedbEngine> {
    /// Open or create a durable store
    pub fn open(config: StoreConfig) -> Result<Self> {
        let engine = RedbEngine::open(&config)?;
        tracing::info!(path = %engine.path().display(), "store opened");
        Ok(Self::with_engine(engine, &config))
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let config = StoreConfig::builder().data_dir(path.as_ref()).build();
        Self::open(config)
    }
}

impl<E: Engine> VersionedStore<E> {
    /// Wrap an already-open engine
    ///
    /// Stamps come from the process-wide generator.
    pub fn with_engine(engine: E, config: &StoreConfig) -> Self {
        Self {
            engine: RwLock::new(Some(engine)),
            stamps: StampGenerator::process(),
            max_conflict_retries: config.max_conflict_retries,
        }
    }

    /// Replace the stamp generator
    pub fn with_generator(mut self, stamps: Arc<StampGenerator>) -> Self {
        self.stamps = stamps;
        self
    }

    // =========================================================================
    // Stamps
    // =========================================================================

    /// Issue a stamp for the current instant
    pub fn new_stamp(&self) -> Stamp {
        self.stamps.next()
    }

    /// Build an envelope carrying a fresh stamp
    pub fn envelope(&self, payload: impl Into<Bytes>) -> Envelope {
        Envelope::new(payload, self.new_stamp())
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Store `payload` under `key` unless the stored stamp is equal or newer
    pub fn conditional_set(
        &self,
        key: &[u8],
        payload: impl Into<Bytes>,
        stamp: Stamp,
    ) -> Result<WriteOutcome> {
        self.set_envelope(key, &Envelope::new(payload, stamp))
    }

    /// Store a prebuilt envelope under `key`
    ///
    /// Fails with `StoreError::Decode` if the stored envelope is corrupt; the
    /// corrupt entry is left in place.
    pub fn set_envelope(&self, key: &[u8], envelope: &Envelope) -> Result<WriteOutcome> {
        let encoded = envelope.encode()?;

        let outcome = self.run_conditional("set", key, |engine| {
            engine.update(|txn| {
                if let Some(bytes) = txn.get(key)? {
                    let incumbent = Envelope::decode(&bytes)?;
                    if !envelope.supersedes(&incumbent) {
                        return Ok(WriteOutcome::Superseded);
                    }
                }
                txn.set(key, &encoded)?;
                Ok(WriteOutcome::Applied)
            })
        })?;

        tracing::debug!(
            key = %String::from_utf8_lossy(key),
            stamp = %envelope.stamp(),
            %outcome,
            "conditional set"
        );
        Ok(outcome)
    }

    /// Read the current envelope for `key`
    pub fn get(&self, key: &[u8]) -> Result<Lookup> {
        let guard = self.engine.read();
        let engine = guard.as_ref().ok_or(StoreError::Closed)?;

        let lookup = match engine.view(key)? {
            None => Lookup::NotFound,
            Some(bytes) => match Envelope::decode(&bytes) {
                Ok(envelope) => Lookup::Found(envelope),
                Err(e) => {
                    tracing::warn!(
                        key = %String::from_utf8_lossy(key),
                        error = %e,
                        "stored envelope is corrupt"
                    );
                    Lookup::Corrupt(e.to_string())
                }
            },
        };

        Ok(lookup)
    }

    /// Read just the payload for `key`
    ///
    /// A corrupt entry is an error here rather than a distinct outcome.
    pub fn get_payload(&self, key: &[u8]) -> Result<Option<Bytes>> {
        match self.get(key)? {
            Lookup::Found(envelope) => Ok(Some(envelope.into_payload())),
            Lookup::NotFound => Ok(None),
            Lookup::Corrupt(reason) => Err(StoreError::Decode(reason)),
        }
    }

    /// Remove `key` if `stamp` is strictly newer than the stored stamp
    ///
    /// Deleting an absent key is an applied no-op.
    pub fn conditional_delete(&self, key: &[u8], stamp: Stamp) -> Result<WriteOutcome> {
        let outcome = self.run_conditional("delete", key, |engine| {
            engine.update(|txn| {
                if let Some(bytes) = txn.get(key)? {
                    let incumbent = Envelope::decode(&bytes)?;
                    if !stamp.is_newer_than(&incumbent.stamp()) {
                        return Ok(WriteOutcome::Superseded);
                    }
                    txn.delete(key)?;
                }
                Ok(WriteOutcome::Applied)
            })
        })?;

        tracing::debug!(
            key = %String::from_utf8_lossy(key),
            %stamp,
            %outcome,
            "conditional delete"
        );
        Ok(outcome)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Release the engine
    ///
    /// Waits for in-flight operations. Closing an already closed store is a
    /// no-op.
    pub fn close(&self) -> Result<()> {
        let engine = self.engine.write().take();
        match engine {
            Some(engine) => {
                engine.close()?;
                tracing::info!("store closed");
            }
            None => tracing::debug!("store already closed"),
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.engine.read().is_none()
    }

    /// Run one conditional attempt, re-running it after transient conflicts
    fn run_conditional<F>(
        &self,
        op: &'static str,
        key: &[u8],
        mut attempt: F,
    ) -> Result<WriteOutcome>
    where
        F: FnMut(&E) -> Result<WriteOutcome>,
    {
        let guard = self.engine.read();
        let engine = guard.as_ref().ok_or(StoreError::Closed)?;

        let backoff = Backoff::new();
        let mut retries = 0;
        loop {
            match attempt(engine) {
                Err(e) if e.is_retryable() && retries < self.max_conflict_retries => {
                    retries += 1;
                    tracing::debug!(op, retries, error = %e, "retrying after conflict");
                    backoff.snooze();
                }
                Err(e) => {
                    tracing::warn!(
                        op,
                        key = %String::from_utf8_lossy(key),
                        error = %e,
                        "conditional operation failed"
                    );
                    return Err(e);
                }
                Ok(outcome) => return Ok(outcome),
            }
        }
    }
}

impl<E: Engine> Drop for VersionedStore<E> {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.get_mut().take() {
            if let Err(e) = engine.close() {
                tracing::warn!(error = %e, "failed to close engine on drop");
            }
        }
    }
}
