//! Envelope Module
//!
//! The persisted unit: a caller payload paired with its version stamp.
//!
//! ## Stored Format
//! ```text
//! ┌─────────────┬─────────┬──────────────────────────────────────┐
//! │ Version (1) │ CRC (4) │ Body (bincode)                       │
//! │             │         │ ┌────────────┬─────────────────────┐ │
//! │             │         │ │ Stamp (16) │ PayloadLen (8) + .. │ │
//! │             │         │ └────────────┴─────────────────────┘ │
//! └─────────────┴─────────┴──────────────────────────────────────┘
//! ```
//!
//! The CRC covers the body only. The format is stable across restarts;
//! a new layout must bump the version byte.

mod codec;

use bytes::Bytes;

use crate::stamp::Stamp;

pub use codec::{FORMAT_VERSION, HEADER_SIZE};

/// A payload and the stamp it was written with
///
/// Envelopes are never mutated; every write builds a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    payload: Bytes,
    stamp: Stamp,
}

impl Envelope {
    pub fn new(payload: impl Into<Bytes>, stamp: Stamp) -> Self {
        Self {
            payload: payload.into(),
            stamp,
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn stamp(&self) -> Stamp {
        self.stamp
    }

    /// Take the payload, dropping the stamp
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Whether this envelope should replace `incumbent`
    pub fn supersedes(&self, incumbent: &Envelope) -> bool {
        self.stamp.is_newer_than(&incumbent.stamp)
    }
}
