//! Stamp Module
//!
//! 128-bit version stamps that order competing writes.
//!
//! ## Layout
//! ```text
//! ┌──────────────────────────────┬───────────────┬────────────────────┐
//! │ Timestamp (64)               │ ClockSeq (16) │ Node (48)          │
//! │ 100ns ticks since 1582-10-15 │               │                    │
//! └──────────────────────────────┴───────────────┴────────────────────┘
//!  ^ compared                     ^ disambiguation only, never compared
//! ```
//!
//! The tick base is the RFC 4122 version-1 UUID time base, so a v1 UUID can
//! be re-laid into a stamp without losing its ordering.

mod generator;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

pub use generator::{new_stamp, StampGenerator};

/// 100ns ticks between the Gregorian epoch (1582-10-15) and the Unix epoch
pub const GREGORIAN_OFFSET_TICKS: u64 = 0x01B2_1DD2_1381_4000;

const NODE_MASK: u64 = 0xFFFF_FFFF_FFFF;

/// A version stamp
///
/// Ordering between stamps is defined only by [`Stamp::timestamp`]; use
/// [`Stamp::is_newer_than`] to arbitrate writes. Equal timestamps from
/// different issuers are not ordered, and the incumbent wins the tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stamp(u128);

impl Stamp {
    /// The zero stamp, older than every generated stamp
    pub const ZERO: Stamp = Stamp(0);

    /// Build a stamp from its three components
    ///
    /// `node` is truncated to 48 bits.
    pub const fn from_parts(timestamp: u64, clock_seq: u16, node: u64) -> Self {
        let low = ((clock_seq as u64) << 48) | (node & NODE_MASK);
        Stamp(((timestamp as u128) << 64) | low as u128)
    }

    pub const fn from_u128(raw: u128) -> Self {
        Stamp(raw)
    }

    pub const fn as_u128(&self) -> u128 {
        self.0
    }

    /// Ordering component: 100ns ticks since the Gregorian epoch
    pub const fn timestamp(&self) -> u64 {
        (self.0 >> 64) as u64
    }

    pub const fn clock_seq(&self) -> u16 {
        (self.0 >> 48) as u16
    }

    pub const fn node(&self) -> u64 {
        (self.0 as u64) & NODE_MASK
    }

    /// Strictly newer by timestamp; ties return false
    pub fn is_newer_than(&self, incumbent: &Stamp) -> bool {
        self.timestamp() > incumbent.timestamp()
    }

    /// Big-endian byte form, as persisted
    pub fn to_bytes(&self) -> [u8; 16] {
        self.0.to_be_bytes()
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Stamp(u128::from_be_bytes(bytes))
    }

    /// Microseconds since the Unix epoch, saturating at zero for pre-1970 stamps
    pub fn unix_micros(&self) -> u64 {
        self.timestamp().saturating_sub(GREGORIAN_OFFSET_TICKS) / 10
    }

    /// Re-lay an RFC 4122 version-1 UUID as a stamp
    ///
    /// The 60-bit v1 timestamp becomes the ordering component; the clock
    /// sequence (variant bits stripped) and node id are carried over.
    pub fn from_uuid_v1(uuid: &Uuid) -> Result<Self, StampParseError> {
        if uuid.get_version_num() != 1 {
            return Err(StampParseError::NotVersion1(uuid.get_version_num()));
        }

        let raw = uuid.as_u128();
        let time_low = (raw >> 96) as u64 & 0xFFFF_FFFF;
        let time_mid = (raw >> 80) as u64 & 0xFFFF;
        let time_hi = (raw >> 64) as u64 & 0x0FFF;
        let timestamp = (time_hi << 48) | (time_mid << 32) | time_low;

        let clock_seq = (raw >> 48) as u16 & 0x3FFF;
        let node = raw as u64 & NODE_MASK;

        Ok(Stamp::from_parts(timestamp, clock_seq, node))
    }

    /// Parse a hyphenated version-1 UUID string as a stamp
    pub fn parse_uuid_v1(s: &str) -> Result<Self, StampParseError> {
        let uuid = Uuid::parse_str(s).map_err(|e| StampParseError::Uuid(e.to_string()))?;
        Self::from_uuid_v1(&uuid)
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Accepts either 32 hex digits (the `Display` form) or a hyphenated v1 UUID
impl FromStr for Stamp {
    type Err = StampParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains('-') {
            return Self::parse_uuid_v1(s);
        }
        if s.len() != 32 {
            return Err(StampParseError::Length(s.len()));
        }
        // from_str_radix would also take a leading '+'
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(StampParseError::Hex(format!("non-hex character in {:?}", s)));
        }
        u128::from_str_radix(s, 16)
            .map(Stamp)
            .map_err(|e| StampParseError::Hex(e.to_string()))
    }
}

/// Errors from parsing a stamp
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StampParseError {
    #[error("expected 32 hex digits, got {0} characters")]
    Length(usize),

    #[error("invalid hex: {0}")]
    Hex(String),

    #[error("invalid uuid: {0}")]
    Uuid(String),

    #[error("uuid is version {0}, expected a time-based version 1 uuid")]
    NotVersion1(usize),
}
