//! Stamp Generator
//!
//! Issues fresh stamps for the current instant.

use std::sync::{Arc, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use uuid::Uuid;

use super::{Stamp, GREGORIAN_OFFSET_TICKS};

/// Issues stamps for one process
///
/// Each call to [`StampGenerator::next`] returns a timestamp strictly greater
/// than the previous one from the same generator:
///
/// - **Clock advanced**: `timestamp = wall_clock`.
/// - **Clock stalled or stepped back**: `timestamp = last + 1`.
///
/// so two writes issued in sequence by one process never tie. A generator
/// that has reached `u64::MAX` ticks (only possible by observing such a
/// stamp) keeps issuing `u64::MAX` rather than wrapping to zero. The node id
/// and clock sequence are fixed per generator and keep stamps from different
/// generators distinct when their ticks collide.
pub struct StampGenerator {
    node: u64,
    clock_seq: u16,
    /// Last issued timestamp (100ns ticks since the Gregorian epoch)
    last_ticks: Mutex<u64>,
}

impl StampGenerator {
    /// Create a generator with a random node id and clock sequence
    pub fn new() -> Self {
        let entropy = Uuid::new_v4().as_u128();
        // Random node ids carry the multicast bit so they never alias a MAC
        let node = (entropy as u64 & 0xFFFF_FFFF_FFFF) | 0x0100_0000_0000;
        let clock_seq = (entropy >> 64) as u16 & 0x3FFF;
        Self::with_node(node, clock_seq)
    }

    /// Create a generator with a fixed identity
    pub fn with_node(node: u64, clock_seq: u16) -> Self {
        Self {
            node,
            clock_seq,
            last_ticks: Mutex::new(0),
        }
    }

    /// Issue a stamp for the current instant
    pub fn next(&self) -> Stamp {
        let wall = Self::wall_clock_ticks();
        let mut last = self.last_ticks.lock();

        let ticks = if wall > *last {
            wall
        } else {
            match last.checked_add(1) {
                Some(next) => next,
                None => {
                    tracing::warn!("stamp generator reached the timestamp ceiling");
                    u64::MAX
                }
            }
        };
        *last = ticks;

        Stamp::from_parts(ticks, self.clock_seq, self.node)
    }

    /// Advance past a stamp seen from another issuer
    ///
    /// Stamps issued afterwards are strictly newer than `seen`, unless `seen`
    /// is already at the `u64::MAX` ceiling.
    pub fn observe(&self, seen: &Stamp) {
        let mut last = self.last_ticks.lock();
        if seen.timestamp() > *last {
            *last = seen.timestamp();
        }
    }

    pub fn node(&self) -> u64 {
        self.node
    }

    pub fn clock_seq(&self) -> u16 {
        self.clock_seq
    }

    /// Wall-clock time in 100ns ticks since the Gregorian epoch
    fn wall_clock_ticks() -> u64 {
        let since_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        GREGORIAN_OFFSET_TICKS + (since_unix.as_nanos() / 100) as u64
    }
}

impl Default for StampGenerator {
    fn default() -> Self {
        Self::new()
    }
}

static PROCESS_GENERATOR: OnceLock<Arc<StampGenerator>> = OnceLock::new();

impl StampGenerator {
    /// The generator shared by every store in this process
    pub fn process() -> Arc<StampGenerator> {
        Arc::clone(PROCESS_GENERATOR.get_or_init(|| Arc::new(StampGenerator::new())))
    }
}

/// Issue a stamp from the process-wide generator
pub fn new_stamp() -> Stamp {
    StampGenerator::process().next()
}
