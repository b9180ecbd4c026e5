//! Envelope codec
//!
//! Encoding and decoding of envelopes to their stored bytes.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::stamp::Stamp;

use super::Envelope;

/// Current stored format version
pub const FORMAT_VERSION: u8 = 1;

/// Header size: Version (1) + CRC (4)
pub const HEADER_SIZE: usize = 5;

/// Body as serialized by bincode
#[derive(Serialize, Deserialize)]
struct EnvelopeRecord {
    stamp: [u8; 16],
    payload: Vec<u8>,
}

impl Envelope {
    /// Encode to the stored format
    pub fn encode(&self) -> Result<Vec<u8>> {
        let record = EnvelopeRecord {
            stamp: self.stamp.to_bytes(),
            payload: self.payload.to_vec(),
        };
        let body = bincode::serialize(&record).map_err(|e| StoreError::Encode(e.to_string()))?;

        let mut bytes = Vec::with_capacity(HEADER_SIZE + body.len());
        bytes.push(FORMAT_VERSION);
        bytes.extend_from_slice(&crc32fast::hash(&body).to_le_bytes());
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    /// Decode from the stored format
    ///
    /// Fails on truncation, an unknown version, a checksum mismatch, or a
    /// malformed body.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(StoreError::Decode(format!(
                "envelope too short: {} bytes",
                bytes.len()
            )));
        }

        let version = bytes[0];
        if version != FORMAT_VERSION {
            return Err(StoreError::Decode(format!(
                "unknown envelope version {}",
                version
            )));
        }

        let stored_crc = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        let body = &bytes[HEADER_SIZE..];
        let computed_crc = crc32fast::hash(body);
        if stored_crc != computed_crc {
            return Err(StoreError::Decode(format!(
                "checksum mismatch: stored {:08x}, computed {:08x}",
                stored_crc, computed_crc
            )));
        }

        let record: EnvelopeRecord =
            bincode::deserialize(body).map_err(|e| StoreError::Decode(e.to_string()))?;

        Ok(Envelope::new(record.payload, Stamp::from_bytes(record.stamp)))
    }
}
