//! The fixed 16-byte header at the start of every page store file.
//!
//! ```text
//! offset  size  field
//!      0     4  magic        mix(FORMAT_VERSION, caller seed)
//!      4     4  header_size  bytes of header incl. these 16
//!      8     4  record_size  bytes per record
//!     12     4  num_records  current record count
//!     16     *  extra header (caller defined, header_size - 16 bytes)
//! ```
//!
//! Fields are encoded with the bincode legacy configuration (little-endian,
//! fixed-width integers), so the struct below encodes to exactly 16 bytes.

use serde::{Deserialize, Serialize};

use crate::errors::SpatialResult;

/// Size of the fixed part of the header.
pub const STORE_HEADER_SIZE: usize = 16;

/// Byte offset of `num_records` within the header.
pub const NUM_RECORDS_OFFSET: usize = 12;

/// On-disk format revision, mixed into every magic number.
pub const FORMAT_VERSION: u32 = 0x5254_0002;

/// Mixes two 32-bit values into one magic number.
///
/// Files created for structurally different uses get different seeds and
/// therefore never validate against each other.
pub fn mix_magic(magic1: u32, magic2: u32) -> u32 {
    const PRIME: u64 = 2_654_435_761;
    let mut result: u64 = 1;
    result = result.wrapping_mul(PRIME).wrapping_add(magic1 as u64);
    result = result.wrapping_mul(PRIME).wrapping_add(magic2 as u64);
    result as u32
}

/// Decoded form of the fixed header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreHeader {
    pub magic: u32,
    pub header_size: u32,
    pub record_size: u32,
    pub num_records: u32,
}

impl StoreHeader {
    /// Expected total file length for this header.
    pub fn expected_file_len(&self) -> u64 {
        self.header_size as u64 + self.record_size as u64 * self.num_records as u64
    }

    pub fn encode_into(&self, buffer: &mut [u8]) -> SpatialResult<()> {
        bincode::serde::encode_into_slice(
            self,
            &mut buffer[..STORE_HEADER_SIZE],
            bincode::config::legacy(),
        )?;
        Ok(())
    }

    pub fn decode(buffer: &[u8]) -> SpatialResult<Self> {
        let (header, _) =
            bincode::serde::decode_from_slice(&buffer[..STORE_HEADER_SIZE], bincode::config::legacy())?;
        Ok(header)
    }
}
