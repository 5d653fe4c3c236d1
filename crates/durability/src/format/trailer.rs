//! Version 2 block framing and trailer.
//!
//! A v2 payload is a run of checksummed blocks closed by a 16-byte trailer:
//!
//! ```text
//! block   := data_len(4, LE) + data[data_len] + block_checksum
//! trailer := END_OF_BLOCKS(4, LE) + block_count(4, LE) + payload_len(8, LE)
//! ```
//!
//! `data_len` is in `1..=MAX_V2_BLOCK_SIZE`, so the `END_OF_BLOCKS` marker
//! (`u32::MAX`) in the same slot unambiguously starts the trailer.

use snapframe_core::{IntegrityError, V2_END_OF_BLOCKS, V2_TRAILER_SIZE};

/// Size of the length field in front of each block.
pub const BLOCK_LENGTH_SIZE: usize = 4;

/// Trailer closing a v2 payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockTrailer {
    /// Number of blocks written
    pub block_count: u32,
    /// Total logical payload bytes across all blocks
    pub payload_len: u64,
}

impl BlockTrailer {
    /// Serialize to the 16-byte on-disk form
    pub fn to_bytes(&self) -> [u8; V2_TRAILER_SIZE as usize] {
        let mut buf = [0u8; V2_TRAILER_SIZE as usize];
        buf[0..4].copy_from_slice(&V2_END_OF_BLOCKS.to_le_bytes());
        buf[4..8].copy_from_slice(&self.block_count.to_le_bytes());
        buf[8..16].copy_from_slice(&self.payload_len.to_le_bytes());
        buf
    }

    /// Parse the on-disk form, validating the end-of-blocks marker
    pub fn from_bytes(data: &[u8]) -> Result<Self, IntegrityError> {
        if data.len() != V2_TRAILER_SIZE as usize {
            return Err(IntegrityError::MalformedTrailer(format!(
                "expected {} bytes, got {}",
                V2_TRAILER_SIZE,
                data.len()
            )));
        }

        let marker = read_u32_le(&data[0..4]);
        if marker != V2_END_OF_BLOCKS {
            return Err(IntegrityError::MalformedTrailer(format!(
                "bad end-of-blocks marker {:#010x}",
                marker
            )));
        }

        let mut len = [0u8; 8];
        len.copy_from_slice(&data[8..16]);
        Ok(BlockTrailer {
            block_count: read_u32_le(&data[4..8]),
            payload_len: u64::from_le_bytes(len),
        })
    }
}

/// Decode a little-endian u32 from the first 4 bytes of `bytes`
///
/// Callers check that at least 4 bytes are present.
pub(crate) fn read_u32_le(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}
