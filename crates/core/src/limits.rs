//! Format limits shared by snapshot writers, readers and validators
//!
//! ## Contract
//!
//! These values are part of the on-disk format. Changing any of them makes
//! existing snapshot files unreadable, so they are FROZEN and can only change
//! together with a new format version.

/// Size of the fixed header region at the start of every snapshot file.
///
/// The region holds an 8-byte length prefix, the serialized header record and
/// zero padding. Payload bytes always start at this offset.
pub const SNAPSHOT_HEADER_SIZE: u64 = 1024;

/// Size of the little-endian length prefix at offset 0.
pub const HEADER_LENGTH_PREFIX_SIZE: u64 = 8;

/// Largest serialized header record that fits in the header region.
pub const MAX_HEADER_RECORD_SIZE: u64 = SNAPSHOT_HEADER_SIZE - HEADER_LENGTH_PREFIX_SIZE;

/// Size of the trailer appended after the last v2 payload block.
pub const V2_TRAILER_SIZE: u64 = 16;

/// Marker occupying the length slot of a v2 block to announce the trailer.
///
/// Block lengths are capped at [`MAX_V2_BLOCK_SIZE`], so this value can never
/// be mistaken for a block.
pub const V2_END_OF_BLOCKS: u32 = u32::MAX;

/// Default amount of payload data carried by one v2 block (64KB).
pub const DEFAULT_V2_BLOCK_SIZE: usize = 64 * 1024;

/// Largest data length a v2 block may declare (16MB).
pub const MAX_V2_BLOCK_SIZE: usize = 16 * 1024 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_record_budget() {
        assert_eq!(MAX_HEADER_RECORD_SIZE + HEADER_LENGTH_PREFIX_SIZE, SNAPSHOT_HEADER_SIZE);
    }

    #[test]
    fn test_block_sizes_below_end_marker() {
        assert!(DEFAULT_V2_BLOCK_SIZE <= MAX_V2_BLOCK_SIZE);
        assert!((MAX_V2_BLOCK_SIZE as u64) < V2_END_OF_BLOCKS as u64);
    }
}
