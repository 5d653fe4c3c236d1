//! CRC32 (IEEE polynomial) checksum.
//!
//! This is the default algorithm for new snapshots. The finalized value is
//! emitted as 4 big-endian bytes.

use std::fmt;

use snapframe_core::ChecksumType;

use super::traits::Checksum;

/// Size of a CRC32 checksum in bytes.
pub const CRC32_SIZE: usize = 4;

/// CRC32 IEEE accumulator backed by `crc32fast`.
#[derive(Clone, Default)]
pub struct Crc32Checksum {
    hasher: crc32fast::Hasher,
}

impl fmt::Debug for Crc32Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crc32Checksum")
            .field("value", &format_args!("{:#010x}", self.value()))
            .finish()
    }
}

impl Crc32Checksum {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Finalized value as an integer.
    pub fn value(&self) -> u32 {
        self.hasher.clone().finalize()
    }
}

impl Checksum for Crc32Checksum {
    fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    fn sum(&self) -> Vec<u8> {
        self.value().to_be_bytes().to_vec()
    }

    fn reset(&mut self) {
        self.hasher.reset();
    }

    fn size(&self) -> usize {
        CRC32_SIZE
    }

    fn checksum_type(&self) -> ChecksumType {
        ChecksumType::Crc32Ieee
    }
}
