//! Snapshot writer configuration
//!
//! Replaces process-wide format defaults with an explicit value handed to
//! every writer. The default writes the current version with CRC32.

use thiserror::Error;

use crate::limits::{DEFAULT_V2_BLOCK_SIZE, MAX_V2_BLOCK_SIZE};
use crate::types::{ChecksumType, SnapshotVersion};

/// Smallest v2 block size accepted by [`SnapshotConfig::validate`].
pub const MIN_V2_BLOCK_SIZE: usize = 512;

/// Snapshot writer configuration parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotConfig {
    /// Payload framing version (default: [`SnapshotVersion::CURRENT`]).
    pub version: SnapshotVersion,

    /// Checksum algorithm for payload and header (default: CRC32 IEEE).
    pub checksum_type: ChecksumType,

    /// Payload bytes per v2 block (default: 64KB).
    ///
    /// Ignored by v1. Readers never need this value because every block
    /// carries its own length.
    pub block_size: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        SnapshotConfig {
            version: SnapshotVersion::CURRENT,
            checksum_type: ChecksumType::Crc32Ieee,
            block_size: DEFAULT_V2_BLOCK_SIZE,
        }
    }
}

impl SnapshotConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the framing version (builder pattern).
    pub fn with_version(mut self, version: SnapshotVersion) -> Self {
        self.version = version;
        self
    }

    /// Set the checksum algorithm (builder pattern).
    pub fn with_checksum_type(mut self, checksum_type: ChecksumType) -> Self {
        self.checksum_type = checksum_type;
        self
    }

    /// Set the v2 block size (builder pattern).
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.checksum_type == ChecksumType::Highway {
            return Err(ConfigError::ChecksumNotImplemented(self.checksum_type));
        }
        if !(MIN_V2_BLOCK_SIZE..=MAX_V2_BLOCK_SIZE).contains(&self.block_size) {
            return Err(ConfigError::BlockSizeOutOfRange {
                size: self.block_size,
                min: MIN_V2_BLOCK_SIZE,
                max: MAX_V2_BLOCK_SIZE,
            });
        }
        Ok(())
    }

    /// Create a v2 configuration with small blocks, so tests cross many
    /// block boundaries with little data.
    pub fn for_testing() -> Self {
        SnapshotConfig {
            version: SnapshotVersion::V2,
            checksum_type: ChecksumType::Crc32Ieee,
            block_size: MIN_V2_BLOCK_SIZE,
        }
    }
}

/// Snapshot configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Block size outside the accepted range.
    #[error("Block size {size} must be between {min} and {max} bytes")]
    BlockSizeOutOfRange {
        /// Requested block size
        size: usize,
        /// Smallest accepted size
        min: usize,
        /// Largest accepted size
        max: usize,
    },

    /// Checksum algorithm is reserved but not implemented.
    #[error("Checksum type {0} is not supported yet")]
    ChecksumNotImplemented(ChecksumType),
}
