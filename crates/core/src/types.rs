//! Format tags carried in every snapshot header
//!
//! Both tags are closed enums. Decoding an unknown tag is always an
//! [`IntegrityError`]: a reader must never treat a snapshot written by newer
//! or foreign code as if it were one of the formats listed here.

use std::fmt;

use crate::error::IntegrityError;

// ============================================================================
// Checksum Type
// ============================================================================

/// Checksum algorithm used for payload, header and block checksums
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChecksumType {
    /// CRC32 with the IEEE polynomial (the default)
    #[default]
    Crc32Ieee,
    /// Highway hash. Reserved tag, no implementation yet.
    Highway,
}

impl ChecksumType {
    /// Wire tag for CRC32 IEEE
    pub const CRC32_IEEE_TAG: u32 = 0;
    /// Wire tag for Highway hash
    pub const HIGHWAY_TAG: u32 = 1;

    /// Decode a wire tag
    pub fn from_u32(tag: u32) -> Result<Self, IntegrityError> {
        match tag {
            Self::CRC32_IEEE_TAG => Ok(ChecksumType::Crc32Ieee),
            Self::HIGHWAY_TAG => Ok(ChecksumType::Highway),
            other => Err(IntegrityError::UnsupportedChecksumType(other)),
        }
    }

    /// Wire tag for this checksum type
    pub fn as_u32(self) -> u32 {
        match self {
            ChecksumType::Crc32Ieee => Self::CRC32_IEEE_TAG,
            ChecksumType::Highway => Self::HIGHWAY_TAG,
        }
    }

    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            ChecksumType::Crc32Ieee => "crc32-ieee",
            ChecksumType::Highway => "highway",
        }
    }
}

impl fmt::Display for ChecksumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Snapshot Version
// ============================================================================

/// Payload framing version
///
/// Readers support every version listed here; writers pick one through
/// configuration and default to [`SnapshotVersion::CURRENT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SnapshotVersion {
    /// Flat payload with a single running checksum
    V1,
    /// Checksummed blocks followed by a 16-byte trailer
    V2,
}

impl SnapshotVersion {
    /// Version selected for new snapshots
    pub const CURRENT: SnapshotVersion = SnapshotVersion::V1;

    /// Every version a reader must understand
    pub const ALL: [SnapshotVersion; 2] = [SnapshotVersion::V1, SnapshotVersion::V2];

    /// Decode a wire tag
    pub fn from_u64(tag: u64) -> Result<Self, IntegrityError> {
        match tag {
            1 => Ok(SnapshotVersion::V1),
            2 => Ok(SnapshotVersion::V2),
            other => Err(IntegrityError::UnsupportedVersion(other)),
        }
    }

    /// Wire tag for this version
    pub fn as_u64(self) -> u64 {
        match self {
            SnapshotVersion::V1 => 1,
            SnapshotVersion::V2 => 2,
        }
    }

    /// Whether payloads of this version end with a trailer
    pub fn has_trailer(self) -> bool {
        matches!(self, SnapshotVersion::V2)
    }
}

impl Default for SnapshotVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for SnapshotVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.as_u64())
    }
}
