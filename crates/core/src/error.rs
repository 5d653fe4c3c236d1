//! Error types for snapshot framing
//!
//! Two classes of failure exist and callers must treat them differently:
//!
//! - [`SnapshotError::Io`]: the storage or the channel failed (cannot open,
//!   short read, disk full). The caller may retry, re-fetch or give up.
//! - [`SnapshotError::Integrity`]: the artifact is corrupt, truncated, or was
//!   produced by incompatible code, or the API was driven out of order. There
//!   is no partial-trust mode; the snapshot attempt must be discarded.
//!
//! We use `thiserror` for the `Display` and `Error` implementations.

use std::io;
use thiserror::Error;

use crate::config::ConfigError;
use crate::types::ChecksumType;

/// Result type alias for snapshot operations
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Top-level error for snapshot writers, readers and validators
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// I/O error (open, read, write, sync)
    #[error("I/O error: {0}")]
    Io(io::Error),

    /// Format-integrity violation
    #[error("Integrity violation: {0}")]
    Integrity(#[from] IntegrityError),

    /// Writer configuration rejected before any file was touched
    #[error("Invalid snapshot config: {0}")]
    Config(#[from] ConfigError),
}

impl SnapshotError {
    /// Returns true for format-integrity violations
    pub fn is_integrity(&self) -> bool {
        matches!(self, SnapshotError::Integrity(_))
    }

    /// Returns true for recoverable I/O failures
    pub fn is_io(&self) -> bool {
        matches!(self, SnapshotError::Io(_))
    }

    /// The integrity violation, if this is one
    pub fn integrity(&self) -> Option<&IntegrityError> {
        match self {
            SnapshotError::Integrity(e) => Some(e),
            _ => None,
        }
    }

    /// The I/O error kind, if this is an I/O failure
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            SnapshotError::Io(e) => Some(e.kind()),
            _ => None,
        }
    }
}

/// Strategy readers report integrity failures through `std::io::Read`, which
/// wraps them in an `InvalidData` error. Unwrap those back into the integrity
/// class so they are never mistaken for a retryable I/O failure.
impl From<io::Error> for SnapshotError {
    fn from(e: io::Error) -> Self {
        let carries_integrity = e
            .get_ref()
            .map_or(false, |inner| inner.is::<IntegrityError>());
        if !carries_integrity {
            return SnapshotError::Io(e);
        }

        let kind = e.kind();
        match e.into_inner().map(|inner| inner.downcast::<IntegrityError>()) {
            Some(Ok(integrity)) => SnapshotError::Integrity(*integrity),
            Some(Err(inner)) => SnapshotError::Io(io::Error::new(kind, inner)),
            None => SnapshotError::Io(io::Error::from(kind)),
        }
    }
}

impl From<SnapshotError> for io::Error {
    fn from(e: SnapshotError) -> Self {
        match e {
            SnapshotError::Io(e) => e,
            SnapshotError::Integrity(e) => e.into(),
            SnapshotError::Config(e) => io::Error::new(io::ErrorKind::InvalidInput, e),
        }
    }
}

/// Format-integrity violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    /// Header checksum does not match the header contents
    #[error("Corrupted snapshot header: stored checksum {stored:02x?}, computed {computed:02x?}")]
    HeaderChecksumMismatch {
        /// Checksum recorded in the header
        stored: Vec<u8>,
        /// Checksum re-derived from the header fields
        computed: Vec<u8>,
    },

    /// Payload checksum does not match the bytes read
    #[error("Corrupted snapshot payload: stored checksum {stored:02x?}, computed {computed:02x?}")]
    PayloadChecksumMismatch {
        /// Checksum recorded in the header
        stored: Vec<u8>,
        /// Checksum accumulated over the payload
        computed: Vec<u8>,
    },

    /// Serialized header does not fit in the header region
    #[error("Snapshot header is too large: {size} bytes, limit {max}")]
    HeaderTooLarge {
        /// Serialized header size
        size: u64,
        /// Largest size the header region can hold
        max: u64,
    },

    /// Length prefix at offset 0 exceeds the header region
    #[error("Invalid snapshot header length {length}, limit {max}")]
    InvalidHeaderLength {
        /// Length read from the prefix
        length: u64,
        /// Largest valid length
        max: u64,
    },

    /// Header record could not be decoded
    #[error("Malformed snapshot header: {0}")]
    MalformedHeader(String),

    /// Version tag not understood by this build
    #[error("Unsupported snapshot version {0}")]
    UnsupportedVersion(u64),

    /// Checksum tag not understood by this build
    #[error("Unsupported checksum type {0}")]
    UnsupportedChecksumType(u32),

    /// Checksum tag is reserved but has no implementation
    #[error("Checksum type {0} is not supported yet")]
    ChecksumNotImplemented(ChecksumType),

    /// Payload read attempted before the header was parsed
    #[error("Snapshot payload read before header was parsed")]
    ReadBeforeHeader,

    /// Header parsed twice on the same reader
    #[error("Snapshot header already parsed")]
    HeaderAlreadyParsed,

    /// A v2 block failed its checksum
    #[error("Corrupted snapshot block {block}")]
    BlockChecksumMismatch {
        /// Zero-based block index
        block: u64,
    },

    /// A v2 block is structurally invalid
    #[error("Malformed snapshot block {block}: {detail}")]
    MalformedBlock {
        /// Zero-based block index
        block: u64,
        /// What was wrong with it
        detail: String,
    },

    /// The v2 trailer is structurally invalid
    #[error("Malformed snapshot trailer: {0}")]
    MalformedTrailer(String),

    /// The v2 trailer disagrees with the payload that was read
    #[error("Snapshot trailer mismatch on {field}: trailer says {expected}, payload has {actual}")]
    TrailerMismatch {
        /// Trailer field that disagreed
        field: &'static str,
        /// Value recorded in the trailer
        expected: u64,
        /// Value observed while reading
        actual: u64,
    },

    /// File is too short for its declared version
    #[error("Truncated snapshot: {file_size} bytes, need at least {minimum}")]
    TruncatedPayload {
        /// Actual file size
        file_size: u64,
        /// Smallest valid size
        minimum: u64,
    },

    /// Payload written after the framing was finished
    #[error("Snapshot payload written after framing was finished")]
    WriteAfterFinish,
}

impl From<IntegrityError> for io::Error {
    fn from(e: IntegrityError) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, e)
    }
}
