//! Per-version payload strategies.
//!
//! Each format version provides three strategies:
//!
//! - [`VersionWriter`]: frames payload bytes on the way to disk
//! - [`VersionReader`]: de-frames and checksums payload bytes from disk
//! - [`VersionValidator`]: admits payload bytes arriving as transfer chunks
//!
//! Dispatch from a [`SnapshotVersion`] to a strategy is a closed `match`.
//! Adding a version means one new variant and one new arm in each function
//! below; existing versions are never modified.

mod v1;
mod v2;

pub use v1::{V1Reader, V1Validator, V1Writer};
pub use v2::{V2Reader, V2Validator, V2Writer};

use std::io::{self, Read, Write};

use snapframe_core::{ChecksumType, IntegrityError, SnapshotConfig, SnapshotVersion};

use crate::format::{BlockTrailer, SnapshotHeader};

/// Payload writer for one format version.
///
/// Bytes go in through [`Write`]; the strategy's running checksum is
/// order-sensitive, so writes must arrive in payload order.
pub trait VersionWriter<W: Write>: Write + Send {
    /// Terminate the framing.
    ///
    /// Writes any buffered data plus version-specific closing bytes. After
    /// this returns, further writes fail. Calling it again is a no-op.
    fn finish(&mut self) -> io::Result<()>;

    /// Finalized checksum of the logical payload.
    ///
    /// Only meaningful after [`VersionWriter::finish`].
    fn payload_sum(&self) -> Vec<u8>;

    /// Logical payload bytes accepted so far.
    fn payload_len(&self) -> u64;

    /// Format version this strategy produces.
    fn version(&self) -> SnapshotVersion;

    /// Underlying sink, used to rewrite the header region in place.
    fn get_mut(&mut self) -> &mut W;
}

/// Payload reader for one format version.
///
/// The source must already be positioned past the header region and, for
/// versions with a trailer, bounded so reads cannot reach it.
pub trait VersionReader: Read + Send {
    /// Checksum of every payload byte returned so far.
    fn sum(&self) -> Vec<u8>;

    /// Logical payload bytes returned so far.
    fn payload_len(&self) -> u64;

    /// Confirm the framing was fully consumed and matches its own
    /// bookkeeping. Always succeeds for versions without internal framing.
    fn verify_complete(&self) -> Result<(), IntegrityError>;

    /// Format version this strategy decodes.
    fn version(&self) -> SnapshotVersion;
}

/// Chunk admission state machine for one format version.
///
/// Receives only payload bytes; the header region of chunk 0 has already
/// been stripped. Chunks are assumed to arrive in sequence.
pub trait VersionValidator: Send {
    /// Incorporate one chunk. Returns false if the chunk is unacceptable.
    fn add_chunk(&mut self, data: &[u8], chunk_id: u64) -> bool;

    /// Whether every expected byte arrived and the payload checksum matches.
    fn validate(&self) -> bool;
}

/// Get the writer strategy selected by `config`.
pub fn version_writer<W>(
    w: W,
    config: &SnapshotConfig,
) -> Result<Box<dyn VersionWriter<W>>, IntegrityError>
where
    W: Write + Send + 'static,
{
    match config.version {
        SnapshotVersion::V1 => Ok(Box::new(V1Writer::new(w, config.checksum_type)?)),
        SnapshotVersion::V2 => Ok(Box::new(V2Writer::new(
            w,
            config.checksum_type,
            config.block_size,
        )?)),
    }
}

/// Get the reader strategy for a payload of `version`.
///
/// `trailer` is the v2 trailer read from the end of the file, when known.
pub fn version_reader<R>(
    r: R,
    version: SnapshotVersion,
    checksum_type: ChecksumType,
    trailer: Option<BlockTrailer>,
) -> Result<Box<dyn VersionReader>, IntegrityError>
where
    R: Read + Send + 'static,
{
    match version {
        SnapshotVersion::V1 => Ok(Box::new(V1Reader::new(r, checksum_type)?)),
        SnapshotVersion::V2 => Ok(Box::new(V2Reader::new(r, checksum_type, trailer)?)),
    }
}

/// Get the validator strategy for the snapshot described by `header`.
pub fn version_validator(
    header: &SnapshotHeader,
) -> Result<Box<dyn VersionValidator>, IntegrityError> {
    match header.version {
        SnapshotVersion::V1 => Ok(Box::new(V1Validator::new(header)?)),
        SnapshotVersion::V2 => Ok(Box::new(V2Validator::new(header)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_dispatch() {
        for version in SnapshotVersion::ALL {
            let config = SnapshotConfig::default().with_version(version);
            let writer = version_writer(Vec::new(), &config).unwrap();
            assert_eq!(writer.version(), version);
        }
    }

    #[test]
    fn test_reader_dispatch() {
        for version in SnapshotVersion::ALL {
            let reader =
                version_reader(io::empty(), version, ChecksumType::Crc32Ieee, None).unwrap();
            assert_eq!(reader.version(), version);
        }
    }

    #[test]
    fn test_reserved_checksum_rejected_everywhere() {
        let config = SnapshotConfig::default().with_checksum_type(ChecksumType::Highway);
        assert!(version_writer(Vec::new(), &config).is_err());
        assert!(version_reader(io::empty(), SnapshotVersion::V1, ChecksumType::Highway, None).is_err());

        let header = SnapshotHeader::new(
            0,
            0,
            Vec::new(),
            ChecksumType::Highway,
            SnapshotVersion::V2,
        );
        assert!(matches!(
            version_validator(&header),
            Err(IntegrityError::ChecksumNotImplemented(ChecksumType::Highway))
        ));
    }
}
