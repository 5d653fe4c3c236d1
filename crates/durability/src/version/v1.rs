//! Version 1: flat payload with a single running checksum.
//!
//! There is no internal framing. The payload runs from the end of the header
//! region to the end of the file, and its length is implied by the file size.

use std::io::{self, Read, Write};

use snapframe_core::{ChecksumType, IntegrityError, SnapshotVersion};

use super::{VersionReader, VersionValidator, VersionWriter};
use crate::checksum::{new_checksum, Checksum};
use crate::format::SnapshotHeader;

/// Version 1 payload writer
pub struct V1Writer<W> {
    inner: W,
    checksum: Box<dyn Checksum>,
    payload_len: u64,
}

impl<W: Write> V1Writer<W> {
    /// Wrap a sink positioned at the start of the payload
    pub fn new(inner: W, checksum_type: ChecksumType) -> Result<Self, IntegrityError> {
        Ok(V1Writer {
            inner,
            checksum: new_checksum(checksum_type)?,
            payload_len: 0,
        })
    }
}

impl<W: Write> Write for V1Writer<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(data)?;
        self.checksum.update(&data[..n]);
        self.payload_len += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write + Send> VersionWriter<W> for V1Writer<W> {
    fn finish(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    fn payload_sum(&self) -> Vec<u8> {
        self.checksum.sum()
    }

    fn payload_len(&self) -> u64 {
        self.payload_len
    }

    fn version(&self) -> SnapshotVersion {
        SnapshotVersion::V1
    }

    fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }
}

/// Version 1 payload reader
pub struct V1Reader<R> {
    inner: R,
    checksum: Box<dyn Checksum>,
    payload_len: u64,
}

impl<R: Read> V1Reader<R> {
    /// Wrap a source positioned at the start of the payload
    pub fn new(inner: R, checksum_type: ChecksumType) -> Result<Self, IntegrityError> {
        Ok(V1Reader {
            inner,
            checksum: new_checksum(checksum_type)?,
            payload_len: 0,
        })
    }
}

impl<R: Read> Read for V1Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.checksum.update(&buf[..n]);
        self.payload_len += n as u64;
        Ok(n)
    }
}

impl<R: Read + Send> VersionReader for V1Reader<R> {
    fn sum(&self) -> Vec<u8> {
        self.checksum.sum()
    }

    fn payload_len(&self) -> u64 {
        self.payload_len
    }

    fn verify_complete(&self) -> Result<(), IntegrityError> {
        Ok(())
    }

    fn version(&self) -> SnapshotVersion {
        SnapshotVersion::V1
    }
}

/// Version 1 chunk validator
///
/// Every chunk is acceptable on its own; only the final checksum comparison
/// can reject a v1 transfer.
pub struct V1Validator {
    expected: Vec<u8>,
    checksum: Box<dyn Checksum>,
}

impl V1Validator {
    /// Create a validator expecting the payload checksum in `header`
    pub fn new(header: &SnapshotHeader) -> Result<Self, IntegrityError> {
        Ok(V1Validator {
            expected: header.payload_checksum.clone(),
            checksum: new_checksum(header.checksum_type)?,
        })
    }
}

impl VersionValidator for V1Validator {
    fn add_chunk(&mut self, data: &[u8], _chunk_id: u64) -> bool {
        self.checksum.update(data);
        true
    }

    fn validate(&self) -> bool {
        self.checksum.sum() == self.expected
    }
}
