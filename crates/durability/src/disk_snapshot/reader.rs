//! Snapshot reader
//!
//! Parses the header region, binds the payload reader for the header's
//! version and streams the payload. Validation is explicit: callers check
//! the header with [`SnapshotReader::validate_header`] and, after consuming
//! the whole payload, the payload with [`SnapshotReader::validate_payload`].

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use snapframe_core::{
    IntegrityError, Result, SnapshotError, SNAPSHOT_HEADER_SIZE, V2_TRAILER_SIZE,
};
use tracing::{debug, warn};

use crate::format::{record_length, BlockTrailer, SnapshotHeader};
use crate::version::{version_reader, VersionReader};

/// Reader for a completed snapshot file
pub struct SnapshotReader {
    path: PathBuf,
    file: Option<File>,
    payload: Option<Box<dyn VersionReader>>,
}

impl SnapshotReader {
    /// Open `path` read-only. Nothing is parsed yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        debug!(target: "snapframe::snapshot", path = %path.display(), "Opened snapshot for reading");
        Ok(SnapshotReader {
            path,
            file: Some(file),
            payload: None,
        })
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the header and position the reader at the first payload byte
    ///
    /// The header checksum is not checked here; see
    /// [`SnapshotReader::validate_header`]. May only be called once; the
    /// reader cannot be reused after a failed call.
    pub fn get_header(&mut self) -> Result<SnapshotHeader> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| self.integrity(IntegrityError::HeaderAlreadyParsed))?;

        let file_size = file.metadata()?.len();
        if file_size < SNAPSHOT_HEADER_SIZE {
            return Err(self.integrity(IntegrityError::TruncatedPayload {
                file_size,
                minimum: SNAPSHOT_HEADER_SIZE,
            }));
        }

        let mut prefix = [0u8; 8];
        file.read_exact(&mut prefix)?;
        let length = record_length(prefix).map_err(|e| self.integrity(e))?;

        let mut record = vec![0u8; length as usize];
        file.read_exact(&mut record)?;
        let header = SnapshotHeader::from_bytes(&record).map_err(|e| self.integrity(e))?;

        let (source, trailer): (Box<dyn Read + Send>, Option<BlockTrailer>) =
            if header.version.has_trailer() {
                let minimum = SNAPSHOT_HEADER_SIZE + V2_TRAILER_SIZE;
                if file_size < minimum {
                    return Err(self.integrity(IntegrityError::TruncatedPayload {
                        file_size,
                        minimum,
                    }));
                }

                file.seek(SeekFrom::Start(file_size - V2_TRAILER_SIZE))?;
                let mut raw = [0u8; V2_TRAILER_SIZE as usize];
                file.read_exact(&mut raw)?;
                let trailer = BlockTrailer::from_bytes(&raw).map_err(|e| self.integrity(e))?;

                file.seek(SeekFrom::Start(SNAPSHOT_HEADER_SIZE))?;
                let bounded = BufReader::new(file).take(file_size - minimum);
                (Box::new(bounded), Some(trailer))
            } else {
                file.seek(SeekFrom::Start(SNAPSHOT_HEADER_SIZE))?;
                (Box::new(BufReader::new(file)), None)
            };

        let payload = version_reader(source, header.version, header.checksum_type, trailer)
            .map_err(|e| self.integrity(e))?;
        self.payload = Some(payload);

        debug!(
            target: "snapframe::snapshot",
            path = %self.path.display(),
            version = %header.version,
            checksum = %header.checksum_type,
            payload_size = header.payload_size(),
            "Parsed snapshot header"
        );
        Ok(header)
    }

    /// Read payload bytes
    ///
    /// Returns 0 at the end of the payload. Fails with
    /// [`IntegrityError::ReadBeforeHeader`] until the header was parsed.
    /// After a corrupt block every further read fails with the same error.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Some(payload) = self.payload.as_mut() else {
            return Err(self.integrity(IntegrityError::ReadBeforeHeader));
        };
        let result = payload.read(buf);
        result.map_err(|e| match SnapshotError::from(e) {
            SnapshotError::Integrity(e) => self.integrity(e),
            other => other,
        })
    }

    /// Check the payload read so far against `header`
    ///
    /// Call after the whole payload was consumed. For framed versions the
    /// block count and length are checked against the trailer first.
    pub fn validate_payload(&self, header: &SnapshotHeader) -> Result<()> {
        let payload = self
            .payload
            .as_ref()
            .ok_or_else(|| self.integrity(IntegrityError::ReadBeforeHeader))?;

        payload
            .verify_complete()
            .map_err(|e| self.integrity(e))?;

        let computed = payload.sum();
        if computed != header.payload_checksum {
            return Err(self.integrity(IntegrityError::PayloadChecksumMismatch {
                stored: header.payload_checksum.clone(),
                computed,
            }));
        }
        Ok(())
    }

    /// Re-derive the header checksum and compare it with the stored one
    pub fn validate_header(&self, header: &SnapshotHeader) -> Result<()> {
        header.verify_checksum().map_err(|e| self.integrity(e))
    }

    /// Release the file
    pub fn close(self) {
        debug!(target: "snapframe::snapshot", path = %self.path.display(), "Closed snapshot reader");
    }

    fn integrity(&self, e: IntegrityError) -> SnapshotError {
        warn!(
            target: "snapframe::snapshot",
            path = %self.path.display(),
            error = %e,
            "Snapshot integrity check failed"
        );
        SnapshotError::Integrity(e)
    }
}

impl Read for SnapshotReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        SnapshotReader::read(self, buf).map_err(io::Error::from)
    }
}
