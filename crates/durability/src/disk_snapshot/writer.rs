//! Two-pass snapshot writer
//!
//! The payload checksum is only known after the last payload byte, yet the
//! header that records it lives at offset 0. The writer therefore:
//!
//! 1. Writes a zero-filled header region
//! 2. Streams the payload through the version strategy
//! 3. Finishes the strategy, builds and seals the header
//! 4. Seeks back to offset 0 and overwrites the header region in place
//! 5. fsyncs the file, then fsyncs the parent directory
//!
//! Steps 1-2 belong to [`SnapshotWriter`]; [`SnapshotWriter::save_header`]
//! consumes it and returns a [`FinalizedSnapshot`], which can only be closed.
//! Writing payload after the header was saved does not compile.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use snapframe_core::{
    ChecksumType, Result, SnapshotConfig, SnapshotVersion, SNAPSHOT_HEADER_SIZE,
};
use tracing::{debug, info};

use crate::format::SnapshotHeader;
use crate::version::{version_writer, VersionWriter};

type PayloadSink = BufWriter<File>;

/// Payload phase of a snapshot being written
pub struct SnapshotWriter {
    path: PathBuf,
    checksum_type: ChecksumType,
    payload: Box<dyn VersionWriter<PayloadSink>>,
}

impl SnapshotWriter {
    /// Create (or truncate) `path` and prepare it for payload writes
    ///
    /// The configuration is validated before the file is touched.
    pub fn open(path: impl AsRef<Path>, config: &SnapshotConfig) -> Result<Self> {
        config.validate()?;

        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        // Placeholder, rewritten by save_header
        file.write_all(&[0u8; SNAPSHOT_HEADER_SIZE as usize])?;

        let payload = version_writer(BufWriter::new(file), config)?;

        debug!(
            target: "snapframe::snapshot",
            path = %path.display(),
            version = %config.version,
            checksum = %config.checksum_type,
            "Opened snapshot for writing"
        );

        Ok(SnapshotWriter {
            path,
            checksum_type: config.checksum_type,
            payload,
        })
    }

    /// Open with [`SnapshotConfig::default`]
    pub fn with_defaults(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path, &SnapshotConfig::default())
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format version being written
    pub fn version(&self) -> SnapshotVersion {
        self.payload.version()
    }

    /// Logical payload bytes accepted so far
    pub fn payload_len(&self) -> u64 {
        self.payload.payload_len()
    }

    /// Finish the payload and write the final header over the placeholder
    ///
    /// `session_size` and `data_store_size` are recorded as given. On error
    /// the file is left with an invalid header and must be discarded.
    pub fn save_header(
        mut self,
        session_size: u64,
        data_store_size: u64,
    ) -> Result<FinalizedSnapshot> {
        self.payload.finish()?;

        let mut header = SnapshotHeader::new(
            session_size,
            data_store_size,
            self.payload.payload_sum(),
            self.checksum_type,
            self.payload.version(),
        );
        header.seal()?;
        let region = header.encode_region()?;

        let sink = self.payload.get_mut();
        sink.seek(SeekFrom::Start(0))?;
        sink.write_all(&region)?;
        sink.flush()?;

        info!(
            target: "snapframe::snapshot",
            path = %self.path.display(),
            version = %header.version,
            session_size,
            data_store_size,
            payload_len = self.payload.payload_len(),
            "Saved snapshot header"
        );

        Ok(FinalizedSnapshot {
            path: self.path,
            payload: self.payload,
            header,
        })
    }
}

impl Write for SnapshotWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.payload.write(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.payload.flush()
    }
}

/// A snapshot whose header has been written, awaiting a durable close
pub struct FinalizedSnapshot {
    path: PathBuf,
    payload: Box<dyn VersionWriter<PayloadSink>>,
    header: SnapshotHeader,
}

impl FinalizedSnapshot {
    /// Header written at offset 0
    pub fn header(&self) -> &SnapshotHeader {
        &self.header
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Make the snapshot durable and release the file
    ///
    /// fsyncs the file contents, then the containing directory so the
    /// directory entry survives a crash. Returns the header that was written.
    pub fn close(mut self) -> Result<SnapshotHeader> {
        let sink = self.payload.get_mut();
        sink.flush()?;
        sink.get_ref().sync_all()?;
        sync_parent_dir(&self.path)?;

        info!(
            target: "snapframe::snapshot",
            path = %self.path.display(),
            "Snapshot durably closed"
        );
        Ok(self.header)
    }
}

/// fsync the directory holding `path`
fn sync_parent_dir(path: &Path) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()
}
