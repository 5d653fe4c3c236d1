//! Version 2: checksummed blocks followed by a trailer.
//!
//! The payload is cut into blocks of at most `block_size` bytes. Each block
//! carries its own length and checksum, so corruption is caught at the block
//! where it happens instead of after the whole payload was streamed. See
//! [`crate::format::trailer`] for the byte layout.
//!
//! The header's payload checksum still covers only the logical payload bytes,
//! exactly as in version 1.

use std::io::{self, Read, Write};

use snapframe_core::{
    ChecksumType, IntegrityError, SnapshotVersion, MAX_V2_BLOCK_SIZE, V2_END_OF_BLOCKS,
    V2_TRAILER_SIZE,
};

use super::{VersionReader, VersionValidator, VersionWriter};
use crate::checksum::{new_checksum, Checksum};
use crate::format::{read_u32_le, BlockTrailer, SnapshotHeader, BLOCK_LENGTH_SIZE};

// ============================================================================
// Writer
// ============================================================================

/// Version 2 payload writer
///
/// Any error from the sink poisons the writer: a block may be half written,
/// so every later `write`, `flush` or `finish` fails and the file must be
/// discarded.
pub struct V2Writer<W> {
    inner: W,
    block_size: usize,
    block: Vec<u8>,
    block_checksum: Box<dyn Checksum>,
    payload_checksum: Box<dyn Checksum>,
    block_count: u32,
    payload_len: u64,
    finished: bool,
    failed: bool,
}

impl<W: Write> V2Writer<W> {
    /// Wrap a sink positioned at the start of the payload
    pub fn new(
        inner: W,
        checksum_type: ChecksumType,
        block_size: usize,
    ) -> Result<Self, IntegrityError> {
        let block_size = block_size.clamp(1, MAX_V2_BLOCK_SIZE);
        Ok(V2Writer {
            inner,
            block_size,
            block: Vec::with_capacity(block_size),
            block_checksum: new_checksum(checksum_type)?,
            payload_checksum: new_checksum(checksum_type)?,
            block_count: 0,
            payload_len: 0,
            finished: false,
            failed: false,
        })
    }

    /// Number of blocks written so far
    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    fn ensure_usable(&self) -> io::Result<()> {
        if self.failed {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "v2 snapshot writer failed earlier",
            ));
        }
        Ok(())
    }

    /// Record a sink failure so the writer refuses further work
    fn poison<T>(&mut self, result: io::Result<T>) -> io::Result<T> {
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    /// Write the buffered block, if any
    fn emit_block(&mut self) -> io::Result<()> {
        if self.block.is_empty() {
            return Ok(());
        }

        let block_count = self.block_count.checked_add(1).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "snapshot exceeds v2 block limit")
        })?;

        self.block_checksum.reset();
        self.block_checksum.update(&self.block);

        self.inner.write_all(&(self.block.len() as u32).to_le_bytes())?;
        self.inner.write_all(&self.block)?;
        self.inner.write_all(&self.block_checksum.sum())?;

        self.payload_checksum.update(&self.block);
        self.payload_len += self.block.len() as u64;
        self.block_count = block_count;
        self.block.clear();
        Ok(())
    }

    fn write_trailer(&mut self) -> io::Result<()> {
        self.emit_block()?;

        let trailer = BlockTrailer {
            block_count: self.block_count,
            payload_len: self.payload_len,
        };
        self.inner.write_all(&trailer.to_bytes())?;
        self.inner.flush()
    }
}

impl<W: Write> Write for V2Writer<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.finished {
            return Err(IntegrityError::WriteAfterFinish.into());
        }
        self.ensure_usable()?;

        let mut rest = data;
        while !rest.is_empty() {
            let room = self.block_size - self.block.len();
            let (head, tail) = rest.split_at(room.min(rest.len()));
            self.block.extend_from_slice(head);
            rest = tail;

            if self.block.len() == self.block_size {
                let emitted = self.emit_block();
                self.poison(emitted)?;
            }
        }
        Ok(data.len())
    }

    /// Emits the partially filled block, so blocks before the last one may
    /// be short.
    fn flush(&mut self) -> io::Result<()> {
        self.ensure_usable()?;
        let emitted = self.emit_block().and_then(|()| self.inner.flush());
        self.poison(emitted)
    }
}

impl<W: Write + Send> VersionWriter<W> for V2Writer<W> {
    fn finish(&mut self) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        self.ensure_usable()?;
        let written = self.write_trailer();
        self.poison(written)?;
        self.finished = true;
        Ok(())
    }

    fn payload_sum(&self) -> Vec<u8> {
        self.payload_checksum.sum()
    }

    fn payload_len(&self) -> u64 {
        self.payload_len + self.block.len() as u64
    }

    fn version(&self) -> SnapshotVersion {
        SnapshotVersion::V2
    }

    fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Version 2 payload reader
///
/// Verifies each block's checksum when the block is loaded. The source must
/// end where the trailer begins. The first failed block load is sticky: every
/// later `read` returns the same error and no bytes.
pub struct V2Reader<R> {
    inner: R,
    trailer: Option<BlockTrailer>,
    /// Framed bytes the trailer accounts for and not yet consumed
    framed_remaining: Option<u64>,
    block: Vec<u8>,
    pos: usize,
    block_checksum: Box<dyn Checksum>,
    payload_checksum: Box<dyn Checksum>,
    blocks_read: u64,
    payload_len: u64,
    exhausted: bool,
    failed: Option<ReadFailure>,
}

/// Error recorded by a failed block load
#[derive(Debug, Clone)]
enum ReadFailure {
    Integrity(IntegrityError),
    Io(io::ErrorKind),
}

impl ReadFailure {
    fn from_io(e: &io::Error) -> Self {
        match e
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<IntegrityError>())
        {
            Some(integrity) => ReadFailure::Integrity(integrity.clone()),
            None => ReadFailure::Io(e.kind()),
        }
    }

    fn to_io(&self) -> io::Error {
        match self {
            ReadFailure::Integrity(e) => e.clone().into(),
            ReadFailure::Io(kind) => io::Error::new(*kind, "v2 snapshot read failed earlier"),
        }
    }
}

impl<R: Read> V2Reader<R> {
    /// Wrap a bounded source positioned at the first block
    ///
    /// When `trailer` is given, [`VersionReader::verify_complete`] checks the
    /// block count and payload length against it, and no block may reach past
    /// the framed length the trailer implies.
    pub fn new(
        inner: R,
        checksum_type: ChecksumType,
        trailer: Option<BlockTrailer>,
    ) -> Result<Self, IntegrityError> {
        let block_checksum = new_checksum(checksum_type)?;
        let framing = (BLOCK_LENGTH_SIZE + block_checksum.size()) as u64;
        let framed_remaining = trailer.map(|t| {
            t.payload_len
                .saturating_add((t.block_count as u64).saturating_mul(framing))
        });
        Ok(V2Reader {
            inner,
            trailer,
            framed_remaining,
            block: Vec::new(),
            pos: 0,
            block_checksum,
            payload_checksum: new_checksum(checksum_type)?,
            blocks_read: 0,
            payload_len: 0,
            exhausted: false,
            failed: None,
        })
    }

    /// Take `n` framed bytes from the budget the trailer allows
    fn claim(&mut self, n: u64) -> Result<(), IntegrityError> {
        if let Some(remaining) = self.framed_remaining {
            if n > remaining {
                return Err(overrun(self.blocks_read));
            }
            self.framed_remaining = Some(remaining - n);
        }
        Ok(())
    }

    /// Load and verify the next block. Returns false at the end of blocks.
    fn next_block(&mut self) -> io::Result<bool> {
        if self.exhausted {
            return Ok(false);
        }

        let index = self.blocks_read;
        let mut len_buf = [0u8; BLOCK_LENGTH_SIZE];
        let got = read_full(&mut self.inner, &mut len_buf)?;
        if got == 0 {
            self.exhausted = true;
            return Ok(false);
        }
        if got < BLOCK_LENGTH_SIZE {
            return Err(IntegrityError::MalformedBlock {
                block: index,
                detail: "truncated block length".to_string(),
            }
            .into());
        }
        self.claim(BLOCK_LENGTH_SIZE as u64)?;

        let len = read_u32_le(&len_buf);
        if len == V2_END_OF_BLOCKS {
            return Err(IntegrityError::MalformedBlock {
                block: index,
                detail: "end-of-blocks marker inside payload range".to_string(),
            }
            .into());
        }
        let len = len as usize;
        if len == 0 || len > MAX_V2_BLOCK_SIZE {
            return Err(IntegrityError::MalformedBlock {
                block: index,
                detail: format!("invalid block length {}", len),
            }
            .into());
        }
        let csize = self.block_checksum.size();
        self.claim((len + csize) as u64)?;

        self.block.resize(len, 0);
        let mut stored = vec![0u8; csize];
        self.inner
            .read_exact(&mut self.block)
            .and_then(|()| self.inner.read_exact(&mut stored))
            .map_err(|e| match e.kind() {
                io::ErrorKind::UnexpectedEof => overrun(index).into(),
                _ => e,
            })?;

        self.block_checksum.reset();
        self.block_checksum.update(&self.block);
        if self.block_checksum.sum() != stored {
            return Err(IntegrityError::BlockChecksumMismatch { block: index }.into());
        }

        self.pos = 0;
        self.blocks_read += 1;
        Ok(true)
    }
}

fn overrun(block: u64) -> IntegrityError {
    IntegrityError::MalformedBlock {
        block,
        detail: "block overruns payload".to_string(),
    }
}

impl<R: Read> Read for V2Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(failure) = &self.failed {
            return Err(failure.to_io());
        }
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pos == self.block.len() {
            match self.next_block() {
                Ok(true) => {}
                Ok(false) => return Ok(0),
                Err(e) => {
                    self.block.clear();
                    self.pos = 0;
                    self.failed = Some(ReadFailure::from_io(&e));
                    return Err(e);
                }
            }
        }

        let n = buf.len().min(self.block.len() - self.pos);
        buf[..n].copy_from_slice(&self.block[self.pos..self.pos + n]);
        self.pos += n;
        self.payload_checksum.update(&buf[..n]);
        self.payload_len += n as u64;
        Ok(n)
    }
}

impl<R: Read + Send> VersionReader for V2Reader<R> {
    fn sum(&self) -> Vec<u8> {
        self.payload_checksum.sum()
    }

    fn payload_len(&self) -> u64 {
        self.payload_len
    }

    fn verify_complete(&self) -> Result<(), IntegrityError> {
        let Some(trailer) = self.trailer else {
            return Ok(());
        };
        if self.blocks_read != trailer.block_count as u64 {
            return Err(IntegrityError::TrailerMismatch {
                field: "block_count",
                expected: trailer.block_count as u64,
                actual: self.blocks_read,
            });
        }
        if self.payload_len != trailer.payload_len {
            return Err(IntegrityError::TrailerMismatch {
                field: "payload_len",
                expected: trailer.payload_len,
                actual: self.payload_len,
            });
        }
        Ok(())
    }

    fn version(&self) -> SnapshotVersion {
        SnapshotVersion::V2
    }
}

/// Read until `buf` is full or the source ends; returns bytes read
fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// ============================================================================
// Validator
// ============================================================================

/// Version 2 chunk validator
///
/// Parses blocks across chunk boundaries, holding back at most one partial
/// block plus the current chunk. Once a chunk is rejected the validator stays
/// failed.
pub struct V2Validator {
    expected: Vec<u8>,
    pending: Vec<u8>,
    block_checksum: Box<dyn Checksum>,
    payload_checksum: Box<dyn Checksum>,
    blocks: u64,
    payload_len: u64,
    trailer: Option<BlockTrailer>,
    failed: bool,
}

impl V2Validator {
    /// Create a validator for the snapshot described by `header`
    pub fn new(header: &SnapshotHeader) -> Result<Self, IntegrityError> {
        Ok(V2Validator {
            expected: header.payload_checksum.clone(),
            pending: Vec::new(),
            block_checksum: new_checksum(header.checksum_type)?,
            payload_checksum: new_checksum(header.checksum_type)?,
            blocks: 0,
            payload_len: 0,
            trailer: None,
            failed: false,
        })
    }

    fn consume(&mut self) -> Result<(), IntegrityError> {
        let mut pending = std::mem::take(&mut self.pending);
        let mut offset = 0;
        let result = self.consume_from(&pending, &mut offset);
        pending.drain(..offset);
        self.pending = pending;
        result
    }

    fn consume_from(&mut self, pending: &[u8], offset: &mut usize) -> Result<(), IntegrityError> {
        loop {
            let rest = &pending[*offset..];
            if self.trailer.is_some() {
                if !rest.is_empty() {
                    return Err(IntegrityError::MalformedTrailer(format!(
                        "{} bytes after trailer",
                        rest.len()
                    )));
                }
                return Ok(());
            }
            if rest.len() < BLOCK_LENGTH_SIZE {
                return Ok(());
            }

            let marker = read_u32_le(rest);
            if marker == V2_END_OF_BLOCKS {
                let trailer_size = V2_TRAILER_SIZE as usize;
                if rest.len() < trailer_size {
                    return Ok(());
                }
                self.trailer = Some(BlockTrailer::from_bytes(&rest[..trailer_size])?);
                *offset += trailer_size;
                continue;
            }

            let len = marker as usize;
            if len == 0 || len > MAX_V2_BLOCK_SIZE {
                return Err(IntegrityError::MalformedBlock {
                    block: self.blocks,
                    detail: format!("invalid block length {}", len),
                });
            }

            let framed = BLOCK_LENGTH_SIZE + len + self.block_checksum.size();
            if rest.len() < framed {
                return Ok(());
            }

            let data = &rest[BLOCK_LENGTH_SIZE..BLOCK_LENGTH_SIZE + len];
            let stored = &rest[BLOCK_LENGTH_SIZE + len..framed];
            self.block_checksum.reset();
            self.block_checksum.update(data);
            if self.block_checksum.sum() != stored {
                return Err(IntegrityError::BlockChecksumMismatch { block: self.blocks });
            }

            self.payload_checksum.update(data);
            self.payload_len += len as u64;
            self.blocks += 1;
            *offset += framed;
        }
    }
}

impl VersionValidator for V2Validator {
    fn add_chunk(&mut self, data: &[u8], chunk_id: u64) -> bool {
        if self.failed {
            return false;
        }

        self.pending.extend_from_slice(data);
        match self.consume() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    target: "snapframe::snapshot",
                    chunk_id,
                    error = %e,
                    "Rejected v2 snapshot chunk"
                );
                self.failed = true;
                false
            }
        }
    }

    fn validate(&self) -> bool {
        if self.failed || !self.pending.is_empty() {
            return false;
        }
        let Some(trailer) = self.trailer else {
            return false;
        };
        trailer.block_count as u64 == self.blocks
            && trailer.payload_len == self.payload_len
            && self.payload_checksum.sum() == self.expected
    }
}
