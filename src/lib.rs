//! snapframe - versioned, checksummed snapshot files
//!
//! A snapshot file is a fixed 1024-byte header region followed by a payload.
//! The header records the payload sizes, the payload checksum, the checksum
//! algorithm and the payload framing version, and carries its own checksum.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::io::{Read, Write};
//! use snapframe::{SnapshotReader, SnapshotWriter};
//!
//! # fn main() -> snapframe::Result<()> {
//! let mut writer = SnapshotWriter::with_defaults("state.gbsnap")?;
//! writer.write_all(b"sessions")?;
//! writer.write_all(b"state machine")?;
//! writer.save_header(8, 13)?.close()?;
//!
//! let mut reader = SnapshotReader::open("state.gbsnap")?;
//! let header = reader.get_header()?;
//! reader.validate_header(&header)?;
//! let mut payload = Vec::new();
//! reader.read_to_end(&mut payload)?;
//! reader.validate_payload(&header)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - `snapframe-core`: tags, limits, configuration and error types
//! - `snapframe-durability`: checksums, formats, version strategies, and the
//!   writer, reader and chunk validator

pub use snapframe_core::*;
pub use snapframe_durability::*;
