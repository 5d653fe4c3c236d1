//! Durability layer for snapframe
//!
//! This crate handles everything that touches snapshot bytes:
//!
//! - Checksum registry: algorithm tag to accumulator
//! - Binary on-disk formats (header region, v2 blocks and trailer)
//! - Version strategies: per-version payload writer, reader and validator
//! - Snapshot writer with a two-pass header and a durable close
//! - Snapshot reader with explicit header and payload validation
//! - Chunked validator for snapshots received over a transport

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checksum; // Checksum trait and registry
pub mod disk_snapshot; // Snapshot writer, reader and chunk validator
pub mod format; // Header region, v2 block framing and trailer
pub mod version; // Per-version payload strategies

// === Re-exports ===
pub use checksum::{checksum_of, new_checksum, Checksum, Crc32Checksum};
pub use disk_snapshot::{
    FinalizedSnapshot, SnapshotReader, SnapshotValidator, SnapshotWriter, ValidatorState,
};
pub use format::{header_from_first_chunk, BlockTrailer, SnapshotHeader};
pub use version::{
    version_reader, version_validator, version_writer, VersionReader, VersionValidator,
    VersionWriter,
};
