//! Core types for snapframe
//!
//! This crate defines the vocabulary shared by every snapshot component:
//! - ChecksumType: checksum algorithm tag
//! - SnapshotVersion: payload framing tag
//! - SnapshotConfig: explicit writer configuration
//! - Error: I/O versus integrity error classes
//! - Limits: frozen sizes of the on-disk format

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod limits;
pub mod types;

pub use config::{ConfigError, SnapshotConfig, MIN_V2_BLOCK_SIZE};
pub use error::{IntegrityError, Result, SnapshotError};
pub use limits::{
    DEFAULT_V2_BLOCK_SIZE, HEADER_LENGTH_PREFIX_SIZE, MAX_HEADER_RECORD_SIZE, MAX_V2_BLOCK_SIZE,
    SNAPSHOT_HEADER_SIZE, V2_END_OF_BLOCKS, V2_TRAILER_SIZE,
};
pub use types::{ChecksumType, SnapshotVersion};
