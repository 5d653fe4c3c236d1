//! On-disk byte formats for snapshots.
//!
//! Keeping serialization separate from the writer, reader and validator
//! makes format evolution easier to manage.
//!
//! # Module Structure
//!
//! - `header`: header record, header checksum, fixed header region
//! - `trailer`: v2 block framing and trailer

pub mod header;
pub mod trailer;

pub use header::{
    frame_record, header_from_first_chunk, now_nanos, record_length, SnapshotHeader,
    HEADER_FIXED_FIELDS_SIZE,
};
pub(crate) use trailer::read_u32_le;
pub use trailer::{BlockTrailer, BLOCK_LENGTH_SIZE};
