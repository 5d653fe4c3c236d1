//! Checksum registry.
//!
//! Maps a [`ChecksumType`] from a snapshot header or configuration to a
//! fresh accumulator. Every snapshot checksum goes through this seam, so a
//! new algorithm is one variant plus one match arm here.
//!
//! # Known Algorithms
//!
//! - `Crc32Ieee`: CRC32, IEEE polynomial (default)
//!
//! # Reserved
//!
//! - `Highway`: tag is allocated, selecting it fails with
//!   [`IntegrityError::ChecksumNotImplemented`] rather than producing a
//!   checksum from some other algorithm.

mod crc32;
mod traits;

pub use crc32::{Crc32Checksum, CRC32_SIZE};
pub use traits::Checksum;

use snapframe_core::{ChecksumType, IntegrityError};

/// Get a fresh accumulator for the given algorithm.
pub fn new_checksum(checksum_type: ChecksumType) -> Result<Box<dyn Checksum>, IntegrityError> {
    match checksum_type {
        ChecksumType::Crc32Ieee => Ok(Box::new(Crc32Checksum::new())),
        ChecksumType::Highway => Err(IntegrityError::ChecksumNotImplemented(checksum_type)),
    }
}

/// One-shot checksum of `data`.
pub fn checksum_of(checksum_type: ChecksumType, data: &[u8]) -> Result<Vec<u8>, IntegrityError> {
    let mut checksum = new_checksum(checksum_type)?;
    checksum.update(data);
    Ok(checksum.sum())
}
