//! Snapshot header record and the fixed header region.
//!
//! Every snapshot file starts with a region of [`SNAPSHOT_HEADER_SIZE`] bytes:
//!
//! ```text
//! +---------------------+
//! | Length L (8, LE)    |  Size of the serialized header record
//! +---------------------+
//! | Header record (L)   |  See below
//! +---------------------+
//! | Zero padding        |  Up to SNAPSHOT_HEADER_SIZE, never parsed
//! +---------------------+
//! ```
//!
//! # Header Record (little-endian)
//!
//! ```text
//! session_size(8) + data_store_size(8) + unreliable_time(8) + version(8)
//! + checksum_type(4) + payload_checksum_len(4) + payload_checksum
//! + header_checksum_len(4) + header_checksum
//! ```
//!
//! The length prefix lets the record grow across versions without moving the
//! payload, as long as it stays under [`MAX_HEADER_RECORD_SIZE`].
//!
//! # Header Checksum
//!
//! `header_checksum` covers the record serialized with `header_checksum`
//! empty. Sealing and verification both clear the field, serialize, and hash
//! with the header's own `checksum_type`.

use std::time::{SystemTime, UNIX_EPOCH};

use snapframe_core::{
    ChecksumType, IntegrityError, SnapshotVersion, HEADER_LENGTH_PREFIX_SIZE,
    MAX_HEADER_RECORD_SIZE, SNAPSHOT_HEADER_SIZE,
};

use crate::checksum::checksum_of;

/// Size of the fixed-width part of the record (everything but the two
/// checksum byte strings).
pub const HEADER_FIXED_FIELDS_SIZE: usize = 8 + 8 + 8 + 8 + 4 + 4 + 4;

/// Snapshot header
///
/// Built once by the writer after the payload is complete, and rebuilt once
/// per open by readers and validators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHeader {
    /// Size of the session-tracking section of the payload
    pub session_size: u64,
    /// Size of the application-state section of the payload
    pub data_store_size: u64,
    /// Wall-clock creation time in nanoseconds since epoch. Advisory only.
    pub unreliable_time: u64,
    /// Checksum of the entire logical payload
    pub payload_checksum: Vec<u8>,
    /// Algorithm used for every checksum in this snapshot
    pub checksum_type: ChecksumType,
    /// Payload framing version
    pub version: SnapshotVersion,
    /// Checksum of this record serialized with this field empty
    pub header_checksum: Vec<u8>,
}

impl SnapshotHeader {
    /// Create an unsealed header stamped with the current time
    pub fn new(
        session_size: u64,
        data_store_size: u64,
        payload_checksum: Vec<u8>,
        checksum_type: ChecksumType,
        version: SnapshotVersion,
    ) -> Self {
        SnapshotHeader {
            session_size,
            data_store_size,
            unreliable_time: now_nanos(),
            payload_checksum,
            checksum_type,
            version,
            header_checksum: Vec::new(),
        }
    }

    /// Total logical payload size recorded in the header
    pub fn payload_size(&self) -> u64 {
        self.session_size.saturating_add(self.data_store_size)
    }

    /// Serialize the record (without length prefix or padding)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            HEADER_FIXED_FIELDS_SIZE + self.payload_checksum.len() + self.header_checksum.len(),
        );
        buf.extend_from_slice(&self.session_size.to_le_bytes());
        buf.extend_from_slice(&self.data_store_size.to_le_bytes());
        buf.extend_from_slice(&self.unreliable_time.to_le_bytes());
        buf.extend_from_slice(&self.version.as_u64().to_le_bytes());
        buf.extend_from_slice(&self.checksum_type.as_u32().to_le_bytes());
        put_bytes(&mut buf, &self.payload_checksum);
        put_bytes(&mut buf, &self.header_checksum);
        buf
    }

    /// Deserialize a record
    ///
    /// The whole slice must be consumed. Unknown version or checksum tags are
    /// rejected, never mapped to a default.
    pub fn from_bytes(data: &[u8]) -> Result<Self, IntegrityError> {
        let mut cursor = RecordCursor::new(data);

        let session_size = cursor.u64("session_size")?;
        let data_store_size = cursor.u64("data_store_size")?;
        let unreliable_time = cursor.u64("unreliable_time")?;
        let version = SnapshotVersion::from_u64(cursor.u64("version")?)?;
        let checksum_type = ChecksumType::from_u32(cursor.u32("checksum_type")?)?;
        let payload_checksum = cursor.bytes("payload_checksum")?;
        let header_checksum = cursor.bytes("header_checksum")?;
        cursor.finish()?;

        Ok(SnapshotHeader {
            session_size,
            data_store_size,
            unreliable_time,
            payload_checksum,
            checksum_type,
            version,
            header_checksum,
        })
    }

    /// Checksum of this record with `header_checksum` cleared
    pub fn compute_header_checksum(&self) -> Result<Vec<u8>, IntegrityError> {
        let mut unsealed = self.clone();
        unsealed.header_checksum.clear();
        checksum_of(self.checksum_type, &unsealed.to_bytes())
    }

    /// Compute and store the header checksum
    pub fn seal(&mut self) -> Result<(), IntegrityError> {
        self.header_checksum = self.compute_header_checksum()?;
        Ok(())
    }

    /// Re-derive the header checksum and compare it with the stored one
    pub fn verify_checksum(&self) -> Result<(), IntegrityError> {
        let computed = self.compute_header_checksum()?;
        if computed != self.header_checksum {
            return Err(IntegrityError::HeaderChecksumMismatch {
                stored: self.header_checksum.clone(),
                computed,
            });
        }
        Ok(())
    }

    /// Length prefix followed by the serialized record
    ///
    /// Fails with [`IntegrityError::HeaderTooLarge`] when the record does not
    /// fit in the header region. The result is never truncated.
    pub fn encode_region(&self) -> Result<Vec<u8>, IntegrityError> {
        frame_record(&self.to_bytes())
    }
}

/// Prefix a serialized record with its length, enforcing the region budget
pub fn frame_record(record: &[u8]) -> Result<Vec<u8>, IntegrityError> {
    let size = record.len() as u64;
    if size > MAX_HEADER_RECORD_SIZE {
        return Err(IntegrityError::HeaderTooLarge {
            size,
            max: MAX_HEADER_RECORD_SIZE,
        });
    }

    let mut buf = Vec::with_capacity(HEADER_LENGTH_PREFIX_SIZE as usize + record.len());
    buf.extend_from_slice(&size.to_le_bytes());
    buf.extend_from_slice(record);
    Ok(buf)
}

/// Decode and bound-check the length prefix at offset 0
pub fn record_length(prefix: [u8; 8]) -> Result<u64, IntegrityError> {
    let length = u64::from_le_bytes(prefix);
    if length > MAX_HEADER_RECORD_SIZE {
        return Err(IntegrityError::InvalidHeaderLength {
            length,
            max: MAX_HEADER_RECORD_SIZE,
        });
    }
    Ok(length)
}

/// Extract the header embedded at the start of the first transfer chunk
///
/// Chunk 0 starts at file offset 0 and must carry the entire header region.
/// The record is decoded and its own checksum verified before it is trusted.
pub fn header_from_first_chunk(data: &[u8]) -> Result<SnapshotHeader, IntegrityError> {
    if (data.len() as u64) < SNAPSHOT_HEADER_SIZE {
        return Err(IntegrityError::MalformedHeader(format!(
            "first chunk holds {} bytes, header region needs {}",
            data.len(),
            SNAPSHOT_HEADER_SIZE
        )));
    }

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&data[..8]);
    let length = record_length(prefix)? as usize;

    let start = HEADER_LENGTH_PREFIX_SIZE as usize;
    let header = SnapshotHeader::from_bytes(&data[start..start + length])?;
    header.verify_checksum()?;
    Ok(header)
}

/// Current wall-clock time in nanoseconds since epoch
pub fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

/// Bounds-checked reader over a header record
struct RecordCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> RecordCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        RecordCursor { data, pos: 0 }
    }

    fn take(&mut self, len: usize, field: &str) -> Result<&'a [u8], IntegrityError> {
        let remaining = self.data.len() - self.pos;
        if len > remaining {
            return Err(IntegrityError::MalformedHeader(format!(
                "{} needs {} bytes, {} left",
                field, len, remaining
            )));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u64(&mut self, field: &str) -> Result<u64, IntegrityError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8, field)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn u32(&mut self, field: &str) -> Result<u32, IntegrityError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4, field)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn bytes(&mut self, field: &str) -> Result<Vec<u8>, IntegrityError> {
        let len = self.u32(field)? as usize;
        Ok(self.take(len, field)?.to_vec())
    }

    fn finish(self) -> Result<(), IntegrityError> {
        if self.pos != self.data.len() {
            return Err(IntegrityError::MalformedHeader(format!(
                "{} trailing bytes after header record",
                self.data.len() - self.pos
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sealed_header() -> SnapshotHeader {
        let mut header = SnapshotHeader::new(
            128,
            9_872,
            vec![0xDE, 0xAD, 0xBE, 0xEF],
            ChecksumType::Crc32Ieee,
            SnapshotVersion::V1,
        );
        header.seal().unwrap();
        header
    }

    fn region_bytes(header: &SnapshotHeader) -> Vec<u8> {
        let mut region = header.encode_region().unwrap();
        region.resize(SNAPSHOT_HEADER_SIZE as usize, 0);
        region
    }

    #[test]
    fn test_record_roundtrip() {
        let header = sealed_header();
        let decoded = SnapshotHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.payload_size(), 10_000);
    }

    #[test]
    fn test_record_layout() {
        let header = sealed_header();
        let bytes = header.to_bytes();

        assert_eq!(bytes.len(), HEADER_FIXED_FIELDS_SIZE + 4 + 4);
        assert_eq!(u64::from_le_bytes(bytes[0..8].try_into().unwrap()), 128);
        assert_eq!(u64::from_le_bytes(bytes[8..16].try_into().unwrap()), 9_872);
        assert_eq!(u64::from_le_bytes(bytes[24..32].try_into().unwrap()), 1);
        assert_eq!(u32::from_le_bytes(bytes[32..36].try_into().unwrap()), 0);
    }

    #[test]
    fn test_seal_and_verify() {
        let header = sealed_header();
        assert_eq!(header.header_checksum.len(), 4);
        assert!(header.verify_checksum().is_ok());
    }

    #[test]
    fn test_checksum_covers_cleared_record() {
        let header = sealed_header();
        let mut unsealed = header.clone();
        unsealed.header_checksum.clear();
        let expected = crc32fast::hash(&unsealed.to_bytes()).to_be_bytes().to_vec();
        assert_eq!(header.header_checksum, expected);
    }

    #[test]
    fn test_verify_detects_field_change() {
        let mut header = sealed_header();
        header.data_store_size += 1;
        assert!(matches!(
            header.verify_checksum(),
            Err(IntegrityError::HeaderChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_verify_unsealed_header_fails() {
        let header = SnapshotHeader::new(1, 2, vec![0; 4], ChecksumType::Crc32Ieee, SnapshotVersion::V1);
        assert!(header.verify_checksum().is_err());
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut bytes = sealed_header().to_bytes();
        bytes[24..32].copy_from_slice(&9u64.to_le_bytes());
        assert_eq!(
            SnapshotHeader::from_bytes(&bytes),
            Err(IntegrityError::UnsupportedVersion(9))
        );
    }

    #[test]
    fn test_unknown_checksum_type_rejected() {
        let mut bytes = sealed_header().to_bytes();
        bytes[32..36].copy_from_slice(&42u32.to_le_bytes());
        assert_eq!(
            SnapshotHeader::from_bytes(&bytes),
            Err(IntegrityError::UnsupportedChecksumType(42))
        );
    }

    #[test]
    fn test_truncated_record_rejected() {
        let bytes = sealed_header().to_bytes();
        for len in 0..bytes.len() {
            assert!(
                matches!(
                    SnapshotHeader::from_bytes(&bytes[..len]),
                    Err(IntegrityError::MalformedHeader(_))
                ),
                "prefix of {} bytes should not decode",
                len
            );
        }
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = sealed_header().to_bytes();
        bytes.push(0);
        assert!(matches!(
            SnapshotHeader::from_bytes(&bytes),
            Err(IntegrityError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_encode_region() {
        let header = sealed_header();
        let region = header.encode_region().unwrap();
        let record = header.to_bytes();

        assert_eq!(region.len(), 8 + record.len());
        assert_eq!(
            u64::from_le_bytes(region[0..8].try_into().unwrap()),
            record.len() as u64
        );
        assert_eq!(&region[8..], &record[..]);
    }

    #[test]
    fn test_oversized_header_rejected() {
        let mut header = sealed_header();
        header.payload_checksum = vec![0xAB; SNAPSHOT_HEADER_SIZE as usize];

        let result = header.encode_region();
        assert!(matches!(
            result,
            Err(IntegrityError::HeaderTooLarge { max, .. }) if max == MAX_HEADER_RECORD_SIZE
        ));
    }

    #[test]
    fn test_record_exactly_at_budget_fits() {
        let record = vec![0u8; MAX_HEADER_RECORD_SIZE as usize];
        let framed = frame_record(&record).unwrap();
        assert_eq!(framed.len() as u64, SNAPSHOT_HEADER_SIZE);

        let record = vec![0u8; MAX_HEADER_RECORD_SIZE as usize + 1];
        assert!(frame_record(&record).is_err());
    }

    #[test]
    fn test_record_length_bounds() {
        assert_eq!(record_length(16u64.to_le_bytes()).unwrap(), 16);
        assert!(matches!(
            record_length(SNAPSHOT_HEADER_SIZE.to_le_bytes()),
            Err(IntegrityError::InvalidHeaderLength { .. })
        ));
    }

    #[test]
    fn test_header_from_first_chunk() {
        let header = sealed_header();
        let mut chunk = region_bytes(&header);
        chunk.extend_from_slice(b"payload bytes");

        assert_eq!(header_from_first_chunk(&chunk).unwrap(), header);
    }

    #[test]
    fn test_first_chunk_too_short() {
        let header = sealed_header();
        let region = region_bytes(&header);
        assert!(matches!(
            header_from_first_chunk(&region[..100]),
            Err(IntegrityError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_first_chunk_with_tampered_header() {
        let header = sealed_header();
        let mut chunk = region_bytes(&header);
        chunk[8 + 16] ^= 0x01; // unreliable_time
        assert!(matches!(
            header_from_first_chunk(&chunk),
            Err(IntegrityError::HeaderChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_first_chunk_of_zeroes() {
        let chunk = vec![0u8; SNAPSHOT_HEADER_SIZE as usize];
        assert!(header_from_first_chunk(&chunk).is_err());
    }
}
