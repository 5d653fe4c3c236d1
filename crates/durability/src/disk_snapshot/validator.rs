//! Chunked snapshot validator
//!
//! Admits a snapshot arriving over a transport as numbered chunks, without
//! buffering the whole file. Chunk 0 starts at file offset 0 and must carry
//! the full header region; the header is extracted and verified from it
//! before any payload byte is trusted.
//!
//! ```text
//! Unbound --chunk 0 ok--> Bound --validate()--> Valid | Invalid
//! ```

use std::fmt;

use snapframe_core::SNAPSHOT_HEADER_SIZE;
use tracing::{debug, warn};

use crate::format::{header_from_first_chunk, SnapshotHeader};
use crate::version::{version_validator, VersionValidator};

/// Observable validator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorState {
    /// No acceptable chunk 0 yet
    Unbound,
    /// Header extracted, accepting payload chunks
    Bound,
    /// `validate` succeeded
    Valid,
    /// `validate` failed
    Invalid,
}

impl fmt::Display for ValidatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValidatorState::Unbound => "unbound",
            ValidatorState::Bound => "bound",
            ValidatorState::Valid => "valid",
            ValidatorState::Invalid => "invalid",
        };
        f.write_str(name)
    }
}

enum Phase {
    Unbound,
    Bound {
        header: SnapshotHeader,
        strategy: Box<dyn VersionValidator>,
    },
    Finished {
        header: SnapshotHeader,
        valid: bool,
    },
}

/// Incremental validator for a snapshot received in chunks
///
/// Chunk IDs after 0 are assumed to arrive in sequence; only the rule that
/// chunk 0 comes first, exactly once, is enforced here.
pub struct SnapshotValidator {
    phase: Phase,
}

impl SnapshotValidator {
    /// Create an unbound validator
    pub fn new() -> Self {
        SnapshotValidator {
            phase: Phase::Unbound,
        }
    }

    /// Offer the next chunk. Returns false if it is rejected.
    pub fn add_chunk(&mut self, data: &[u8], chunk_id: u64) -> bool {
        if chunk_id == 0 {
            return self.bind(data);
        }

        match &mut self.phase {
            Phase::Bound { strategy, .. } => strategy.add_chunk(data, chunk_id),
            Phase::Unbound => {
                warn!(target: "snapframe::snapshot", chunk_id, "Rejected chunk before chunk 0");
                false
            }
            Phase::Finished { .. } => {
                warn!(target: "snapframe::snapshot", chunk_id, "Rejected chunk after validation");
                false
            }
        }
    }

    fn bind(&mut self, data: &[u8]) -> bool {
        if !matches!(self.phase, Phase::Unbound) {
            warn!(target: "snapframe::snapshot", state = %self.state(), "Rejected duplicate chunk 0");
            return false;
        }

        let bound = header_from_first_chunk(data)
            .and_then(|header| version_validator(&header).map(|strategy| (header, strategy)));
        let (header, mut strategy) = match bound {
            Ok(bound) => bound,
            Err(e) => {
                warn!(target: "snapframe::snapshot", error = %e, "Rejected snapshot chunk 0");
                return false;
            }
        };

        debug!(
            target: "snapframe::snapshot",
            version = %header.version,
            checksum = %header.checksum_type,
            payload_size = header.payload_size(),
            "Bound snapshot validator"
        );

        let accepted = strategy.add_chunk(&data[SNAPSHOT_HEADER_SIZE as usize..], 0);
        self.phase = Phase::Bound { header, strategy };
        accepted
    }

    /// Final verdict on everything received
    ///
    /// The first call after binding decides `Valid` or `Invalid`; later calls
    /// return the same verdict. An unbound validator is never valid.
    pub fn validate(&mut self) -> bool {
        let valid = match &self.phase {
            Phase::Unbound => return false,
            Phase::Finished { valid, .. } => return *valid,
            Phase::Bound { strategy, .. } => strategy.validate(),
        };

        if let Phase::Bound { header, .. } = std::mem::replace(&mut self.phase, Phase::Unbound) {
            if !valid {
                warn!(target: "snapframe::snapshot", version = %header.version, "Snapshot failed validation");
            }
            self.phase = Phase::Finished { header, valid };
        }
        valid
    }

    /// Current state
    pub fn state(&self) -> ValidatorState {
        match self.phase {
            Phase::Unbound => ValidatorState::Unbound,
            Phase::Bound { .. } => ValidatorState::Bound,
            Phase::Finished { valid: true, .. } => ValidatorState::Valid,
            Phase::Finished { valid: false, .. } => ValidatorState::Invalid,
        }
    }

    /// Header extracted from chunk 0, once bound
    pub fn header(&self) -> Option<&SnapshotHeader> {
        match &self.phase {
            Phase::Unbound => None,
            Phase::Bound { header, .. } | Phase::Finished { header, .. } => Some(header),
        }
    }
}

impl Default for SnapshotValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapframe_core::{SnapshotConfig, SnapshotVersion};
    use std::io::Write;

    use crate::disk_snapshot::SnapshotWriter;

    fn snapshot_bytes(config: &SnapshotConfig, payload: &[u8]) -> Vec<u8> {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("snap.gbsnap");
        let mut writer = SnapshotWriter::open(&path, config).unwrap();
        writer.write_all(payload).unwrap();
        writer
            .save_header(0, payload.len() as u64)
            .unwrap()
            .close()
            .unwrap();
        std::fs::read(&path).unwrap()
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 17 % 253) as u8).collect()
    }

    /// Chunk 0 carries the header region plus `first_extra` payload bytes
    fn chunked(bytes: &[u8], first_extra: usize, size: usize) -> Vec<&[u8]> {
        let split = (SNAPSHOT_HEADER_SIZE as usize + first_extra).min(bytes.len());
        let (first, rest) = bytes.split_at(split);
        std::iter::once(first).chain(rest.chunks(size)).collect()
    }

    fn feed(validator: &mut SnapshotValidator, chunks: &[&[u8]]) -> bool {
        chunks
            .iter()
            .enumerate()
            .all(|(id, chunk)| validator.add_chunk(chunk, id as u64))
    }

    #[test]
    fn test_valid_snapshot_both_versions() {
        for config in [SnapshotConfig::default(), SnapshotConfig::for_testing()] {
            let bytes = snapshot_bytes(&config, &payload(4_000));

            let mut validator = SnapshotValidator::new();
            assert!(feed(&mut validator, &chunked(&bytes, 100, 333)));
            assert_eq!(validator.state(), ValidatorState::Bound);
            assert_eq!(validator.header().unwrap().version, config.version);

            assert!(validator.validate());
            assert_eq!(validator.state(), ValidatorState::Valid);
            assert!(validator.validate());
        }
    }

    #[test]
    fn test_single_chunk() {
        let bytes = snapshot_bytes(&SnapshotConfig::for_testing(), &payload(1_500));
        let mut validator = SnapshotValidator::new();
        assert!(validator.add_chunk(&bytes, 0));
        assert!(validator.validate());
    }

    #[test]
    fn test_chunk_before_chunk_zero() {
        let bytes = snapshot_bytes(&SnapshotConfig::default(), &payload(100));
        let mut validator = SnapshotValidator::new();

        assert!(!validator.add_chunk(&bytes[SNAPSHOT_HEADER_SIZE as usize..], 1));
        assert_eq!(validator.state(), ValidatorState::Unbound);
        assert!(!validator.validate());
        assert_eq!(validator.state(), ValidatorState::Unbound);
    }

    #[test]
    fn test_duplicate_chunk_zero() {
        let bytes = snapshot_bytes(&SnapshotConfig::default(), &payload(100));
        let mut validator = SnapshotValidator::new();

        assert!(validator.add_chunk(&bytes, 0));
        assert!(!validator.add_chunk(&bytes, 0));
        assert_eq!(validator.state(), ValidatorState::Bound);
    }

    #[test]
    fn test_short_chunk_zero_rejected() {
        let bytes = snapshot_bytes(&SnapshotConfig::default(), &payload(100));
        let mut validator = SnapshotValidator::new();

        assert!(!validator.add_chunk(&bytes[..512], 0));
        assert_eq!(validator.state(), ValidatorState::Unbound);

        // A proper chunk 0 can still bind afterwards
        assert!(validator.add_chunk(&bytes, 0));
        assert!(validator.validate());
    }

    #[test]
    fn test_corrupt_header_rejected() {
        let mut bytes = snapshot_bytes(&SnapshotConfig::default(), &payload(100));
        bytes[20] ^= 0x02;

        let mut validator = SnapshotValidator::new();
        assert!(!validator.add_chunk(&bytes, 0));
        assert_eq!(validator.state(), ValidatorState::Unbound);
        assert!(validator.header().is_none());
    }

    #[test]
    fn test_corrupt_v1_payload_invalid() {
        let mut bytes = snapshot_bytes(&SnapshotConfig::default(), &payload(2_000));
        bytes[SNAPSHOT_HEADER_SIZE as usize + 1_500] ^= 0x01;

        let mut validator = SnapshotValidator::new();
        assert!(feed(&mut validator, &chunked(&bytes, 0, 256)));
        assert!(!validator.validate());
        assert_eq!(validator.state(), ValidatorState::Invalid);
        assert!(!validator.add_chunk(b"late", 99));
    }

    #[test]
    fn test_corrupt_v2_payload_rejects_chunk() {
        let mut bytes = snapshot_bytes(&SnapshotConfig::for_testing(), &payload(2_000));
        bytes[SNAPSHOT_HEADER_SIZE as usize + 1_500] ^= 0x01;

        let mut validator = SnapshotValidator::new();
        assert!(!feed(&mut validator, &chunked(&bytes, 0, 256)));
        assert!(!validator.validate());
    }

    #[test]
    fn test_truncated_stream_invalid() {
        for config in [SnapshotConfig::default(), SnapshotConfig::for_testing()] {
            let bytes = snapshot_bytes(&config, &payload(2_000));
            let truncated = &bytes[..bytes.len() - 10];

            let mut validator = SnapshotValidator::new();
            feed(&mut validator, &chunked(truncated, 0, 300));
            assert!(!validator.validate(), "{:?}", config.version);
        }
    }

    #[test]
    fn test_empty_payload_v2() {
        let bytes = snapshot_bytes(&SnapshotConfig::for_testing(), &[]);
        let mut validator = SnapshotValidator::new();
        assert!(validator.add_chunk(&bytes, 0));
        assert!(validator.validate());
        assert_eq!(validator.header().unwrap().version, SnapshotVersion::V2);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ValidatorState::Unbound.to_string(), "unbound");
        assert_eq!(ValidatorState::Invalid.to_string(), "invalid");
    }
}
