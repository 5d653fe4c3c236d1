//! Structured log events emitted by the snapshot components
//!
//! A capture layer records every event so tests can assert on level,
//! target and message without a global subscriber.

use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

use snapframe_core::{SnapshotConfig, SnapshotVersion, SNAPSHOT_HEADER_SIZE};
use snapframe_durability::{SnapshotReader, SnapshotValidator, SnapshotWriter};
use tempfile::TempDir;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

#[derive(Debug, Clone)]
struct CapturedEvent {
    level: Level,
    target: String,
    message: String,
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }
}

#[derive(Clone, Default)]
struct CaptureLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CaptureLayer {
    fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    fn count(&self, level: Level, message: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.level == level && e.message.contains(message))
            .count()
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            message: visitor.0,
        });
    }
}

fn capture<F: FnOnce()>(f: F) -> CaptureLayer {
    let layer = CaptureLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());
    tracing::subscriber::with_default(subscriber, f);
    layer
}

fn write_snapshot(path: &std::path::Path, payload: &[u8]) {
    let mut writer = SnapshotWriter::open(path, &SnapshotConfig::default()).unwrap();
    writer.write_all(payload).unwrap();
    writer.save_header(0, payload.len() as u64).unwrap().close().unwrap();
}

#[test]
fn test_writer_lifecycle_events() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("snap.gbsnap");

    let logs = capture(|| write_snapshot(&path, b"payload"));

    assert_eq!(logs.count(Level::DEBUG, "Opened snapshot for writing"), 1);
    assert_eq!(logs.count(Level::INFO, "Saved snapshot header"), 1);
    assert_eq!(logs.count(Level::INFO, "Snapshot durably closed"), 1);
    assert!(logs
        .events()
        .iter()
        .all(|e| e.target == "snapframe::snapshot"));
}

#[test]
fn test_payload_mismatch_warns() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("snap.gbsnap");
    write_snapshot(&path, b"some payload bytes");

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[SNAPSHOT_HEADER_SIZE as usize] ^= 0xFF;
    std::fs::write(&path, &bytes).unwrap();

    let logs = capture(|| {
        let mut reader = SnapshotReader::open(&path).unwrap();
        let header = reader.get_header().unwrap();
        let mut payload = Vec::new();
        reader.read_to_end(&mut payload).unwrap();
        assert!(reader.validate_payload(&header).is_err());
    });

    assert_eq!(logs.count(Level::WARN, "Snapshot integrity check failed"), 1);
}

#[test]
fn test_rejected_chunks_warn() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("snap.gbsnap");
    write_snapshot(&path, b"payload");
    let bytes = std::fs::read(&path).unwrap();

    let logs = capture(|| {
        let mut validator = SnapshotValidator::new();
        assert!(!validator.add_chunk(b"early", 1));
        assert!(validator.add_chunk(&bytes, 0));
        assert!(!validator.add_chunk(&bytes, 0));
    });

    assert_eq!(logs.count(Level::WARN, "Rejected chunk before chunk 0"), 1);
    assert_eq!(logs.count(Level::WARN, "Rejected duplicate chunk 0"), 1);
    assert_eq!(logs.count(Level::DEBUG, "Bound snapshot validator"), 1);
}

#[test]
fn test_reader_misuse_warns() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("snap.gbsnap");
    write_snapshot(&path, b"payload");

    let logs = capture(|| {
        let mut reader = SnapshotReader::open(&path).unwrap();
        let mut buf = [0u8; 4];
        assert!(reader.read(&mut buf).is_err());
        let header = reader.get_header().unwrap();
        assert!(reader.get_header().is_err());
        reader.read_to_end(&mut Vec::new()).unwrap();
        reader.validate_payload(&header).unwrap();

        let reader = SnapshotReader::open(&path).unwrap();
        assert!(reader.validate_payload(&header).is_err());
    });

    assert_eq!(logs.count(Level::WARN, "Snapshot integrity check failed"), 3);
}

#[test]
fn test_unsupported_version_warns() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("snap.gbsnap");
    write_snapshot(&path, b"payload");

    // Checksum type field; 1 is the reserved Highway slot
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[40..44].copy_from_slice(&1u32.to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let logs = capture(|| {
        let mut reader = SnapshotReader::open(&path).unwrap();
        assert!(reader.get_header().unwrap_err().is_integrity());
    });

    assert_eq!(logs.count(Level::WARN, "Snapshot integrity check failed"), 1);
}

#[test]
fn test_corrupt_v2_block_warns_on_every_read() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("snap.gbsnap");
    let config = SnapshotConfig::for_testing();
    assert_eq!(config.version, SnapshotVersion::V2);

    let payload = vec![7u8; 1_000];
    let mut writer = SnapshotWriter::open(&path, &config).unwrap();
    writer.write_all(&payload).unwrap();
    writer.save_header(0, 1_000).unwrap().close().unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[SNAPSHOT_HEADER_SIZE as usize + 4 + 10] ^= 0x01;
    std::fs::write(&path, &bytes).unwrap();

    let logs = capture(|| {
        let mut reader = SnapshotReader::open(&path).unwrap();
        reader.get_header().unwrap();
        let mut buf = [0u8; 64];
        assert!(reader.read(&mut buf).is_err());
        assert!(reader.read(&mut buf).is_err());
    });

    assert_eq!(logs.count(Level::WARN, "Snapshot integrity check failed"), 2);
}
