//! Snapshot file I/O
//!
//! - `writer`: two-pass writer with a durable close
//! - `reader`: header parsing and payload streaming
//! - `validator`: chunk-by-chunk admission on the receiving side

pub mod reader;
pub mod validator;
pub mod writer;

pub use reader::SnapshotReader;
pub use validator::{SnapshotValidator, ValidatorState};
pub use writer::{FinalizedSnapshot, SnapshotWriter};
