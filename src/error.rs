use std::io;
use thiserror::Error;

/// Every failure the archive, frame and record layers can report.
///
/// All variants are hard failures: nothing in this crate retries or
/// continues past one.  Callers that want per-file resilience (see
/// [`crate::patch::patch_directory`]) catch at file granularity.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Incompatible archive version: {version}")]
    IncompatibleHeaderVersion { version: i32 },

    #[error("Item checksum error: '{key}' (stored {expected:#018x}, computed {actual:#018x})")]
    BlockChecksumMismatch { key: String, expected: u64, actual: u64 },

    #[error("Frame length mismatch: should have read {expected} bytes, but read {actual} instead")]
    FrameLengthMismatch { expected: u64, actual: u64 },

    #[error("Record revision {revision} is not supported, last is {latest}")]
    UnsupportedRecordRevision { revision: i32, latest: i32 },

    #[error("Key not found: '{0}'")]
    BlockKeyNotFound(String),

    #[error("Key already added: '{0}'")]
    DuplicateBlockKey(String),

    #[error("{field}: {count} entries exceed fixed capacity {capacity}")]
    CapacityExceeded { field: &'static str, count: usize, capacity: usize },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ArchiveError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ArchiveError::InvalidData(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
