use std::time::Duration;

use thiserror::Error;

use crate::infrastructure::media::MediaError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("location {0} does not belong to this store")]
    InvalidLocation(String),

    #[error("storage request failed: {0}")]
    Request(String),

    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("broker connection failed: {0}")]
    Connection(String),

    #[error("failed to declare {name}: {reason}")]
    Topology { name: String, reason: String },

    #[error("publish to {exchange}/{routing_key} failed: {reason}")]
    Publish {
        exchange: String,
        routing_key: String,
        reason: String,
    },

    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Any failure inside a single extraction attempt.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("failed to download source: {0}")]
    Download(#[source] StorageError),

    #[error("failed to probe source duration: {0}")]
    Probe(#[source] MediaError),

    #[error("snapshot at {offset:?} failed: {source}")]
    Snapshot {
        offset: Duration,
        #[source]
        source: MediaError,
    },

    #[error("source duration {duration_secs}s needs more than {limit} snapshots")]
    TooManySnapshots { duration_secs: f64, limit: usize },

    #[error("failed to assemble archive: {0}")]
    Archive(String),

    #[error("failed to upload archive: {0}")]
    Upload(#[source] StorageError),

    #[error("extraction attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("working area IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for ProcessingError {
    fn from(err: zip::result::ZipError) -> Self {
        ProcessingError::Archive(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("failed to fingerprint upload: {0}")]
    Fingerprint(#[source] std::io::Error),

    #[error("failed to store source artifact: {0}")]
    Upload(#[source] StorageError),

    #[error("status store error: {0}")]
    Store(#[source] anyhow::Error),

    #[error("failed to enqueue video {video_id}: {source}")]
    Enqueue {
        video_id: i32,
        #[source]
        source: QueueError,
    },
}
