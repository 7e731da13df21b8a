use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod ffmpeg;

pub use ffmpeg::Ffmpeg;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: &'static str,
        status: String,
        stderr: String,
    },

    #[error("{tool} produced no output file at {path}")]
    MissingOutput { tool: &'static str, path: String },

    #[error("unreadable probe output: {0}")]
    InvalidProbeOutput(String),

    #[error("failed to run media tool: {0}")]
    Io(#[from] std::io::Error),
}

/// Probing and still-frame extraction on a local media file.
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Total duration in seconds. Sources without a known duration report 0.
    async fn probe_duration(&self, source: &Path) -> Result<f64, MediaError>;

    /// Writes a single frame taken at `offset` to `output`.
    async fn snapshot(&self, source: &Path, offset: Duration, output: &Path)
    -> Result<(), MediaError>;
}
