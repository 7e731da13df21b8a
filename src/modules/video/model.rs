use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "video_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl VideoStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, VideoStatus::Completed | VideoStatus::Error)
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VideoStatus::Pending => "PENDING",
            VideoStatus::Processing => "PROCESSING",
            VideoStatus::Completed => "COMPLETED",
            VideoStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Video {
    pub id: i32,
    pub user_id: i32,
    pub original_file_name: String,
    /// Storage location of the uploaded source.
    pub file_path: String,
    /// SHA-256 of the source bytes, lowercase hex.
    pub file_hash: String,
    pub status: VideoStatus,
    /// Storage location of the frame archive once processing completed.
    pub zip_path: Option<String>,
    pub created_at: OffsetDateTime,
    pub processed_at: Option<OffsetDateTime>,
}

impl Video {
    pub fn is_pending(&self) -> bool {
        self.status == VideoStatus::Pending
    }

    pub fn mark_processing(&mut self) {
        self.status = VideoStatus::Processing;
    }

    pub fn mark_completed(&mut self, zip_path: String, at: OffsetDateTime) {
        self.status = VideoStatus::Completed;
        self.zip_path = Some(zip_path);
        self.processed_at = Some(at);
    }

    pub fn mark_failed(&mut self) {
        self.status = VideoStatus::Error;
    }
}

/// Insert payload; the store assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub user_id: i32,
    pub original_file_name: String,
    pub file_path: String,
    pub file_hash: String,
}
