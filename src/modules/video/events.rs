use serde::{Deserialize, Serialize};

use super::model::Video;

/// Queue payload for one frame-extraction job. Everything else is re-read from
/// the video record when the job is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JobMessage {
    pub job_id: i32,
}

impl JobMessage {
    pub fn new(job_id: i32) -> Self {
        Self { job_id }
    }
}

/// Status-change email request consumed by the notification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    pub email: String,
    pub subject: String,
    pub body: String,
    pub attachment_path: Option<String>,
    /// `true` for "processing started", `false` for result notifications.
    pub is_processing_update: bool,
}

impl NotificationMessage {
    pub fn processing_started(email: &str, video: &Video) -> Self {
        Self {
            email: email.to_string(),
            subject: "Processing started".to_string(),
            body: format!(
                "Your video '{}' is being processed.",
                video.original_file_name
            ),
            attachment_path: None,
            is_processing_update: true,
        }
    }

    pub fn processing_completed(email: &str, video: &Video, archive_location: &str) -> Self {
        Self {
            email: email.to_string(),
            subject: "Your video is ready!".to_string(),
            body: format!(
                "The frames extracted from '{}' are attached as a ZIP archive.",
                video.original_file_name
            ),
            attachment_path: Some(archive_location.to_string()),
            is_processing_update: false,
        }
    }

    pub fn processing_failed(email: &str, video: &Video) -> Self {
        Self {
            email: email.to_string(),
            subject: "Video processing failed".to_string(),
            body: format!(
                "We could not extract frames from '{}'. Please try uploading it again.",
                video.original_file_name
            ),
            attachment_path: None,
            is_processing_update: false,
        }
    }
}
