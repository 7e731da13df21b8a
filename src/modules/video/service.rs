use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use super::events::JobMessage;
use super::model::{NewVideo, Video};
use super::repository::VideoStore;
use crate::common::error::SubmissionError;
use crate::common::fingerprint::fingerprint_file;
use crate::infrastructure::queue::JobPublisher;
use crate::infrastructure::storage::ArtifactStore;

#[derive(Debug, Clone)]
pub struct SubmittedVideo {
    pub video: Video,
    /// The source bytes were already stored for this owner and got reused.
    pub reused_source: bool,
}

/// Turns a staged upload into a PENDING record plus a queued job.
#[derive(Clone)]
pub struct VideoService {
    videos: Arc<dyn VideoStore>,
    storage: Arc<dyn ArtifactStore>,
    jobs: JobPublisher,
}

impl VideoService {
    pub fn new(
        videos: Arc<dyn VideoStore>,
        storage: Arc<dyn ArtifactStore>,
        jobs: JobPublisher,
    ) -> Self {
        Self {
            videos,
            storage,
            jobs,
        }
    }

    pub async fn submit(
        &self,
        user_id: i32,
        original_file_name: &str,
        staged: &Path,
    ) -> Result<SubmittedVideo, SubmissionError> {
        let file_hash = fingerprint_file(staged)
            .await
            .map_err(SubmissionError::Fingerprint)?;

        let existing = self
            .videos
            .find_by_owner_and_fingerprint(user_id, &file_hash)
            .await
            .map_err(SubmissionError::Store)?;

        let (file_path, reused_source) = match existing {
            Some(previous) => {
                info!(
                    user_id,
                    video_id = previous.id,
                    "Identical upload found, reusing stored source"
                );
                (previous.file_path, true)
            }
            None => {
                let name = format!("{}_{}", Uuid::new_v4(), storage_name(original_file_name));
                let location = self
                    .storage
                    .upload_file(staged, &name)
                    .await
                    .map_err(SubmissionError::Upload)?;
                (location, false)
            }
        };

        let mut video = self
            .videos
            .create(NewVideo {
                user_id,
                original_file_name: original_file_name.to_string(),
                file_path,
                file_hash,
            })
            .await
            .map_err(SubmissionError::Store)?;

        if let Err(source) = self.jobs.publish(&JobMessage::new(video.id)).await {
            error!(
                video_id = video.id,
                error = %source,
                "Failed to enqueue video, marking as ERROR"
            );
            video.mark_failed();
            if let Err(e) = self.videos.update(&video).await {
                error!(video_id = video.id, error = %e, "Failed to persist ERROR status");
            }
            return Err(SubmissionError::Enqueue {
                video_id: video.id,
                source,
            });
        }

        info!(
            user_id,
            video_id = video.id,
            reused_source,
            "Video submitted for processing"
        );
        Ok(SubmittedVideo {
            video,
            reused_source,
        })
    }
}

/// Final path component of a client-supplied file name, limited to characters
/// that are safe in object keys.
fn storage_name(original_file_name: &str) -> String {
    let base = original_file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
