use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use super::consumer::{HandleOutcome, IncomingMessage, MessageHandler};
use super::frame_extractor::FrameExtractor;
use crate::common::error::ProcessingError;
use crate::common::retry::RetryPolicy;
use crate::infrastructure::queue::NotificationPublisher;
use crate::modules::user::repository::UserStore;
use crate::modules::video::events::{JobMessage, NotificationMessage};
use crate::modules::video::model::Video;
use crate::modules::video::repository::VideoStore;

/// Drives one job message through PENDING -> PROCESSING -> COMPLETED | ERROR.
pub struct VideoProcessor {
    videos: Arc<dyn VideoStore>,
    users: Arc<dyn UserStore>,
    extractor: Arc<dyn FrameExtractor>,
    notifier: NotificationPublisher,
    retry: RetryPolicy,
    job_timeout: Option<Duration>,
}

impl VideoProcessor {
    pub fn new(
        videos: Arc<dyn VideoStore>,
        users: Arc<dyn UserStore>,
        extractor: Arc<dyn FrameExtractor>,
        notifier: NotificationPublisher,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            videos,
            users,
            extractor,
            notifier,
            retry,
            job_timeout: None,
        }
    }

    /// Bounds every extraction attempt; an expired attempt counts as failed.
    pub fn with_job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job_timeout = timeout;
        self
    }

    pub async fn process(&self, job: JobMessage) -> HandleOutcome {
        let job_id = job.job_id;

        let video = match self
            .retry
            .run("load video", |_| self.videos.get_by_id(job_id))
            .await
        {
            Ok(Some(video)) => video,
            Ok(None) => {
                info!(job_id, "Video not found, discarding job");
                return HandleOutcome::Ack;
            }
            Err(e) => {
                error!(job_id, error = %e, "Could not load video");
                return HandleOutcome::RejectPermanent;
            }
        };

        if !video.is_pending() {
            info!(job_id, status = %video.status, "Video is not pending, discarding job");
            return HandleOutcome::Ack;
        }

        match self
            .retry
            .run("claim video", |_| self.videos.claim_pending(job_id))
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                info!(
                    job_id,
                    "Video already claimed by another delivery, discarding job"
                );
                return HandleOutcome::Ack;
            }
            Err(e) => {
                error!(job_id, error = %e, "Could not mark video as processing");
                return HandleOutcome::RejectPermanent;
            }
        }

        let mut video = video;
        video.mark_processing();
        info!(job_id, user_id = video.user_id, "Processing started");

        let email = self.owner_email(&video).await;
        if let Some(email) = &email {
            self.notify(
                job_id,
                NotificationMessage::processing_started(email, &video),
            )
            .await;
        }

        let extracted = self
            .retry
            .run("extract frames", |attempt| {
                let source = video.file_path.clone();
                async move {
                    debug!(job_id, attempt, "Extraction attempt");
                    self.extract_once(&source, job_id).await
                }
            })
            .await;

        match extracted {
            Ok(location) => self.complete(video, location, email.as_deref()).await,
            Err(e) => {
                error!(job_id, error = %e, "Frame extraction failed permanently");
                self.fail(video, email.as_deref()).await
            }
        }
    }

    async fn extract_once(&self, source: &str, job_id: i32) -> Result<String, ProcessingError> {
        let extraction = self.extractor.extract(source, job_id);
        match self.job_timeout {
            Some(limit) => tokio::time::timeout(limit, extraction)
                .await
                .map_err(|_| ProcessingError::Timeout(limit))?,
            None => extraction.await,
        }
    }

    async fn complete(
        &self,
        mut video: Video,
        location: String,
        email: Option<&str>,
    ) -> HandleOutcome {
        let job_id = video.id;
        let mut completed = video.clone();
        completed.mark_completed(location.clone(), OffsetDateTime::now_utc());

        if let Err(e) = self
            .retry
            .run("persist completion", |_| self.videos.update(&completed))
            .await
        {
            error!(job_id, location = %location, error = %e, "Could not persist completed status");
            // Single best-effort write.
            video.mark_failed();
            if let Err(e) = self.videos.update(&video).await {
                error!(
                    job_id,
                    error = %e,
                    "Could not persist ERROR status, record left PROCESSING"
                );
            }
            return HandleOutcome::RejectPermanent;
        }

        info!(job_id, location = %location, "Processing completed");
        if let Some(email) = email {
            self.notify(
                job_id,
                NotificationMessage::processing_completed(email, &completed, &location),
            )
            .await;
        }
        HandleOutcome::Ack
    }

    async fn fail(&self, mut video: Video, email: Option<&str>) -> HandleOutcome {
        let job_id = video.id;
        video.mark_failed();

        if let Err(e) = self
            .retry
            .run("persist failure", |_| self.videos.update(&video))
            .await
        {
            error!(job_id, error = %e, "Could not persist ERROR status");
        }

        if let Some(email) = email {
            self.notify(
                job_id,
                NotificationMessage::processing_failed(email, &video),
            )
            .await;
        }
        HandleOutcome::RejectPermanent
    }

    async fn owner_email(&self, video: &Video) -> Option<String> {
        match self.users.find_email(video.user_id).await {
            Ok(Some(email)) => Some(email),
            Ok(None) => {
                warn!(
                    job_id = video.id,
                    user_id = video.user_id,
                    "Owner has no known email, notifications skipped"
                );
                None
            }
            Err(e) => {
                warn!(
                    job_id = video.id,
                    user_id = video.user_id,
                    error = %e,
                    "Owner lookup failed, notifications skipped"
                );
                None
            }
        }
    }

    async fn notify(&self, job_id: i32, notification: NotificationMessage) {
        if let Err(e) = self.notifier.publish(&notification).await {
            warn!(job_id, subject = %notification.subject, error = %e, "Notification not sent");
        }
    }
}

#[async_trait]
impl MessageHandler for VideoProcessor {
    async fn handle(&self, message: &IncomingMessage) -> HandleOutcome {
        let job = match serde_json::from_slice::<JobMessage>(&message.payload) {
            Ok(job) => job,
            Err(e) => {
                error!(
                    delivery_tag = message.delivery_tag,
                    error = %e,
                    "Malformed job message"
                );
                return HandleOutcome::RejectPermanent;
            }
        };

        debug!(
            job_id = job.job_id,
            redelivered = message.redelivered,
            "Job received"
        );
        self.process(job).await
    }
}
