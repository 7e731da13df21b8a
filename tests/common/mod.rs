#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;

use framesnap::common::error::{ProcessingError, QueueError, StorageError};
use framesnap::infrastructure::media::{MediaError, MediaToolkit};
use framesnap::infrastructure::queue::MessagePublisher;
use framesnap::infrastructure::storage::{ArtifactStore, ByteStream};
use framesnap::modules::user::model::UserRecord;
use framesnap::modules::user::repository::UserStore;
use framesnap::modules::video::model::{NewVideo, Video, VideoStatus};
use framesnap::modules::video::repository::VideoStore;
use framesnap::workers::consumer::IncomingMessage;
use framesnap::workers::frame_extractor::FrameExtractor;

pub fn pending_video(id: i32, user_id: i32) -> Video {
    Video {
        id,
        user_id,
        original_file_name: "holiday.mp4".to_string(),
        file_path: format!("mem/source_{id}.mp4"),
        file_hash: "0".repeat(64),
        status: VideoStatus::Pending,
        zip_path: None,
        created_at: OffsetDateTime::now_utc(),
        processed_at: None,
    }
}

pub fn message(payload: &[u8]) -> IncomingMessage {
    IncomingMessage {
        payload: payload.to_vec(),
        redelivered: false,
        delivery_tag: 1,
    }
}

/// Video store that records every status it is asked to persist.
#[derive(Default)]
pub struct InMemoryVideoStore {
    videos: Mutex<HashMap<i32, Video>>,
    history: Mutex<Vec<(i32, VideoStatus)>>,
    writes: AtomicU32,
    /// Claims report that another delivery got there first.
    pub lose_claims: AtomicBool,
    /// Writes of COMPLETED records fail.
    pub fail_completed_writes: AtomicBool,
}

impl InMemoryVideoStore {
    pub fn with(videos: impl IntoIterator<Item = Video>) -> Self {
        let store = Self::default();
        for video in videos {
            store.videos.lock().unwrap().insert(video.id, video);
        }
        store
    }

    pub fn get(&self, id: i32) -> Option<Video> {
        self.videos.lock().unwrap().get(&id).cloned()
    }

    pub fn all(&self) -> Vec<Video> {
        let mut videos: Vec<Video> = self.videos.lock().unwrap().values().cloned().collect();
        videos.sort_by_key(|v| v.id);
        videos
    }

    /// Statuses written for `id`, in order.
    pub fn history(&self, id: i32) -> Vec<VideoStatus> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter(|(video_id, _)| *video_id == id)
            .map(|(_, status)| *status)
            .collect()
    }

    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    fn record(&self, id: i32, status: VideoStatus) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.history.lock().unwrap().push((id, status));
    }
}

#[async_trait]
impl VideoStore for InMemoryVideoStore {
    async fn get_by_id(&self, id: i32) -> Result<Option<Video>> {
        Ok(self.get(id))
    }

    async fn create(&self, video: NewVideo) -> Result<Video> {
        let mut videos = self.videos.lock().unwrap();
        let id = videos.keys().max().copied().unwrap_or(0) + 1;
        let created = Video {
            id,
            user_id: video.user_id,
            original_file_name: video.original_file_name,
            file_path: video.file_path,
            file_hash: video.file_hash,
            status: VideoStatus::Pending,
            zip_path: None,
            created_at: OffsetDateTime::now_utc(),
            processed_at: None,
        };
        videos.insert(id, created.clone());
        drop(videos);
        self.record(id, VideoStatus::Pending);
        Ok(created)
    }

    async fn update(&self, video: &Video) -> Result<()> {
        if video.status == VideoStatus::Completed
            && self.fail_completed_writes.load(Ordering::SeqCst)
        {
            return Err(anyhow!("database unavailable"));
        }
        self.videos.lock().unwrap().insert(video.id, video.clone());
        self.record(video.id, video.status);
        Ok(())
    }

    async fn find_by_owner_and_fingerprint(
        &self,
        user_id: i32,
        file_hash: &str,
    ) -> Result<Option<Video>> {
        Ok(self
            .all()
            .into_iter()
            .find(|v| v.user_id == user_id && v.file_hash == file_hash))
    }

    async fn claim_pending(&self, id: i32) -> Result<bool> {
        if self.lose_claims.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let claimed = {
            let mut videos = self.videos.lock().unwrap();
            match videos.get_mut(&id) {
                Some(video) if video.status == VideoStatus::Pending => {
                    video.status = VideoStatus::Processing;
                    true
                }
                _ => false,
            }
        };
        if claimed {
            self.record(id, VideoStatus::Processing);
        }
        Ok(claimed)
    }
}

#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<i32, UserRecord>>,
    pub fail_writes: AtomicBool,
}

impl InMemoryUserStore {
    pub fn with_user(id: i32, email: &str) -> Self {
        let store = Self::default();
        store.users.lock().unwrap().insert(
            id,
            UserRecord {
                id,
                email: email.to_string(),
                username: format!("user{id}"),
            },
        );
        store
    }

    pub fn get(&self, id: i32) -> Option<UserRecord> {
        self.users.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_email(&self, user_id: i32) -> Result<Option<String>> {
        Ok(self.get(user_id).map(|u| u.email))
    }

    async fn upsert(&self, user: &UserRecord) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("database unavailable"));
        }
        self.users.lock().unwrap().insert(user.id, user.clone());
        Ok(())
    }
}

/// Artifact store keeping objects in memory under `mem/{name}` locations.
#[derive(Default)]
pub struct InMemoryArtifactStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    uploads: AtomicU32,
}

impl InMemoryArtifactStore {
    pub fn put(&self, location: &str, bytes: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(location.to_string(), bytes.to_vec());
    }

    pub fn object(&self, location: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(location).cloned()
    }

    pub fn uploads(&self) -> u32 {
        self.uploads.load(Ordering::SeqCst)
    }

    fn store(&self, name: &str, bytes: Vec<u8>) -> String {
        let location = format!("mem/{name}");
        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().unwrap().insert(location.clone(), bytes);
        location
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn upload_bytes(&self, bytes: Bytes, name: &str) -> Result<String, StorageError> {
        Ok(self.store(name, bytes.to_vec()))
    }

    async fn upload_file(&self, path: &Path, name: &str) -> Result<String, StorageError> {
        let bytes = tokio::fs::read(path).await?;
        Ok(self.store(name, bytes))
    }

    async fn download(&self, location: &str, local_path: &Path) -> Result<(), StorageError> {
        let bytes = self
            .object(location)
            .ok_or_else(|| StorageError::NotFound(location.to_string()))?;
        std::fs::write(local_path, bytes)?;
        Ok(())
    }

    async fn exists(&self, location: &str) -> Result<bool, StorageError> {
        Ok(self.object(location).is_some())
    }

    async fn open_stream(&self, location: &str) -> Result<ByteStream, StorageError> {
        let bytes = self
            .object(location)
            .ok_or_else(|| StorageError::NotFound(location.to_string()))?;
        Ok(Box::pin(std::io::Cursor::new(bytes)))
    }
}

#[derive(Debug, Clone)]
pub struct Published {
    pub exchange: String,
    pub routing_key: String,
    pub payload: serde_json::Value,
}

#[derive(Default)]
pub struct RecordingBroker {
    published: Mutex<Vec<Published>>,
    pub fail: AtomicBool,
}

impl RecordingBroker {
    pub fn failing() -> Self {
        let broker = Self::default();
        broker.fail.store(true, Ordering::SeqCst);
        broker
    }

    pub fn published(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_to(&self, exchange: &str) -> Vec<serde_json::Value> {
        self.published()
            .into_iter()
            .filter(|p| p.exchange == exchange)
            .map(|p| p.payload)
            .collect()
    }
}

#[async_trait]
impl MessagePublisher for RecordingBroker {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), QueueError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(QueueError::Publish {
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                reason: "broker unreachable".to_string(),
            });
        }
        self.published.lock().unwrap().push(Published {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            payload: serde_json::from_slice(payload)?,
        });
        Ok(())
    }
}

/// Media toolkit reporting a fixed duration and writing the offset as the frame body.
/// Frames are written synchronously so an abandoned attempt leaves no pending write.
pub struct FakeMedia {
    pub duration_secs: f64,
    pub fail_snapshots: bool,
    pub delay: Duration,
    pub snapshots: AtomicU32,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeMedia {
    pub fn new(duration_secs: f64) -> Self {
        Self {
            duration_secs,
            fail_snapshots: false,
            delay: Duration::ZERO,
            snapshots: AtomicU32::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn failing(duration_secs: f64) -> Self {
        Self {
            fail_snapshots: true,
            ..Self::new(duration_secs)
        }
    }

    /// Every snapshot takes `delay`.
    pub fn slow(duration_secs: f64, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(duration_secs)
        }
    }

    /// Most snapshots observed running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaToolkit for FakeMedia {
    async fn probe_duration(&self, source: &Path) -> Result<f64, MediaError> {
        std::fs::metadata(source)?;
        Ok(self.duration_secs)
    }

    async fn snapshot(
        &self,
        source: &Path,
        offset: Duration,
        output: &Path,
    ) -> Result<(), MediaError> {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_snapshots {
            return Err(MediaError::ToolFailed {
                tool: "ffmpeg",
                status: "exit status: 1".to_string(),
                stderr: format!("cannot decode {}", source.display()),
            });
        }
        std::fs::write(output, format!("t={}", offset.as_secs()))?;
        Ok(())
    }
}

/// Extractor failing every attempt.
#[derive(Default)]
pub struct FailingExtractor {
    pub attempts: AtomicU32,
}

#[async_trait]
impl FrameExtractor for FailingExtractor {
    async fn extract(
        &self,
        _source_location: &str,
        _job_id: i32,
    ) -> Result<String, ProcessingError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ProcessingError::Archive("no frames were extracted".to_string()))
    }
}

/// Extractor that never finishes within a short timeout.
#[derive(Default)]
pub struct StalledExtractor {
    pub attempts: AtomicU32,
}

#[async_trait]
impl FrameExtractor for StalledExtractor {
    async fn extract(
        &self,
        _source_location: &str,
        _job_id: i32,
    ) -> Result<String, ProcessingError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok("mem/never.zip".to_string())
    }
}
