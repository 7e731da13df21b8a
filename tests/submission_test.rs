mod common;

use std::sync::Arc;

use common::{InMemoryArtifactStore, InMemoryVideoStore, RecordingBroker};
use framesnap::common::error::SubmissionError;
use framesnap::infrastructure::queue::JobPublisher;
use framesnap::infrastructure::queue::topology::{VIDEO_EXCHANGE, VIDEO_PROCESS_QUEUE};
use framesnap::modules::video::model::VideoStatus;
use framesnap::modules::video::service::VideoService;

struct Harness {
    videos: Arc<InMemoryVideoStore>,
    store: Arc<InMemoryArtifactStore>,
    broker: Arc<RecordingBroker>,
    service: VideoService,
    dir: tempfile::TempDir,
}

fn harness(broker: RecordingBroker) -> Harness {
    let videos = Arc::new(InMemoryVideoStore::default());
    let store = Arc::new(InMemoryArtifactStore::default());
    let broker = Arc::new(broker);
    let service = VideoService::new(
        videos.clone(),
        store.clone(),
        JobPublisher::new(broker.clone()),
    );
    Harness {
        videos,
        store,
        broker,
        service,
        dir: tempfile::tempdir().unwrap(),
    }
}

impl Harness {
    fn stage(&self, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }
}

#[tokio::test]
async fn new_upload_is_stored_recorded_and_enqueued() {
    let h = harness(RecordingBroker::default());
    let staged = h.stage("clip.mp4", b"first video");

    let submitted = h.service.submit(1, "clip.mp4", &staged).await.unwrap();

    assert!(!submitted.reused_source);
    assert_eq!(submitted.video.status, VideoStatus::Pending);
    assert_eq!(submitted.video.file_hash.len(), 64);
    assert!(submitted.video.file_path.ends_with("_clip.mp4"));
    assert_eq!(h.store.uploads(), 1);
    assert_eq!(
        h.store.object(&submitted.video.file_path).as_deref(),
        Some(&b"first video"[..])
    );

    let published = h.broker.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].exchange, VIDEO_EXCHANGE);
    assert_eq!(published[0].routing_key, VIDEO_PROCESS_QUEUE);
    assert_eq!(
        published[0].payload,
        serde_json::json!({ "jobId": submitted.video.id })
    );
}

#[tokio::test]
async fn same_owner_same_bytes_reuses_the_stored_source() {
    let h = harness(RecordingBroker::default());
    let first = h
        .service
        .submit(1, "a.mp4", &h.stage("a.mp4", b"same bytes"))
        .await
        .unwrap();
    let second = h
        .service
        .submit(1, "renamed.mp4", &h.stage("renamed.mp4", b"same bytes"))
        .await
        .unwrap();

    assert!(second.reused_source);
    assert_eq!(h.store.uploads(), 1);
    assert_ne!(first.video.id, second.video.id);
    assert_eq!(first.video.file_path, second.video.file_path);
    assert_eq!(second.video.status, VideoStatus::Pending);
    assert_eq!(second.video.original_file_name, "renamed.mp4");
    assert_eq!(h.broker.published().len(), 2);
}

#[tokio::test]
async fn other_owners_do_not_share_sources() {
    let h = harness(RecordingBroker::default());
    h.service
        .submit(1, "a.mp4", &h.stage("a.mp4", b"same bytes"))
        .await
        .unwrap();
    let other = h
        .service
        .submit(2, "a.mp4", &h.stage("b.mp4", b"same bytes"))
        .await
        .unwrap();

    assert!(!other.reused_source);
    assert_eq!(h.store.uploads(), 2);
}

#[tokio::test]
async fn enqueue_failure_marks_the_record_as_error() {
    let h = harness(RecordingBroker::failing());
    let staged = h.stage("clip.mp4", b"bytes");

    let err = h.service.submit(1, "clip.mp4", &staged).await.unwrap_err();

    let SubmissionError::Enqueue { video_id, .. } = err else {
        panic!("expected an enqueue error, got {err:?}");
    };
    assert_eq!(h.videos.get(video_id).unwrap().status, VideoStatus::Error);
    assert_eq!(
        h.videos.history(video_id),
        vec![VideoStatus::Pending, VideoStatus::Error]
    );
}

#[tokio::test]
async fn unreadable_upload_fails_before_any_side_effect() {
    let h = harness(RecordingBroker::default());
    let missing = h.dir.path().join("missing.mp4");

    let err = h.service.submit(1, "missing.mp4", &missing).await.unwrap_err();

    assert!(matches!(err, SubmissionError::Fingerprint(_)));
    assert_eq!(h.store.uploads(), 0);
    assert!(h.videos.all().is_empty());
    assert!(h.broker.published().is_empty());
}
