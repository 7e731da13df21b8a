use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::media::Ffmpeg;
use crate::infrastructure::queue::NotificationPublisher;
use crate::infrastructure::queue::topology::{USER_EVENTS_QUEUE, VIDEO_PROCESS_QUEUE};
use crate::modules::user::repository::UserRepository;
use crate::modules::video::repository::VideoRepository;
use crate::state::AppState;

pub mod consumer;
pub mod frame_extractor;
pub mod user_sync;
pub mod video_processor;

use consumer::{ConsumerSpec, run_consumer_pool};
use frame_extractor::{ExtractionSettings, FrameExtractionEngine};
use user_sync::UserSyncHandler;
use video_processor::VideoProcessor;

/// Starts the job consumer pool and the user sync consumer. The returned
/// handles finish once `shutdown` is cancelled and in-flight deliveries settle.
pub fn spawn_workers(state: &AppState, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
    let worker = &state.config.worker;

    let videos = Arc::new(VideoRepository::new(state.db.clone()));
    let users = Arc::new(UserRepository::new(state.db.clone()));
    let storage = Arc::new(state.storage.clone());
    let media = Arc::new(Ffmpeg::new(
        worker.ffmpeg_path.clone(),
        worker.ffprobe_path.clone(),
        worker.snapshot_width,
        worker.snapshot_height,
    ));

    let extractor = Arc::new(FrameExtractionEngine::new(
        storage,
        media,
        ExtractionSettings {
            interval: worker.snapshot_interval(),
            concurrency: worker.snapshot_concurrency,
            max_snapshots: worker.snapshot_max_count,
            work_dir: worker.work_dir.clone(),
        },
    ));

    let notifier = NotificationPublisher::new(Arc::new(state.queue.clone()));
    let processor = VideoProcessor::new(
        videos,
        users.clone(),
        extractor,
        notifier,
        worker.retry_policy(),
    )
    .with_job_timeout(worker.job_timeout());

    let mut handles = run_consumer_pool(
        state.queue.clone(),
        ConsumerSpec {
            queue: VIDEO_PROCESS_QUEUE,
            tag: "frame-extractor",
            workers: worker.consumers,
            prefetch: worker.prefetch,
        },
        Arc::new(processor),
        shutdown.clone(),
    );

    handles.extend(run_consumer_pool(
        state.queue.clone(),
        ConsumerSpec {
            queue: USER_EVENTS_QUEUE,
            tag: "user-sync",
            workers: 1,
            prefetch: 1,
        },
        Arc::new(UserSyncHandler::new(users)),
        shutdown,
    ));

    handles
}
