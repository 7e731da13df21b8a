use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt, stream};
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zip::CompressionMethod;
use zip::write::FileOptions;

use crate::common::error::ProcessingError;
use crate::infrastructure::media::MediaToolkit;
use crate::infrastructure::storage::ArtifactStore;

/// Turns a stored source video into a stored archive of still frames.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Returns the storage location of the uploaded archive.
    async fn extract(&self, source_location: &str, job_id: i32) -> Result<String, ProcessingError>;
}

#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub interval: Duration,
    pub concurrency: usize,
    /// Probed durations needing more snapshots than this fail the attempt.
    pub max_snapshots: usize,
    pub work_dir: PathBuf,
}

pub struct FrameExtractionEngine {
    store: Arc<dyn ArtifactStore>,
    media: Arc<dyn MediaToolkit>,
    settings: ExtractionSettings,
}

impl FrameExtractionEngine {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        media: Arc<dyn MediaToolkit>,
        settings: ExtractionSettings,
    ) -> Self {
        Self {
            store,
            media,
            settings,
        }
    }

    async fn snapshot_all(
        &self,
        workspace: &JobWorkspace,
        count: usize,
    ) -> Result<Vec<PathBuf>, ProcessingError> {
        let width = snapshot_name_width(count);
        let offsets = snapshot_offsets(count, self.settings.interval);
        let jobs = offsets.enumerate().map(|(index, offset)| {
            let media = self.media.clone();
            let source = workspace.source.clone();
            let output = workspace.frames_dir.join(snapshot_file_name(index, width));
            async move {
                media
                    .snapshot(&source, offset, &output)
                    .await
                    .map_err(|source| ProcessingError::Snapshot { offset, source })?;
                Ok::<_, ProcessingError>(output)
            }
        });

        stream::iter(jobs)
            .buffer_unordered(self.settings.concurrency.max(1))
            .try_collect()
            .await
    }
}

#[async_trait]
impl FrameExtractor for FrameExtractionEngine {
    async fn extract(&self, source_location: &str, job_id: i32) -> Result<String, ProcessingError> {
        let workspace = JobWorkspace::create(&self.settings.work_dir, job_id, source_location)?;

        self.store
            .download(source_location, &workspace.source)
            .await
            .map_err(ProcessingError::Download)?;

        let duration = self
            .media
            .probe_duration(&workspace.source)
            .await
            .map_err(ProcessingError::Probe)?;

        let count = snapshot_count(
            duration,
            self.settings.interval,
            self.settings.max_snapshots,
        )?;
        info!(
            job_id,
            duration_secs = duration,
            snapshots = count,
            concurrency = self.settings.concurrency,
            "Extracting frames"
        );

        let frames = self.snapshot_all(&workspace, count).await?;

        // The blocking task owns the workspace, so an abandoned attempt still
        // removes whatever the archive writer leaves behind.
        let (workspace, entries) = tokio::task::spawn_blocking(move || {
            let entries = write_archive(frames, &workspace.archive);
            (workspace, entries)
        })
        .await
        .map_err(|e| ProcessingError::Archive(format!("archive task failed: {}", e)))?;
        let entries = entries?;
        debug!(job_id, entries, "Archive assembled");

        let name = result_name(job_id, OffsetDateTime::now_utc());
        let location = self
            .store
            .upload_file(&workspace.archive, &name)
            .await
            .map_err(ProcessingError::Upload)?;

        info!(job_id, location = %location, "Frame archive uploaded");
        Ok(location)
    }
}

/// Number of snapshots for a source of `duration_secs`: one per full interval,
/// never fewer than one and never more than `limit`.
pub fn snapshot_count(
    duration_secs: f64,
    interval: Duration,
    limit: usize,
) -> Result<usize, ProcessingError> {
    let interval_secs = interval.as_secs_f64();
    if !duration_secs.is_finite() || duration_secs <= 0.0 || interval_secs <= 0.0 {
        return Ok(1);
    }

    let count = (duration_secs / interval_secs).floor();
    if count > limit as f64 {
        return Err(ProcessingError::TooManySnapshots {
            duration_secs,
            limit,
        });
    }
    Ok((count as usize).max(1))
}

/// Offsets `0, interval, 2 * interval, ...`, produced lazily.
pub fn snapshot_offsets(count: usize, interval: Duration) -> impl Iterator<Item = Duration> {
    let next = move |offset: &Duration| offset.checked_add(interval);
    std::iter::successors(Some(Duration::ZERO), next).take(count)
}

/// Digits needed to name `count` snapshots, at least four.
pub fn snapshot_name_width(count: usize) -> usize {
    let last = count.saturating_sub(1);
    (last.checked_ilog10().unwrap_or(0) as usize + 1).max(4)
}

/// Zero-padded to `width` so lexicographic order is chronological order.
pub fn snapshot_file_name(index: usize, width: usize) -> String {
    format!("frame_{:0width$}.png", index, width = width)
}

/// `{uuid}_video_{job}_{yyyyMMddHHmmss}.zip`
pub fn result_name(job_id: i32, at: OffsetDateTime) -> String {
    format!(
        "{}_video_{}_{:04}{:02}{:02}{:02}{:02}{:02}.zip",
        Uuid::new_v4(),
        job_id,
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    )
}

/// Writes `frames` into a deflated ZIP at `archive`, ordered by file name.
/// Returns the number of entries.
pub fn write_archive(mut frames: Vec<PathBuf>, archive: &Path) -> Result<usize, ProcessingError> {
    if frames.is_empty() {
        return Err(ProcessingError::Archive("no frames were extracted".to_string()));
    }
    frames.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut zip = zip::ZipWriter::new(File::create(archive)?);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for frame in &frames {
        let name = frame
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ProcessingError::Archive(format!("bad frame path {}", frame.display()))
            })?;
        zip.start_file(name, options)?;
        io::copy(&mut File::open(frame)?, &mut zip)?;
    }

    zip.finish()?;
    Ok(frames.len())
}

/// Job-scoped directory in the work area holding the source copy, the frames
/// and the archive. It is removed on drop, so every exit path of an extraction
/// attempt cleans up after itself.
struct JobWorkspace {
    root: PathBuf,
    source: PathBuf,
    frames_dir: PathBuf,
    archive: PathBuf,
}

impl JobWorkspace {
    /// Creates the directories synchronously; a late write into a removed
    /// workspace then fails instead of recreating it.
    fn create(work_dir: &Path, job_id: i32, source_location: &str) -> io::Result<Self> {
        let root = work_dir.join(format!("job_{}_{}", job_id, Uuid::new_v4().simple()));
        let workspace = Self {
            source: root.join(format!("source.{}", source_extension(source_location))),
            frames_dir: root.join("frames"),
            archive: root.join("frames.zip"),
            root,
        };
        std::fs::create_dir_all(&workspace.frames_dir)?;
        Ok(workspace)
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.root.display(), error = %e, "Failed to remove job workspace");
            }
        }
    }
}

fn source_extension(source_location: &str) -> String {
    Path::new(source_location)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "mp4".to_string())
}
