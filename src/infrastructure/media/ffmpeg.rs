use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use super::{MediaError, MediaToolkit};

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// ffprobe/ffmpeg binaries found on `PATH` or configured explicitly.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
    width: u32,
    height: u32,
}

impl Ffmpeg {
    pub fn new(ffmpeg_path: PathBuf, ffprobe_path: PathBuf, width: u32, height: u32) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
            width,
            height,
        }
    }

    fn probe_args(source: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "json",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(source.as_os_str().to_owned());
        args
    }

    fn snapshot_args(&self, source: &Path, offset: Duration, output: &Path) -> Vec<OsString> {
        vec![
            "-v".into(),
            "error".into(),
            "-ss".into(),
            format!("{:.3}", offset.as_secs_f64()).into(),
            "-i".into(),
            source.as_os_str().to_owned(),
            "-frames:v".into(),
            "1".into(),
            "-vf".into(),
            format!("scale={}:{}", self.width, self.height).into(),
            "-y".into(),
            output.as_os_str().to_owned(),
        ]
    }
}

/// Parses `ffprobe -show_entries format=duration -of json` output. Missing or
/// `N/A` durations (live streams, some containers) parse as 0.
pub fn parse_duration(stdout: &[u8]) -> Result<f64, MediaError> {
    let probe: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|e| MediaError::InvalidProbeOutput(e.to_string()))?;

    let raw = probe.format.and_then(|f| f.duration);
    match raw.as_deref().map(str::trim) {
        None | Some("") | Some("N/A") => Ok(0.0),
        Some(value) => value
            .parse::<f64>()
            .map_err(|_| MediaError::InvalidProbeOutput(format!("duration {:?}", value))),
    }
}

#[async_trait]
impl MediaToolkit for Ffmpeg {
    async fn probe_duration(&self, source: &Path) -> Result<f64, MediaError> {
        let output = Command::new(&self.ffprobe_path)
            .args(Self::probe_args(source))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::ToolFailed {
                tool: "ffprobe",
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let duration = parse_duration(&output.stdout)?;
        debug!(source = %source.display(), duration, "Probed source");
        Ok(duration)
    }

    async fn snapshot(
        &self,
        source: &Path,
        offset: Duration,
        output: &Path,
    ) -> Result<(), MediaError> {
        let result = Command::new(&self.ffmpeg_path)
            .args(self.snapshot_args(source, offset, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !result.status.success() {
            return Err(MediaError::ToolFailed {
                tool: "ffmpeg",
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        // ffmpeg exits 0 without writing anything when the seek lands past the end.
        if tokio::fs::metadata(output).await.is_err() {
            return Err(MediaError::MissingOutput {
                tool: "ffmpeg",
                path: output.display().to_string(),
            });
        }

        Ok(())
    }
}
