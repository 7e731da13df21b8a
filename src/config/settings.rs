use std::path::PathBuf;
use std::time::Duration;

use crate::common::retry::RetryPolicy;
use crate::config::env::{self, EnvKey};

/// Number of processing units on the host, falling back to 1 when unknown.
pub fn available_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[derive(Clone, Debug)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
    pub heartbeat_secs: u16,
    pub connection_timeout_secs: u64,
    pub message_ttl_ms: u32,
}

impl BrokerConfig {
    /// AMQP URI with credentials and vhost percent-encoded; heartbeat and
    /// connection timeout travel as URI query parameters.
    pub fn amqp_url(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}/{}?heartbeat={}&connection_timeout={}",
            encode(&self.user),
            encode(&self.password),
            self.host,
            self.port,
            encode(&self.vhost),
            self.heartbeat_secs,
            self.connection_timeout_secs.saturating_mul(1000),
        )
    }
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub consumers: usize,
    pub prefetch: u16,
    pub retry_count: u32,
    pub retry_base_delay_secs: f64,
    pub retry_max_delay_secs: u64,
    pub snapshot_interval_secs: f64,
    pub snapshot_concurrency: usize,
    pub snapshot_max_count: usize,
    pub snapshot_width: u32,
    pub snapshot_height: u32,
    pub job_timeout_secs: u64,
    pub work_dir: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
}

impl WorkerConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        let base_delay = Duration::try_from_secs_f64(self.retry_base_delay_secs.max(0.0))
            .unwrap_or(Duration::MAX);
        RetryPolicy::new(self.retry_count, base_delay)
            .with_max_delay(Duration::from_secs(self.retry_max_delay_secs))
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.snapshot_interval_secs).unwrap_or(Duration::MAX)
    }

    /// `None` when no per-attempt timeout is configured.
    pub fn job_timeout(&self) -> Option<Duration> {
        (self.job_timeout_secs > 0).then(|| Duration::from_secs(self.job_timeout_secs))
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: String,
    pub minio_url: String,
    pub minio_bucket: String,
    pub minio_access_key: String,
    pub minio_secret_key: String,
    pub broker: BrokerConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

fn required(key: EnvKey) -> Result<String, ConfigError> {
    let name = key.as_str();
    env::get(key).map_err(|_| ConfigError::Missing(name))
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let cpus = available_cpus();

        let config = Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            database_url: required(EnvKey::DatabaseUrl)?,
            minio_url: required(EnvKey::MinioUrl)?,
            minio_bucket: required(EnvKey::MinioBucket)?,
            minio_access_key: required(EnvKey::MinioAccessKey)?,
            minio_secret_key: required(EnvKey::MinioSecretKey)?,
            broker: BrokerConfig {
                host: env::get_or(EnvKey::RabbitHost, "localhost"),
                port: env::get_parsed(EnvKey::RabbitPort, 5672),
                user: env::get_or(EnvKey::RabbitUser, "guest"),
                password: env::get_or(EnvKey::RabbitPassword, "guest"),
                vhost: env::get_or(EnvKey::RabbitVhost, "/"),
                heartbeat_secs: env::get_parsed(EnvKey::RabbitHeartbeatSecs, 60),
                connection_timeout_secs: env::get_parsed(EnvKey::RabbitConnectionTimeoutSecs, 15),
                message_ttl_ms: env::get_parsed(EnvKey::QueueMessageTtlMs, 30_000),
            },
            worker: WorkerConfig {
                consumers: env::get_parsed(EnvKey::WorkerConsumers, cpus),
                prefetch: env::get_parsed(EnvKey::WorkerPrefetch, 1),
                retry_count: env::get_parsed(EnvKey::RetryCount, 3),
                retry_base_delay_secs: env::get_parsed(EnvKey::RetryBaseDelaySecs, 2.0),
                retry_max_delay_secs: env::get_parsed(EnvKey::RetryMaxDelaySecs, 300),
                snapshot_interval_secs: env::get_parsed(EnvKey::SnapshotIntervalSecs, 5.0),
                snapshot_concurrency: env::get_parsed(EnvKey::SnapshotConcurrency, cpus),
                snapshot_max_count: env::get_parsed(EnvKey::SnapshotMaxCount, 20_000),
                snapshot_width: env::get_parsed(EnvKey::SnapshotWidth, 1920),
                snapshot_height: env::get_parsed(EnvKey::SnapshotHeight, 1080),
                job_timeout_secs: env::get_parsed(EnvKey::JobTimeoutSecs, 0),
                work_dir: env::get(EnvKey::WorkDir)
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| std::env::temp_dir().join("framesnap")),
                ffmpeg_path: PathBuf::from(env::get_or(EnvKey::FfmpegPath, "ffmpeg")),
                ffprobe_path: PathBuf::from(env::get_or(EnvKey::FfprobePath, "ffprobe")),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.worker.validate()
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let interval = self.snapshot_interval_secs;
        if interval <= 0.0 || Duration::try_from_secs_f64(interval).is_err() {
            return Err(ConfigError::Invalid {
                key: EnvKey::SnapshotIntervalSecs.as_str(),
                reason: format!("must be a positive number of seconds, got {}", interval),
            });
        }
        let base_delay = self.retry_base_delay_secs;
        if base_delay.is_nan() || Duration::try_from_secs_f64(base_delay.max(0.0)).is_err() {
            return Err(ConfigError::Invalid {
                key: EnvKey::RetryBaseDelaySecs.as_str(),
                reason: format!(
                    "must be a representable number of seconds, got {}",
                    base_delay
                ),
            });
        }
        if self.consumers == 0 {
            return Err(ConfigError::Invalid {
                key: EnvKey::WorkerConsumers.as_str(),
                reason: "at least one consumer is required".to_string(),
            });
        }
        if self.prefetch == 0 {
            return Err(ConfigError::Invalid {
                key: EnvKey::WorkerPrefetch.as_str(),
                reason: "prefetch of 0 means unlimited; use a positive value".to_string(),
            });
        }
        if self.snapshot_concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: EnvKey::SnapshotConcurrency.as_str(),
                reason: "at least one concurrent snapshot is required".to_string(),
            });
        }
        if self.snapshot_max_count == 0 {
            return Err(ConfigError::Invalid {
                key: EnvKey::SnapshotMaxCount.as_str(),
                reason: "at least one snapshot per job is required".to_string(),
            });
        }
        Ok(())
    }
}
