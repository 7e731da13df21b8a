use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    DatabaseUrl,
    RabbitHost,
    RabbitPort,
    RabbitUser,
    RabbitPassword,
    RabbitVhost,
    RabbitHeartbeatSecs,
    RabbitConnectionTimeoutSecs,
    QueueMessageTtlMs,
    WorkerConsumers,
    WorkerPrefetch,
    RetryCount,
    RetryBaseDelaySecs,
    RetryMaxDelaySecs,
    SnapshotIntervalSecs,
    SnapshotConcurrency,
    SnapshotMaxCount,
    SnapshotWidth,
    SnapshotHeight,
    JobTimeoutSecs,
    WorkDir,
    FfmpegPath,
    FfprobePath,
    MinioUrl,
    MinioBucket,
    MinioAccessKey,
    MinioSecretKey,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::RabbitHost => "RABBITMQ_HOST",
            EnvKey::RabbitPort => "RABBITMQ_PORT",
            EnvKey::RabbitUser => "RABBITMQ_USER",
            EnvKey::RabbitPassword => "RABBITMQ_PASSWORD",
            EnvKey::RabbitVhost => "RABBITMQ_VHOST",
            EnvKey::RabbitHeartbeatSecs => "RABBITMQ_HEARTBEAT_SECS",
            EnvKey::RabbitConnectionTimeoutSecs => "RABBITMQ_CONNECTION_TIMEOUT_SECS",
            EnvKey::QueueMessageTtlMs => "QUEUE_MESSAGE_TTL_MS",
            EnvKey::WorkerConsumers => "WORKER_CONSUMERS",
            EnvKey::WorkerPrefetch => "WORKER_PREFETCH",
            EnvKey::RetryCount => "RETRY_COUNT",
            EnvKey::RetryBaseDelaySecs => "RETRY_BASE_DELAY_SECS",
            EnvKey::RetryMaxDelaySecs => "RETRY_MAX_DELAY_SECS",
            EnvKey::SnapshotIntervalSecs => "SNAPSHOT_INTERVAL_SECS",
            EnvKey::SnapshotConcurrency => "SNAPSHOT_CONCURRENCY",
            EnvKey::SnapshotMaxCount => "SNAPSHOT_MAX_COUNT",
            EnvKey::SnapshotWidth => "SNAPSHOT_WIDTH",
            EnvKey::SnapshotHeight => "SNAPSHOT_HEIGHT",
            EnvKey::JobTimeoutSecs => "JOB_TIMEOUT_SECS",
            EnvKey::WorkDir => "WORK_DIR",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::FfprobePath => "FFPROBE_PATH",
            EnvKey::MinioUrl => "MINIO_ENDPOINT",
            EnvKey::MinioBucket => "MINIO_BUCKET_VIDEOS",
            EnvKey::MinioAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::MinioSecretKey => "AWS_SECRET_ACCESS_KEY",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
