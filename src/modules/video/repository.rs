use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use super::model::{NewVideo, Video, VideoStatus};

/// Persistence of video records.
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn get_by_id(&self, id: i32) -> Result<Option<Video>>;

    async fn create(&self, video: NewVideo) -> Result<Video>;

    async fn update(&self, video: &Video) -> Result<()>;

    async fn find_by_owner_and_fingerprint(&self, user_id: i32, file_hash: &str)
    -> Result<Option<Video>>;

    /// Moves a PENDING record to PROCESSING. Returns `false` when the record
    /// was not PENDING anymore, meaning another delivery already claimed it.
    async fn claim_pending(&self, id: i32) -> Result<bool>;
}

const VIDEO_COLUMNS: &str = "id, user_id, original_file_name, file_path, file_hash, status, \
                             zip_path, created_at, processed_at";

#[derive(Clone)]
pub struct VideoRepository {
    pool: PgPool,
}

impl VideoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VideoStore for VideoRepository {
    async fn get_by_id(&self, id: i32) -> Result<Option<Video>> {
        let video = sqlx::query_as::<_, Video>(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(video)
    }

    async fn create(&self, video: NewVideo) -> Result<Video> {
        let created = sqlx::query_as::<_, Video>(&format!(
            r#"
            INSERT INTO videos (user_id, original_file_name, file_path, file_hash, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {VIDEO_COLUMNS}
            "#
        ))
        .bind(video.user_id)
        .bind(&video.original_file_name)
        .bind(&video.file_path)
        .bind(&video.file_hash)
        .bind(VideoStatus::Pending)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn update(&self, video: &Video) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE videos
            SET status = $2, zip_path = $3, processed_at = $4
            WHERE id = $1
            "#,
        )
        .bind(video.id)
        .bind(video.status)
        .bind(&video.zip_path)
        .bind(video.processed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_owner_and_fingerprint(
        &self,
        user_id: i32,
        file_hash: &str,
    ) -> Result<Option<Video>> {
        let video = sqlx::query_as::<_, Video>(&format!(
            r#"
            SELECT {VIDEO_COLUMNS} FROM videos
            WHERE user_id = $1 AND file_hash = $2
            ORDER BY id
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .bind(file_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(video)
    }

    async fn claim_pending(&self, id: i32) -> Result<bool> {
        let result = sqlx::query("UPDATE videos SET status = $2 WHERE id = $1 AND status = $3")
            .bind(id)
            .bind(VideoStatus::Processing)
            .bind(VideoStatus::Pending)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}
