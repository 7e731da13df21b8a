use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use super::model::UserRecord;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_email(&self, user_id: i32) -> Result<Option<String>>;

    async fn upsert(&self, user: &UserRecord) -> Result<()>;
}

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn find_email(&self, user_id: i32) -> Result<Option<String>> {
        let email = sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(email)
    }

    async fn upsert(&self, user: &UserRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, username)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET email = EXCLUDED.email, username = EXCLUDED.username, updated_at = NOW()
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.username)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
