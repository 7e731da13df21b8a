use sqlx::FromRow;

/// Local copy of a user from the identity service, kept only so the worker can
/// address notifications.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct UserRecord {
    pub id: i32,
    pub email: String,
    pub username: String,
}
