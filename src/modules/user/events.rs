use serde::{Deserialize, Deserializer};

use super::model::UserRecord;

/// `user.created` event published by the identity service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCreatedMessage {
    #[serde(alias = "Id", deserialize_with = "int_or_string")]
    pub id: i32,
    #[serde(alias = "Email")]
    pub email: String,
    #[serde(alias = "Username")]
    pub username: String,
}

/// The identity service has sent ids both as JSON numbers and as strings.
fn int_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i32),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(id) => Ok(id),
        Raw::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl From<UserCreatedMessage> for UserRecord {
    fn from(msg: UserCreatedMessage) -> Self {
        Self {
            id: msg.id,
            email: msg.email,
            username: msg.username,
        }
    }
}
