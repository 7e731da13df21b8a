use async_trait::async_trait;
use lapin::publisher_confirm::Confirmation;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, options::*};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::publisher::MessagePublisher;
use crate::common::error::QueueError;

/// One broker connection plus a confirm-mode channel reserved for publishing.
/// Consumers never share the publish channel; they open their own through
/// [`RabbitMqService::create_channel`].
#[derive(Clone)]
pub struct RabbitMqService {
    url: String,
    conn: Arc<Mutex<Connection>>,
    channel: Arc<Mutex<Channel>>,
}

impl RabbitMqService {
    async fn connect(url: &str) -> Result<(Connection, Channel), QueueError> {
        info!("Connecting to RabbitMQ");
        let conn = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| QueueError::Connection(format!("failed to connect: {}", e)))?;

        let channel = conn
            .create_channel()
            .await
            .map_err(|e| QueueError::Connection(format!("failed to create channel: {}", e)))?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| QueueError::Connection(format!("failed to enable confirms: {}", e)))?;

        info!("Connected to RabbitMQ");
        Ok((conn, channel))
    }

    pub async fn new(url: &str) -> Result<Self, QueueError> {
        let (conn, channel) = Self::connect(url).await?;

        Ok(Self {
            url: url.to_string(),
            conn: Arc::new(Mutex::new(conn)),
            channel: Arc::new(Mutex::new(channel)),
        })
    }

    pub async fn reconnect(&self) -> Result<(), QueueError> {
        warn!("RabbitMQ connection dropped, reconnecting...");
        let (conn, channel) = Self::connect(&self.url).await?;
        *self.conn.lock().await = conn;
        *self.channel.lock().await = channel;
        Ok(())
    }

    /// Reconnects only when the current connection is no longer usable, so
    /// several consumers recovering at once share one new connection.
    pub async fn ensure_connected(&self) -> Result<(), QueueError> {
        if self.is_connected().await {
            return Ok(());
        }
        self.reconnect().await
    }

    pub async fn is_connected(&self) -> bool {
        self.conn.lock().await.status().connected()
    }

    pub async fn create_channel(&self) -> Result<Channel, QueueError> {
        self.conn
            .lock()
            .await
            .create_channel()
            .await
            .map_err(|e| QueueError::Connection(format!("failed to create channel: {}", e)))
    }

    async fn publish_internal(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<Confirmation, lapin::Error> {
        let channel = self.channel.lock().await;

        let confirmation = channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_delivery_mode(2), // Persistent
            )
            .await?
            .await?;

        Ok(confirmation)
    }
}

#[async_trait]
impl MessagePublisher for RabbitMqService {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), QueueError> {
        let publish_error = |e: lapin::Error| QueueError::Publish {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            reason: e.to_string(),
        };

        let confirmation = match self.publish_internal(exchange, routing_key, payload).await {
            Ok(confirmation) => confirmation,
            Err(e) => {
                warn!(
                    exchange,
                    routing_key,
                    error = %e,
                    "RabbitMQ publish failed, retrying after reconnect"
                );
                self.reconnect().await?;
                self.publish_internal(exchange, routing_key, payload)
                    .await
                    .map_err(publish_error)?
            }
        };

        if confirmation.is_nack() {
            return Err(QueueError::Publish {
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                reason: "broker negatively acknowledged the message".to_string(),
            });
        }

        Ok(())
    }
}
