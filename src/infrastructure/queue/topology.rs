use lapin::options::{
    ExchangeDeclareOptions, ExchangeDeleteOptions, QueueBindOptions, QueueDeclareOptions,
    QueueDeleteOptions,
};
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::{Channel, ExchangeKind};
use tracing::{info, warn};

use super::rabbitmq::RabbitMqService;
use crate::common::error::QueueError;

pub const VIDEO_EXCHANGE: &str = "video_exchange";
pub const VIDEO_PROCESS_QUEUE: &str = "video.process";
pub const DEAD_LETTER_EXCHANGE: &str = "dlx.video.process";
pub const DEAD_LETTER_QUEUE: &str = "dead_letter.video.process";
pub const NOTIFICATION_EXCHANGE: &str = "notification_exchange";
pub const NOTIFICATION_QUEUE: &str = "notification.events";
pub const USER_EXCHANGE: &str = "user_exchange";
pub const USER_EVENTS_QUEUE: &str = "user.events";
pub const USER_CREATED_ROUTING_KEY: &str = "user.created";

pub const DEFAULT_MESSAGE_TTL_MS: u32 = 30_000;

/// `(exchange, queue, routing key)` bindings declared at startup. The primary
/// job queue is listed separately because it carries dead-letter arguments.
const PLAIN_BINDINGS: [(&str, &str, &str); 3] = [
    (DEAD_LETTER_EXCHANGE, DEAD_LETTER_QUEUE, DEAD_LETTER_QUEUE),
    (NOTIFICATION_EXCHANGE, NOTIFICATION_QUEUE, NOTIFICATION_QUEUE),
    (USER_EXCHANGE, USER_EVENTS_QUEUE, USER_CREATED_ROUTING_KEY),
];

/// Arguments for the primary job queue: rejected or expired jobs move to the
/// dead-letter exchange under the dead-letter queue's name.
pub fn primary_queue_arguments(message_ttl_ms: u32) -> FieldTable {
    let mut args = FieldTable::default();
    args.insert(
        ShortString::from("x-dead-letter-exchange"),
        AMQPValue::LongString(LongString::from(DEAD_LETTER_EXCHANGE)),
    );
    args.insert(
        ShortString::from("x-dead-letter-routing-key"),
        AMQPValue::LongString(LongString::from(DEAD_LETTER_QUEUE)),
    );
    args.insert(
        ShortString::from("x-message-ttl"),
        AMQPValue::LongInt(i32::try_from(message_ttl_ms).unwrap_or(i32::MAX)),
    );
    args
}

/// Declares every exchange, queue and binding the pipeline relies on.
///
/// A declaration the broker refuses (usually `PRECONDITION_FAILED` because an
/// existing entity has different arguments) closes its channel; the entity is
/// then deleted on a fresh channel and declared again.
pub struct TopologyManager<'a> {
    rabbit: &'a RabbitMqService,
    message_ttl_ms: u32,
}

impl<'a> TopologyManager<'a> {
    pub fn new(rabbit: &'a RabbitMqService, message_ttl_ms: u32) -> Self {
        Self {
            rabbit,
            message_ttl_ms,
        }
    }

    pub async fn declare(&self) -> Result<(), QueueError> {
        for exchange in [
            VIDEO_EXCHANGE,
            DEAD_LETTER_EXCHANGE,
            NOTIFICATION_EXCHANGE,
            USER_EXCHANGE,
        ] {
            self.declare_exchange(exchange).await?;
        }

        self.declare_queue(
            VIDEO_PROCESS_QUEUE,
            primary_queue_arguments(self.message_ttl_ms),
        )
        .await?;
        self.bind(VIDEO_EXCHANGE, VIDEO_PROCESS_QUEUE, VIDEO_PROCESS_QUEUE)
            .await?;

        for (exchange, queue, routing_key) in PLAIN_BINDINGS {
            self.declare_queue(queue, FieldTable::default()).await?;
            self.bind(exchange, queue, routing_key).await?;
        }

        info!(
            message_ttl_ms = self.message_ttl_ms,
            "RabbitMQ topology declared"
        );
        Ok(())
    }

    async fn declare_exchange(&self, name: &str) -> Result<(), QueueError> {
        let options = ExchangeDeclareOptions {
            durable: true,
            ..ExchangeDeclareOptions::default()
        };

        let channel = self.rabbit.create_channel().await?;
        let Err(e) = channel
            .exchange_declare(name, ExchangeKind::Direct, options, FieldTable::default())
            .await
        else {
            return Ok(());
        };

        warn!(exchange = name, error = %e, "Exchange declaration rejected, recreating");
        let channel = self.rabbit.create_channel().await?;
        channel
            .exchange_delete(name, ExchangeDeleteOptions::default())
            .await
            .map_err(|e| topology_error(name, e))?;
        channel
            .exchange_declare(name, ExchangeKind::Direct, options, FieldTable::default())
            .await
            .map_err(|e| topology_error(name, e))
    }

    async fn declare_queue(&self, name: &str, arguments: FieldTable) -> Result<(), QueueError> {
        let options = QueueDeclareOptions {
            durable: true,
            ..QueueDeclareOptions::default()
        };

        let channel = self.rabbit.create_channel().await?;
        let Err(e) = channel
            .queue_declare(name, options, arguments.clone())
            .await
        else {
            return Ok(());
        };

        warn!(queue = name, error = %e, "Queue declaration rejected, recreating");
        let channel = self.rabbit.create_channel().await?;
        channel
            .queue_delete(name, QueueDeleteOptions::default())
            .await
            .map_err(|e| topology_error(name, e))?;
        channel
            .queue_declare(name, options, arguments)
            .await
            .map(|_| ())
            .map_err(|e| topology_error(name, e))
    }

    async fn bind(&self, exchange: &str, queue: &str, routing_key: &str) -> Result<(), QueueError> {
        let channel: Channel = self.rabbit.create_channel().await?;
        channel
            .queue_bind(
                queue,
                exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| topology_error(&format!("{exchange} -> {queue}"), e))
    }
}

fn topology_error(name: &str, e: lapin::Error) -> QueueError {
    QueueError::Topology {
        name: name.to_string(),
        reason: e.to_string(),
    }
}
