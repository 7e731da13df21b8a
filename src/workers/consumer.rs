use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions,
};
use lapin::types::FieldTable;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::common::error::QueueError;
use crate::infrastructure::queue::RabbitMqService;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// What the broker should do with a delivery once its handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    Ack,
    /// Reject without requeue; the broker dead-letters the message.
    RejectPermanent,
    RejectRequeue,
}

/// Broker-side settlement of a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Ack,
    Nack { requeue: bool },
}

impl From<HandleOutcome> for Settlement {
    fn from(outcome: HandleOutcome) -> Self {
        match outcome {
            HandleOutcome::Ack => Settlement::Ack,
            HandleOutcome::RejectPermanent => Settlement::Nack { requeue: false },
            HandleOutcome::RejectRequeue => Settlement::Nack { requeue: true },
        }
    }
}

#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub payload: Vec<u8>,
    pub redelivered: bool,
    pub delivery_tag: u64,
}

impl From<&Delivery> for IncomingMessage {
    fn from(delivery: &Delivery) -> Self {
        Self {
            payload: delivery.data.clone(),
            redelivered: delivery.redelivered,
            delivery_tag: delivery.delivery_tag,
        }
    }
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &IncomingMessage) -> HandleOutcome;
}

#[derive(Debug, Clone)]
pub struct ConsumerSpec {
    pub queue: &'static str,
    pub tag: &'static str,
    pub workers: usize,
    pub prefetch: u16,
}

/// Starts `spec.workers` consumers on `spec.queue`, each on its own channel.
/// Handles return once `shutdown` fires and the current delivery is settled.
pub fn run_consumer_pool(
    rabbit: RabbitMqService,
    spec: ConsumerSpec,
    handler: Arc<dyn MessageHandler>,
    shutdown: CancellationToken,
) -> Vec<JoinHandle<()>> {
    info!(
        queue = spec.queue,
        workers = spec.workers,
        prefetch = spec.prefetch,
        "Starting consumer pool"
    );

    (0..spec.workers.max(1))
        .map(|index| {
            let rabbit = rabbit.clone();
            let handler = handler.clone();
            let shutdown = shutdown.clone();
            let spec = spec.clone();
            tokio::spawn(async move {
                let tag = format!("{}-{}", spec.tag, index);
                run_worker(rabbit, &spec, &tag, &handler, &shutdown).await;
            })
        })
        .collect()
}

async fn run_worker(
    rabbit: RabbitMqService,
    spec: &ConsumerSpec,
    tag: &str,
    handler: &Arc<dyn MessageHandler>,
    shutdown: &CancellationToken,
) {
    loop {
        match consume(&rabbit, spec, tag, handler, shutdown).await {
            Ok(()) => break,
            Err(e) => {
                warn!(queue = spec.queue, consumer = tag, error = %e, "Consumer interrupted");
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }

        if let Err(e) = rabbit.ensure_connected().await {
            error!(queue = spec.queue, consumer = tag, error = %e, "Reconnect failed");
        }
    }

    info!(queue = spec.queue, consumer = tag, "Consumer stopped");
}

/// Consumes until shutdown (`Ok`) or until the channel breaks (`Err`).
async fn consume(
    rabbit: &RabbitMqService,
    spec: &ConsumerSpec,
    tag: &str,
    handler: &Arc<dyn MessageHandler>,
    shutdown: &CancellationToken,
) -> Result<(), QueueError> {
    let channel = rabbit.create_channel().await?;

    channel
        .basic_qos(spec.prefetch, BasicQosOptions::default())
        .await
        .map_err(|e| QueueError::Connection(format!("failed to set prefetch: {}", e)))?;

    let mut consumer = channel
        .basic_consume(
            spec.queue,
            tag,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| QueueError::Connection(format!("failed to consume {}: {}", spec.queue, e)))?;

    info!(queue = spec.queue, consumer = tag, "Consumer listening");

    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => {
                if let Err(e) = channel.basic_cancel(tag, BasicCancelOptions::default()).await {
                    warn!(consumer = tag, error = %e, "Failed to cancel consumer");
                }
                return Ok(());
            }
            next = consumer.next() => next,
        };

        let delivery = match next {
            Some(Ok(delivery)) => delivery,
            Some(Err(e)) => return Err(QueueError::Connection(e.to_string())),
            None => return Err(QueueError::Connection("consumer stream closed".to_string())),
        };

        let message = IncomingMessage::from(&delivery);
        let delivery_tag = message.delivery_tag;
        let outcome = dispatch(handler.clone(), message).await;
        debug!(
            queue = spec.queue,
            delivery_tag,
            ?outcome,
            "Settling delivery"
        );

        if let Err(e) = settle(&delivery, outcome).await {
            error!(
                queue = spec.queue,
                delivery_tag,
                error = %e,
                "Failed to settle delivery"
            );
        }
    }
}

/// Runs the handler in its own task so a panic costs one delivery, not the
/// worker. A panicked delivery is rejected without requeue.
pub async fn dispatch(handler: Arc<dyn MessageHandler>, message: IncomingMessage) -> HandleOutcome {
    let delivery_tag = message.delivery_tag;
    match tokio::spawn(async move { handler.handle(&message).await }).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(delivery_tag, error = %e, "Message handler panicked");
            HandleOutcome::RejectPermanent
        }
    }
}

async fn settle(delivery: &Delivery, outcome: HandleOutcome) -> Result<(), lapin::Error> {
    match Settlement::from(outcome) {
        Settlement::Ack => delivery.ack(BasicAckOptions::default()).await.map(drop),
        Settlement::Nack { requeue } => delivery
            .nack(BasicNackOptions {
                requeue,
                ..BasicNackOptions::default()
            })
            .await
            .map(drop),
    }
}
