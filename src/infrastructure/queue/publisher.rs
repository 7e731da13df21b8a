use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::topology::{
    NOTIFICATION_EXCHANGE, NOTIFICATION_QUEUE, VIDEO_EXCHANGE, VIDEO_PROCESS_QUEUE,
};
use crate::common::error::QueueError;
use crate::modules::video::events::{JobMessage, NotificationMessage};

/// Durable publish of an already-encoded payload.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, exchange: &str, routing_key: &str, payload: &[u8])
    -> Result<(), QueueError>;
}

#[derive(Clone)]
pub struct JobPublisher {
    broker: Arc<dyn MessagePublisher>,
}

impl JobPublisher {
    pub fn new(broker: Arc<dyn MessagePublisher>) -> Self {
        Self { broker }
    }

    pub async fn publish(&self, job: &JobMessage) -> Result<(), QueueError> {
        let payload = serde_json::to_vec(job)?;
        self.broker
            .publish(VIDEO_EXCHANGE, VIDEO_PROCESS_QUEUE, &payload)
            .await?;
        debug!(job_id = job.job_id, "Job enqueued");
        Ok(())
    }
}

#[derive(Clone)]
pub struct NotificationPublisher {
    broker: Arc<dyn MessagePublisher>,
}

impl NotificationPublisher {
    pub fn new(broker: Arc<dyn MessagePublisher>) -> Self {
        Self { broker }
    }

    pub async fn publish(&self, notification: &NotificationMessage) -> Result<(), QueueError> {
        let payload = serde_json::to_vec(notification)?;
        self.broker
            .publish(NOTIFICATION_EXCHANGE, NOTIFICATION_QUEUE, &payload)
            .await
    }
}
