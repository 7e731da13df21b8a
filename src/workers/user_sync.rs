use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::consumer::{HandleOutcome, IncomingMessage, MessageHandler};
use crate::modules::user::events::UserCreatedMessage;
use crate::modules::user::model::UserRecord;
use crate::modules::user::repository::UserStore;

/// Mirrors `user.created` events into the local user table.
pub struct UserSyncHandler {
    users: Arc<dyn UserStore>,
}

impl UserSyncHandler {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl MessageHandler for UserSyncHandler {
    async fn handle(&self, message: &IncomingMessage) -> HandleOutcome {
        let event = match serde_json::from_slice::<UserCreatedMessage>(&message.payload) {
            Ok(event) => event,
            Err(e) => {
                error!(delivery_tag = message.delivery_tag, error = %e, "Malformed user event");
                return HandleOutcome::RejectPermanent;
            }
        };

        let user = UserRecord::from(event);
        match self.users.upsert(&user).await {
            Ok(()) => {
                info!(user_id = user.id, "User synchronized");
                HandleOutcome::Ack
            }
            // One requeue; a second failure drops the event.
            Err(e) if !message.redelivered => {
                warn!(user_id = user.id, error = %e, "User sync failed, requeueing");
                HandleOutcome::RejectRequeue
            }
            Err(e) => {
                error!(user_id = user.id, error = %e, "User sync failed again, rejecting");
                HandleOutcome::RejectPermanent
            }
        }
    }
}
