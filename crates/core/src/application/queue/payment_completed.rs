// Payment Completed Handler (booking collaborator notification)

use super::remove;
use crate::error::Result;
use crate::port::QueueStore;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Published by the booking system once a purchase settles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentCompletedEvent {
    pub event_id: String,
    pub resource_id: String,
    pub user_id: String,
    pub booking_id: String,
    pub amount: i64,
    /// Epoch ms
    pub timestamp: i64,
}

/// Free the user's slot early; redelivered events are harmless
pub async fn execute(store: &dyn QueueStore, event: &PaymentCompletedEvent) -> Result<bool> {
    info!(
        event_id = %event.event_id,
        booking_id = %event.booking_id,
        resource_id = %event.resource_id,
        user_id = %event.user_id,
        "Payment completed, releasing queue slot"
    );
    remove::execute(store, &event.resource_id, &event.user_id).await
}
