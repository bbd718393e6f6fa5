// Validate Use Case (booking flow gate)

use super::validation::validate_ids;
use crate::domain::{DomainError, QueueToken};
use crate::error::Result;
use crate::port::{QueueStore, TimeProvider};
use tracing::debug;

/// Check that `token` is the user's current, unexpired admission
pub async fn execute(
    store: &dyn QueueStore,
    time_provider: &dyn TimeProvider,
    resource_id: &str,
    user_id: &str,
    token: &str,
) -> Result<QueueToken> {
    validate_ids(resource_id, user_id)?;
    let now = time_provider.now_millis();

    let record = store
        .get_active_record(resource_id, user_id, now)
        .await?
        .ok_or_else(|| DomainError::not_found(resource_id, user_id))?;

    if record.is_expired_at(now) {
        return Err(DomainError::expired(resource_id, user_id).into());
    }

    if record.token.as_deref() != Some(token) {
        debug!(resource_id, user_id, "Token mismatch");
        return Err(DomainError::invalid(resource_id, user_id, "token mismatch").into());
    }

    Ok(record)
}
