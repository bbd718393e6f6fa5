// Activate Use Case (READY -> ACTIVE)

use super::validation::validate_ids;
use crate::domain::{DomainError, QueueDomainService, QueueStatus, QueueToken};
use crate::error::Result;
use crate::port::{QueueStore, TimeProvider};
use tracing::info;

/// Called when the booking page opens; idempotent for ACTIVE tokens
pub async fn execute(
    store: &dyn QueueStore,
    domain: &QueueDomainService,
    time_provider: &dyn TimeProvider,
    resource_id: &str,
    user_id: &str,
) -> Result<QueueToken> {
    validate_ids(resource_id, user_id)?;
    let now = time_provider.now_millis();

    let record = current(store, resource_id, user_id, now).await?;
    if record.status == QueueStatus::Active {
        return Ok(record);
    }

    let expires_at = domain.active_expiration(now);
    if let Some(activated) = store
        .mark_active(resource_id, user_id, expires_at, now)
        .await?
    {
        info!(resource_id, user_id, expires_at, "Token activated");
        return Ok(activated);
    }

    // Lost a race (concurrent activate, expiry or removal): report what is there now
    let record = current(store, resource_id, user_id, now).await?;
    if record.status == QueueStatus::Active {
        return Ok(record);
    }
    Err(DomainError::invalid(
        resource_id,
        user_id,
        format!("cannot activate from status {}", record.status),
    )
    .into())
}

/// Unexpired admitted record, or the matching domain error
async fn current(
    store: &dyn QueueStore,
    resource_id: &str,
    user_id: &str,
    now: i64,
) -> Result<QueueToken> {
    let record = store
        .get_active_record(resource_id, user_id, now)
        .await?
        .ok_or_else(|| DomainError::not_found(resource_id, user_id))?;

    if record.is_expired_at(now) {
        return Err(DomainError::expired(resource_id, user_id).into());
    }
    Ok(record)
}
