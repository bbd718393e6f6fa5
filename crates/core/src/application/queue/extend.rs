// Extend Use Case (ACTIVE, bounded extensions)

use super::validation::validate_ids;
use crate::domain::{DomainError, QueueDomainService, QueueToken};
use crate::error::Result;
use crate::port::{QueueStore, TimeProvider};
use tracing::info;

/// Refresh the ACTIVE TTL and consume one extension
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
    domain.validate_extension(&record)?;

    let expires_at = domain.active_expiration(now);
    let max = domain.config().max_extension_count;
    if let Some(extended) = store
        .try_extend(resource_id, user_id, expires_at, max, now)
        .await?
    {
        info!(
            resource_id,
            user_id,
            extend_count = extended.extend_count.unwrap_or(0),
            expires_at,
            "Token extended"
        );
        return Ok(extended);
    }

    // A concurrent extend consumed the last slot (or the record changed)
    let record = current(store, resource_id, user_id, now).await?;
    domain.validate_extension(&record)?;
    Err(DomainError::invalid(resource_id, user_id, "extension lost a concurrent update").into())
}

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
