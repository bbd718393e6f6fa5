// Enter Use Case

use super::validation::validate_ids;
use crate::domain::{QueueDomainService, QueuePosition};
use crate::error::{AppError, Result};
use crate::port::{EnqueueOutcome, QueueStore, TimeProvider};
use tracing::{debug, info};

/// Join the wait line (idempotent)
///
/// Already admitted users get their admission back, already waiting users
/// keep their original place.
pub async fn execute(
    store: &dyn QueueStore,
    domain: &QueueDomainService,
    time_provider: &dyn TimeProvider,
    resource_id: &str,
    user_id: &str,
) -> Result<QueuePosition> {
    validate_ids(resource_id, user_id)?;
    let now = time_provider.now_millis();

    if let Some(record) = store.get_active_record(resource_id, user_id, now).await? {
        if !record.is_expired_at(now) {
            debug!(resource_id, user_id, status = %record.status, "Enter: already admitted");
            return Ok(QueuePosition::already_admitted(&record));
        }
    }

    if let Some(rank) = store.wait_position(resource_id, user_id).await? {
        let position = rank + 1;
        let total_waiting = store.wait_size(resource_id).await?;
        debug!(resource_id, user_id, position, "Enter: already waiting");
        return Ok(QueuePosition::already_waiting(
            resource_id,
            user_id,
            position,
            total_waiting,
            domain.estimated_wait_minutes(position),
        ));
    }

    match store.enqueue_wait(resource_id, user_id, now).await? {
        EnqueueOutcome::Inserted(rank) => {
            let position = rank + 1;
            let total_waiting = store.wait_size(resource_id).await?;
            info!(resource_id, user_id, position, total_waiting, "User entered wait line");
            Ok(QueuePosition::new_entry(
                resource_id,
                user_id,
                position,
                total_waiting,
                domain.estimated_wait_minutes(position),
            ))
        }
        EnqueueOutcome::AlreadyWaiting(rank) => {
            let position = rank + 1;
            let total_waiting = store.wait_size(resource_id).await?;
            Ok(QueuePosition::already_waiting(
                resource_id,
                user_id,
                position,
                total_waiting,
                domain.estimated_wait_minutes(position),
            ))
        }
        EnqueueOutcome::Admitted => {
            // Promoted between the checks above and the insert
            let record = store
                .get_active_record(resource_id, user_id, now)
                .await?
                .ok_or_else(|| {
                    AppError::Internal(format!(
                        "enqueue suppressed without an admitted record: resource={}, user={}",
                        resource_id, user_id
                    ))
                })?;
            Ok(QueuePosition::already_admitted(&record))
        }
    }
}
