// Status Use Case

use super::validation::validate_ids;
use crate::domain::QueueToken;
use crate::error::Result;
use crate::port::{QueueStore, TimeProvider};

/// Current status: admitted record, then wait rank, then NOT_FOUND
///
/// A record past `expires_at` reports EXPIRED even before the sweep removes it,
/// unless the user has since re-entered the wait line.
pub async fn execute(
    store: &dyn QueueStore,
    time_provider: &dyn TimeProvider,
    resource_id: &str,
    user_id: &str,
) -> Result<QueueToken> {
    validate_ids(resource_id, user_id)?;
    let now = time_provider.now_millis();

    let expired = match store.get_active_record(resource_id, user_id, now).await? {
        Some(record) if !record.is_expired_at(now) => return Ok(record),
        Some(_) => true,
        None => false,
    };

    if let Some(rank) = store.wait_position(resource_id, user_id).await? {
        return Ok(QueueToken::waiting(resource_id, user_id, rank + 1));
    }

    if expired {
        return Ok(QueueToken::expired(resource_id, user_id));
    }
    Ok(QueueToken::not_found(resource_id, user_id))
}
