// Remove Use Case

use super::validation::validate_ids;
use crate::error::Result;
use crate::port::QueueStore;
use tracing::info;

/// Drop the user from both the active set and the wait line (idempotent)
///
/// Returns true if anything was removed.
pub async fn execute(store: &dyn QueueStore, resource_id: &str, user_id: &str) -> Result<bool> {
    validate_ids(resource_id, user_id)?;

    let removed_active = store.remove_active(resource_id, user_id).await?;
    let removed_wait = store.remove_wait(resource_id, user_id).await?;

    if removed_active || removed_wait {
        info!(resource_id, user_id, removed_active, removed_wait, "User removed from queue");
    }
    Ok(removed_active || removed_wait)
}
