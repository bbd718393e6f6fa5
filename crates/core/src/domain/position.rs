// Queue Position Value Object

use super::token::{QueueStatus, QueueToken};
use serde::{Deserialize, Serialize};

/// Wait-line snapshot returned by Enter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePosition {
    pub resource_id: String,
    pub user_id: String,
    /// 1-based; 0 for an already admitted user
    pub position: u64,
    pub total_waiting: u64,
    pub estimated_wait_minutes: u64,
    pub status: QueueStatus,
    /// Only set when the user is already admitted
    pub token: Option<String>,
    /// True only for the call that inserted the user
    pub is_new_entry: bool,
}

impl QueuePosition {
    pub fn new_entry(
        resource_id: impl Into<String>,
        user_id: impl Into<String>,
        position: u64,
        total_waiting: u64,
        estimated_wait_minutes: u64,
    ) -> Self {
        Self::waiting(resource_id, user_id, position, total_waiting, estimated_wait_minutes, true)
    }

    pub fn already_waiting(
        resource_id: impl Into<String>,
        user_id: impl Into<String>,
        position: u64,
        total_waiting: u64,
        estimated_wait_minutes: u64,
    ) -> Self {
        Self::waiting(resource_id, user_id, position, total_waiting, estimated_wait_minutes, false)
    }

    pub fn already_admitted(token: &QueueToken) -> Self {
        Self {
            resource_id: token.resource_id.clone(),
            user_id: token.user_id.clone(),
            position: 0,
            total_waiting: 0,
            estimated_wait_minutes: 0,
            status: token.status,
            token: token.token.clone(),
            is_new_entry: false,
        }
    }

    fn waiting(
        resource_id: impl Into<String>,
        user_id: impl Into<String>,
        position: u64,
        total_waiting: u64,
        estimated_wait_minutes: u64,
        is_new_entry: bool,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            user_id: user_id.into(),
            position,
            total_waiting,
            estimated_wait_minutes,
            status: QueueStatus::Waiting,
            token: None,
            is_new_entry,
        }
    }
}
