// RPC Request/Response Types

use serde::{Deserialize, Serialize};
use waitline_core::application::StatusSnapshot;
use waitline_core::domain::{QueuePosition, QueueStatus, QueueToken};

/// Identifies one user's place in one resource's queue.
/// Used by queue.enter.v1, queue.status.v1, queue.activate.v1, queue.extend.v1,
/// queue.remove.v1 and queue.subscribe.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueKeyRequest {
    pub resource_id: String,
    pub user_id: String,
}

/// queue.enter.v1 - Response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnterResponse {
    pub resource_id: String,
    pub user_id: String,
    pub position: u64,
    pub total_waiting: u64,
    pub estimated_wait_minutes: u64,
    pub status: QueueStatus,
    pub token: Option<String>,
    pub is_new_entry: bool,
}

impl From<QueuePosition> for EnterResponse {
    fn from(p: QueuePosition) -> Self {
        Self {
            resource_id: p.resource_id,
            user_id: p.user_id,
            position: p.position,
            total_waiting: p.total_waiting,
            estimated_wait_minutes: p.estimated_wait_minutes,
            status: p.status,
            token: p.token,
            is_new_entry: p.is_new_entry,
        }
    }
}

/// queue.activate.v1 / queue.extend.v1 - Response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub resource_id: String,
    pub user_id: String,
    pub token: Option<String>,
    pub status: QueueStatus,
    pub position: Option<u64>,
    /// Epoch ms
    pub expires_at: Option<i64>,
    pub extend_count: Option<u32>,
}

impl From<QueueToken> for TokenResponse {
    fn from(t: QueueToken) -> Self {
        Self {
            resource_id: t.resource_id,
            user_id: t.user_id,
            token: t.token,
            status: t.status,
            position: t.position,
            expires_at: t.expires_at,
            extend_count: t.extend_count,
        }
    }
}

/// queue.status.v1 - Response (token state plus polling hints)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub token: TokenResponse,
    pub recommended_poll_interval_ms: u64,
    pub min_poll_interval_ms: u64,
}

impl From<StatusSnapshot> for StatusResponse {
    fn from(s: StatusSnapshot) -> Self {
        Self {
            token: s.token.into(),
            recommended_poll_interval_ms: s.recommended_poll_interval_ms,
            min_poll_interval_ms: s.min_poll_interval_ms,
        }
    }
}

/// queue.validate.v1 - Request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateRequest {
    pub resource_id: String,
    pub user_id: String,
    pub token: String,
}

/// queue.validate.v1 - Response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub status: QueueStatus,
    pub expires_at: Option<i64>,
}

/// queue.remove.v1 / booking.payment_completed.v1 - Response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveResponse {
    pub removed: bool,
}

/// admin.resources.v1 - Response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcesResponse {
    pub resource_ids: Vec<String>,
}
