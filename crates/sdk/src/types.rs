//! SDK Request/Response Types
//!
//! Mirrors the JSON-RPC types from api-rpc crate.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    Waiting,
    Ready,
    Active,
    Expired,
    NotFound,
}

impl QueueStatus {
    /// READY or ACTIVE
    pub fn is_admitted(self) -> bool {
        matches!(self, QueueStatus::Ready | QueueStatus::Active)
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct QueueKeyRequest {
    pub resource_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ValidateRequest {
    pub resource_id: String,
    pub user_id: String,
    pub token: String,
}

/// Response from queue.enter.v1
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnterResponse {
    pub resource_id: String,
    pub user_id: String,
    /// 1-based; 0 when already admitted
    pub position: u64,
    pub total_waiting: u64,
    pub estimated_wait_minutes: u64,
    pub status: QueueStatus,
    pub token: Option<String>,
    pub is_new_entry: bool,
}

/// Token state returned by activate/extend and embedded in status
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
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

/// Response from queue.status.v1, also the payload of streamed events
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub token: TokenResponse,
    pub recommended_poll_interval_ms: u64,
    pub min_poll_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub status: QueueStatus,
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoveResponse {
    pub removed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourcesResponse {
    pub resource_ids: Vec<String>,
}

/// Booking notification for booking.payment_completed.v1
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentCompleted {
    pub event_id: String,
    pub resource_id: String,
    pub user_id: String,
    pub booking_id: String,
    pub amount: i64,
    /// Epoch ms
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusError {
    pub message: String,
    pub retryable: bool,
}

/// Pushed on the queue.status subscription
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum StatusEvent {
    StatusUpdate(StatusResponse),
    /// Last event: the user was admitted
    Ready(StatusResponse),
    /// Last event: the server could not read the status
    Error(StatusError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_event_wire_format() {
        let raw = r#"{
            "event": "ready",
            "data": {
                "resource_id": "C1",
                "user_id": "U1",
                "token": "tok-1",
                "status": "READY",
                "position": null,
                "expires_at": 1700000300000,
                "extend_count": 0,
                "recommended_poll_interval_ms": 3000,
                "min_poll_interval_ms": 1000
            }
        }"#;

        match serde_json::from_str::<StatusEvent>(raw).unwrap() {
            StatusEvent::Ready(snapshot) => {
                assert!(snapshot.token.status.is_admitted());
                assert_eq!(snapshot.token.token.as_deref(), Some("tok-1"));
                assert_eq!(snapshot.recommended_poll_interval_ms, 3000);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_error_event_wire_format() {
        let raw = r#"{"event":"error","data":{"message":"Store unavailable: timeout","retryable":true}}"#;
        let event: StatusEvent = serde_json::from_str(raw).unwrap();
        assert!(matches!(event, StatusEvent::Error(StatusError { retryable: true, .. })));
    }

    #[test]
    fn test_not_found_status() {
        let status: QueueStatus = serde_json::from_str("\"NOT_FOUND\"").unwrap();
        assert_eq!(status, QueueStatus::NotFound);
        assert!(!status.is_admitted());
    }
}
