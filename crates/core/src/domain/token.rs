// Queue Token Domain Model

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Queue status of one (resource, user) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    /// In the wait line
    Waiting,
    /// Admitted, booking page not opened yet
    Ready,
    /// Admitted and using the booking page
    Active,
    /// TTL passed
    Expired,
    NotFound,
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueStatus::Waiting => write!(f, "WAITING"),
            QueueStatus::Ready => write!(f, "READY"),
            QueueStatus::Active => write!(f, "ACTIVE"),
            QueueStatus::Expired => write!(f, "EXPIRED"),
            QueueStatus::NotFound => write!(f, "NOT_FOUND"),
        }
    }
}

impl FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "WAITING" => Ok(QueueStatus::Waiting),
            "READY" => Ok(QueueStatus::Ready),
            "ACTIVE" => Ok(QueueStatus::Active),
            "EXPIRED" => Ok(QueueStatus::Expired),
            "NOT_FOUND" => Ok(QueueStatus::NotFound),
            other => Err(format!("unknown queue status: {}", other)),
        }
    }
}

/// A user's place in line or admitted session
///
/// `token` is set only for READY/ACTIVE, `position` only for WAITING.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueToken {
    pub resource_id: String,
    pub user_id: String,
    pub token: Option<String>,
    pub status: QueueStatus,
    /// 1-based rank in the wait line
    pub position: Option<u64>,
    /// Epoch ms
    pub expires_at: Option<i64>,
    pub extend_count: Option<u32>,
}

impl QueueToken {
    pub fn waiting(resource_id: impl Into<String>, user_id: impl Into<String>, position: u64) -> Self {
        Self {
            resource_id: resource_id.into(),
            user_id: user_id.into(),
            token: None,
            status: QueueStatus::Waiting,
            position: Some(position),
            expires_at: None,
            extend_count: None,
        }
    }

    pub fn ready(
        resource_id: impl Into<String>,
        user_id: impl Into<String>,
        token: impl Into<String>,
        expires_at: i64,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            user_id: user_id.into(),
            token: Some(token.into()),
            status: QueueStatus::Ready,
            position: None,
            expires_at: Some(expires_at),
            extend_count: Some(0),
        }
    }

    pub fn active(
        resource_id: impl Into<String>,
        user_id: impl Into<String>,
        token: impl Into<String>,
        expires_at: i64,
        extend_count: u32,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            user_id: user_id.into(),
            token: Some(token.into()),
            status: QueueStatus::Active,
            position: None,
            expires_at: Some(expires_at),
            extend_count: Some(extend_count),
        }
    }

    pub fn expired(resource_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::empty(resource_id, user_id, QueueStatus::Expired)
    }

    pub fn not_found(resource_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::empty(resource_id, user_id, QueueStatus::NotFound)
    }

    fn empty(resource_id: impl Into<String>, user_id: impl Into<String>, status: QueueStatus) -> Self {
        Self {
            resource_id: resource_id.into(),
            user_id: user_id.into(),
            token: None,
            status,
            position: None,
            expires_at: None,
            extend_count: None,
        }
    }

    /// READY or ACTIVE
    pub fn is_admitted(&self) -> bool {
        matches!(self.status, QueueStatus::Ready | QueueStatus::Active)
    }

    /// True once `expires_at` has been reached
    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now_millis,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrips_through_display() {
        for status in [
            QueueStatus::Waiting,
            QueueStatus::Ready,
            QueueStatus::Active,
            QueueStatus::Expired,
            QueueStatus::NotFound,
        ] {
            assert_eq!(status.to_string().parse::<QueueStatus>().unwrap(), status);
        }
        assert!("PENDING".parse::<QueueStatus>().is_err());
    }

    #[test]
    fn test_token_present_only_when_admitted() {
        let waiting = QueueToken::waiting("C1", "U1", 3);
        assert!(waiting.token.is_none());
        assert_eq!(waiting.position, Some(3));
        assert!(!waiting.is_admitted());

        let ready = QueueToken::ready("C1", "U1", "tok", 1_000);
        assert!(ready.token.is_some());
        assert!(ready.position.is_none());
        assert_eq!(ready.extend_count, Some(0));
        assert!(ready.is_admitted());

        let gone = QueueToken::not_found("C1", "U1");
        assert!(gone.token.is_none() && gone.position.is_none());
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let token = QueueToken::active("C1", "U1", "tok", 5_000, 1);
        assert!(!token.is_expired_at(4_999));
        assert!(token.is_expired_at(5_000));
        assert!(!QueueToken::waiting("C1", "U1", 1).is_expired_at(i64::MAX));
    }

    #[test]
    fn test_serializes_status_in_screaming_case() {
        let json = serde_json::to_value(QueueToken::not_found("C1", "U1")).unwrap();
        assert_eq!(json["status"], "NOT_FOUND");
    }
}
