// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// No record for the user; the client must enter the queue again
    #[error("Queue token not found: resource={resource_id}, user={user_id}")]
    TokenNotFound { resource_id: String, user_id: String },

    /// TTL passed (the record may still be physically present until the sweep)
    #[error("Queue token expired: resource={resource_id}, user={user_id}")]
    TokenExpired { resource_id: String, user_id: String },

    /// Token mismatch, or operation not valid for the current status
    #[error("Queue token invalid: resource={resource_id}, user={user_id} ({reason})")]
    TokenInvalid {
        resource_id: String,
        user_id: String,
        reason: String,
    },

    #[error("Extension limit exceeded: resource={resource_id}, user={user_id}, max={max}")]
    ExtensionLimitExceeded {
        resource_id: String,
        user_id: String,
        max: u32,
    },

    /// Reserved for capacity-reject entry paths
    #[error("Queue full: resource={0}")]
    QueueFull(String),

    #[error("Invalid queue configuration: {0}")]
    InvalidConfig(String),
}

impl DomainError {
    pub fn not_found(resource_id: &str, user_id: &str) -> Self {
        DomainError::TokenNotFound {
            resource_id: resource_id.to_string(),
            user_id: user_id.to_string(),
        }
    }

    pub fn expired(resource_id: &str, user_id: &str) -> Self {
        DomainError::TokenExpired {
            resource_id: resource_id.to_string(),
            user_id: user_id.to_string(),
        }
    }

    pub fn invalid(resource_id: &str, user_id: &str, reason: impl Into<String>) -> Self {
        DomainError::TokenInvalid {
            resource_id: resource_id.to_string(),
            user_id: user_id.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
