//! RPC Error Types
//!
//! Maps application errors to stable JSON-RPC error codes.

use jsonrpsee::types::ErrorObjectOwned;
use serde_json::json;
use waitline_core::domain::DomainError;
use waitline_core::error::AppError;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const TOKEN_NOT_FOUND: i32 = 4001;
    pub const TOKEN_EXPIRED: i32 = 4002;
    pub const THROTTLED: i32 = 4003;
    pub const TOKEN_INVALID: i32 = 4004;
    pub const EXTENSION_LIMIT_EXCEEDED: i32 = 4005;
    pub const QUEUE_FULL: i32 = 4006;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const STORE_UNAVAILABLE: i32 = 5001;
    pub const DATA_CORRUPTION: i32 = 5002;
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    match err {
        AppError::Domain(e) => domain_error(e),
        AppError::Validation(msg) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, msg, None::<()>)
        }
        AppError::Serialization(e) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, e.to_string(), None::<()>)
        }
        AppError::StoreUnavailable(msg) => ErrorObjectOwned::owned(
            code::STORE_UNAVAILABLE,
            format!("Store unavailable: {}", msg),
            Some(json!({ "retryable": true })),
        ),
        AppError::DataCorruption(msg) => {
            ErrorObjectOwned::owned(code::DATA_CORRUPTION, msg, None::<()>)
        }
        AppError::Config(msg) | AppError::Internal(msg) => {
            ErrorObjectOwned::owned(code::INTERNAL_ERROR, msg, None::<()>)
        }
    }
}

fn domain_error(err: DomainError) -> ErrorObjectOwned {
    let code = match &err {
        DomainError::TokenNotFound { .. } => code::TOKEN_NOT_FOUND,
        DomainError::TokenExpired { .. } => code::TOKEN_EXPIRED,
        DomainError::TokenInvalid { .. } => code::TOKEN_INVALID,
        DomainError::ExtensionLimitExceeded { .. } => code::EXTENSION_LIMIT_EXCEEDED,
        DomainError::QueueFull(_) => code::QUEUE_FULL,
        DomainError::InvalidConfig(_) => code::INTERNAL_ERROR,
    };
    ErrorObjectOwned::owned(code, err.to_string(), None::<()>)
}

/// Rejection for a request over its rate limit
pub fn throttled(retry_after_seconds: u64) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(
        code::THROTTLED,
        "Rate limit exceeded. Please slow down.",
        Some(json!({ "retry_after_seconds": retry_after_seconds })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_get_distinct_codes() {
        let cases = [
            (DomainError::not_found("C1", "U1"), code::TOKEN_NOT_FOUND),
            (DomainError::expired("C1", "U1"), code::TOKEN_EXPIRED),
            (DomainError::invalid("C1", "U1", "mismatch"), code::TOKEN_INVALID),
            (
                DomainError::ExtensionLimitExceeded {
                    resource_id: "C1".to_string(),
                    user_id: "U1".to_string(),
                    max: 2,
                },
                code::EXTENSION_LIMIT_EXCEEDED,
            ),
            (DomainError::QueueFull("C1".to_string()), code::QUEUE_FULL),
        ];
        for (err, expected) in cases {
            assert_eq!(to_rpc_error(AppError::Domain(err)).code(), expected);
        }
    }

    #[test]
    fn test_store_unavailable_is_marked_retryable() {
        let err = to_rpc_error(AppError::StoreUnavailable("timeout".to_string()));
        assert_eq!(err.code(), code::STORE_UNAVAILABLE);
        let data = err.data().map(|d| d.get().to_string()).unwrap_or_default();
        assert!(data.contains("retryable"));
    }

    #[test]
    fn test_throttled_carries_retry_after() {
        let err = throttled(60);
        assert_eq!(err.code(), code::THROTTLED);
        let data = err.data().map(|d| d.get().to_string()).unwrap_or_default();
        assert!(data.contains("\"retry_after_seconds\":60"));
    }
}
