//! SDK Error Types

use thiserror::Error;

/// SDK Result type
pub type Result<T> = std::result::Result<T, SdkError>;

const THROTTLED: i32 = 4003;
const STORE_UNAVAILABLE: i32 = 5001;

/// SDK Error
#[derive(Debug, Error)]
pub enum SdkError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("RPC error ({code}): {message}")]
    Rpc { code: i32, message: String },

    /// Rate limited; retry after the given delay
    #[error("Throttled, retry after {retry_after_seconds}s")]
    Throttled { retry_after_seconds: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl SdkError {
    /// Server error code, if the server answered
    pub fn code(&self) -> Option<i32> {
        match self {
            SdkError::Rpc { code, .. } => Some(*code),
            SdkError::Throttled { .. } => Some(THROTTLED),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SdkError::Throttled { .. } | SdkError::Transport(_) | SdkError::Connection(_)
        ) || self.code() == Some(STORE_UNAVAILABLE)
    }
}

impl From<jsonrpsee::core::ClientError> for SdkError {
    fn from(e: jsonrpsee::core::ClientError) -> Self {
        match e {
            jsonrpsee::core::ClientError::Call(call_err) => {
                if call_err.code() == THROTTLED {
                    let retry_after_seconds = call_err
                        .data()
                        .and_then(|d| serde_json::from_str::<serde_json::Value>(d.get()).ok())
                        .and_then(|v| v.get("retry_after_seconds").and_then(|s| s.as_u64()))
                        .unwrap_or(1);
                    return SdkError::Throttled {
                        retry_after_seconds,
                    };
                }
                SdkError::Rpc {
                    code: call_err.code(),
                    message: call_err.message().to_string(),
                }
            }
            jsonrpsee::core::ClientError::Transport(e) => {
                SdkError::Transport(format!("Transport error: {}", e))
            }
            jsonrpsee::core::ClientError::RestartNeeded(_) => {
                SdkError::Connection("Connection restart needed".to_string())
            }
            jsonrpsee::core::ClientError::ParseError(e) => SdkError::Serialization(e),
            _ => SdkError::Other(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonrpsee::core::ClientError;
    use jsonrpsee::types::ErrorObjectOwned;
    use serde_json::json;

    #[test]
    fn test_throttled_call_error_is_typed() {
        let err: SdkError = ClientError::Call(ErrorObjectOwned::owned(
            THROTTLED,
            "Rate limit exceeded",
            Some(json!({ "retry_after_seconds": 60 })),
        ))
        .into();

        assert!(matches!(
            err,
            SdkError::Throttled {
                retry_after_seconds: 60
            }
        ));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_domain_call_error_keeps_code() {
        let err: SdkError =
            ClientError::Call(ErrorObjectOwned::owned(4001, "not found", None::<()>)).into();

        assert_eq!(err.code(), Some(4001));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_store_unavailable_is_retryable() {
        let err: SdkError =
            ClientError::Call(ErrorObjectOwned::owned(STORE_UNAVAILABLE, "down", None::<()>))
                .into();
        assert!(err.is_retryable());
    }
}
