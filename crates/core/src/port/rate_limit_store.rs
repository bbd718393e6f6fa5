// Rate Limit Store Port (shared token-bucket counters)

use crate::error::Result;
use async_trait::async_trait;

/// Token-bucket counters shared by every process using the store
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Atomically consume one token for `key`
    ///
    /// A missing or expired bucket starts at `capacity - 1` with a fresh
    /// `window_millis` lifetime. Returns false once the bucket is empty.
    async fn try_acquire(
        &self,
        key: &str,
        capacity: u32,
        window_millis: i64,
        now_millis: i64,
    ) -> Result<bool>;
}

/// Mock implementations for testing
pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// key -> (tokens, expires_at)
    #[derive(Default)]
    pub struct InMemoryRateLimitStore {
        buckets: Mutex<HashMap<String, (u32, i64)>>,
        unavailable: AtomicBool,
    }

    impl InMemoryRateLimitStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_unavailable(&self, unavailable: bool) {
            self.unavailable.store(unavailable, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl RateLimitStore for InMemoryRateLimitStore {
        async fn try_acquire(
            &self,
            key: &str,
            capacity: u32,
            window_millis: i64,
            now_millis: i64,
        ) -> Result<bool> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(AppError::StoreUnavailable(
                    "rate limit store switched off".to_string(),
                ));
            }

            let mut buckets = self.buckets.lock().unwrap();
            match buckets.get_mut(key) {
                Some((tokens, expires_at)) if *expires_at > now_millis => {
                    if *tokens == 0 {
                        return Ok(false);
                    }
                    *tokens -= 1;
                    Ok(true)
                }
                _ => {
                    if capacity == 0 {
                        return Ok(false);
                    }
                    buckets.insert(key.to_string(), (capacity - 1, now_millis + window_millis));
                    Ok(true)
                }
            }
        }
    }
}
