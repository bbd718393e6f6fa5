//! Per-user request throttling
//!
//! Token buckets live in the shared [`RateLimitStore`] so every server
//! process sees the same budget. When the store cannot answer, requests
//! are let through: availability of the queue wins over strict limiting.

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use waitline_core::port::{RateLimitStore, TimeProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests allowed per window
    pub capacity: u32,
    /// Bucket refills completely once per window
    pub refill_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 30,
            refill_window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Throttled { retry_after_seconds: u64 },
}

pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    time_provider: Arc<dyn TimeProvider>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn RateLimitStore>,
        time_provider: Arc<dyn TimeProvider>,
        config: RateLimitConfig,
    ) -> Self {
        Self {
            store,
            time_provider,
            config,
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    pub fn key(resource_id: &str, user_id: &str) -> String {
        format!("rate_limit:queue:{}:{}", resource_id, user_id)
    }

    /// Take one request from the (resource, user) bucket
    pub async fn check(&self, resource_id: &str, user_id: &str) -> RateLimitDecision {
        let key = Self::key(resource_id, user_id);
        let window_millis = self.config.refill_window.as_millis() as i64;
        let now = self.time_provider.now_millis();

        match self
            .store
            .try_acquire(&key, self.config.capacity, window_millis, now)
            .await
        {
            Ok(true) => RateLimitDecision::Allowed,
            Ok(false) => RateLimitDecision::Throttled {
                retry_after_seconds: self.config.refill_window.as_secs().max(1),
            },
            Err(e) => {
                warn!(key = %key, error = %e, "Rate limit store unavailable, allowing request");
                RateLimitDecision::Allowed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waitline_core::port::rate_limit_store::mocks::InMemoryRateLimitStore;
    use waitline_core::port::time_provider::mocks::ManualTimeProvider;

    fn limiter(capacity: u32) -> (RateLimiter, Arc<InMemoryRateLimitStore>, Arc<ManualTimeProvider>) {
        let store = Arc::new(InMemoryRateLimitStore::new());
        let time = Arc::new(ManualTimeProvider::new(1_700_000_000_000));
        let limiter = RateLimiter::new(
            store.clone(),
            time.clone(),
            RateLimitConfig {
                capacity,
                refill_window: Duration::from_secs(60),
            },
        );
        (limiter, store, time)
    }

    #[test]
    fn test_key_format() {
        assert_eq!(RateLimiter::key("C1", "U1"), "rate_limit:queue:C1:U1");
    }

    #[tokio::test]
    async fn test_throttles_after_capacity() {
        let (limiter, _, _) = limiter(3);

        for _ in 0..3 {
            assert_eq!(limiter.check("C1", "U1").await, RateLimitDecision::Allowed);
        }
        assert_eq!(
            limiter.check("C1", "U1").await,
            RateLimitDecision::Throttled {
                retry_after_seconds: 60
            }
        );
        // Separate users have separate buckets
        assert_eq!(limiter.check("C1", "U2").await, RateLimitDecision::Allowed);
    }

    #[tokio::test]
    async fn test_refills_after_window() {
        let (limiter, _, time) = limiter(1);

        assert_eq!(limiter.check("C1", "U1").await, RateLimitDecision::Allowed);
        assert!(matches!(
            limiter.check("C1", "U1").await,
            RateLimitDecision::Throttled { .. }
        ));

        time.advance_secs(60);
        assert_eq!(limiter.check("C1", "U1").await, RateLimitDecision::Allowed);
    }

    #[tokio::test]
    async fn test_fails_open_when_store_unavailable() {
        let (limiter, store, _) = limiter(1);
        store.set_unavailable(true);

        for _ in 0..5 {
            assert_eq!(limiter.check("C1", "U1").await, RateLimitDecision::Allowed);
        }
    }
}
