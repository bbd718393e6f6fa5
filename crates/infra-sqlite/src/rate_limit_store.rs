// SQLite RateLimitStore Implementation (token buckets shared across processes)

use crate::connection::DEFAULT_STORE_TIMEOUT;
use crate::error::map_sqlx_error;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::debug;
use waitline_core::error::{AppError, Result};
use waitline_core::port::RateLimitStore;

pub struct SqliteRateLimitStore {
    pool: SqlitePool,
    store_timeout: Duration,
}

impl SqliteRateLimitStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// Drop buckets whose window has passed
    pub async fn purge_expired(&self, now_millis: i64) -> Result<u64> {
        let purge = async {
            let result = sqlx::query("DELETE FROM rate_limits WHERE expires_at <= ?")
                .bind(now_millis)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            Ok::<_, AppError>(result.rows_affected())
        };

        tokio::time::timeout(self.store_timeout, purge)
            .await
            .map_err(|_| AppError::StoreUnavailable("rate limit purge timed out".to_string()))?
    }
}

#[async_trait]
impl RateLimitStore for SqliteRateLimitStore {
    async fn try_acquire(
        &self,
        key: &str,
        capacity: u32,
        window_millis: i64,
        now_millis: i64,
    ) -> Result<bool> {
        if capacity == 0 {
            return Ok(false);
        }

        // Fresh or expired bucket: capacity - 1; otherwise decrement while tokens remain.
        // The DO UPDATE WHERE makes an empty bucket a no-op (0 rows affected).
        let acquire = async {
            let result = sqlx::query(
                r#"
                INSERT INTO rate_limits (key, tokens, expires_at)
                VALUES (?1, ?2 - 1, ?3 + ?4)
                ON CONFLICT (key) DO UPDATE SET
                    tokens = CASE WHEN rate_limits.expires_at <= ?3
                                  THEN ?2 - 1 ELSE rate_limits.tokens - 1 END,
                    expires_at = CASE WHEN rate_limits.expires_at <= ?3
                                      THEN ?3 + ?4 ELSE rate_limits.expires_at END
                WHERE rate_limits.tokens > 0 OR rate_limits.expires_at <= ?3
                "#,
            )
            .bind(key)
            .bind(i64::from(capacity))
            .bind(now_millis)
            .bind(window_millis)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

            Ok::<_, AppError>(result.rows_affected() == 1)
        };

        let allowed = tokio::time::timeout(self.store_timeout, acquire)
            .await
            .map_err(|_| AppError::StoreUnavailable("rate limit check timed out".to_string()))??;

        debug!(key, allowed, "Rate limit check");
        Ok(allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_test_db;
    use std::sync::Arc;

    const NOW: i64 = 1_700_000_000_000;

    #[tokio::test]
    async fn test_bucket_drains_then_refills() {
        let store = SqliteRateLimitStore::new(setup_test_db().await);

        for _ in 0..3 {
            assert!(store.try_acquire("k", 3, 60_000, NOW).await.unwrap());
        }
        assert!(!store.try_acquire("k", 3, 60_000, NOW + 1).await.unwrap());
        assert!(!store.try_acquire("k", 3, 60_000, NOW + 59_999).await.unwrap());

        // Window over: fresh bucket
        assert!(store.try_acquire("k", 3, 60_000, NOW + 60_000).await.unwrap());
        // Other keys are independent
        assert!(store.try_acquire("other", 3, 60_000, NOW).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_bucket() {
        let store = Arc::new(SqliteRateLimitStore::new(setup_test_db().await));

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.try_acquire("k", 5, 60_000, NOW).await.unwrap() })
            })
            .collect();

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 5);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = SqliteRateLimitStore::new(setup_test_db().await);
        store.try_acquire("a", 3, 1_000, NOW).await.unwrap();
        store.try_acquire("b", 3, 5_000, NOW).await.unwrap();

        assert_eq!(store.purge_expired(NOW + 1_000).await.unwrap(), 1);
    }
}
