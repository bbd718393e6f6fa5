// Waitline Infrastructure - SQLite Adapter
// Implements: QueueStore, RateLimitStore

mod connection;
mod error;
mod migration;
mod queue_store;
mod rate_limit_store;

pub use connection::{create_pool, DEFAULT_STORE_TIMEOUT};
pub use migration::run_migrations;
pub use queue_store::SqliteQueueStore;
pub use rate_limit_store::SqliteRateLimitStore;

// Note: sqlx::Error conversion is handled by wrapping in helper functions
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{create_pool, run_migrations};
    use sqlx::SqlitePool;

    /// Fresh file-backed database (every pooled connection sees the same data)
    pub async fn setup_test_db() -> SqlitePool {
        let path = std::env::temp_dir().join(format!("waitline-test-{}.db", uuid::Uuid::new_v4()));
        let url = format!("sqlite://{}", path.display());
        let pool = create_pool(&url).await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }
}
