// SQLite Connection Pool Setup

use crate::error::map_sqlx_error;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;
use waitline_core::error::{AppError, Result};

/// Upper bound for any single store call
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// Create SQLite connection pool with WAL mode and busy timeout
///
/// In-memory databases are private per connection, so they get a single one.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    if !database_url.starts_with("sqlite:") {
        return Err(AppError::Config(format!(
            "unsupported database url {}: expected sqlite: scheme",
            database_url
        )));
    }

    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| AppError::Config(format!("invalid database url {}: {}", database_url, e)))?
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .create_if_missing(true);

    let max_connections = if database_url.contains(":memory:") {
        1
    } else {
        10
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(map_sqlx_error)?;

    info!(database_url, max_connections, "SQLite pool ready");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_pool() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        assert!(pool.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_rejects_bad_url() {
        let err = create_pool("postgres://nope").await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        let err = create_pool("/tmp/waitline.db").await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
