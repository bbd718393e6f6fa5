// SQLite QueueStore Implementation
//
// Multi-statement operations run in one transaction whose first statement is
// a write, so the RESERVED lock is taken up front and concurrent writers
// (other pools, other processes) serialize instead of failing on a stale
// WAL snapshot.

use crate::connection::DEFAULT_STORE_TIMEOUT;
use crate::error::map_sqlx_error;
use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};
use waitline_core::domain::{QueueStatus, QueueToken};
use waitline_core::error::{AppError, Result};
use waitline_core::port::queue_store::{DISCOVERY_PAGE_SIZE, PURGE_BUFFER_MILLIS};
use waitline_core::port::{EnqueueOutcome, QueueStore};

/// Rows per multi-row INSERT (6 binds each, well under SQLite's variable limit)
const INSERT_CHUNK: usize = 1_000;

const RANK_SQL: &str = r#"
    SELECT (
        SELECT COUNT(*) FROM wait_queue w
        WHERE w.resource_id = me.resource_id
          AND (w.score < me.score OR (w.score = me.score AND w.seq < me.seq))
    )
    FROM wait_queue me
    WHERE me.resource_id = ? AND me.user_id = ?
"#;

const RECORD_COLUMNS: &str = "resource_id, user_id, token, status, extend_count, expires_at";

pub struct SqliteQueueStore {
    pool: SqlitePool,
    store_timeout: Duration,
}

impl SqliteQueueStore {
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

    /// Bound a store call by `store_timeout`
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = self.store_timeout.as_millis() as u64;
                warn!(op, timeout_ms, "Store call timed out");
                Err(AppError::StoreUnavailable(format!(
                    "{} timed out after {}ms",
                    op, timeout_ms
                )))
            }
        }
    }
}

/// SQLite row representation of an admitted record
#[derive(Debug, sqlx::FromRow)]
struct ActiveRow {
    resource_id: String,
    user_id: String,
    token: String,
    status: String,
    extend_count: i64,
    expires_at: i64,
}

impl ActiveRow {
    fn into_token(self) -> Result<QueueToken> {
        if self.token.is_empty() {
            return Err(self.corrupt("empty token"));
        }
        let Ok(extend_count) = u32::try_from(self.extend_count) else {
            return Err(self.corrupt(&format!("invalid extend_count {}", self.extend_count)));
        };

        match self.status.parse::<QueueStatus>() {
            Ok(QueueStatus::Active) => Ok(QueueToken::active(
                self.resource_id,
                self.user_id,
                self.token,
                self.expires_at,
                extend_count,
            )),
            Ok(QueueStatus::Ready) => {
                let mut token =
                    QueueToken::ready(self.resource_id, self.user_id, self.token, self.expires_at);
                token.extend_count = Some(extend_count);
                Ok(token)
            }
            _ => Err(self.corrupt(&format!("unexpected status {:?}", self.status))),
        }
    }

    fn corrupt(&self, what: &str) -> AppError {
        AppError::DataCorruption(format!(
            "{} (resource={}, user={})",
            what, self.resource_id, self.user_id
        ))
    }
}

/// (user, score, seq) of popped wait entries, returned in arrival order
#[derive(Debug, sqlx::FromRow)]
struct PoppedRow {
    user_id: String,
    score: i64,
    seq: i64,
}

fn arrival_order(mut rows: Vec<PoppedRow>) -> Vec<String> {
    // DELETE ... RETURNING gives no ordering guarantee
    rows.sort_by_key(|r| (r.score, r.seq));
    rows.into_iter().map(|r| r.user_id).collect()
}

fn to_u64(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

async fn rank_in<'e, E>(executor: E, resource_id: &str, user_id: &str) -> Result<Option<u64>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rank: Option<i64> = sqlx::query_scalar(RANK_SQL)
        .bind(resource_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .map_err(map_sqlx_error)?;
    Ok(rank.map(to_u64))
}

/// Insert or overwrite READY records (an expired, unpurged record may still exist)
async fn write_ready<'e, E>(
    executor: E,
    resource_id: &str,
    users: &[(String, String)],
    expires_at: i64,
) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "INSERT INTO active_tokens (resource_id, user_id, token, status, expires_at, purge_at) ",
    );
    builder.push_values(users, |mut row, (user_id, token)| {
        row.push_bind(resource_id)
            .push_bind(user_id)
            .push_bind(token)
            .push_bind(QueueStatus::Ready.to_string())
            .push_bind(expires_at)
            .push_bind(expires_at + PURGE_BUFFER_MILLIS);
    });
    builder.push(
        " ON CONFLICT (resource_id, user_id) DO UPDATE SET \
         token = excluded.token, status = excluded.status, extend_count = 0, \
         expires_at = excluded.expires_at, purge_at = excluded.purge_at",
    );

    builder
        .build()
        .execute(executor)
        .await
        .map_err(map_sqlx_error)?;
    Ok(())
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn enqueue_wait(
        &self,
        resource_id: &str,
        user_id: &str,
        score: i64,
    ) -> Result<EnqueueOutcome> {
        self.bounded("enqueue_wait", async {
            let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

            let inserted = sqlx::query(
                r#"
                INSERT INTO wait_queue (resource_id, user_id, score)
                SELECT ?, ?, ?
                WHERE NOT EXISTS (
                    SELECT 1 FROM active_tokens
                    WHERE resource_id = ? AND user_id = ? AND expires_at > ?
                )
                ON CONFLICT (resource_id, user_id) DO NOTHING
                "#,
            )
            .bind(resource_id)
            .bind(user_id)
            .bind(score)
            .bind(resource_id)
            .bind(user_id)
            .bind(score)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected()
                == 1;

            let rank = rank_in(&mut *tx, resource_id, user_id).await?;
            tx.commit().await.map_err(map_sqlx_error)?;

            let outcome = match (inserted, rank) {
                (true, Some(rank)) => EnqueueOutcome::Inserted(rank),
                (false, Some(rank)) => EnqueueOutcome::AlreadyWaiting(rank),
                (_, None) => EnqueueOutcome::Admitted,
            };
            debug!(resource_id, user_id, ?outcome, "enqueue_wait");
            Ok(outcome)
        })
        .await
    }

    async fn wait_position(&self, resource_id: &str, user_id: &str) -> Result<Option<u64>> {
        self.bounded("wait_position", rank_in(&self.pool, resource_id, user_id))
            .await
    }

    async fn wait_size(&self, resource_id: &str) -> Result<u64> {
        self.bounded("wait_size", async {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wait_queue WHERE resource_id = ?")
                .bind(resource_id)
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            Ok(to_u64(count))
        })
        .await
    }

    async fn active_size(&self, resource_id: &str, now_millis: i64) -> Result<u64> {
        self.bounded("active_size", async {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM active_tokens WHERE resource_id = ? AND expires_at > ?",
            )
            .bind(resource_id)
            .bind(now_millis)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
            Ok(to_u64(count))
        })
        .await
    }

    async fn admit_batch(&self, resource_id: &str, count: u64) -> Result<Vec<String>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        self.bounded("admit_batch", async {
            let rows = sqlx::query_as::<_, PoppedRow>(
                r#"
                DELETE FROM wait_queue
                WHERE seq IN (
                    SELECT seq FROM wait_queue
                    WHERE resource_id = ?
                    ORDER BY score ASC, seq ASC
                    LIMIT ?
                )
                RETURNING user_id, score, seq
                "#,
            )
            .bind(resource_id)
            .bind(i64::try_from(count).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

            Ok(arrival_order(rows))
        })
        .await
    }

    async fn promote_to_active(
        &self,
        resource_id: &str,
        user_id: &str,
        token: &str,
        expires_at: i64,
        _now_millis: i64,
    ) -> Result<QueueToken> {
        self.bounded("promote_to_active", async {
            let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

            sqlx::query("DELETE FROM wait_queue WHERE resource_id = ? AND user_id = ?")
                .bind(resource_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;

            let users = [(user_id.to_string(), token.to_string())];
            write_ready(&mut *tx, resource_id, &users, expires_at).await?;

            tx.commit().await.map_err(map_sqlx_error)?;
            Ok(QueueToken::ready(resource_id, user_id, token, expires_at))
        })
        .await
    }

    async fn admit_to_ready(
        &self,
        resource_id: &str,
        capacity: u64,
        tokens: &[String],
        expires_at: i64,
        now_millis: i64,
    ) -> Result<Vec<QueueToken>> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        self.bounded("admit_to_ready", async {
            let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

            // Write first: takes the write lock before counting
            sqlx::query("DELETE FROM active_tokens WHERE resource_id = ? AND purge_at <= ?")
                .bind(resource_id)
                .bind(now_millis)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;

            // Expired records stay readable until purged but hold no slot
            let active: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM active_tokens WHERE resource_id = ? AND expires_at > ?",
            )
            .bind(resource_id)
            .bind(now_millis)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            let headroom = capacity.saturating_sub(to_u64(active));
            let take = headroom.min(tokens.len() as u64);
            if take == 0 {
                tx.commit().await.map_err(map_sqlx_error)?;
                return Ok(Vec::new());
            }

            let rows = sqlx::query_as::<_, PoppedRow>(
                r#"
                DELETE FROM wait_queue
                WHERE seq IN (
                    SELECT seq FROM wait_queue
                    WHERE resource_id = ?
                    ORDER BY score ASC, seq ASC
                    LIMIT ?
                )
                RETURNING user_id, score, seq
                "#,
            )
            .bind(resource_id)
            .bind(take as i64)
            .fetch_all(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            let users: Vec<(String, String)> = arrival_order(rows)
                .into_iter()
                .zip(tokens.iter().cloned())
                .collect();

            for chunk in users.chunks(INSERT_CHUNK) {
                write_ready(&mut *tx, resource_id, chunk, expires_at).await?;
            }

            tx.commit().await.map_err(map_sqlx_error)?;

            debug!(resource_id, active, admitted = users.len(), "admit_to_ready");
            Ok(users
                .into_iter()
                .map(|(user_id, token)| QueueToken::ready(resource_id, user_id, token, expires_at))
                .collect())
        })
        .await
    }

    async fn get_active_record(
        &self,
        resource_id: &str,
        user_id: &str,
        now_millis: i64,
    ) -> Result<Option<QueueToken>> {
        self.bounded("get_active_record", async {
            let row = sqlx::query_as::<_, ActiveRow>(&format!(
                "SELECT {} FROM active_tokens WHERE resource_id = ? AND user_id = ? AND purge_at > ?",
                RECORD_COLUMNS
            ))
            .bind(resource_id)
            .bind(user_id)
            .bind(now_millis)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

            row.map(ActiveRow::into_token).transpose()
        })
        .await
    }

    async fn refresh_expiry(
        &self,
        resource_id: &str,
        user_id: &str,
        expires_at: i64,
        now_millis: i64,
    ) -> Result<bool> {
        self.bounded("refresh_expiry", async {
            let result = sqlx::query(
                r#"
                UPDATE active_tokens SET expires_at = ?, purge_at = ?
                WHERE resource_id = ? AND user_id = ? AND purge_at > ?
                "#,
            )
            .bind(expires_at)
            .bind(expires_at + PURGE_BUFFER_MILLIS)
            .bind(resource_id)
            .bind(user_id)
            .bind(now_millis)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

            Ok(result.rows_affected() == 1)
        })
        .await
    }

    async fn increment_extend_count(
        &self,
        resource_id: &str,
        user_id: &str,
    ) -> Result<Option<u32>> {
        self.bounded("increment_extend_count", async {
            let count: Option<i64> = sqlx::query_scalar(
                r#"
                UPDATE active_tokens SET extend_count = extend_count + 1
                WHERE resource_id = ? AND user_id = ?
                RETURNING extend_count
                "#,
            )
            .bind(resource_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

            count
                .map(|c| {
                    u32::try_from(c).map_err(|_| {
                        AppError::DataCorruption(format!("invalid extend_count {}", c))
                    })
                })
                .transpose()
        })
        .await
    }

    async fn mark_active(
        &self,
        resource_id: &str,
        user_id: &str,
        expires_at: i64,
        now_millis: i64,
    ) -> Result<Option<QueueToken>> {
        self.bounded("mark_active", async {
            let row = sqlx::query_as::<_, ActiveRow>(&format!(
                r#"
                UPDATE active_tokens SET status = ?, expires_at = ?, purge_at = ?
                WHERE resource_id = ? AND user_id = ? AND status = ? AND expires_at > ?
                RETURNING {}
                "#,
                RECORD_COLUMNS
            ))
            .bind(QueueStatus::Active.to_string())
            .bind(expires_at)
            .bind(expires_at + PURGE_BUFFER_MILLIS)
            .bind(resource_id)
            .bind(user_id)
            .bind(QueueStatus::Ready.to_string())
            .bind(now_millis)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

            row.map(ActiveRow::into_token).transpose()
        })
        .await
    }

    async fn try_extend(
        &self,
        resource_id: &str,
        user_id: &str,
        expires_at: i64,
        max_extensions: u32,
        now_millis: i64,
    ) -> Result<Option<QueueToken>> {
        self.bounded("try_extend", async {
            let row = sqlx::query_as::<_, ActiveRow>(&format!(
                r#"
                UPDATE active_tokens
                SET extend_count = extend_count + 1, expires_at = ?, purge_at = ?
                WHERE resource_id = ? AND user_id = ? AND status = ?
                  AND expires_at > ? AND extend_count < ?
                RETURNING {}
                "#,
                RECORD_COLUMNS
            ))
            .bind(expires_at)
            .bind(expires_at + PURGE_BUFFER_MILLIS)
            .bind(resource_id)
            .bind(user_id)
            .bind(QueueStatus::Active.to_string())
            .bind(now_millis)
            .bind(i64::from(max_extensions))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

            row.map(ActiveRow::into_token).transpose()
        })
        .await
    }

    async fn sweep_expired(&self, resource_id: &str, now_millis: i64) -> Result<u64> {
        self.bounded("sweep_expired", async {
            let result =
                sqlx::query("DELETE FROM active_tokens WHERE resource_id = ? AND expires_at <= ?")
                    .bind(resource_id)
                    .bind(now_millis)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;
            Ok(result.rows_affected())
        })
        .await
    }

    async fn remove_active(&self, resource_id: &str, user_id: &str) -> Result<bool> {
        self.bounded("remove_active", async {
            let result =
                sqlx::query("DELETE FROM active_tokens WHERE resource_id = ? AND user_id = ?")
                    .bind(resource_id)
                    .bind(user_id)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn remove_wait(&self, resource_id: &str, user_id: &str) -> Result<bool> {
        self.bounded("remove_wait", async {
            let result = sqlx::query("DELETE FROM wait_queue WHERE resource_id = ? AND user_id = ?")
                .bind(resource_id)
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn list_resources_with_activity(&self) -> Result<Vec<String>> {
        self.bounded("list_resources_with_activity", async {
            let mut resources = Vec::new();
            let mut cursor = String::new();

            // Keyset pagination so no single query scans everything
            loop {
                let page: Vec<String> = sqlx::query_scalar(
                    r#"
                    SELECT resource_id FROM (
                        SELECT resource_id FROM wait_queue
                        UNION
                        SELECT resource_id FROM active_tokens
                    )
                    WHERE resource_id > ?
                    ORDER BY resource_id
                    LIMIT ?
                    "#,
                )
                .bind(&cursor)
                .bind(DISCOVERY_PAGE_SIZE)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

                let full_page = page.len() == DISCOVERY_PAGE_SIZE as usize;
                if let Some(last) = page.last() {
                    cursor = last.clone();
                }
                resources.extend(page);
                if !full_page {
                    break;
                }
            }

            Ok(resources)
        })
        .await
    }
}
