// Queue Store Port (Interface)

use crate::domain::QueueToken;
use crate::error::Result;
use async_trait::async_trait;

/// Physical retention past `expires_at` before a record is purged
pub const PURGE_BUFFER_MILLIS: i64 = 60_000;

/// Page size for resource discovery scans
pub const DISCOVERY_PAGE_SIZE: u32 = 100;

/// Result of an insert-if-absent into the wait line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// This call inserted the user (0-based rank)
    Inserted(u64),
    /// The user was already waiting (0-based rank)
    AlreadyWaiting(u64),
    /// The user holds a live admitted record; nothing inserted
    Admitted,
}

impl EnqueueOutcome {
    /// 0-based rank, if the user is in the wait line
    pub fn rank(&self) -> Option<u64> {
        match self {
            EnqueueOutcome::Inserted(rank) | EnqueueOutcome::AlreadyWaiting(rank) => Some(*rank),
            EnqueueOutcome::Admitted => None,
        }
    }
}

/// Durable wait line + active set, per resource
///
/// Every multi-step method is atomic with respect to concurrent callers,
/// including callers in other processes sharing the same store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Insert-if-absent with `score` as arrival time
    ///
    /// Suppressed while the user holds an unexpired admitted record.
    async fn enqueue_wait(&self, resource_id: &str, user_id: &str, score: i64)
        -> Result<EnqueueOutcome>;

    /// 0-based rank, `None` if not waiting
    async fn wait_position(&self, resource_id: &str, user_id: &str) -> Result<Option<u64>>;

    async fn wait_size(&self, resource_id: &str) -> Result<u64>;

    /// Unexpired admitted records; expired ones hold no slot even before purge
    async fn active_size(&self, resource_id: &str, now_millis: i64) -> Result<u64>;

    /// Pop up to `count` lowest-score users, exactly once across callers
    async fn admit_batch(&self, resource_id: &str, count: u64) -> Result<Vec<String>>;

    /// Remove from the wait line and write a READY record, as one unit
    async fn promote_to_active(
        &self,
        resource_id: &str,
        user_id: &str,
        token: &str,
        expires_at: i64,
        now_millis: i64,
    ) -> Result<QueueToken>;

    /// Capacity-checked pop + promote in one transaction
    ///
    /// Admits at most `min(capacity - active, tokens.len())` users in arrival order.
    async fn admit_to_ready(
        &self,
        resource_id: &str,
        capacity: u64,
        tokens: &[String],
        expires_at: i64,
        now_millis: i64,
    ) -> Result<Vec<QueueToken>>;

    /// Admitted record as stored (status not adjusted for expiry)
    async fn get_active_record(
        &self,
        resource_id: &str,
        user_id: &str,
        now_millis: i64,
    ) -> Result<Option<QueueToken>>;

    async fn refresh_expiry(
        &self,
        resource_id: &str,
        user_id: &str,
        expires_at: i64,
        now_millis: i64,
    ) -> Result<bool>;

    /// New count, `None` when no record exists
    async fn increment_extend_count(&self, resource_id: &str, user_id: &str)
        -> Result<Option<u32>>;

    /// READY (unexpired) -> ACTIVE with a fresh TTL
    async fn mark_active(
        &self,
        resource_id: &str,
        user_id: &str,
        expires_at: i64,
        now_millis: i64,
    ) -> Result<Option<QueueToken>>;

    /// ACTIVE (unexpired) with count < max -> count+1 and fresh TTL
    async fn try_extend(
        &self,
        resource_id: &str,
        user_id: &str,
        expires_at: i64,
        max_extensions: u32,
        now_millis: i64,
    ) -> Result<Option<QueueToken>>;

    /// Delete every record with `expires_at <= now`
    async fn sweep_expired(&self, resource_id: &str, now_millis: i64) -> Result<u64>;

    async fn remove_active(&self, resource_id: &str, user_id: &str) -> Result<bool>;

    async fn remove_wait(&self, resource_id: &str, user_id: &str) -> Result<bool>;

    /// Resources with a non-empty wait line or active set
    async fn list_resources_with_activity(&self) -> Result<Vec<String>>;
}

/// Mock implementations for testing
pub mod mocks {
    use super::*;
    use crate::domain::QueueStatus;
    use crate::error::AppError;
    use std::collections::{BTreeMap, BTreeSet, HashMap};
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct Record {
        token: String,
        status: QueueStatus,
        extend_count: u32,
        expires_at: i64,
        purge_at: i64,
    }

    #[derive(Default)]
    struct Line {
        /// (score, seq, user)
        waiting: BTreeSet<(i64, u64, String)>,
        index: HashMap<String, (i64, u64)>,
        active: HashMap<String, Record>,
    }

    impl Line {
        fn rank(&self, user_id: &str) -> Option<u64> {
            let (score, seq) = self.index.get(user_id)?;
            let rank = self
                .waiting
                .range(..(*score, *seq, String::new()))
                .count();
            Some(rank as u64)
        }

        fn live(&self, user_id: &str, now_millis: i64) -> Option<&Record> {
            self.active
                .get(user_id)
                .filter(|r| r.purge_at > now_millis)
        }

        fn pop(&mut self, count: usize) -> Vec<String> {
            let mut popped = Vec::with_capacity(count);
            while popped.len() < count {
                let Some(first) = self.waiting.pop_first() else {
                    break;
                };
                self.index.remove(&first.2);
                popped.push(first.2);
            }
            popped
        }

        fn write_ready(&mut self, user_id: &str, token: &str, expires_at: i64) {
            self.active.insert(
                user_id.to_string(),
                Record {
                    token: token.to_string(),
                    status: QueueStatus::Ready,
                    extend_count: 0,
                    expires_at,
                    purge_at: expires_at + PURGE_BUFFER_MILLIS,
                },
            );
        }
    }

    fn to_token(resource_id: &str, user_id: &str, record: &Record) -> QueueToken {
        match record.status {
            QueueStatus::Active => QueueToken::active(
                resource_id,
                user_id,
                record.token.clone(),
                record.expires_at,
                record.extend_count,
            ),
            _ => {
                let mut token =
                    QueueToken::ready(resource_id, user_id, record.token.clone(), record.expires_at);
                token.extend_count = Some(record.extend_count);
                token
            }
        }
    }

    /// In-memory store with the same contract as the SQLite adapter
    #[derive(Default)]
    pub struct InMemoryQueueStore {
        lines: Mutex<BTreeMap<String, Line>>,
        seq: AtomicU64,
        unavailable: AtomicBool,
    }

    impl InMemoryQueueStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every call fail with `StoreUnavailable`
        pub fn set_unavailable(&self, unavailable: bool) {
            self.unavailable.store(unavailable, Ordering::SeqCst);
        }

        /// Write a record directly, bypassing the admission path
        pub fn insert_record(
            &self,
            resource_id: &str,
            user_id: &str,
            token: &str,
            status: QueueStatus,
            extend_count: u32,
            expires_at: i64,
        ) {
            let mut lines = self.lines.lock().unwrap();
            lines.entry(resource_id.to_string()).or_default().active.insert(
                user_id.to_string(),
                Record {
                    token: token.to_string(),
                    status,
                    extend_count,
                    expires_at,
                    purge_at: expires_at + PURGE_BUFFER_MILLIS,
                },
            );
        }

        fn check(&self) -> Result<()> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(AppError::StoreUnavailable(
                    "in-memory store switched off".to_string(),
                ));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl QueueStore for InMemoryQueueStore {
        async fn enqueue_wait(
            &self,
            resource_id: &str,
            user_id: &str,
            score: i64,
        ) -> Result<EnqueueOutcome> {
            self.check()?;
            let mut lines = self.lines.lock().unwrap();
            let line = lines.entry(resource_id.to_string()).or_default();

            if line
                .active
                .get(user_id)
                .is_some_and(|r| r.expires_at > score)
            {
                return Ok(EnqueueOutcome::Admitted);
            }

            if let Some(rank) = line.rank(user_id) {
                return Ok(EnqueueOutcome::AlreadyWaiting(rank));
            }

            let seq = self.seq.fetch_add(1, Ordering::SeqCst);
            line.waiting.insert((score, seq, user_id.to_string()));
            line.index.insert(user_id.to_string(), (score, seq));
            Ok(EnqueueOutcome::Inserted(line.rank(user_id).unwrap_or(0)))
        }

        async fn wait_position(&self, resource_id: &str, user_id: &str) -> Result<Option<u64>> {
            self.check()?;
            let lines = self.lines.lock().unwrap();
            Ok(lines.get(resource_id).and_then(|l| l.rank(user_id)))
        }

        async fn wait_size(&self, resource_id: &str) -> Result<u64> {
            self.check()?;
            let lines = self.lines.lock().unwrap();
            Ok(lines
                .get(resource_id)
                .map(|l| l.waiting.len() as u64)
                .unwrap_or(0))
        }

        async fn active_size(&self, resource_id: &str, now_millis: i64) -> Result<u64> {
            self.check()?;
            let lines = self.lines.lock().unwrap();
            Ok(lines
                .get(resource_id)
                .map(|l| l.active.values().filter(|r| r.expires_at > now_millis).count() as u64)
                .unwrap_or(0))
        }

        async fn admit_batch(&self, resource_id: &str, count: u64) -> Result<Vec<String>> {
            self.check()?;
            let mut lines = self.lines.lock().unwrap();
            Ok(match lines.get_mut(resource_id) {
                Some(line) => line.pop(count as usize),
                None => Vec::new(),
            })
        }

        async fn promote_to_active(
            &self,
            resource_id: &str,
            user_id: &str,
            token: &str,
            expires_at: i64,
            _now_millis: i64,
        ) -> Result<QueueToken> {
            self.check()?;
            let mut lines = self.lines.lock().unwrap();
            let line = lines.entry(resource_id.to_string()).or_default();
            if let Some((score, seq)) = line.index.remove(user_id) {
                line.waiting.remove(&(score, seq, user_id.to_string()));
            }
            line.write_ready(user_id, token, expires_at);
            Ok(QueueToken::ready(resource_id, user_id, token, expires_at))
        }

        async fn admit_to_ready(
            &self,
            resource_id: &str,
            capacity: u64,
            tokens: &[String],
            expires_at: i64,
            now_millis: i64,
        ) -> Result<Vec<QueueToken>> {
            self.check()?;
            let mut lines = self.lines.lock().unwrap();
            let Some(line) = lines.get_mut(resource_id) else {
                return Ok(Vec::new());
            };

            line.active.retain(|_, r| r.purge_at > now_millis);
            let held = line
                .active
                .values()
                .filter(|r| r.expires_at > now_millis)
                .count() as u64;
            let headroom = capacity.saturating_sub(held);
            let take = headroom.min(tokens.len() as u64) as usize;

            let users = line.pop(take);
            let mut admitted = Vec::with_capacity(users.len());
            for (user_id, token) in users.iter().zip(tokens) {
                line.write_ready(user_id, token, expires_at);
                admitted.push(QueueToken::ready(
                    resource_id,
                    user_id.as_str(),
                    token.as_str(),
                    expires_at,
                ));
            }
            Ok(admitted)
        }

        async fn get_active_record(
            &self,
            resource_id: &str,
            user_id: &str,
            now_millis: i64,
        ) -> Result<Option<QueueToken>> {
            self.check()?;
            let lines = self.lines.lock().unwrap();
            Ok(lines
                .get(resource_id)
                .and_then(|l| l.live(user_id, now_millis))
                .map(|r| to_token(resource_id, user_id, r)))
        }

        async fn refresh_expiry(
            &self,
            resource_id: &str,
            user_id: &str,
            expires_at: i64,
            now_millis: i64,
        ) -> Result<bool> {
            self.check()?;
            let mut lines = self.lines.lock().unwrap();
            let record = lines
                .get_mut(resource_id)
                .and_then(|l| l.active.get_mut(user_id))
                .filter(|r| r.purge_at > now_millis);
            Ok(match record {
                Some(record) => {
                    record.expires_at = expires_at;
                    record.purge_at = expires_at + PURGE_BUFFER_MILLIS;
                    true
                }
                None => false,
            })
        }

        async fn increment_extend_count(
            &self,
            resource_id: &str,
            user_id: &str,
        ) -> Result<Option<u32>> {
            self.check()?;
            let mut lines = self.lines.lock().unwrap();
            Ok(lines
                .get_mut(resource_id)
                .and_then(|l| l.active.get_mut(user_id))
                .map(|r| {
                    r.extend_count += 1;
                    r.extend_count
                }))
        }

        async fn mark_active(
            &self,
            resource_id: &str,
            user_id: &str,
            expires_at: i64,
            now_millis: i64,
        ) -> Result<Option<QueueToken>> {
            self.check()?;
            let mut lines = self.lines.lock().unwrap();
            let record = lines
                .get_mut(resource_id)
                .and_then(|l| l.active.get_mut(user_id))
                .filter(|r| r.status == QueueStatus::Ready && r.expires_at > now_millis);
            Ok(record.map(|r| {
                r.status = QueueStatus::Active;
                r.expires_at = expires_at;
                r.purge_at = expires_at + PURGE_BUFFER_MILLIS;
                to_token(resource_id, user_id, r)
            }))
        }

        async fn try_extend(
            &self,
            resource_id: &str,
            user_id: &str,
            expires_at: i64,
            max_extensions: u32,
            now_millis: i64,
        ) -> Result<Option<QueueToken>> {
            self.check()?;
            let mut lines = self.lines.lock().unwrap();
            let record = lines
                .get_mut(resource_id)
                .and_then(|l| l.active.get_mut(user_id))
                .filter(|r| {
                    r.status == QueueStatus::Active
                        && r.expires_at > now_millis
                        && r.extend_count < max_extensions
                });
            Ok(record.map(|r| {
                r.extend_count += 1;
                r.expires_at = expires_at;
                r.purge_at = expires_at + PURGE_BUFFER_MILLIS;
                to_token(resource_id, user_id, r)
            }))
        }

        async fn sweep_expired(&self, resource_id: &str, now_millis: i64) -> Result<u64> {
            self.check()?;
            let mut lines = self.lines.lock().unwrap();
            let Some(line) = lines.get_mut(resource_id) else {
                return Ok(0);
            };
            let before = line.active.len();
            line.active.retain(|_, r| r.expires_at > now_millis);
            Ok((before - line.active.len()) as u64)
        }

        async fn remove_active(&self, resource_id: &str, user_id: &str) -> Result<bool> {
            self.check()?;
            let mut lines = self.lines.lock().unwrap();
            Ok(lines
                .get_mut(resource_id)
                .and_then(|l| l.active.remove(user_id))
                .is_some())
        }

        async fn remove_wait(&self, resource_id: &str, user_id: &str) -> Result<bool> {
            self.check()?;
            let mut lines = self.lines.lock().unwrap();
            let Some(line) = lines.get_mut(resource_id) else {
                return Ok(false);
            };
            Ok(match line.index.remove(user_id) {
                Some((score, seq)) => line.waiting.remove(&(score, seq, user_id.to_string())),
                None => false,
            })
        }

        async fn list_resources_with_activity(&self) -> Result<Vec<String>> {
            self.check()?;
            let lines = self.lines.lock().unwrap();
            Ok(lines
                .iter()
                .filter(|(_, l)| !l.waiting.is_empty() || !l.active.is_empty())
                .map(|(id, _)| id.clone())
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::InMemoryQueueStore;
    use super::*;
    use crate::domain::QueueStatus;

    #[tokio::test]
    async fn test_in_memory_ranks_by_score_then_arrival() {
        let store = InMemoryQueueStore::new();
        let a = store.enqueue_wait("C1", "a", 100).await.unwrap();
        let b = store.enqueue_wait("C1", "b", 100).await.unwrap();
        let c = store.enqueue_wait("C1", "c", 50).await.unwrap();
        assert_eq!(a, EnqueueOutcome::Inserted(0));
        assert_eq!(b, EnqueueOutcome::Inserted(1));
        assert_eq!(c, EnqueueOutcome::Inserted(0));

        // Idempotent: rank recomputed, no duplicate
        let again = store.enqueue_wait("C1", "a", 999).await.unwrap();
        assert_eq!(again, EnqueueOutcome::AlreadyWaiting(1));
        assert_eq!(store.wait_size("C1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_in_memory_admit_respects_capacity() {
        let store = InMemoryQueueStore::new();
        for (i, user) in ["a", "b", "c"].iter().enumerate() {
            store.enqueue_wait("C1", user, i as i64).await.unwrap();
        }
        let tokens = vec!["t1".to_string(), "t2".to_string(), "t3".to_string()];

        let admitted = store.admit_to_ready("C1", 2, &tokens, 5_000, 0).await.unwrap();
        assert_eq!(admitted.len(), 2);
        assert_eq!(admitted[0].user_id, "a");
        assert_eq!(admitted[1].status, QueueStatus::Ready);

        let again = store.admit_to_ready("C1", 2, &tokens, 5_000, 0).await.unwrap();
        assert!(again.is_empty());
        assert_eq!(store.wait_position("C1", "c").await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_in_memory_enqueue_suppressed_while_admitted() {
        let store = InMemoryQueueStore::new();
        store.insert_record("C1", "a", "tok", QueueStatus::Ready, 0, 1_000);
        assert_eq!(
            store.enqueue_wait("C1", "a", 500).await.unwrap(),
            EnqueueOutcome::Admitted
        );
        // Expired record no longer blocks re-entry
        assert_eq!(
            store.enqueue_wait("C1", "a", 1_000).await.unwrap(),
            EnqueueOutcome::Inserted(0)
        );
    }

    #[tokio::test]
    async fn test_in_memory_expired_record_holds_no_slot() {
        let store = InMemoryQueueStore::new();
        store.insert_record("C1", "a", "tok", QueueStatus::Active, 0, 1_000);
        assert_eq!(store.active_size("C1", 999).await.unwrap(), 1);
        assert_eq!(store.active_size("C1", 1_000).await.unwrap(), 0);

        store.enqueue_wait("C1", "a", 1_500).await.unwrap();
        let tokens = vec!["t2".to_string()];
        let admitted = store
            .admit_to_ready("C1", 1, &tokens, 9_000, 1_500)
            .await
            .unwrap();
        assert_eq!(admitted.len(), 1);
        assert_eq!(admitted[0].token.as_deref(), Some("t2"));
    }

    #[tokio::test]
    async fn test_in_memory_unavailable_switch() {
        let store = InMemoryQueueStore::new();
        store.set_unavailable(true);
        let err = store.wait_size("C1").await.unwrap_err();
        assert!(err.is_retryable());
    }
}
