//! Adaptive status delivery
//!
//! One lightweight task per subscribed (resource, user). Each task pushes a
//! snapshot, sleeps for the policy interval, re-reads the status and repeats
//! until the user is admitted, the subscriber goes away or the streamer shuts
//! down. A second subscription for the same pair replaces the first.

pub mod policy;

pub use policy::{PollIntervalPolicy, PollingConfig, PositionThresholdPolicy};

use crate::application::constants::SUBSCRIPTION_BUFFER;
use crate::application::queue::validation::validate_ids;
use crate::application::queue::QueueService;
use crate::domain::QueueToken;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Longest a single subscription stays open (30 minutes)
pub const DEFAULT_MAX_CONNECTION_LIFETIME: Duration = Duration::from_secs(30 * 60);

/// Status plus client polling hints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(flatten)]
    pub token: QueueToken,
    pub recommended_poll_interval_ms: u64,
    pub min_poll_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusError {
    pub message: String,
    pub retryable: bool,
}

/// Pushed to subscribers; serialized as `{"event": ..., "data": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum StatusEvent {
    StatusUpdate(StatusSnapshot),
    /// Terminal: the user is READY or ACTIVE
    Ready(StatusSnapshot),
    /// Terminal: the status could not be read
    Error(StatusError),
}

impl StatusEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StatusEvent::StatusUpdate(_))
    }
}

/// Receiving end of one connection
pub struct StatusSubscription {
    pub id: u64,
    receiver: mpsc::Receiver<StatusEvent>,
    cancel: CancellationToken,
}

impl StatusSubscription {
    /// Next event; `None` once the connection has finished
    pub async fn recv(&mut self) -> Option<StatusEvent> {
        self.receiver.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Split for transports that own the receiver separately
    pub fn into_parts(self) -> (mpsc::Receiver<StatusEvent>, CancellationToken) {
        (self.receiver, self.cancel)
    }
}

type Registry = Arc<Mutex<HashMap<String, (u64, CancellationToken)>>>;

pub struct StatusStreamer {
    service: QueueService,
    policy: Arc<dyn PollIntervalPolicy>,
    connections: Registry,
    next_id: AtomicU64,
    root: CancellationToken,
    max_lifetime: Duration,
}

impl StatusStreamer {
    pub fn new(service: QueueService, policy: Arc<dyn PollIntervalPolicy>) -> Self {
        Self {
            service,
            policy,
            connections: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            root: CancellationToken::new(),
            max_lifetime: DEFAULT_MAX_CONNECTION_LIFETIME,
        }
    }

    pub fn with_max_lifetime(mut self, max_lifetime: Duration) -> Self {
        self.max_lifetime = max_lifetime;
        self
    }

    pub fn policy(&self) -> &dyn PollIntervalPolicy {
        self.policy.as_ref()
    }

    /// Attach polling hints to a status
    pub fn snapshot(&self, token: QueueToken) -> StatusSnapshot {
        snapshot(self.policy.as_ref(), token)
    }

    /// Open a connection, replacing any previous one for the same pair
    pub fn subscribe(&self, resource_id: &str, user_id: &str) -> Result<StatusSubscription> {
        validate_ids(resource_id, user_id)?;

        let key = connection_key(resource_id, user_id);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = self.root.child_token();

        {
            let mut connections = self
                .connections
                .lock()
                .map_err(|_| AppError::Internal("connection registry poisoned".to_string()))?;
            if let Some((old_id, old)) = connections.insert(key.clone(), (id, cancel.clone())) {
                old.cancel();
                debug!(resource_id, user_id, old_id, "Previous subscription replaced");
            }
        }

        let (tx, receiver) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let connection = Connection {
            service: self.service.clone(),
            policy: self.policy.clone(),
            resource_id: resource_id.to_string(),
            user_id: user_id.to_string(),
            tx,
            cancel: cancel.clone(),
            max_lifetime: self.max_lifetime,
        };
        let registry = self.connections.clone();

        info!(resource_id, user_id, id, "Status subscription started");
        tokio::spawn(async move {
            connection.run().await;
            deregister(&registry, &key, id);
        });

        Ok(StatusSubscription {
            id,
            receiver,
            cancel,
        })
    }

    /// Cancel the current connection for the pair, if any
    pub fn unsubscribe(&self, resource_id: &str, user_id: &str) -> bool {
        let key = connection_key(resource_id, user_id);
        let Ok(mut connections) = self.connections.lock() else {
            return false;
        };
        match connections.remove(&key) {
            Some((_, cancel)) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn active_connections(&self) -> usize {
        self.connections.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Stop every connection
    pub fn shutdown(&self) {
        info!(connections = self.active_connections(), "Status streamer shutting down");
        self.root.cancel();
    }
}

fn connection_key(resource_id: &str, user_id: &str) -> String {
    format!("{}:{}", resource_id, user_id)
}

fn snapshot(policy: &dyn PollIntervalPolicy, token: QueueToken) -> StatusSnapshot {
    StatusSnapshot {
        recommended_poll_interval_ms: policy.recommended_interval_ms(&token),
        min_poll_interval_ms: policy.min_interval_ms(),
        token,
    }
}

/// Remove the registry entry only if it still belongs to this connection
fn deregister(registry: &Registry, key: &str, id: u64) {
    if let Ok(mut connections) = registry.lock() {
        if connections.get(key).is_some_and(|(current, _)| *current == id) {
            connections.remove(key);
        }
    }
}

struct Connection {
    service: QueueService,
    policy: Arc<dyn PollIntervalPolicy>,
    resource_id: String,
    user_id: String,
    tx: mpsc::Sender<StatusEvent>,
    cancel: CancellationToken,
    max_lifetime: Duration,
}

impl Connection {
    async fn run(self) {
        let deadline = tokio::time::Instant::now() + self.max_lifetime;

        let mut last = match self.fetch().await {
            None => return self.finish("cancelled"),
            Some(Ok(token)) => token,
            Some(Err(e)) => {
                self.send_error(e).await;
                return self.finish("error");
            }
        };
        if !self.send(StatusEvent::StatusUpdate(self.snapshot(last.clone()))).await {
            return self.finish("subscriber gone");
        }

        loop {
            let wait = Duration::from_millis(self.policy.recommended_interval_ms(&last));
            tokio::select! {
                _ = self.cancel.cancelled() => return self.finish("cancelled"),
                _ = self.tx.closed() => return self.finish("subscriber gone"),
                _ = tokio::time::sleep_until(deadline) => return self.finish("lifetime reached"),
                _ = tokio::time::sleep(wait) => {}
            }

            let token = match self.fetch().await {
                None => return self.finish("cancelled"),
                Some(Ok(token)) => token,
                Some(Err(e)) => {
                    self.send_error(e).await;
                    return self.finish("error");
                }
            };

            if token.is_admitted() {
                self.send(StatusEvent::Ready(self.snapshot(token))).await;
                return self.finish("admitted");
            }

            if !self.send(StatusEvent::StatusUpdate(self.snapshot(token.clone()))).await {
                return self.finish("subscriber gone");
            }
            last = token;
        }
    }

    /// `None` when cancelled mid-read
    async fn fetch(&self) -> Option<Result<QueueToken>> {
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            status = self.service.status(&self.resource_id, &self.user_id) => Some(status),
        }
    }

    fn snapshot(&self, token: QueueToken) -> StatusSnapshot {
        snapshot(self.policy.as_ref(), token)
    }

    async fn send(&self, event: StatusEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }

    async fn send_error(&self, e: AppError) {
        warn!(
            resource_id = %self.resource_id,
            user_id = %self.user_id,
            error = %e,
            "Status delivery failed"
        );
        let event = StatusEvent::Error(StatusError {
            message: e.to_string(),
            retryable: e.is_retryable(),
        });
        self.send(event).await;
    }

    fn finish(&self, reason: &'static str) {
        self.cancel.cancel();
        debug!(
            resource_id = %self.resource_id,
            user_id = %self.user_id,
            reason,
            "Status subscription finished"
        );
    }
}
