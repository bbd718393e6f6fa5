//! Admission Scheduler - moves users from the wait line into the active set
//!
//! Two independent loops:
//! - promotion: every `admission_interval`, admit up to the free capacity per resource
//! - cleanup: every `cleanup_interval`, sweep records past their expiry
//!
//! Ticks never overlap (each tick is awaited before the next interval fires);
//! resources within one tick are processed concurrently.

use super::constants::{
    CLEANUP_INTERVAL_MULTIPLIER, DEFAULT_ADMISSION_INTERVAL_SECONDS, DEFAULT_RESOURCE_CONCURRENCY,
};
use super::shutdown::ShutdownToken;
use crate::domain::{QueueDomainService, QueueToken};
use crate::error::Result;
use crate::port::{QueueStore, TimeProvider};
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

/// Scheduler cadence and fan-out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub admission_interval: Duration,
    pub cleanup_interval: Duration,
    pub resource_concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let admission_interval = Duration::from_secs(DEFAULT_ADMISSION_INTERVAL_SECONDS);
        Self {
            admission_interval,
            cleanup_interval: admission_interval * CLEANUP_INTERVAL_MULTIPLIER,
            resource_concurrency: DEFAULT_RESOURCE_CONCURRENCY,
        }
    }
}

/// Outcome of one pass over every active resource
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub resources: usize,
    /// Users admitted (promotion) or records swept (cleanup)
    pub affected: u64,
    pub failures: usize,
}

pub struct AdmissionScheduler {
    store: Arc<dyn QueueStore>,
    domain: QueueDomainService,
    time_provider: Arc<dyn TimeProvider>,
    config: SchedulerConfig,
}

impl AdmissionScheduler {
    pub fn new(
        store: Arc<dyn QueueStore>,
        domain: QueueDomainService,
        time_provider: Arc<dyn TimeProvider>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            domain,
            time_provider,
            config,
        }
    }

    /// Admit as many waiting users as the resource has free slots for
    pub async fn promote_resource(&self, resource_id: &str) -> Result<Vec<QueueToken>> {
        let now = self.time_provider.now_millis();

        let active = self.store.active_size(resource_id, now).await?;
        let batch = self.domain.batch_size(active);
        if batch == 0 {
            debug!(resource_id, active, "No free capacity");
            return Ok(Vec::new());
        }

        let waiting = self.store.wait_size(resource_id).await?;
        let count = batch.min(waiting);
        if count == 0 {
            return Ok(Vec::new());
        }

        let tokens: Vec<String> = (0..count).map(|_| self.domain.generate_token()).collect();
        let admitted = self
            .store
            .admit_to_ready(
                resource_id,
                self.domain.config().active_max_size,
                &tokens,
                self.domain.ready_expiration(now),
                now,
            )
            .await?;

        if !admitted.is_empty() {
            info!(
                resource_id,
                admitted = admitted.len(),
                active_before = active,
                waiting_before = waiting,
                "Users promoted to READY"
            );
        }
        Ok(admitted)
    }

    /// Remove every record past its expiry
    pub async fn cleanup_resource(&self, resource_id: &str) -> Result<u64> {
        let now = self.time_provider.now_millis();
        let swept = self.store.sweep_expired(resource_id, now).await?;
        if swept > 0 {
            info!(resource_id, swept, "Expired tokens swept");
        }
        Ok(swept)
    }

    /// One promotion pass; per-resource failures are logged and counted
    pub async fn run_promotion_tick(&self) -> Result<TickReport> {
        let resources = self.store.list_resources_with_activity().await?;
        let report = self
            .for_each_resource(resources, "promotion", |resource_id| async move {
                self.promote_resource(&resource_id)
                    .await
                    .map(|admitted| admitted.len() as u64)
            })
            .await;

        debug!(
            resources = report.resources,
            admitted = report.affected,
            failures = report.failures,
            "Promotion tick finished"
        );
        Ok(report)
    }

    /// One cleanup pass; per-resource failures are logged and counted
    pub async fn run_cleanup_tick(&self) -> Result<TickReport> {
        let resources = self.store.list_resources_with_activity().await?;
        let report = self
            .for_each_resource(resources, "cleanup", |resource_id| async move {
                self.cleanup_resource(&resource_id).await
            })
            .await;

        debug!(
            resources = report.resources,
            swept = report.affected,
            failures = report.failures,
            "Cleanup tick finished"
        );
        Ok(report)
    }

    async fn for_each_resource<'a, F, Fut>(
        &'a self,
        resources: Vec<String>,
        job: &'static str,
        work: F,
    ) -> TickReport
    where
        F: Fn(String) -> Fut + 'a,
        Fut: std::future::Future<Output = Result<u64>> + 'a,
    {
        let count = resources.len();
        let affected = AtomicU64::new(0);
        let failures = AtomicUsize::new(0);

        stream::iter(resources)
            .for_each_concurrent(self.config.resource_concurrency.max(1), |resource_id| {
                let fut = work(resource_id.clone());
                let affected = &affected;
                let failures = &failures;
                async move {
                    match fut.await {
                        Ok(n) => {
                            affected.fetch_add(n, Ordering::Relaxed);
                        }
                        Err(e) => {
                            failures.fetch_add(1, Ordering::Relaxed);
                            error!(resource_id = %resource_id, job, error = %e, "Scheduler job failed for resource");
                        }
                    }
                }
            })
            .await;

        TickReport {
            resources: count,
            affected: affected.into_inner(),
            failures: failures.into_inner(),
        }
    }

    /// Promotion loop (runs until shutdown)
    pub async fn run_promotion_loop(self: Arc<Self>, mut shutdown: ShutdownToken) {
        info!(
            interval_ms = self.config.admission_interval.as_millis() as u64,
            concurrency = self.config.resource_concurrency,
            "Promotion scheduler started"
        );

        let mut tick = interval(self.config.admission_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = tick.tick() => {}
            }

            if let Err(e) = self.run_promotion_tick().await {
                error!(error = %e, "Promotion tick failed");
            }
        }

        info!("Promotion scheduler stopped");
    }

    /// Cleanup loop (runs until shutdown)
    pub async fn run_cleanup_loop(self: Arc<Self>, mut shutdown: ShutdownToken) {
        info!(
            interval_ms = self.config.cleanup_interval.as_millis() as u64,
            "Cleanup scheduler started"
        );

        let mut tick = interval(self.config.cleanup_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = tick.tick() => {}
            }

            if let Err(e) = self.run_cleanup_tick().await {
                error!(error = %e, "Cleanup tick failed");
            }
        }

        info!("Cleanup scheduler stopped");
    }

    /// Spawn both loops on the current runtime
    pub fn spawn(self: Arc<Self>, shutdown: ShutdownToken) -> (JoinHandle<()>, JoinHandle<()>) {
        let promotion = tokio::spawn(self.clone().run_promotion_loop(shutdown.clone()));
        let cleanup = tokio::spawn(self.run_cleanup_loop(shutdown));
        (promotion, cleanup)
    }
}
