//! Shared fixtures: temp-file SQLite databases and service wiring

#![allow(dead_code)]

use std::sync::Arc;
use waitline_core::application::{AdmissionScheduler, QueueService, SchedulerConfig};
use waitline_core::domain::{QueueConfig, QueueDomainService};
use waitline_core::port::id_provider::mocks::SequentialIdProvider;
use waitline_core::port::time_provider::mocks::ManualTimeProvider;
use waitline_core::port::UuidProvider;
use waitline_infra_sqlite::{create_pool, run_migrations, SqliteQueueStore};

pub const START: i64 = 1_700_000_000_000;

/// URL of a fresh database file
pub fn temp_db_url() -> String {
    let path = std::env::temp_dir().join(format!("waitline-it-{}.db", uuid::Uuid::new_v4()));
    format!("sqlite://{}", path.display())
}

/// Independent pool + store over `url` (one per simulated server instance)
pub async fn open_store(url: &str) -> Arc<SqliteQueueStore> {
    let pool = create_pool(url).await.unwrap();
    run_migrations(&pool).await.unwrap();
    Arc::new(SqliteQueueStore::new(pool))
}

pub fn config(active_max_size: u64, max_extension_count: u32) -> QueueConfig {
    QueueConfig::new(active_max_size, 300, 600, max_extension_count, 5).unwrap()
}

/// Deterministic tokens ("tok-1", "tok-2", ...)
pub fn domain(config: QueueConfig) -> QueueDomainService {
    QueueDomainService::new(config, Arc::new(SequentialIdProvider::new("tok")))
}

/// Random tokens, for instances that must not collide
pub fn uuid_domain(config: QueueConfig) -> QueueDomainService {
    QueueDomainService::new(config, Arc::new(UuidProvider))
}

pub struct Instance {
    pub service: QueueService,
    pub scheduler: Arc<AdmissionScheduler>,
    pub store: Arc<SqliteQueueStore>,
}

pub fn instance(
    store: Arc<SqliteQueueStore>,
    domain: QueueDomainService,
    time: Arc<ManualTimeProvider>,
) -> Instance {
    let service = QueueService::new(store.clone(), domain.clone(), time.clone());
    let scheduler = Arc::new(AdmissionScheduler::new(
        store.clone(),
        domain,
        time,
        SchedulerConfig::default(),
    ));
    Instance {
        service,
        scheduler,
        store,
    }
}
