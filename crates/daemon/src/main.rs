//! Waitline - Main Entry Point
//!
//! Composition root: settings, logging, SQLite stores, admission scheduler,
//! status streamer and the JSON-RPC server.

mod settings;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use settings::Settings;
use waitline_api_rpc::{RateLimiter, RpcHandler, RpcServer};
use waitline_core::application::{
    shutdown_channel, AdmissionScheduler, PositionThresholdPolicy, QueueService, ShutdownToken,
    StatusStreamer,
};
use waitline_core::domain::QueueDomainService;
use waitline_core::port::{SystemTimeProvider, TimeProvider, UuidProvider};
use waitline_infra_sqlite::{create_pool, run_migrations, SqliteQueueStore, SqliteRateLimitStore};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    info!("Waitline v{} starting...", VERSION);

    // 1. Configuration
    let settings = Settings::load().context("Failed to load settings")?;
    let queue_config = settings
        .queue
        .clone()
        .validated()
        .context("Invalid queue configuration")?;

    // 2. Database
    info!(database_url = %settings.database.url, "Initializing database...");
    let pool = create_pool(&settings.database.url)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 3. DI wiring
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let queue_store =
        Arc::new(SqliteQueueStore::new(pool.clone()).with_timeout(settings.store_timeout()));
    let rate_limit_store =
        Arc::new(SqliteRateLimitStore::new(pool.clone()).with_timeout(settings.store_timeout()));

    let domain = QueueDomainService::new(queue_config, Arc::new(UuidProvider));
    let service = QueueService::new(queue_store.clone(), domain.clone(), time_provider.clone());

    // 4. Admission scheduler
    let (shutdown_tx, shutdown) = shutdown_channel();
    let scheduler = Arc::new(AdmissionScheduler::new(
        queue_store,
        domain,
        time_provider.clone(),
        settings.scheduler_config(),
    ));
    let (promotion_handle, cleanup_handle) = scheduler.spawn(shutdown.clone());

    let purge_handle = tokio::spawn(purge_rate_limits(
        rate_limit_store.clone(),
        time_provider.clone(),
        settings.rate_limit_config().refill_window,
        shutdown,
    ));

    // 5. Delivery + RPC
    let streamer = Arc::new(StatusStreamer::new(
        service.clone(),
        Arc::new(PositionThresholdPolicy::new(settings.polling.clone())),
    ));
    let rate_limiter = RateLimiter::new(
        rate_limit_store,
        time_provider,
        settings.rate_limit_config(),
    );
    let handler = Arc::new(RpcHandler::new(service, streamer.clone(), rate_limiter));
    let (addr, rpc_handle) = RpcServer::new(settings.rpc_config(), handler)
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!(addr = %addr, "System ready");
    info!("Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 7. Graceful shutdown
    shutdown_tx.shutdown();
    streamer.shutdown();
    if let Err(e) = rpc_handle.stop() {
        warn!(error = %e, "RPC server already stopped");
    }

    let background = async {
        let _ = promotion_handle.await;
        let _ = cleanup_handle.await;
        let _ = purge_handle.await;
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, background).await.is_err() {
        warn!("Background tasks did not stop in time");
    }
    pool.close().await;

    info!("Shutdown complete.");
    Ok(())
}

/// `WAITLINE_LOG_FORMAT=json` for structured output, pretty otherwise
fn init_tracing() -> Result<()> {
    let log_format = std::env::var("WAITLINE_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("waitline=info"))
        .context("Failed to create env filter")?;

    match log_format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init(),
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty())
            .init(),
    }
    Ok(())
}

/// Drop expired rate-limit buckets once per refill window
async fn purge_rate_limits(
    store: Arc<SqliteRateLimitStore>,
    time_provider: Arc<dyn TimeProvider>,
    every: Duration,
    mut shutdown: ShutdownToken,
) {
    let mut interval = tokio::time::interval(every.max(Duration::from_secs(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            _ = interval.tick() => {
                match store.purge_expired(time_provider.now_millis()).await {
                    Ok(0) => {}
                    Ok(purged) => info!(purged, "Expired rate limit buckets purged"),
                    Err(e) => error!(error = %e, "Rate limit purge failed"),
                }
            }
        }
    }
}
