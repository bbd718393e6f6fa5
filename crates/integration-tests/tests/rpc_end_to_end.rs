//! Daemon wiring over a real socket, driven through the SDK

mod common;

use common::*;
use std::sync::Arc;
use std::time::Duration;
use waitline_api_rpc::{
    RateLimitConfig, RateLimiter, RpcHandler, RpcServer, RpcServerConfig, ServerHandle,
};
use waitline_core::application::{PollingConfig, PositionThresholdPolicy, StatusStreamer};
use waitline_core::port::rate_limit_store::mocks::InMemoryRateLimitStore;
use waitline_core::port::time_provider::mocks::ManualTimeProvider;
use waitline_core::port::RateLimitStore;
use waitline_infra_sqlite::{create_pool, run_migrations, SqliteRateLimitStore};
use waitline_sdk::{PaymentCompleted, QueueStatus, SdkError, StatusEvent, WaitlineClient};

struct Running {
    client: WaitlineClient,
    instance: Instance,
    _handle: ServerHandle,
}

async fn start(rate_limits: Arc<dyn RateLimitStore>, rate_capacity: u32) -> Running {
    let time = Arc::new(ManualTimeProvider::new(START));
    let it = instance(open_store(&temp_db_url()).await, domain(config(10, 2)), time.clone());

    let streamer = Arc::new(StatusStreamer::new(
        it.service.clone(),
        Arc::new(PositionThresholdPolicy::new(PollingConfig {
            fast_interval_ms: 20,
            slow_interval_ms: 50,
            fast_threshold: 1_000,
            min_interval_ms: 10,
        })),
    ));
    let limiter = RateLimiter::new(
        rate_limits,
        time,
        RateLimitConfig {
            capacity: rate_capacity,
            refill_window: Duration::from_secs(60),
        },
    );
    let handler = Arc::new(RpcHandler::new(it.service.clone(), streamer, limiter));

    let config = RpcServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
    };
    let (addr, handle) = RpcServer::new(config, handler).start().await.unwrap();
    let client = WaitlineClient::connect(format!("http://{}", addr))
        .await
        .unwrap();

    Running {
        client,
        instance: it,
        _handle: handle,
    }
}

async fn sqlite_rate_limits() -> Arc<dyn RateLimitStore> {
    let pool = create_pool(&temp_db_url()).await.unwrap();
    run_migrations(&pool).await.unwrap();
    Arc::new(SqliteRateLimitStore::new(pool))
}

#[tokio::test]
async fn test_sdk_round_trip() {
    let srv = start(sqlite_rate_limits().await, 30).await;
    let client = &srv.client;

    let entered = client.enter("C1", "U1").await.unwrap();
    assert!(entered.is_new_entry);
    assert_eq!(entered.status, QueueStatus::Waiting);

    let waiting = client.status("C1", "U1").await.unwrap();
    assert_eq!(waiting.token.position, Some(1));
    assert_eq!(waiting.recommended_poll_interval_ms, 20);

    srv.instance.scheduler.promote_resource("C1").await.unwrap();

    let ready = client.status("C1", "U1").await.unwrap();
    assert_eq!(ready.token.status, QueueStatus::Ready);
    let token = ready.token.token.clone().unwrap();

    let active = client.activate("C1", "U1").await.unwrap();
    assert_eq!(active.status, QueueStatus::Active);

    let valid = client.validate("C1", "U1", token.as_str()).await.unwrap();
    assert!(valid.valid);

    let forged = client.validate("C1", "U1", "forged").await.unwrap_err();
    assert_eq!(forged.code(), Some(4004));

    let extended = client.extend("C1", "U1").await.unwrap();
    assert_eq!(extended.extend_count, Some(1));

    assert_eq!(
        client.resources().await.unwrap().resource_ids,
        vec!["C1".to_string()]
    );

    assert!(client.remove("C1", "U1").await.unwrap().removed);
    let gone = client.status("C1", "U1").await.unwrap();
    assert_eq!(gone.token.status, QueueStatus::NotFound);

    let missing = client.activate("C1", "U1").await.unwrap_err();
    assert_eq!(missing.code(), Some(4001));
}

#[tokio::test]
async fn test_invalid_ids_are_rejected() {
    let srv = start(sqlite_rate_limits().await, 30).await;

    let err = srv.client.enter("C1", "user with spaces").await.unwrap_err();
    assert_eq!(err.code(), Some(4000));
}

#[tokio::test]
async fn test_status_polling_is_throttled() {
    let srv = start(sqlite_rate_limits().await, 3).await;
    srv.client.enter("C1", "U1").await.unwrap();

    for _ in 0..3 {
        srv.client.status("C1", "U1").await.unwrap();
    }
    let err = srv.client.status("C1", "U1").await.unwrap_err();
    assert!(matches!(
        err,
        SdkError::Throttled {
            retry_after_seconds: 60
        }
    ));

    // Other users keep their own budget
    srv.client.status("C1", "U2").await.unwrap();
}

#[tokio::test]
async fn test_rate_limiter_fails_open() {
    let limits = Arc::new(InMemoryRateLimitStore::new());
    limits.set_unavailable(true);
    let srv = start(limits, 1).await;

    for _ in 0..5 {
        srv.client.status("C1", "U1").await.unwrap();
    }
}

#[tokio::test]
async fn test_payment_completed_over_rpc() {
    let srv = start(sqlite_rate_limits().await, 30).await;
    srv.client.enter("C1", "U1").await.unwrap();
    srv.instance.scheduler.promote_resource("C1").await.unwrap();

    let event = PaymentCompleted {
        event_id: "evt-7".to_string(),
        resource_id: "C1".to_string(),
        user_id: "U1".to_string(),
        booking_id: "B-7".to_string(),
        amount: 99_000,
        timestamp: START,
    };
    assert!(srv.client.payment_completed(&event).await.unwrap().removed);
    assert!(!srv.client.payment_completed(&event).await.unwrap().removed);
}

/// Stream pushes updates while waiting and ends with `ready`
#[tokio::test]
async fn test_subscription_ends_with_ready() {
    let srv = start(sqlite_rate_limits().await, 30).await;
    srv.client.enter("C1", "U1").await.unwrap();

    let mut stream = srv.client.subscribe_status("C1", "U1").await.unwrap();
    match stream.next().await.unwrap().unwrap() {
        StatusEvent::StatusUpdate(snapshot) => {
            assert_eq!(snapshot.token.status, QueueStatus::Waiting);
            assert_eq!(snapshot.token.position, Some(1));
        }
        other => panic!("unexpected first event: {:?}", other),
    }

    srv.instance.scheduler.promote_resource("C1").await.unwrap();

    let ready = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match stream.next().await {
                Some(Ok(StatusEvent::Ready(snapshot))) => break Some(snapshot),
                Some(Ok(StatusEvent::StatusUpdate(_))) => continue,
                _ => break None,
            }
        }
    })
    .await
    .unwrap()
    .expect("stream ended without ready");

    assert_eq!(ready.token.status, QueueStatus::Ready);
    assert!(ready.token.token.is_some());
}
