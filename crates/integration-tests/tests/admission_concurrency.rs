//! Concurrency guarantees with two server instances sharing one database file
//!
//! Each instance has its own connection pool, so these exercise SQLite
//! locking rather than in-process synchronization.

mod common;

use common::*;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use waitline_core::domain::{DomainError, QueueConfig, QueueStatus};
use waitline_core::error::AppError;
use waitline_core::port::time_provider::mocks::ManualTimeProvider;
use waitline_core::port::QueueStore;

async fn two_instances(config: QueueConfig) -> (Instance, Instance) {
    let url = temp_db_url();
    let time = Arc::new(ManualTimeProvider::new(START));
    let a = instance(open_store(&url).await, uuid_domain(config.clone()), time.clone());
    let b = instance(open_store(&url).await, uuid_domain(config), time);
    (a, b)
}

#[tokio::test]
async fn test_concurrent_enters_insert_once() {
    let (a, b) = two_instances(config(10, 2)).await;

    let calls = (0..40).map(|i| {
        let service = if i % 2 == 0 {
            a.service.clone()
        } else {
            b.service.clone()
        };
        async move { service.enter("C1", "U1").await.unwrap() }
    });
    let results = join_all(calls).await;

    let new_entries = results.iter().filter(|p| p.is_new_entry).count();
    assert_eq!(new_entries, 1);
    assert!(results.iter().all(|p| p.position == 1));
    assert_eq!(a.store.wait_size("C1").await.unwrap(), 1);
}

#[tokio::test]
async fn test_concurrent_users_get_distinct_positions() {
    let (a, b) = two_instances(config(10, 2)).await;

    let calls = (0..100).map(|i| {
        let service = if i % 2 == 0 {
            a.service.clone()
        } else {
            b.service.clone()
        };
        async move { service.enter("C1", &format!("U{}", i)).await.unwrap() }
    });
    join_all(calls).await;

    let mut positions = Vec::new();
    for i in 0..100 {
        let status = a.service.status("C1", &format!("U{}", i)).await.unwrap();
        assert_eq!(status.status, QueueStatus::Waiting);
        positions.push(status.position.unwrap());
    }
    positions.sort_unstable();
    assert_eq!(positions, (1..=100).collect::<Vec<u64>>());
}

/// Two schedulers draining one line never admit a user twice
#[tokio::test]
async fn test_two_schedulers_pop_exactly_once() {
    let (a, b) = two_instances(config(1_000, 2)).await;
    for i in 0..200 {
        a.service.enter("C1", &format!("U{}", i)).await.unwrap();
    }

    let mut admitted = Vec::new();
    for _ in 0..3 {
        let (left, right) = tokio::join!(
            a.scheduler.promote_resource("C1"),
            b.scheduler.promote_resource("C1")
        );
        admitted.extend(left.unwrap());
        admitted.extend(right.unwrap());
    }

    let users: HashSet<_> = admitted.iter().map(|t| t.user_id.clone()).collect();
    assert_eq!(admitted.len(), 200);
    assert_eq!(users.len(), 200);
    assert_eq!(a.store.wait_size("C1").await.unwrap(), 0);
    assert_eq!(b.store.active_size("C1", START).await.unwrap(), 200);
}

#[tokio::test]
async fn test_capacity_holds_across_instances() {
    let (a, b) = two_instances(config(10, 2)).await;
    for i in 0..50 {
        b.service.enter("C1", &format!("U{}", i)).await.unwrap();
    }

    let mut admitted = 0;
    for _ in 0..3 {
        let (left, right) = tokio::join!(
            a.scheduler.promote_resource("C1"),
            b.scheduler.promote_resource("C1")
        );
        admitted += left.unwrap().len() + right.unwrap().len();
    }

    assert_eq!(admitted, 10);
    assert_eq!(a.store.active_size("C1", START).await.unwrap(), 10);
    assert_eq!(a.store.wait_size("C1").await.unwrap(), 40);
}

/// max_extension_count holds under concurrent Extend from both instances
#[tokio::test]
async fn test_concurrent_extends_respect_limit() {
    let (a, b) = two_instances(config(10, 2)).await;
    a.service.enter("C1", "U1").await.unwrap();
    a.scheduler.promote_resource("C1").await.unwrap();
    a.service.activate("C1", "U1").await.unwrap();

    let calls = (0..10).map(|i| {
        let service = if i % 2 == 0 {
            a.service.clone()
        } else {
            b.service.clone()
        };
        async move { service.extend("C1", "U1").await }
    });
    let results = join_all(calls).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            matches!(
                err,
                AppError::Domain(DomainError::ExtensionLimitExceeded { max: 2, .. })
            ),
            "unexpected extend failure: {:?}",
            err
        );
    }
    let status = b.service.status("C1", "U1").await.unwrap();
    assert_eq!(status.status, QueueStatus::Active);
    assert_eq!(status.extend_count, Some(2));
}
