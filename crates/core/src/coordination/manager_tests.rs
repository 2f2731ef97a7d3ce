// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::FakeClock;
use crate::error::CoordError;
use crate::test_support::wait_until;

const LONG: Duration = Duration::from_secs(5);

fn coordinator() -> (Coordinator<FakeClock>, FakeClock) {
    let clock = FakeClock::new();
    let config = CoordinatorConfig::default()
        .with_max_workers(2)
        .with_reclaim_poll_interval(Duration::from_millis(5));
    (Coordinator::with_clock(config, clock.clone()).unwrap(), clock)
}

#[tokio::test]
async fn start_rejects_invalid_config() {
    let result = Coordinator::start(CoordinatorConfig::default().with_max_workers(0));
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[tokio::test]
async fn new_coordinator_is_idle() {
    let (coordinator, _) = coordinator();
    let stats = coordinator.get_stats();

    assert_eq!(stats.max_workers, 2);
    assert_eq!(stats.active_workers, 0);
    assert_eq!(stats.utilization_percent, 0.0);
    assert_eq!(stats.active_mutexes, 0);
    assert_eq!(stats.active_match_locks, 0);
    assert_eq!(stats.queued_tasks, 0);
    assert!(!coordinator.is_cleanup_running());
}

#[tokio::test]
async fn mutex_round_trip_through_coordinator() {
    let (coordinator, _) = coordinator();

    let handle = coordinator.acquire_mutex("room_5", "a", LONG).await.unwrap();
    assert_eq!(coordinator.get_stats().active_mutexes, 1);
    coordinator.release_mutex(&handle).unwrap();
    assert_eq!(coordinator.get_stats().active_mutexes, 0);
}

#[tokio::test]
async fn match_lock_round_trip_through_coordinator() {
    let (coordinator, clock) = coordinator();

    let stale = coordinator.acquire_match_lock("m1", "host", LONG).await.unwrap();
    clock.advance(Duration::from_secs(11));
    let fresh = coordinator
        .acquire_match_lock("m1", "guest", Duration::from_millis(100))
        .await
        .unwrap();

    assert!(matches!(
        coordinator.release_match_lock(&stale),
        Err(CoordError::InvalidRelease { .. })
    ));
    coordinator.release_match_lock(&fresh).unwrap();
    assert_eq!(coordinator.get_stats().active_match_locks, 0);
}

#[tokio::test]
async fn turn_operations_delegate() {
    let (coordinator, _) = coordinator();

    assert_eq!(coordinator.enqueue_turn("m1", "alice"), 0);
    assert_eq!(coordinator.enqueue_turn("m1", "bob"), 1);
    coordinator.remove_from_turn("m1", "alice");
    assert_eq!(coordinator.dequeue_turn("m1"), Some("bob".to_string()));
    assert_eq!(coordinator.dequeue_turn("m1"), None);
}

#[tokio::test]
async fn submit_task_runs_on_pool() {
    let (coordinator, _) = coordinator();
    let handle = coordinator.submit_task(Priority::High, async { Ok::<_, String>(41 + 1) });
    assert_eq!(handle.await.unwrap(), 42);
}

#[tokio::test]
async fn sweep_uses_configured_ttl() {
    let (coordinator, clock) = coordinator();
    let _handle = coordinator.acquire_match_lock("m1", "host", LONG).await.unwrap();

    clock.advance(Duration::from_secs(29));
    assert!(coordinator.sweep().expired.removed.is_empty());

    clock.advance(Duration::from_secs(2));
    assert_eq!(coordinator.sweep().expired.removed, vec!["m1".to_string()]);
}

#[tokio::test]
async fn cleanup_start_is_idempotent_and_stop_is_safe() {
    let (coordinator, clock) = coordinator();
    coordinator.stop_cleanup().await;

    coordinator.start_cleanup(Duration::from_millis(10));
    coordinator.start_cleanup(Duration::from_millis(10));
    assert!(coordinator.is_cleanup_running());

    let _handle = coordinator.acquire_match_lock("m1", "host", LONG).await.unwrap();
    clock.advance(Duration::from_secs(31));
    wait_until(|| coordinator.get_stats().active_match_locks == 0).await;

    coordinator.stop_cleanup().await;
    assert!(!coordinator.is_cleanup_running());
    coordinator.stop_cleanup().await;
}

#[tokio::test]
async fn shutdown_stops_cleanup_and_pool() {
    let (coordinator, _) = coordinator();
    coordinator.start_cleanup(Duration::from_millis(10));

    coordinator.shutdown().await;

    assert!(!coordinator.is_cleanup_running());
    let late = coordinator.submit_task(Priority::Low, async { Ok::<_, String>(()) });
    assert_eq!(late.await.unwrap_err(), CoordError::SchedulerShutdown);
}

#[tokio::test]
async fn zero_cleanup_interval_uses_configured_interval() {
    let clock = FakeClock::new();
    let config = CoordinatorConfig::default()
        .with_max_workers(1)
        .with_cleanup_interval(Duration::from_millis(10));
    let coordinator = Coordinator::with_clock(config, clock.clone()).unwrap();

    coordinator.start_cleanup(Duration::ZERO);
    assert!(coordinator.is_cleanup_running());

    // The supervisor is alive and sweeping
    let _handle = coordinator.acquire_match_lock("m1", "host", LONG).await.unwrap();
    clock.advance(Duration::from_secs(31));
    wait_until(|| coordinator.get_stats().active_match_locks == 0).await;

    coordinator.stop_cleanup().await;
}
