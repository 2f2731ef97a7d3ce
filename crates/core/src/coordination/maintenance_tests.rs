// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::FakeClock;
use crate::id::HolderId;
use crate::scheduler::Priority;
use crate::test_support::wait_until;

const LONG: Duration = Duration::from_secs(5);

struct Parts {
    clock: FakeClock,
    mutexes: Arc<MutexRegistry>,
    match_locks: Arc<MatchLockManager<FakeClock>>,
    turns: Arc<TurnQueues>,
    scheduler: Arc<TaskScheduler>,
}

impl Parts {
    fn new(workers: usize) -> Self {
        let clock = FakeClock::new();
        Self {
            match_locks: Arc::new(MatchLockManager::new(
                clock.clone(),
                Duration::from_secs(10),
                Duration::from_millis(5),
            )),
            clock,
            mutexes: Arc::new(MutexRegistry::new()),
            turns: Arc::new(TurnQueues::new()),
            scheduler: Arc::new(TaskScheduler::start(workers)),
        }
    }

    fn task(&self, config: MaintenanceConfig) -> MaintenanceTask<FakeClock> {
        MaintenanceTask::new(
            config,
            self.mutexes.clone(),
            self.match_locks.clone(),
            self.turns.clone(),
            self.scheduler.clone(),
        )
    }
}

#[test]
fn maintenance_config_default() {
    let config = MaintenanceConfig::default();
    assert_eq!(config.interval, Duration::from_secs(10));
    assert_eq!(config.lock_ttl, Duration::from_secs(30));
}

#[test]
fn maintenance_config_builder() {
    let config = MaintenanceConfig::new()
        .with_interval(Duration::from_secs(60))
        .with_lock_ttl(Duration::from_secs(90));

    assert_eq!(config.interval, Duration::from_secs(60));
    assert_eq!(config.lock_ttl, Duration::from_secs(90));
}

#[test]
fn maintenance_config_follows_coordinator_config() {
    let config = MaintenanceConfig::from_config(
        &CoordinatorConfig::default()
            .with_cleanup_interval(Duration::from_secs(3))
            .with_match_lock_ttl(Duration::from_secs(45)),
    );
    assert_eq!(config.interval, Duration::from_secs(3));
    assert_eq!(config.lock_ttl, Duration::from_secs(45));
}

#[tokio::test]
async fn tick_expires_old_locks_and_prunes_queues() {
    let parts = Parts::new(1);
    let task = parts.task(MaintenanceConfig::default());

    let _old = parts
        .match_locks
        .acquire("old", HolderId::new("host"), LONG)
        .await
        .unwrap();
    parts.turns.enqueue("drained", "alice");
    parts.turns.dequeue_next("drained");
    parts.turns.enqueue("busy", "bob");

    // Not yet past the TTL
    parts.clock.advance(Duration::from_secs(20));
    let report = task.tick();
    assert!(report.expired.removed.is_empty());
    assert_eq!(report.pruned_queues, 1);

    parts.clock.advance(Duration::from_secs(11));
    let report = task.tick();
    assert_eq!(report.expired.removed, vec!["old".to_string()]);
    assert_eq!(report.pruned_queues, 0);
    assert!(report.deadlocks.is_empty());
    assert_eq!(parts.match_locks.active_count(), 0);
    assert_eq!(parts.turns.queue_count(), 1);
}

#[tokio::test]
async fn tick_reports_deadlocks() {
    let parts = Parts::new(1);
    let task = parts.task(MaintenanceConfig::default());

    let _r1 = parts.mutexes.acquire("r1", HolderId::new("x"), LONG).await.unwrap();
    let _r2 = parts.mutexes.acquire("r2", HolderId::new("y"), LONG).await.unwrap();
    let waits: Vec<_> = [("x", "r2"), ("y", "r1")]
        .into_iter()
        .map(|(holder, resource)| {
            let mutexes = parts.mutexes.clone();
            tokio::spawn(async move { mutexes.acquire(resource, HolderId::new(holder), LONG).await })
        })
        .collect();
    wait_until(|| parts.mutexes.waiter_count("r1") == 1 && parts.mutexes.waiter_count("r2") == 1)
        .await;

    let report = task.tick();
    assert_eq!(report.deadlocks, vec![vec!["r1".to_string(), "r2".to_string()]]);
    assert_eq!(report.stats.deadlocks, 1);
    assert_eq!(report.stats.active_mutexes, 2);
    assert_eq!(task.stats().deadlocks, 1);

    for wait in waits {
        wait.abort();
    }
}

#[tokio::test]
async fn stats_report_utilization_and_counts() {
    let parts = Parts::new(4);
    let gate = Arc::new(tokio::sync::Semaphore::new(0));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let gate = gate.clone();
            parts.scheduler.submit(Priority::Normal, async move {
                gate.acquire().await.map(|_| ()).map_err(|e| e.to_string())
            })
        })
        .collect();
    let _m = parts.mutexes.acquire("room_1", HolderId::new("a"), LONG).await.unwrap();
    let _l = parts
        .match_locks
        .acquire("match_1", HolderId::new("a"), LONG)
        .await
        .unwrap();
    parts.turns.enqueue("match_1", "a");

    let stats = parts.task(MaintenanceConfig::default()).stats();
    assert_eq!(stats.active_workers, 2);
    assert_eq!(stats.max_workers, 4);
    assert_eq!(stats.utilization_percent, 50.0);
    assert_eq!(stats.active_mutexes, 1);
    assert_eq!(stats.active_match_locks, 1);
    assert_eq!(stats.queued_tasks, 0);
    assert_eq!(stats.turn_queues, 1);

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["utilization_percent"], 50.0);

    gate.add_permits(2);
    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test]
async fn supervisor_sweeps_on_interval_until_stopped() {
    let parts = Parts::new(1);
    let _old = parts
        .match_locks
        .acquire("old", HolderId::new("host"), LONG)
        .await
        .unwrap();
    parts.clock.advance(Duration::from_secs(31));

    let supervisor = CleanupSupervisor::spawn(
        parts.task(MaintenanceConfig::new().with_interval(Duration::from_millis(10))),
    );
    wait_until(|| parts.match_locks.active_count() == 0).await;
    supervisor.stop().await;

    // Nothing sweeps after stop
    let _fresh = parts
        .match_locks
        .acquire("fresh", HolderId::new("host"), LONG)
        .await
        .unwrap();
    parts.clock.advance(Duration::from_secs(31));
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(parts.match_locks.active_count(), 1);
}

#[tokio::test]
async fn supervisor_with_zero_interval_keeps_running() {
    let parts = Parts::new(1);
    let supervisor =
        CleanupSupervisor::spawn(parts.task(MaintenanceConfig::new().with_interval(Duration::ZERO)));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!supervisor.join.is_finished());
    supervisor.stop().await;
}
