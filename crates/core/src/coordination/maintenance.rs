// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic cleanup for coordination state
//!
//! Each sweep expires match locks past their TTL, prunes drained turn
//! queues, scans for deadlocks, and logs a stats snapshot. The supervisor
//! only observes and reaps; it never aborts a deadlocked holder.

use super::deadlock::detect_cycles;
use super::match_lock::{LockExpiry, MatchLockManager};
use super::mutex::MutexRegistry;
use crate::clock::Clock;
use crate::config::CoordinatorConfig;
use crate::scheduler::TaskScheduler;
use crate::turn::TurnQueues;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Configuration for the cleanup supervisor
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaintenanceConfig {
    /// How often to sweep
    pub interval: Duration,
    /// Absolute age after which a match lock is removed
    pub lock_ttl: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            lock_ttl: Duration::from_secs(30),
        }
    }
}

impl MaintenanceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &CoordinatorConfig) -> Self {
        Self {
            interval: config.cleanup_interval,
            lock_ttl: config.match_lock_ttl,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }
}

/// What one sweep did
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SweepReport {
    pub expired: LockExpiry,
    pub pruned_queues: usize,
    pub deadlocks: Vec<Vec<String>>,
    /// Load after the sweep
    pub stats: CoordinationStats,
}

/// Snapshot of coordination load
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinationStats {
    pub active_workers: usize,
    pub max_workers: usize,
    pub utilization_percent: f64,
    pub active_mutexes: usize,
    pub active_match_locks: usize,
    pub queued_tasks: usize,
    pub turn_queues: usize,
    pub deadlocks: usize,
}

impl CoordinationStats {
    /// Collect statistics from the registries of one coordinator
    pub fn collect<C: Clock>(
        mutexes: &MutexRegistry,
        match_locks: &MatchLockManager<C>,
        turns: &TurnQueues,
        scheduler: &TaskScheduler,
    ) -> Self {
        let deadlocks = detect_cycles(&mutexes.snapshot()).len();
        Self::with_deadlocks(mutexes, match_locks, turns, scheduler, deadlocks)
    }

    /// Like `collect`, with the cycle count already known
    fn with_deadlocks<C: Clock>(
        mutexes: &MutexRegistry,
        match_locks: &MatchLockManager<C>,
        turns: &TurnQueues,
        scheduler: &TaskScheduler,
        deadlocks: usize,
    ) -> Self {
        let active_workers = scheduler.busy_workers();
        let max_workers = scheduler.max_workers();
        let utilization_percent = if max_workers == 0 {
            0.0
        } else {
            active_workers as f64 * 100.0 / max_workers as f64
        };

        Self {
            active_workers,
            max_workers,
            utilization_percent,
            active_mutexes: mutexes.active_count(),
            active_match_locks: match_locks.active_count(),
            queued_tasks: scheduler.queued(),
            turn_queues: turns.queue_count(),
            deadlocks,
        }
    }
}

/// One cleanup pass over a coordinator's registries
pub struct MaintenanceTask<C: Clock> {
    config: MaintenanceConfig,
    mutexes: Arc<MutexRegistry>,
    match_locks: Arc<MatchLockManager<C>>,
    turns: Arc<TurnQueues>,
    scheduler: Arc<TaskScheduler>,
}

impl<C: Clock> MaintenanceTask<C> {
    pub fn new(
        config: MaintenanceConfig,
        mutexes: Arc<MutexRegistry>,
        match_locks: Arc<MatchLockManager<C>>,
        turns: Arc<TurnQueues>,
        scheduler: Arc<TaskScheduler>,
    ) -> Self {
        Self {
            config,
            mutexes,
            match_locks,
            turns,
            scheduler,
        }
    }

    /// Run a single sweep
    pub fn tick(&self) -> SweepReport {
        let expired = self.match_locks.expire(self.config.lock_ttl);
        let pruned_queues = self.turns.prune_empty();
        let deadlocks = detect_cycles(&self.mutexes.snapshot());

        for cycle in &deadlocks {
            warn!(cycle = ?cycle, "deadlock detected");
        }
        if !expired.removed.is_empty() || !expired.handed_off.is_empty() || pruned_queues > 0 {
            info!(
                removed = expired.removed.len(),
                handed_off = expired.handed_off.len(),
                pruned_queues,
                "cleanup sweep"
            );
        }

        let stats = CoordinationStats::with_deadlocks(
            &self.mutexes,
            &self.match_locks,
            &self.turns,
            &self.scheduler,
            deadlocks.len(),
        );
        debug!(
            active_workers = stats.active_workers,
            max_workers = stats.max_workers,
            utilization = stats.utilization_percent,
            mutexes = stats.active_mutexes,
            match_locks = stats.active_match_locks,
            queued_tasks = stats.queued_tasks,
            "coordination stats"
        );

        SweepReport {
            expired,
            pruned_queues,
            deadlocks,
            stats,
        }
    }

    pub fn stats(&self) -> CoordinationStats {
        CoordinationStats::collect(&self.mutexes, &self.match_locks, &self.turns, &self.scheduler)
    }

    /// Get the sweep interval
    pub fn interval(&self) -> Duration {
        self.config.interval
    }
}

/// Background task running `MaintenanceTask::tick` on its interval
#[derive(Debug)]
pub struct CleanupSupervisor {
    stop: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl CleanupSupervisor {
    pub fn spawn<C: Clock + 'static>(task: MaintenanceTask<C>) -> Self {
        let mut period = task.interval();
        if period.is_zero() {
            period = MaintenanceConfig::default().interval;
            warn!(fallback = ?period, "zero sweep interval, using default");
        }
        let (stop, mut stopped) = oneshot::channel();
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            info!(interval = ?period, "cleanup supervisor started");

            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {
                        task.tick();
                    }
                }
            }
            info!("cleanup supervisor stopped");
        });
        Self { stop, join }
    }

    /// Stop the loop and wait for it to exit
    pub async fn stop(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.join.await {
            warn!(error = %e, "cleanup supervisor exited abnormally");
        }
    }
}

#[cfg(test)]
#[path = "maintenance_tests.rs"]
mod tests;
