// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator: the single owner of all coordination state
//!
//! Mutexes, match locks, turn queues, the worker pool and the cleanup
//! supervisor all live inside one `Coordinator`. Nothing is global, so
//! independent instances (per test, per shard) can run side by side.

use super::deadlock::detect_cycles;
use super::maintenance::{
    CleanupSupervisor, CoordinationStats, MaintenanceConfig, MaintenanceTask, SweepReport,
};
use super::match_lock::{MatchLockHandle, MatchLockManager};
use super::mutex::{MutexHandle, MutexRegistry};
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, CoordinatorConfig};
use crate::error::Result;
use crate::id::HolderId;
use crate::scheduler::{Priority, TaskHandle, TaskScheduler};
use crate::turn::TurnQueues;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Unified interface to the coordination layer
pub struct Coordinator<C: Clock + 'static = SystemClock> {
    config: CoordinatorConfig,
    mutexes: Arc<MutexRegistry>,
    match_locks: Arc<MatchLockManager<C>>,
    turns: Arc<TurnQueues>,
    scheduler: Arc<TaskScheduler>,
    supervisor: Mutex<Option<CleanupSupervisor>>,
}

impl Coordinator<SystemClock> {
    /// Build a coordinator and start its worker pool.
    ///
    /// Must be called inside a tokio runtime. The cleanup supervisor is not
    /// started; call `start_cleanup` for that.
    pub fn start(config: CoordinatorConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock + 'static> Coordinator<C> {
    pub fn with_clock(config: CoordinatorConfig, clock: C) -> Result<Self, ConfigError> {
        config.validate()?;
        let coordinator = Self {
            mutexes: Arc::new(MutexRegistry::new()),
            match_locks: Arc::new(MatchLockManager::from_config(&config, clock)),
            turns: Arc::new(TurnQueues::new()),
            scheduler: Arc::new(TaskScheduler::start(config.max_workers)),
            supervisor: Mutex::new(None),
            config,
        };
        info!(max_workers = coordinator.config.max_workers, "coordinator started");
        Ok(coordinator)
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    // === Mutex Operations ===

    pub async fn acquire_mutex(
        &self,
        resource_id: &str,
        holder: impl Into<HolderId>,
        timeout: Duration,
    ) -> Result<MutexHandle> {
        self.mutexes.acquire(resource_id, holder.into(), timeout).await
    }

    pub fn release_mutex(&self, handle: &MutexHandle) -> Result<()> {
        self.mutexes.release(handle)
    }

    pub fn mutexes(&self) -> &MutexRegistry {
        &self.mutexes
    }

    // === Match Lock Operations ===

    pub async fn acquire_match_lock(
        &self,
        match_id: &str,
        owner: impl Into<HolderId>,
        timeout: Duration,
    ) -> Result<MatchLockHandle> {
        self.match_locks.acquire(match_id, owner.into(), timeout).await
    }

    pub fn release_match_lock(&self, handle: &MatchLockHandle) -> Result<()> {
        self.match_locks.release(handle)
    }

    pub fn match_locks(&self) -> &MatchLockManager<C> {
        &self.match_locks
    }

    // === Task Operations ===

    pub fn submit_task<F, T, E>(&self, priority: Priority, work: F) -> TaskHandle<T>
    where
        F: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        self.scheduler.submit(priority, work)
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    // === Turn Operations ===

    pub fn enqueue_turn(&self, match_id: &str, participant_id: &str) -> usize {
        self.turns.enqueue(match_id, participant_id)
    }

    pub fn dequeue_turn(&self, match_id: &str) -> Option<String> {
        self.turns.dequeue_next(match_id)
    }

    pub fn remove_from_turn(&self, match_id: &str, participant_id: &str) {
        self.turns.remove(match_id, participant_id)
    }

    pub fn turns(&self) -> &TurnQueues {
        &self.turns
    }

    // === Observability & Maintenance ===

    /// Current wait-for cycles among held mutexes
    pub fn detect_deadlocks(&self) -> Vec<Vec<String>> {
        detect_cycles(&self.mutexes.snapshot())
    }

    pub fn get_stats(&self) -> CoordinationStats {
        CoordinationStats::collect(&self.mutexes, &self.match_locks, &self.turns, &self.scheduler)
    }

    fn maintenance_task(&self, interval: Duration) -> MaintenanceTask<C> {
        MaintenanceTask::new(
            MaintenanceConfig::from_config(&self.config).with_interval(interval),
            self.mutexes.clone(),
            self.match_locks.clone(),
            self.turns.clone(),
            self.scheduler.clone(),
        )
    }

    /// Run one cleanup sweep now
    pub fn sweep(&self) -> SweepReport {
        self.maintenance_task(self.config.cleanup_interval).tick()
    }

    /// Start periodic cleanup. A no-op if it is already running.
    ///
    /// A zero interval falls back to the configured `cleanup_interval`.
    pub fn start_cleanup(&self, interval: Duration) {
        let mut supervisor = self.supervisor.lock().unwrap_or_else(|e| e.into_inner());
        if supervisor.is_some() {
            debug!("cleanup already running");
            return;
        }
        let interval = if interval.is_zero() {
            warn!(
                fallback = ?self.config.cleanup_interval,
                "zero cleanup interval, using configured interval"
            );
            self.config.cleanup_interval
        } else {
            interval
        };
        *supervisor = Some(CleanupSupervisor::spawn(self.maintenance_task(interval)));
    }

    pub fn is_cleanup_running(&self) -> bool {
        self.supervisor
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Stop periodic cleanup and wait for the sweep loop to exit
    pub async fn stop_cleanup(&self) {
        let supervisor = self
            .supervisor
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(supervisor) = supervisor {
            supervisor.stop().await;
        }
    }

    /// Stop cleanup and drain the worker pool
    pub async fn shutdown(&self) {
        self.stop_cleanup().await;
        self.scheduler.shutdown().await;
        info!("coordinator shut down");
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
