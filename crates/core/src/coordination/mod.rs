// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordination primitives for shared match state
//!
//! This module provides:
//! - **MutexRegistry** - Named binary locks with FIFO waiters and bounded waits
//! - **MatchLockManager** - Per-match advisory locks with stale-holder reclaim
//! - **Deadlock detection** - Cycle search over the mutex wait-for graph
//! - **Maintenance** - Periodic TTL sweeps, queue pruning and stats
//! - **Coordinator** - Unified interface owning all of the above

pub mod deadlock;
pub mod maintenance;
pub mod manager;
pub mod match_lock;
pub mod mutex;
pub mod waiters;

pub use deadlock::{detect_cycles, WaitForSnapshot};
pub use maintenance::{
    CleanupSupervisor, CoordinationStats, MaintenanceConfig, MaintenanceTask, SweepReport,
};
pub use manager::Coordinator;
pub use match_lock::{LockExpiry, MatchLockHandle, MatchLockManager};
pub use mutex::{MutexHandle, MutexRegistry};
pub use waiters::WaitQueue;
