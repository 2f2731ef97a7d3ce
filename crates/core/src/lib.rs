// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! arbiter-core: resource coordination for a match session server
//!
//! This crate provides:
//! - Named mutexes and per-match advisory locks with FIFO waiters
//! - A priority-tiered task scheduler over a fixed worker pool
//! - Per-match turn queues
//! - Deadlock detection and periodic cleanup
//!
//! Everything is owned by one explicit [`Coordinator`]; state is in memory
//! only.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod clock;
pub mod config;
pub mod coordination;
pub mod error;
pub mod id;
pub mod scheduler;
pub mod turn;

#[cfg(test)]
mod test_support;

// Re-exports
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, CoordinatorConfig};
pub use coordination::{
    CoordinationStats, Coordinator, MatchLockHandle, MatchLockManager, MutexHandle,
    MutexRegistry, SweepReport,
};
pub use error::{CoordError, Result};
pub use id::{HolderId, TaskId};
pub use scheduler::{Priority, TaskHandle, TaskScheduler};
pub use turn::TurnQueues;
