// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Priority task scheduler
//!
//! - **Priority** - Dispatch tiers and the tiered FIFO queue
//! - **TaskScheduler** - Fixed worker pool fed from the tiers

pub mod pool;
pub mod priority;

pub use pool::{TaskHandle, TaskScheduler};
pub use priority::{Priority, TierQueues};
