// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the coordination layer

use crate::id::TaskId;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by locks, queues and the task scheduler
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordError {
    #[error("timed out after {waited:?} waiting for {resource}")]
    LockTimeout { resource: String, waited: Duration },
    #[error("{holder} does not own {resource}")]
    InvalidRelease { resource: String, holder: String },
    #[error("no lock registered for {resource}")]
    NotFound { resource: String },
    #[error("{task_id} failed: {message}")]
    TaskError { task_id: TaskId, message: String },
    #[error("timed out after {waited:?} waiting for {task_id}")]
    TaskWaitTimeout { task_id: TaskId, waited: Duration },
    #[error("task scheduler is shut down")]
    SchedulerShutdown,
    #[error("queue integrity violated: {0}")]
    QueueIntegrity(String),
}

impl CoordError {
    /// True for either kind of bounded-wait expiry
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            CoordError::LockTimeout { .. } | CoordError::TaskWaitTimeout { .. }
        )
    }
}

pub type Result<T, E = CoordError> = std::result::Result<T, E>;
