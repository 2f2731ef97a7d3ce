// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifiers for lock holders, grants and tasks

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a participant or job that owns (or waits for) a lock
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HolderId(pub String);

impl HolderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HolderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for HolderId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for HolderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Unique token minted for every acquire attempt.
///
/// A handle is only valid while its token matches the grant recorded for
/// the resource, so a handle kept past a forced reclaim can never release
/// somebody else's ownership.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GrantToken(pub u64);

/// Identifier of a submitted task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Monotonic counter shared by one manager instance
#[derive(Debug)]
pub struct Sequence {
    counter: AtomicU64,
}

impl Sequence {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    pub fn next_token(&self) -> GrantToken {
        GrantToken(self.next())
    }

    pub fn next_task(&self) -> TaskId {
        TaskId(self.next())
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}
