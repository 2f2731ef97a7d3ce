// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch tiers
//!
//! Every `High` request is dispatched before any `Normal`, and every
//! `Normal` before any `Low`. Within a tier, submission order wins.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Scheduling precedence of a submitted task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Latency-sensitive work such as answer processing
    High,
    Normal,
    /// Background work such as periodic cleanup
    Low,
}

impl Priority {
    /// Tiers in dispatch order
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Normal, Priority::Low];

    fn index(self) -> usize {
        match self {
            Priority::High => 0,
            Priority::Normal => 1,
            Priority::Low => 2,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        };
        write!(f, "{}", name)
    }
}

/// One FIFO queue per tier
#[derive(Debug)]
pub struct TierQueues<T> {
    tiers: [VecDeque<T>; 3],
}

impl<T> Default for TierQueues<T> {
    fn default() -> Self {
        Self {
            tiers: [VecDeque::new(), VecDeque::new(), VecDeque::new()],
        }
    }
}

impl<T> TierQueues<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, priority: Priority, item: T) {
        self.tiers[priority.index()].push_back(item);
    }

    /// Oldest item of the highest non-empty tier
    pub fn pop_next(&mut self) -> Option<T> {
        self.tiers.iter_mut().find_map(VecDeque::pop_front)
    }

    pub fn len(&self) -> usize {
        self.tiers.iter().map(VecDeque::len).sum()
    }

    pub fn len_of(&self, priority: Priority) -> usize {
        self.tiers[priority.index()].len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.iter().all(VecDeque::is_empty)
    }

    /// Remove everything, highest tier first
    pub fn drain(&mut self) -> Vec<T> {
        self.tiers.iter_mut().flat_map(|q| q.drain(..)).collect()
    }
}

#[cfg(test)]
#[path = "priority_tests.rs"]
mod tests;
