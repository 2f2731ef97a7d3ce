// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-match turn queues
//!
//! Fairness order among participants of a match. A participant appears at
//! most once per match; disconnects remove it from any position.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Default)]
pub struct TurnQueues {
    queues: Mutex<HashMap<String, VecDeque<String>>>,
}

impl TurnQueues {
    pub fn new() -> Self {
        Self::default()
    }

    fn queues(&self) -> MutexGuard<'_, HashMap<String, VecDeque<String>>> {
        self.queues.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a participant and return its 0-based position.
    ///
    /// Enqueueing someone already in line leaves the queue unchanged and
    /// returns their current position.
    pub fn enqueue(&self, match_id: &str, participant_id: &str) -> usize {
        let mut queues = self.queues();
        let queue = queues.entry(match_id.to_string()).or_default();
        if let Some(pos) = queue.iter().position(|p| p == participant_id) {
            return pos;
        }
        queue.push_back(participant_id.to_string());
        debug!(match_id, participant_id, position = queue.len() - 1, "turn enqueued");
        queue.len() - 1
    }

    /// Pop the participant at the front of the line
    pub fn dequeue_next(&self, match_id: &str) -> Option<String> {
        let mut queues = self.queues();
        let next = queues.get_mut(match_id)?.pop_front();
        if let Some(participant_id) = &next {
            debug!(match_id, participant_id = %participant_id, "turn dequeued");
        }
        next
    }

    /// Remove a participant from any position; no-op if absent
    pub fn remove(&self, match_id: &str, participant_id: &str) {
        let mut queues = self.queues();
        if let Some(queue) = queues.get_mut(match_id) {
            queue.retain(|p| p != participant_id);
        }
    }

    pub fn position(&self, match_id: &str, participant_id: &str) -> Option<usize> {
        self.queues()
            .get(match_id)?
            .iter()
            .position(|p| p == participant_id)
    }

    /// Participants currently waiting in a match
    pub fn len(&self, match_id: &str) -> usize {
        self.queues().get(match_id).map(VecDeque::len).unwrap_or(0)
    }

    /// Snapshot of a match's line, front first
    pub fn participants(&self, match_id: &str) -> Vec<String> {
        self.queues()
            .get(match_id)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of matches with a queue entry, empty or not
    pub fn queue_count(&self) -> usize {
        self.queues().len()
    }

    /// Delete queues that have drained. Returns how many were removed.
    pub fn prune_empty(&self) -> usize {
        let mut queues = self.queues();
        let before = queues.len();
        queues.retain(|_, q| !q.is_empty());
        before - queues.len()
    }
}

#[cfg(test)]
#[path = "turn_tests.rs"]
mod tests;
