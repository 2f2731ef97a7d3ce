// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! FIFO waiter queue shared by mutexes and match locks
//!
//! Each waiter is identified by the grant token it minted when it started
//! waiting. Handing off ownership pops the oldest live waiter and completes
//! its wake channel; the woken task resumes on its own, never inside the
//! releasing call.

use crate::error::CoordError;
use crate::id::{GrantToken, HolderId};
use std::collections::VecDeque;
use tokio::sync::oneshot;

/// Receiving side of a waiter's wake signal
pub type WakeReceiver = oneshot::Receiver<()>;

#[derive(Debug)]
struct Waiter {
    token: GrantToken,
    holder: HolderId,
    wake: oneshot::Sender<()>,
}

/// Ordered list of pending acquirers for one resource
#[derive(Debug, Default)]
pub struct WaitQueue {
    waiters: VecDeque<Waiter>,
}

impl WaitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a waiter and return the receiver it should suspend on
    pub fn push(&mut self, token: GrantToken, holder: HolderId) -> Result<WakeReceiver, CoordError> {
        let duplicate = self.contains(token);
        debug_assert!(!duplicate, "waiter {:?} enqueued twice", token);
        if duplicate {
            return Err(CoordError::QueueIntegrity(format!(
                "waiter {} for {} enqueued twice",
                token.0, holder
            )));
        }
        let (wake, rx) = oneshot::channel();
        self.waiters.push_back(Waiter {
            token,
            holder,
            wake,
        });
        Ok(rx)
    }

    /// Remove a waiter by token. Returns false if it was not queued.
    pub fn remove(&mut self, token: GrantToken) -> bool {
        match self.waiters.iter().position(|w| w.token == token) {
            Some(pos) => {
                self.waiters.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Pop waiters until one accepts the wake signal.
    ///
    /// Waiters whose receiver is already gone are discarded. Returns the new
    /// owner's token and identity, or `None` if nobody was left to wake.
    pub fn hand_off(&mut self) -> Option<(GrantToken, HolderId)> {
        while let Some(waiter) = self.waiters.pop_front() {
            if waiter.wake.send(()).is_ok() {
                return Some((waiter.token, waiter.holder));
            }
        }
        None
    }

    pub fn contains(&self, token: GrantToken) -> bool {
        self.waiters.iter().any(|w| w.token == token)
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    /// Holders in queue order
    pub fn holders(&self) -> impl Iterator<Item = &HolderId> {
        self.waiters.iter().map(|w| &w.holder)
    }
}

/// A lock table that can withdraw a waiter whose acquire was abandoned
pub(crate) trait GrantTable {
    /// Withdraw a waiter. Returns true if it had already been granted the lock.
    fn abandon(&self, key: &str, token: GrantToken) -> bool;

    /// Give up a grant that arrived after its acquirer stopped listening
    fn release_abandoned(&self, key: &str, token: GrantToken, holder: &HolderId);
}

/// Withdraws a queued acquire whose future is dropped before completing.
///
/// Armed while the acquirer is suspended. If it is still armed on drop the
/// waiter is removed, and a grant that already reached it is passed on
/// rather than leaked.
pub(crate) struct PendingAcquire<'a, T: GrantTable> {
    table: &'a T,
    key: &'a str,
    token: GrantToken,
    holder: HolderId,
    armed: bool,
}

impl<'a, T: GrantTable> PendingAcquire<'a, T> {
    pub(crate) fn new(table: &'a T, key: &'a str, token: GrantToken, holder: HolderId) -> Self {
        Self {
            table,
            key,
            token,
            holder,
            armed: true,
        }
    }

    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<T: GrantTable> Drop for PendingAcquire<'_, T> {
    fn drop(&mut self) {
        if self.armed && self.table.abandon(self.key, self.token) {
            self.table
                .release_abandoned(self.key, self.token, &self.holder);
        }
    }
}

#[cfg(test)]
#[path = "waiters_tests.rs"]
mod tests;
