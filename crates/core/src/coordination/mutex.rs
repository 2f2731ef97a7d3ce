// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named mutex registry
//!
//! Binary locks keyed by an opaque resource id (room membership lists, match
//! rosters, ...). An entry exists only while the resource is held: it is
//! created by the first acquire and removed when the last owner releases
//! with nobody waiting. Waiters are admitted strictly FIFO.
//!
//! Mutexes are not reentrant. A holder that acquires a resource it already
//! owns queues behind itself, which the deadlock detector reports as a
//! single-resource cycle.

use super::deadlock::WaitForSnapshot;
use super::waiters::{GrantTable, PendingAcquire, WaitQueue};
use crate::error::{CoordError, Result};
use crate::id::{GrantToken, HolderId, Sequence};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

/// Proof of ownership returned by a successful acquire
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutexHandle {
    resource: String,
    holder: HolderId,
    token: GrantToken,
}

impl MutexHandle {
    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn holder(&self) -> &HolderId {
        &self.holder
    }
}

#[derive(Debug)]
struct MutexEntry {
    owner: HolderId,
    token: GrantToken,
    waiters: WaitQueue,
}

/// Registry of all named mutexes owned by one coordinator
#[derive(Debug, Default)]
pub struct MutexRegistry {
    entries: Mutex<HashMap<String, MutexEntry>>,
    tokens: Sequence,
}

impl MutexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, MutexEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Acquire `resource` for `holder`, waiting at most `timeout`.
    ///
    /// Fails with `LockTimeout` if ownership was not granted in time; the
    /// waiter's queue entry is gone by the time the error is returned. A
    /// grant that lands exactly as the deadline fires is kept and returned.
    pub async fn acquire(
        &self,
        resource: &str,
        holder: HolderId,
        timeout: Duration,
    ) -> Result<MutexHandle> {
        let token = self.tokens.next_token();
        let handle = MutexHandle {
            resource: resource.to_string(),
            holder: holder.clone(),
            token,
        };

        let wake = {
            let mut entries = self.entries();
            match entries.get_mut(resource) {
                None => {
                    entries.insert(
                        resource.to_string(),
                        MutexEntry {
                            owner: holder,
                            token,
                            waiters: WaitQueue::new(),
                        },
                    );
                    debug!(resource, holder = %handle.holder, "mutex acquired");
                    return Ok(handle);
                }
                Some(entry) => {
                    let wake = entry.waiters.push(token, holder)?;
                    debug!(
                        resource,
                        holder = %handle.holder,
                        owner = %entry.owner,
                        position = entry.waiters.len() - 1,
                        "mutex busy, queued"
                    );
                    wake
                }
            }
        };

        let mut pending = PendingAcquire::new(self, resource, token, handle.holder.clone());
        let outcome = tokio::time::timeout(timeout, wake).await;
        pending.disarm();

        match outcome {
            Ok(Ok(())) => {
                debug!(resource, holder = %handle.holder, "mutex granted to waiter");
                Ok(handle)
            }
            Ok(Err(_)) => Err(CoordError::QueueIntegrity(format!(
                "waiter on {} dropped without a grant",
                resource
            ))),
            Err(_) => {
                if self.abandon(resource, token) {
                    debug!(resource, holder = %handle.holder, "mutex granted at deadline");
                    return Ok(handle);
                }
                debug!(resource, holder = %handle.holder, ?timeout, "mutex acquire timed out");
                Err(CoordError::LockTimeout {
                    resource: resource.to_string(),
                    waited: timeout,
                })
            }
        }
    }

    /// Release a held mutex.
    ///
    /// Ownership passes to the oldest waiter; with no waiters the entry is
    /// deleted. Only the handle of the current grant may release.
    pub fn release(&self, handle: &MutexHandle) -> Result<()> {
        self.release_grant(&handle.resource, &handle.holder, handle.token)
    }

    fn release_grant(&self, resource: &str, holder: &HolderId, token: GrantToken) -> Result<()> {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(resource) else {
            return Err(CoordError::NotFound {
                resource: resource.to_string(),
            });
        };

        if entry.token != token {
            warn!(resource, holder = %holder, owner = %entry.owner, "release by non-owner");
            return Err(CoordError::InvalidRelease {
                resource: resource.to_string(),
                holder: holder.to_string(),
            });
        }

        match entry.waiters.hand_off() {
            Some((next_token, next)) => {
                debug!(resource, from = %holder, to = %next, "mutex handed off");
                entry.owner = next;
                entry.token = next_token;
            }
            None => {
                entries.remove(resource);
                debug!(resource, holder = %holder, "mutex released");
            }
        }
        Ok(())
    }

    /// Current owner of a resource
    pub fn owner(&self, resource: &str) -> Option<HolderId> {
        self.entries().get(resource).map(|e| e.owner.clone())
    }

    pub fn is_held(&self, resource: &str) -> bool {
        self.entries().contains_key(resource)
    }

    /// Number of acquirers queued behind the owner
    pub fn waiter_count(&self, resource: &str) -> usize {
        self.entries()
            .get(resource)
            .map(|e| e.waiters.len())
            .unwrap_or(0)
    }

    /// Queued holders, oldest first
    pub fn waiters(&self, resource: &str) -> Vec<HolderId> {
        self.entries()
            .get(resource)
            .map(|e| e.waiters.holders().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of held mutexes
    pub fn active_count(&self) -> usize {
        self.entries().len()
    }

    /// Point-in-time ownership and wait relationships for deadlock detection
    pub fn snapshot(&self) -> WaitForSnapshot {
        let entries = self.entries();
        let mut snapshot = WaitForSnapshot::default();
        for (resource, entry) in entries.iter() {
            snapshot.hold(resource, entry.owner.clone());
            for waiter in entry.waiters.holders() {
                snapshot.wait(waiter.clone(), resource);
            }
        }
        snapshot
    }
}

impl GrantTable for MutexRegistry {
    fn abandon(&self, resource: &str, token: GrantToken) -> bool {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(resource) else {
            return false;
        };
        if entry.token == token {
            return true;
        }
        entry.waiters.remove(token);
        false
    }

    fn release_abandoned(&self, resource: &str, token: GrantToken, holder: &HolderId) {
        if let Err(e) = self.release_grant(resource, holder, token) {
            warn!(resource, holder = %holder, error = %e, "failed to pass on abandoned grant");
        }
    }
}

#[cfg(test)]
#[path = "mutex_tests.rs"]
mod tests;
