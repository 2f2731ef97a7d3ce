// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-match advisory ownership lock with stale-holder reclamation
//!
//! Same acquire/release contract as the mutex registry, keyed by match id.
//! While anyone is queued, a holder older than the staleness threshold is
//! displaced and the lock goes to the oldest waiter. The displaced holder is
//! not told; its handle simply stops validating, so callers must check
//! `is_owner` before committing or make their mutations idempotent.

use super::waiters::{GrantTable, PendingAcquire, WaitQueue};
use crate::clock::Clock;
use crate::config::CoordinatorConfig;
use crate::error::{CoordError, Result};
use crate::id::{GrantToken, HolderId, Sequence};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Proof of match ownership returned by a successful acquire
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchLockHandle {
    match_id: String,
    owner: HolderId,
    token: GrantToken,
}

impl MatchLockHandle {
    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    pub fn owner(&self) -> &HolderId {
        &self.owner
    }
}

#[derive(Debug)]
struct MatchLockEntry {
    owner: HolderId,
    token: GrantToken,
    acquired_at: Instant,
    waiters: WaitQueue,
}

impl MatchLockEntry {
    /// Give the lock to the oldest live waiter, restarting its age
    fn hand_off(&mut self, now: Instant) -> Option<HolderId> {
        let (token, next) = self.waiters.hand_off()?;
        let previous = std::mem::replace(&mut self.owner, next.clone());
        self.token = token;
        self.acquired_at = now;
        Some(previous)
    }
}

/// Outcome of a TTL sweep
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LockExpiry {
    /// Locks deleted because nobody was waiting
    pub removed: Vec<String>,
    /// Locks passed to a waiter instead of deleted
    pub handed_off: Vec<String>,
}

/// Match locks owned by one coordinator
#[derive(Debug)]
pub struct MatchLockManager<C: Clock> {
    entries: Mutex<HashMap<String, MatchLockEntry>>,
    tokens: Sequence,
    clock: C,
    stale_threshold: Duration,
    poll_interval: Duration,
}

impl<C: Clock> MatchLockManager<C> {
    pub fn new(clock: C, stale_threshold: Duration, poll_interval: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            tokens: Sequence::new(),
            clock,
            stale_threshold,
            poll_interval,
        }
    }

    pub fn from_config(config: &CoordinatorConfig, clock: C) -> Self {
        Self::new(clock, config.stale_threshold, config.reclaim_poll_interval)
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, MatchLockEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn stale_threshold(&self) -> Duration {
        self.stale_threshold
    }

    /// Acquire the lock for `match_id`, waiting at most `timeout`.
    ///
    /// While queued the waiter re-checks the holder's age every poll
    /// interval, so a crashed or hung holder is displaced without any help
    /// from the supervisor.
    pub async fn acquire(
        &self,
        match_id: &str,
        owner: HolderId,
        timeout: Duration,
    ) -> Result<MatchLockHandle> {
        let token = self.tokens.next_token();
        let handle = MatchLockHandle {
            match_id: match_id.to_string(),
            owner: owner.clone(),
            token,
        };

        let mut wake = {
            let now = self.clock.now();
            let mut entries = self.entries();
            match entries.get_mut(match_id) {
                None => {
                    entries.insert(
                        match_id.to_string(),
                        MatchLockEntry {
                            owner,
                            token,
                            acquired_at: now,
                            waiters: WaitQueue::new(),
                        },
                    );
                    debug!(match_id, owner = %handle.owner, "match lock acquired");
                    return Ok(handle);
                }
                Some(entry) => {
                    let wake = entry.waiters.push(token, owner)?;
                    debug!(
                        match_id,
                        owner = %handle.owner,
                        holder = %entry.owner,
                        "match lock busy, queued"
                    );
                    self.reclaim_entry(match_id, entry, now);
                    wake
                }
            }
        };

        let mut pending = PendingAcquire::new(self, match_id, token, handle.owner.clone());
        let deadline = deadline_after(timeout);
        let outcome = loop {
            let tick = deadline_after(self.poll_interval).min(deadline);
            tokio::select! {
                woken = &mut wake => break Some(woken),
                _ = tokio::time::sleep_until(tick) => {
                    if tick >= deadline {
                        break None;
                    }
                    self.reclaim_if_stale(match_id);
                }
            }
        };
        pending.disarm();

        match outcome {
            Some(Ok(())) => {
                debug!(match_id, owner = %handle.owner, "match lock granted to waiter");
                Ok(handle)
            }
            Some(Err(_)) => Err(CoordError::QueueIntegrity(format!(
                "waiter on match {} dropped without a grant",
                match_id
            ))),
            None => {
                if self.abandon(match_id, token) {
                    debug!(match_id, owner = %handle.owner, "match lock granted at deadline");
                    return Ok(handle);
                }
                debug!(match_id, owner = %handle.owner, ?timeout, "match lock acquire timed out");
                Err(CoordError::LockTimeout {
                    resource: match_id.to_string(),
                    waited: timeout,
                })
            }
        }
    }

    /// Release the lock. Fails with `InvalidRelease` if the handle's grant
    /// was reclaimed or already released and the match has a new owner.
    pub fn release(&self, handle: &MatchLockHandle) -> Result<()> {
        self.release_grant(&handle.match_id, &handle.owner, handle.token)
    }

    fn release_grant(&self, match_id: &str, owner: &HolderId, token: GrantToken) -> Result<()> {
        let now = self.clock.now();
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(match_id) else {
            return Err(CoordError::NotFound {
                resource: match_id.to_string(),
            });
        };

        if entry.token != token {
            warn!(match_id, owner = %owner, holder = %entry.owner, "match lock release by non-owner");
            return Err(CoordError::InvalidRelease {
                resource: match_id.to_string(),
                holder: owner.to_string(),
            });
        }

        if entry.hand_off(now).is_some() {
            debug!(match_id, from = %owner, to = %entry.owner, "match lock handed off");
        } else {
            entries.remove(match_id);
            debug!(match_id, owner = %owner, "match lock released");
        }
        Ok(())
    }

    /// Restart the holder's age (heartbeat)
    pub fn refresh(&self, handle: &MatchLockHandle) -> Result<()> {
        let now = self.clock.now();
        let mut entries = self.entries();
        match entries.get_mut(&handle.match_id) {
            Some(entry) if entry.token == handle.token => {
                entry.acquired_at = now;
                Ok(())
            }
            Some(_) => Err(CoordError::InvalidRelease {
                resource: handle.match_id.clone(),
                holder: handle.owner.to_string(),
            }),
            None => Err(CoordError::NotFound {
                resource: handle.match_id.clone(),
            }),
        }
    }

    /// True if `handle` still carries the current grant
    pub fn is_owner(&self, handle: &MatchLockHandle) -> bool {
        self.entries()
            .get(&handle.match_id)
            .is_some_and(|e| e.token == handle.token)
    }

    /// Displace a stale holder if someone is waiting.
    ///
    /// Returns the new owner when a reclaim happened.
    pub fn reclaim_if_stale(&self, match_id: &str) -> Option<HolderId> {
        let now = self.clock.now();
        let mut entries = self.entries();
        let entry = entries.get_mut(match_id)?;
        self.reclaim_entry(match_id, entry, now)
    }

    fn reclaim_entry(&self, match_id: &str, entry: &mut MatchLockEntry, now: Instant) -> Option<HolderId> {
        if entry.waiters.is_empty()
            || now.saturating_duration_since(entry.acquired_at) <= self.stale_threshold
        {
            return None;
        }
        let age = now.saturating_duration_since(entry.acquired_at);
        let previous = entry.hand_off(now)?;
        info!(
            match_id,
            previous = %previous,
            owner = %entry.owner,
            ?age,
            "reclaimed stale match lock"
        );
        Some(entry.owner.clone())
    }

    /// Drop locks held longer than `ttl`.
    ///
    /// A lock with waiters goes to the oldest waiter instead of vanishing,
    /// so nobody queued on it is stranded.
    pub fn expire(&self, ttl: Duration) -> LockExpiry {
        let now = self.clock.now();
        let mut entries = self.entries();
        let mut expiry = LockExpiry::default();

        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| now.saturating_duration_since(e.acquired_at) > ttl)
            .map(|(id, _)| id.clone())
            .collect();

        for match_id in expired {
            let Some(entry) = entries.get_mut(&match_id) else {
                continue;
            };
            let previous = entry.owner.clone();
            if entry.hand_off(now).is_some() {
                info!(match_id = %match_id, previous = %previous, owner = %entry.owner, "expired match lock handed off");
                expiry.handed_off.push(match_id);
            } else {
                entries.remove(&match_id);
                info!(match_id = %match_id, previous = %previous, "expired match lock removed");
                expiry.removed.push(match_id);
            }
        }
        expiry
    }

    /// Current holder of a match lock
    pub fn holder(&self, match_id: &str) -> Option<HolderId> {
        self.entries().get(match_id).map(|e| e.owner.clone())
    }

    /// How long the current holder has had the lock
    pub fn age(&self, match_id: &str) -> Option<Duration> {
        let now = self.clock.now();
        self.entries()
            .get(match_id)
            .map(|e| now.saturating_duration_since(e.acquired_at))
    }

    pub fn waiter_count(&self, match_id: &str) -> usize {
        self.entries()
            .get(match_id)
            .map(|e| e.waiters.len())
            .unwrap_or(0)
    }

    /// Number of held match locks
    pub fn active_count(&self) -> usize {
        self.entries().len()
    }
}

/// `now + wait`, clamped to roughly thirty years out like `tokio::time::timeout`
fn deadline_after(wait: Duration) -> tokio::time::Instant {
    let now = tokio::time::Instant::now();
    now.checked_add(wait)
        .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365 * 30))
}

impl<C: Clock> GrantTable for MatchLockManager<C> {
    fn abandon(&self, match_id: &str, token: GrantToken) -> bool {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(match_id) else {
            return false;
        };
        if entry.token == token {
            return true;
        }
        entry.waiters.remove(token);
        false
    }

    fn release_abandoned(&self, match_id: &str, token: GrantToken, owner: &HolderId) {
        if let Err(e) = self.release_grant(match_id, owner, token) {
            warn!(match_id, owner = %owner, error = %e, "failed to pass on abandoned match lock");
        }
    }
}

#[cfg(test)]
#[path = "match_lock_tests.rs"]
mod tests;
