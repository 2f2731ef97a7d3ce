// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deadlock detection over the mutex wait-for graph
//!
//! Nodes are held resources. There is an edge R -> R' when the owner of R is
//! queued on R'. A cycle means every owner on it is waiting for the next one
//! and none of them can make progress. Detection only: cycles are reported,
//! nothing is aborted.

use crate::id::HolderId;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Ownership and wait relationships captured at one instant
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WaitForSnapshot {
    /// Owner of each held resource
    pub owners: BTreeMap<String, HolderId>,
    /// Resources each holder is queued on
    pub waiting: BTreeMap<HolderId, BTreeSet<String>>,
}

impl WaitForSnapshot {
    /// Record that `holder` owns `resource`
    pub fn hold(&mut self, resource: impl Into<String>, holder: HolderId) {
        self.owners.insert(resource.into(), holder);
    }

    /// Record that `holder` is queued on `resource`
    pub fn wait(&mut self, holder: HolderId, resource: impl Into<String>) {
        self.waiting.entry(holder).or_default().insert(resource.into());
    }

    /// Held resources the owner of `resource` is waiting for
    fn successors(&self, resource: &str) -> Vec<&str> {
        let Some(owner) = self.owners.get(resource) else {
            return Vec::new();
        };
        self.waiting
            .get(owner)
            .map(|targets| {
                targets
                    .iter()
                    .filter(|t| self.owners.contains_key(t.as_str()))
                    .map(String::as_str)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Colour {
    /// Not yet reached
    White,
    /// On the current search path
    Grey,
    /// Fully explored
    Black,
}

/// Find wait-for cycles.
///
/// Each cycle is listed once, as resource ids in wait order rotated to start
/// at the smallest id. The search is iterative so deep chains cannot
/// overflow the stack.
pub fn detect_cycles(snapshot: &WaitForSnapshot) -> Vec<Vec<String>> {
    let mut colour: HashMap<&str, Colour> = HashMap::new();
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut cycles = Vec::new();

    for start in snapshot.owners.keys().map(String::as_str) {
        if colour.get(start).copied().unwrap_or(Colour::White) != Colour::White {
            continue;
        }

        let mut path: Vec<&str> = vec![start];
        let mut stack: Vec<(&str, Vec<&str>, usize)> =
            vec![(start, snapshot.successors(start), 0)];
        colour.insert(start, Colour::Grey);

        while let Some(frame) = stack.last_mut() {
            let next = frame.1.get(frame.2).copied();
            frame.2 += 1;

            match next {
                Some(next) => match colour.get(next).copied().unwrap_or(Colour::White) {
                    Colour::White => {
                        colour.insert(next, Colour::Grey);
                        path.push(next);
                        stack.push((next, snapshot.successors(next), 0));
                    }
                    Colour::Grey => {
                        if let Some(pos) = path.iter().position(|r| *r == next) {
                            let cycle = canonical(&path[pos..]);
                            if seen.insert(cycle.clone()) {
                                cycles.push(cycle);
                            }
                        }
                    }
                    Colour::Black => {}
                },
                None => {
                    let (node, _, _) = stack.pop().unwrap_or((start, Vec::new(), 0));
                    colour.insert(node, Colour::Black);
                    path.pop();
                }
            }
        }
    }

    cycles
}

/// Rotate a cycle so its smallest resource comes first
fn canonical(cycle: &[&str]) -> Vec<String> {
    let min = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, r)| **r)
        .map(|(i, _)| i)
        .unwrap_or(0);
    cycle[min..]
        .iter()
        .chain(cycle[..min].iter())
        .map(|r| r.to_string())
        .collect()
}

#[cfg(test)]
#[path = "deadlock_tests.rs"]
mod tests;
