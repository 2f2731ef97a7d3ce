// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn holder(name: &str) -> HolderId {
    HolderId::new(name)
}

#[test]
fn hand_off_is_fifo() {
    let mut queue = WaitQueue::new();
    let mut a = queue.push(GrantToken(1), holder("a")).unwrap();
    let mut b = queue.push(GrantToken(2), holder("b")).unwrap();

    assert_eq!(queue.hand_off(), Some((GrantToken(1), holder("a"))));
    assert!(a.try_recv().is_ok());
    assert!(b.try_recv().is_err());

    assert_eq!(queue.hand_off(), Some((GrantToken(2), holder("b"))));
    assert!(b.try_recv().is_ok());
    assert!(queue.is_empty());
}

#[test]
fn hand_off_skips_dropped_receivers() {
    let mut queue = WaitQueue::new();
    let gone = queue.push(GrantToken(1), holder("gone")).unwrap();
    let _live = queue.push(GrantToken(2), holder("live")).unwrap();
    drop(gone);

    assert_eq!(queue.hand_off(), Some((GrantToken(2), holder("live"))));
    assert!(queue.is_empty());
}

#[test]
fn hand_off_on_empty_queue_is_none() {
    let mut queue = WaitQueue::new();
    assert_eq!(queue.hand_off(), None);
}

#[test]
fn remove_takes_waiter_out_of_line() {
    let mut queue = WaitQueue::new();
    let _a = queue.push(GrantToken(1), holder("a")).unwrap();
    let _b = queue.push(GrantToken(2), holder("b")).unwrap();
    let _c = queue.push(GrantToken(3), holder("c")).unwrap();

    assert!(queue.remove(GrantToken(2)));
    assert!(!queue.remove(GrantToken(2)));

    let order: Vec<_> = queue.holders().map(|h| h.as_str()).collect();
    assert_eq!(order, vec!["a", "c"]);
}

#[test]
#[cfg(not(debug_assertions))]
fn duplicate_token_is_integrity_error() {
    let mut queue = WaitQueue::new();
    let _a = queue.push(GrantToken(1), holder("a")).unwrap();
    let err = queue.push(GrantToken(1), holder("a")).unwrap_err();
    assert!(matches!(err, CoordError::QueueIntegrity(_)));
    assert_eq!(queue.len(), 1);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "enqueued twice")]
fn duplicate_token_asserts_in_debug() {
    let mut queue = WaitQueue::new();
    let _a = queue.push(GrantToken(1), holder("a")).unwrap();
    let _ = queue.push(GrantToken(1), holder("a"));
}
