// Unit tests for the pending request table
// Tests identifier assignment, exactly-once resolution, and bulk failure

use crate::client::pending::PendingRequests;
use crate::error::client::ClientError;
use serde_json::json;
use tokio::sync::oneshot;

/// **VALUE**: Verifies identifiers start at 1 and strictly increase.
///
/// **WHY THIS MATTERS**: The bridge correlates responses purely by this
/// number. Reusing an identifier while an earlier entry is outstanding would
/// resolve the wrong caller's request.
///
/// **BUG THIS CATCHES**: Would catch a counter reset or an off-by-one making
/// the first request collide with the reserved probe identifier 0.
#[test]
fn given_fresh_table_when_registering_then_ids_start_at_one_and_increase() {
    let mut pending = PendingRequests::new();

    let (tx1, _rx1) = oneshot::channel();
    let (tx2, _rx2) = oneshot::channel();
    let (tx3, _rx3) = oneshot::channel();

    assert_eq!(pending.register(tx1), 1);
    assert_eq!(pending.register(tx2), 2);
    assert_eq!(pending.register(tx3), 3);
    assert_eq!(pending.len(), 3);
}

/// **VALUE**: Verifies resolution delivers the response and removes the entry.
///
/// **WHY THIS MATTERS**: Resolution must be exactly-once. The entry is removed
/// at the moment it resolves, so a duplicate response later finds nothing.
///
/// **BUG THIS CATCHES**: Would catch an entry surviving its own resolution and
/// being resolved twice.
#[test]
fn given_registered_entry_when_resolved_then_reply_delivered_exactly_once() {
    let mut pending = PendingRequests::new();
    let (tx, mut rx) = oneshot::channel();
    let id = pending.register(tx);

    assert!(pending.resolve(id, json!({"ok": true})));
    assert_eq!(pending.len(), 0);

    let delivered = rx.try_recv().expect("reply should be delivered");
    assert_eq!(delivered.unwrap(), json!({"ok": true}));

    // Duplicate response: no entry left, nothing resolved
    assert!(!pending.resolve(id, json!({"ok": false})));
}

/// **VALUE**: Verifies a response for an unknown identifier has no effect.
///
/// **WHY THIS MATTERS**: Late responses arriving after a reconnect, or bogus
/// identifiers from a confused backend, must be discarded silently.
///
/// **BUG THIS CATCHES**: Would catch lookups that panic or disturb unrelated
/// entries.
#[test]
fn given_unknown_id_when_resolved_then_table_unchanged() {
    let mut pending = PendingRequests::new();
    let (tx, mut rx) = oneshot::channel();
    pending.register(tx);

    assert!(!pending.resolve(99, json!({"ok": true})));

    assert_eq!(pending.len(), 1);
    assert!(rx.try_recv().is_err(), "unrelated entry must stay pending");
}

/// **VALUE**: Verifies rejection fails a single entry with the given error.
///
/// **WHY THIS MATTERS**: A request whose frame cannot even be encoded must
/// fail alone, without disturbing other outstanding requests.
///
/// **BUG THIS CATCHES**: Would catch a rejection that leaks the entry or
/// resolves it as success.
#[test]
fn given_registered_entry_when_rejected_then_error_delivered() {
    let mut pending = PendingRequests::new();
    let (tx, mut rx) = oneshot::channel();
    let id = pending.register(tx);

    let error = ClientError::Encode {
        message: "bad payload".to_string(),
        location: common::ErrorLocation::from(std::panic::Location::caller()),
    };
    assert!(pending.reject(id, error));

    let delivered = rx.try_recv().expect("reply should be delivered");
    assert!(matches!(delivered, Err(ClientError::Encode { .. })));
    assert_eq!(pending.len(), 0);
}

/// **VALUE**: Verifies closing a connection with N pending requests rejects
/// all N and empties the table.
///
/// **WHY THIS MATTERS**: In-flight calls are failed on disconnect, never
/// silently retried; a leaked entry would hang its caller forever.
///
/// **BUG THIS CATCHES**: Would catch fail_all leaving entries behind or
/// resolving some as success.
#[test]
fn given_outstanding_entries_when_fail_all_then_every_caller_gets_closed_error() {
    let mut pending = PendingRequests::new();
    let (tx1, mut rx1) = oneshot::channel();
    let (tx2, mut rx2) = oneshot::channel();
    pending.register(tx1);
    pending.register(tx2);

    pending.fail_all("connection closed");

    assert_eq!(pending.len(), 0);
    for rx in [&mut rx1, &mut rx2] {
        let delivered = rx.try_recv().expect("reply should be delivered");
        assert!(matches!(delivered, Err(ClientError::Closed { .. })));
    }
}

/// **VALUE**: Verifies identifiers keep increasing after the table is emptied.
///
/// **WHY THIS MATTERS**: The counter is process-lifetime, never reset, so a
/// response straggling in from before a reconnect can never collide with a
/// fresh request.
///
/// **BUG THIS CATCHES**: Would catch a counter tied to table occupancy
/// instead of process lifetime.
#[test]
fn given_cleared_table_when_registering_again_then_ids_do_not_restart() {
    let mut pending = PendingRequests::new();

    let (tx1, _rx1) = oneshot::channel();
    assert_eq!(pending.register(tx1), 1);
    pending.fail_all("connection closed");

    let (tx2, _rx2) = oneshot::channel();
    assert_eq!(pending.register(tx2), 2);
}
