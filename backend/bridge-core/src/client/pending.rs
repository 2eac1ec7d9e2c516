//! Pending request table: correlation identifiers mapped to reply slots.
//!
//! Identifiers are strictly increasing, start at 1, and are never reused
//! while the process runs. An entry lives from the moment its request is
//! transmitted until its response arrives or the issuing connection closes,
//! whichever comes first, so resolution is exactly-once per identifier.

use crate::error::client::ClientError;

use common::ErrorLocation;

use std::collections::HashMap;
use std::panic::Location;

use serde_json::Value;
use tokio::sync::oneshot;

pub(crate) type ReplySlot = oneshot::Sender<Result<Value, ClientError>>;

#[derive(Debug, Default)]
pub(crate) struct PendingRequests {
    next_id: u64,
    entries: HashMap<u64, ReplySlot>,
}

impl PendingRequests {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Assign the next identifier and record the reply slot.
    pub(crate) fn register(&mut self, reply: ReplySlot) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.entries.insert(id, reply);
        id
    }

    /// Resolve the entry for `id` with the decoded response.
    ///
    /// Returns `false` if no entry exists; late or duplicate responses find
    /// nothing here and are dropped by the caller.
    pub(crate) fn resolve(&mut self, id: u64, response: Value) -> bool {
        match self.entries.remove(&id) {
            Some(reply) => {
                let _ = reply.send(Ok(response));
                true
            }
            None => false,
        }
    }

    /// Fail the entry for `id` with the given error.
    pub(crate) fn reject(&mut self, id: u64, error: ClientError) -> bool {
        match self.entries.remove(&id) {
            Some(reply) => {
                let _ = reply.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Fail every outstanding entry and clear the table.
    ///
    /// Used when the connection that issued the requests closes; in-flight
    /// calls are failed, never silently retried.
    #[track_caller]
    pub(crate) fn fail_all(&mut self, reason: &str) {
        let caller = Location::caller();
        for (_, reply) in self.entries.drain() {
            let _ = reply.send(Err(ClientError::Closed {
                message: reason.to_string(),
                location: ErrorLocation::from(caller),
            }));
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
