//! Pending callbacks awaiting a `receive` from the remote side.
//!
//! The registry allocates correlation ids from a per-endpoint counter and
//! resolves each id at most once:
//! - `allocate(handler_name, callback)` before the `send` goes out
//! - `resolve_and_remove(id, payload)` when the matching `receive` arrives
//! - `remove(id)` when the `send` never left, or its waiter gave up

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::{debug, warn};
use serde_json::Value;

use crate::error::LockResultExt;
use crate::protocol::CallbackId;

/// Continuation invoked with the remote side's result. Fires at most once.
pub type Callback = Box<dyn FnOnce(Value) + Send>;

struct PendingEntry {
    callback: Callback,
    handler_name: String,
    registered_at: Instant,
}

struct PendingState {
    /// Last issued sequence number; ids start at 1.
    last_seq: u64,
    pending: HashMap<CallbackId, PendingEntry>,
}

/// Correlation-id to callback map.
///
/// Counter and map live behind one mutex so allocation is a single
/// read-modify-write. Callbacks always run after the lock is released,
/// so a callback may issue new sends on the same endpoint.
pub struct PendingCallbacks {
    state: Mutex<PendingState>,
}

impl Default for PendingCallbacks {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingCallbacks {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PendingState {
                last_seq: 0,
                pending: HashMap::new(),
            }),
        }
    }

    /// Store `callback` under a fresh correlation id and return the id.
    pub fn allocate(&self, handler_name: impl Into<String>, callback: Callback) -> CallbackId {
        let mut state = self.state.lock().recover_poison("PendingCallbacks::allocate");
        state.last_seq += 1;
        let id = CallbackId::from_sequence(state.last_seq);
        state.pending.insert(
            id.clone(),
            PendingEntry {
                callback,
                handler_name: handler_name.into(),
                registered_at: Instant::now(),
            },
        );
        id
    }

    /// Remove the entry for `id` and invoke its callback with `payload`.
    ///
    /// Unknown, late, or duplicate ids are a silent no-op. Returns `true`
    /// when a callback fired. A panicking callback is logged and contained.
    pub fn resolve_and_remove(&self, id: &CallbackId, payload: Value) -> bool {
        let entry = self
            .state
            .lock()
            .recover_poison("PendingCallbacks::resolve_and_remove")
            .pending
            .remove(id);

        match entry {
            Some(entry) => {
                let callback = entry.callback;
                if panic::catch_unwind(AssertUnwindSafe(|| callback(payload))).is_err() {
                    warn!(
                        target: "script_bridge::pending",
                        "Callback for id {} ('{}') panicked",
                        id,
                        entry.handler_name
                    );
                }
                true
            }
            None => {
                debug!(
                    target: "script_bridge::pending",
                    "No pending callback for id {}, dropping response",
                    id
                );
                false
            }
        }
    }

    /// Drop the entry for `id` without invoking it.
    ///
    /// Returns `true` if the entry was pending.
    pub fn remove(&self, id: &CallbackId) -> bool {
        self.state
            .lock()
            .recover_poison("PendingCallbacks::remove")
            .pending
            .remove(id)
            .is_some()
    }

    /// Drop every entry older than `max_age`, returning the evicted ids
    /// with the handler each call targeted.
    pub fn evict_older_than(&self, max_age: Duration) -> Vec<(CallbackId, String)> {
        self.evict_expired_at(Instant::now(), max_age)
    }

    fn evict_expired_at(&self, now: Instant, max_age: Duration) -> Vec<(CallbackId, String)> {
        let mut state = self.state.lock().recover_poison("PendingCallbacks::evict");
        let expired: Vec<CallbackId> = state
            .pending
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.registered_at) >= max_age)
            .map(|(id, _)| id.clone())
            .collect();

        let evicted: Vec<(CallbackId, String, PendingEntry)> = expired
            .into_iter()
            .filter_map(|id| {
                let entry = state.pending.remove(&id)?;
                Some((id, entry.handler_name.clone(), entry))
            })
            .collect();

        // Callbacks may own resources with their own locks; drop them unlocked.
        drop(state);

        evicted
            .into_iter()
            .map(|(id, handler_name, _entry)| (id, handler_name))
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.state
            .lock()
            .recover_poison("PendingCallbacks::pending_count")
            .pending
            .len()
    }
}
