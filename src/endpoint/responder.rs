//! One-shot reply handle given to handlers whose caller expects a result.

use std::sync::Arc;

use serde_json::Value;

use super::Outbound;
use crate::error::BridgeResult;
use crate::protocol::{CallbackId, Message, ResponseError};

/// Sends the result of a handler back to the caller.
///
/// Consuming `self` makes a second reply for the same request
/// unrepresentable; the remote side would ignore it anyway.
pub struct Responder {
    callback_id: CallbackId,
    outbound: Arc<Outbound>,
}

impl Responder {
    pub(crate) fn new(callback_id: CallbackId, outbound: Arc<Outbound>) -> Self {
        Self {
            callback_id,
            outbound,
        }
    }

    /// Send `result` as a `receive` Message carrying the caller's id.
    pub fn respond(self, result: Value) -> BridgeResult<()> {
        self.outbound
            .dispatch(&Message::receive(self.callback_id, result))
    }

    /// Send `{"error": error}` as the result.
    pub fn respond_error(self, error: ResponseError) -> BridgeResult<()> {
        self.respond(error.into_payload())
    }
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("callback_id", &self.callback_id)
            .finish_non_exhaustive()
    }
}
