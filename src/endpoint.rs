//! Bridge endpoint: one side of a host/script pairing.
//!
//! The endpoint owns a [`HandlerRegistry`] and a [`PendingCallbacks`]
//! registry and drives both directions of the protocol:
//!
//! - `send` allocates a correlation id (when a result is wanted), encodes a
//!   `send` Message and hands it to the transport
//! - `on_transport_message` decodes inbound text and either runs the named
//!   handler or resolves the pending callback named by `callbackID`
//!
//! There is no session state. Each call is independent and only the two
//! registries change over time. Handlers and callbacks run on whatever
//! thread delivered the message, always outside registry locks.

mod expiry;
mod responder;

pub use expiry::{ExpiryTaskHandle, spawn_expiry_task};
pub use responder::Responder;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use arc_swap::ArcSwap;
use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::config::{BridgeSettings, UnknownHandlerPolicy};
use crate::error::{BridgeError, BridgeResult};
use crate::protocol::{CallKind, CallbackId, Message, ResponseError, decode, encode};
use crate::registry::{Callback, HandlerRegistry, PendingCallbacks};
use crate::transport::Transport;

/// Outbound half shared by the endpoint and every live [`Responder`].
pub(crate) struct Outbound {
    transport: Arc<dyn Transport>,
    settings: ArcSwap<BridgeSettings>,
}

impl Outbound {
    /// Encode and hand a Message to the transport.
    pub(crate) fn dispatch(&self, message: &Message) -> BridgeResult<()> {
        if self.settings.load().verbose {
            info!(
                target: "script_bridge::endpoint",
                "outbound: {}",
                serde_json::to_string(message).unwrap_or_default()
            );
        }

        let encoded = encode(message)?;
        self.transport.deliver(encoded)?;
        Ok(())
    }
}

/// One side of the bridge.
pub struct BridgeEndpoint {
    handlers: HandlerRegistry,
    pending: PendingCallbacks,
    outbound: Arc<Outbound>,
}

impl BridgeEndpoint {
    pub fn new(transport: Arc<dyn Transport>, settings: BridgeSettings) -> Self {
        Self {
            handlers: HandlerRegistry::new(),
            pending: PendingCallbacks::new(),
            outbound: Arc::new(Outbound {
                transport,
                settings: ArcSwap::from_pointee(settings),
            }),
        }
    }

    pub fn settings(&self) -> Arc<BridgeSettings> {
        self.outbound.settings.load_full()
    }

    /// Replace the settings; takes effect for the next message.
    pub fn update_settings(&self, settings: BridgeSettings) {
        self.outbound.settings.store(Arc::new(settings));
    }

    /// Invoke `handler_name` on the other side.
    ///
    /// With a callback, a correlation id is allocated and returned; the
    /// callback fires once when the matching `receive` arrives. If the
    /// transport refuses the message the pending entry is removed and the
    /// error is returned; the callback never fires.
    pub fn send(
        &self,
        handler_name: &str,
        payload: Value,
        callback: Option<Callback>,
    ) -> BridgeResult<Option<CallbackId>> {
        match callback {
            Some(callback) => self.send_boxed(handler_name, payload, callback).map(Some),
            None => self.notify(handler_name, payload).map(|()| None),
        }
    }

    /// [`send`](Self::send) with a closure callback.
    pub fn send_with<F>(
        &self,
        handler_name: &str,
        payload: Value,
        callback: F,
    ) -> BridgeResult<CallbackId>
    where
        F: FnOnce(Value) + Send + 'static,
    {
        self.send_boxed(handler_name, payload, Box::new(callback))
    }

    /// Invoke `handler_name` on the other side without expecting a result.
    pub fn notify(&self, handler_name: &str, payload: Value) -> BridgeResult<()> {
        validate_handler_name(handler_name)?;
        self.outbound
            .dispatch(&Message::send(handler_name, Some(payload), None))
            .inspect_err(|err| log_send_failure(handler_name, err))
    }

    /// Invoke `handler_name` and await its result.
    ///
    /// Fails with [`BridgeError::Timeout`] when `callbackTimeout` is set and
    /// elapses first, and with [`BridgeError::NoResponse`] if the pending
    /// callback is evicted. The pending entry is released on every exit,
    /// including when the returned future is dropped before completion.
    pub async fn call(&self, handler_name: &str, payload: Value) -> BridgeResult<Value> {
        let (tx, rx) = oneshot::channel();
        let id = self.send_with(handler_name, payload, move |result| {
            let _ = tx.send(result);
        })?;
        let _release = PendingGuard {
            pending: &self.pending,
            id,
        };

        let received = match self.settings().callback_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, rx).await {
                Ok(received) => received,
                Err(_) => return Err(BridgeError::timeout(handler_name, timeout)),
            },
            None => rx.await,
        };

        received.map_err(|_| BridgeError::no_response(handler_name))
    }

    /// Route inbound `send` Messages for `handler_name` to `handler`.
    ///
    /// A later registration under the same name replaces this one.
    pub fn register<F>(&self, handler_name: impl Into<String>, handler: F)
    where
        F: Fn(Value, Option<Responder>) + Send + Sync + 'static,
    {
        let handler_name = handler_name.into();
        if self.handlers.register(handler_name.clone(), Arc::new(handler)) {
            debug!(
                target: "script_bridge::endpoint",
                "Replaced handler '{}'",
                handler_name
            );
        }
    }

    /// Register a handler that receives `context` explicitly on every call.
    pub fn register_with_context<C, F>(
        &self,
        handler_name: impl Into<String>,
        context: Arc<C>,
        handler: F,
    ) where
        C: Send + Sync + 'static,
        F: Fn(&C, Value, Option<Responder>) + Send + Sync + 'static,
    {
        self.register(handler_name, move |payload, responder| {
            handler(&context, payload, responder)
        });
    }

    /// Entry point for the transport's inbound path.
    ///
    /// Never fails: undecodable text, unknown handlers and unknown
    /// correlation ids are logged and dropped.
    pub fn on_transport_message(&self, raw: &str) {
        let message = match decode(raw) {
            Ok(message) => message,
            Err(err) => {
                warn!(
                    target: "script_bridge::endpoint",
                    "Dropping undecodable message: {}",
                    err
                );
                return;
            }
        };

        if self.outbound.settings.load().verbose {
            info!(
                target: "script_bridge::endpoint",
                "inbound: {}",
                serde_json::to_string(&message).unwrap_or_default()
            );
        }

        match message.call {
            CallKind::Send => self.handle_send(message),
            CallKind::Receive => self.handle_receive(message),
        }
    }

    /// Drop pending callbacks older than `callbackTimeout`.
    ///
    /// Returns the number evicted; always 0 when no timeout is configured.
    pub fn evict_expired(&self) -> usize {
        let Some(timeout) = self.settings().callback_timeout else {
            return 0;
        };

        let evicted = self.pending.evict_older_than(timeout);
        for (id, handler_name) in &evicted {
            warn!(
                target: "script_bridge::endpoint",
                "Evicted call {} to '{}' after {:?} without a response",
                id,
                handler_name,
                timeout
            );
        }
        evicted.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.pending_count()
    }

    pub fn handler_names(&self) -> Vec<String> {
        self.handlers.names()
    }

    fn send_boxed(
        &self,
        handler_name: &str,
        payload: Value,
        callback: Callback,
    ) -> BridgeResult<CallbackId> {
        validate_handler_name(handler_name)?;

        let id = self.pending.allocate(handler_name, callback);
        let message = Message::send(handler_name, Some(payload), Some(id.clone()));

        if let Err(err) = self.outbound.dispatch(&message) {
            self.pending.remove(&id);
            log_send_failure(handler_name, &err);
            return Err(err);
        }

        Ok(id)
    }

    fn handle_send(&self, message: Message) {
        let handler_name = message.handler_name.clone().unwrap_or_default();
        let callback_id = message.callback_id.clone();

        let Some(handler) = self.handlers.lookup(&handler_name) else {
            self.handle_unknown_handler(&handler_name, callback_id);
            return;
        };

        let responder = callback_id.map(|id| Responder::new(id, Arc::clone(&self.outbound)));
        let payload = message.into_payload();
        if panic::catch_unwind(AssertUnwindSafe(|| handler(payload, responder))).is_err() {
            warn!(
                target: "script_bridge::endpoint",
                "Handler '{}' panicked, dropping message",
                handler_name
            );
        }
    }

    fn handle_unknown_handler(&self, handler_name: &str, callback_id: Option<CallbackId>) {
        match (self.settings().unknown_handler, callback_id) {
            (UnknownHandlerPolicy::ReplyError, Some(id)) => {
                debug!(
                    target: "script_bridge::endpoint",
                    "No handler registered for '{}', replying with error",
                    handler_name
                );
                let payload = ResponseError::unknown_handler(handler_name).into_payload();
                if let Err(err) = self.outbound.dispatch(&Message::receive(id, payload)) {
                    warn!(
                        target: "script_bridge::endpoint",
                        "Failed to reply to unknown handler call '{}': {}",
                        handler_name,
                        err
                    );
                }
            }
            _ => {
                debug!(
                    target: "script_bridge::endpoint",
                    "No handler registered for '{}', dropping",
                    handler_name
                );
            }
        }
    }

    fn handle_receive(&self, message: Message) {
        let Some(id) = message.callback_id.clone() else {
            debug!(
                target: "script_bridge::endpoint",
                "Receive message without callbackID, dropping"
            );
            return;
        };
        self.pending.resolve_and_remove(&id, message.into_payload());
    }
}

impl std::fmt::Debug for BridgeEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeEndpoint")
            .field("handlers", &self.handlers)
            .field("pending", &self.pending.pending_count())
            .finish_non_exhaustive()
    }
}

/// Removes a `call`'s pending entry when the call ends, however it ends.
///
/// Removing an entry that was already resolved is a no-op.
struct PendingGuard<'a> {
    pending: &'a PendingCallbacks,
    id: CallbackId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

fn validate_handler_name(handler_name: &str) -> BridgeResult<()> {
    if handler_name.is_empty() {
        return Err(BridgeError::EmptyHandlerName);
    }
    Ok(())
}

fn log_send_failure(handler_name: &str, err: &BridgeError) {
    warn!(
        target: "script_bridge::endpoint",
        "Failed to send to '{}': {}",
        handler_name,
        err
    );
}
