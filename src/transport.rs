//! Transport adapters connecting two bridge endpoints.
//!
//! A transport only moves already-encoded text one way. The inbound path is
//! whatever code receives text from the other side and calls
//! [`BridgeEndpoint::on_transport_message`](crate::endpoint::BridgeEndpoint::on_transport_message).
//!
//! - `channel` - in-process pairing over tokio mpsc
//! - `script` - evaluation-command queue for an embedded script context

pub mod channel;
pub mod script;
#[cfg(test)]
pub(crate) mod test_helpers;

use thiserror::Error;

/// Failure to hand a message to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The other side is gone
    #[error("transport closed")]
    Closed,

    /// The transport exists but cannot take messages right now
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// One-way, best-effort delivery of encoded messages to the other side.
///
/// `deliver` must not block on the other side processing the message. If
/// the transport needs a specific execution context (for example a UI
/// thread), it is responsible for moving the work there.
pub trait Transport: Send + Sync {
    fn deliver(&self, encoded: String) -> Result<(), TransportError>;
}
