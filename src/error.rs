//! Error handling types for script-bridge
//!
//! Protocol-internal failures (decode, unknown handler, unknown correlation)
//! are absorbed by the endpoint and only reach the log. The types here are
//! what application code sees from `send`, `call` and configuration.

use std::sync::PoisonError;
use std::time::Duration;
use thiserror::Error;

use crate::protocol::EncodeError;
use crate::transport::TransportError;

/// Error type for bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Message could not be serialized
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Outbound `send` named no handler
    #[error("Handler name must not be empty")]
    EmptyHandlerName,

    /// The transport could not take the message
    #[error("Transport unavailable: {message}")]
    TransportUnavailable { message: String },

    /// No response arrived within the configured callback timeout
    #[error("No response from '{handler_name}' within {timeout:?}")]
    Timeout {
        handler_name: String,
        timeout: Duration,
    },

    /// The pending callback was dropped before a response arrived
    #[error("Pending call to '{handler_name}' was dropped without a response")]
    NoResponse { handler_name: String },

    /// Configuration error
    #[error("Invalid configuration: {message}")]
    Config { message: String },
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

impl From<TransportError> for BridgeError {
    fn from(err: TransportError) -> Self {
        BridgeError::TransportUnavailable {
            message: err.to_string(),
        }
    }
}

/// Helper trait to recover a guard from a poisoned lock.
pub trait LockResultExt<T> {
    /// Recover the inner guard of a poisoned lock, logging which
    /// operation observed the poison.
    fn recover_poison(self, context: &str) -> T;
}

impl<T> LockResultExt<T> for Result<T, PoisonError<T>> {
    fn recover_poison(self, context: &str) -> T {
        match self {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!(
                    target: "script_bridge::lock_recovery",
                    "Recovered from poisoned lock in {}",
                    context
                );
                poisoned.into_inner()
            }
        }
    }
}

impl BridgeError {
    /// Create a timeout error
    pub fn timeout(handler_name: impl Into<String>, timeout: Duration) -> Self {
        BridgeError::Timeout {
            handler_name: handler_name.into(),
            timeout,
        }
    }

    /// Create a no-response error
    pub fn no_response(handler_name: impl Into<String>) -> Self {
        BridgeError::NoResponse {
            handler_name: handler_name.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        BridgeError::Config {
            message: message.into(),
        }
    }
}
