//! Structured error payloads carried inside a `receive` Message.
//!
//! The protocol never interprets `data`, so errors the endpoint synthesizes
//! travel as an ordinary payload of the shape `{"error": ResponseError}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error codes used in synthesized error responses (JSON-RPC numbering).
pub struct ErrorCodes;

impl ErrorCodes {
    /// The named handler is not registered on the receiving side
    pub const UNKNOWN_HANDLER: i32 = -32601;

    /// The request was well-formed but could not be completed
    pub const REQUEST_FAILED: i32 = -32803;
}

/// Error object placed under the `error` key of a response payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ResponseError {
    /// Create an UNKNOWN_HANDLER error for `handler_name`
    pub fn unknown_handler(handler_name: &str) -> Self {
        Self {
            code: ErrorCodes::UNKNOWN_HANDLER,
            message: format!("No handler registered for '{handler_name}'"),
            data: Some(serde_json::json!({"handlerName": handler_name})),
        }
    }

    /// Create a REQUEST_FAILED error for handler-reported failures
    pub fn request_failed(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCodes::REQUEST_FAILED,
            message: message.into(),
            data: None,
        }
    }

    /// Wrap this error as a response payload: `{"error": {...}}`.
    pub fn into_payload(self) -> Value {
        serde_json::json!({ "error": self })
    }

    /// Extract an error from a response payload, if it carries one.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        serde_json::from_value(payload.get("error")?.clone()).ok()
    }
}
