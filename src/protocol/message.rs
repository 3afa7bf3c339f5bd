//! The Message record exchanged between the two execution contexts.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::CallbackId;

/// Direction of a Message within a request/response pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    /// Invoke a handler registered on the other side.
    Send,
    /// Deliver the result of an earlier `send` back to its originator.
    Receive,
}

/// A single unit on the wire.
///
/// ```text
/// { "call": "send"|"receive", "handlerName"?: string, "data"?: any, "callbackID"?: string }
/// ```
///
/// `data` distinguishes an absent field (`None`) from an explicit JSON
/// `null` (`Some(Value::Null)`). It is also read from the legacy `info`
/// key older script-side bootstraps wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub call: CallKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler_name: Option<String>,
    #[serde(
        default,
        alias = "info",
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Value>,
    #[serde(
        rename = "callbackID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub callback_id: Option<CallbackId>,
}

impl Message {
    /// Build a `send` Message targeting `handler_name`.
    pub fn send(
        handler_name: impl Into<String>,
        data: Option<Value>,
        callback_id: Option<CallbackId>,
    ) -> Self {
        Self {
            call: CallKind::Send,
            handler_name: Some(handler_name.into()),
            data,
            callback_id,
        }
    }

    /// Build a `receive` Message resolving `callback_id` on the other side.
    pub fn receive(callback_id: CallbackId, data: Value) -> Self {
        Self {
            call: CallKind::Receive,
            handler_name: None,
            data: Some(data),
            callback_id: Some(callback_id),
        }
    }

    /// Payload handed to handlers and callbacks; absent data reads as `null`.
    pub fn payload(&self) -> Value {
        self.data.clone().unwrap_or(Value::Null)
    }

    pub fn into_payload(self) -> Value {
        self.data.unwrap_or(Value::Null)
    }
}

/// Only called when the key is present, so `null` stays `Some(Null)`.
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}
