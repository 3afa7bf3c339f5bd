use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Namespace used when none is configured; matches the bootstrap global.
pub const DEFAULT_NAMESPACE: &str = "WKB";

/// What to do with an inbound `send` naming an unregistered handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnknownHandlerPolicy {
    /// Drop the call silently (the caller's callback stays pending).
    #[default]
    Drop,
    /// Answer calls that carry a `callbackID` with an error payload.
    ReplyError,
}

/// One configuration layer as written in `script-bridge.toml`.
///
/// Every field is optional so layers can be merged field by field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    pub verbose: Option<bool>,
    pub namespace: Option<String>,
    /// Milliseconds a pending callback may wait; `0` disables the timeout.
    pub callback_timeout_ms: Option<u64>,
    pub unknown_handler: Option<UnknownHandlerPolicy>,
}

/// Resolved settings an endpoint runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSettings {
    /// Log every outbound and inbound Message.
    pub verbose: bool,
    /// Global name of the script-side bridge object.
    pub namespace: String,
    pub callback_timeout: Option<Duration>,
    pub unknown_handler: UnknownHandlerPolicy,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            verbose: false,
            namespace: DEFAULT_NAMESPACE.to_string(),
            callback_timeout: None,
            unknown_handler: UnknownHandlerPolicy::Drop,
        }
    }
}

/// Returns the defaults layer (lowest precedence).
pub fn default_config() -> BridgeConfig {
    let defaults = BridgeSettings::default();
    BridgeConfig {
        verbose: Some(defaults.verbose),
        namespace: Some(defaults.namespace),
        callback_timeout_ms: Some(0),
        unknown_handler: Some(defaults.unknown_handler),
    }
}

/// Whether `namespace` can be used as a bare script identifier.
pub fn is_valid_namespace(namespace: &str) -> bool {
    let mut chars = namespace.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
