//! Layered configuration for bridge endpoints.
//!
//! Layers, lowest precedence first:
//! defaults < user (`$XDG_CONFIG_HOME/script-bridge/script-bridge.toml`)
//! < project (`<root>/script-bridge.toml`) < override (JSON value).
//!
//! Loading never fails. Problems are reported as [`SettingsEvent`]s and the
//! offending layer or field falls back to the layers below it.

pub mod settings;
pub mod user;

pub use settings::{
    BridgeConfig, BridgeSettings, DEFAULT_NAMESPACE, UnknownHandlerPolicy, default_config,
    is_valid_namespace,
};
pub use user::{UserConfigError, UserConfigResult, load_user_config, user_config_path};

use serde_json::Value;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// File name of both the user and the project config.
pub const CONFIG_FILE_NAME: &str = "script-bridge.toml";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingsEventKind {
    Info,
    Warning,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettingsEvent {
    pub kind: SettingsEventKind,
    pub message: String,
}

impl SettingsEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: SettingsEventKind::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            kind: SettingsEventKind::Warning,
            message: message.into(),
        }
    }

    /// Forward this event to the log facade.
    pub fn log(&self) {
        match self.kind {
            SettingsEventKind::Info => {
                log::info!(target: "script_bridge::config", "{}", self.message)
            }
            SettingsEventKind::Warning => {
                log::warn!(target: "script_bridge::config", "{}", self.message)
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct SettingsLoadOutcome {
    pub settings: BridgeSettings,
    pub events: Vec<SettingsEvent>,
}

/// Load settings from every layer.
pub fn load_settings(root_path: Option<&Path>, override_value: Option<Value>) -> SettingsLoadOutcome {
    let mut events = Vec::new();

    let defaults = Some(default_config());
    let user_config = load_user_config_with_events(&mut events);
    let project_config = load_project_config(root_path, &mut events);
    let override_config = override_value.and_then(|value| parse_override(value, &mut events));

    let merged = merge_all(&[defaults, user_config, project_config, override_config])
        .unwrap_or_default();
    let settings = resolve(merged, &mut events);

    SettingsLoadOutcome { settings, events }
}

/// Merge configs in order. Later configs have higher precedence.
pub fn merge_all(configs: &[Option<BridgeConfig>]) -> Option<BridgeConfig> {
    configs.iter().cloned().reduce(merge_config).flatten()
}

/// Merge two configs, preferring values from `primary` over `fallback`.
pub fn merge_config(
    fallback: Option<BridgeConfig>,
    primary: Option<BridgeConfig>,
) -> Option<BridgeConfig> {
    match (fallback, primary) {
        (None, None) => None,
        (Some(config), None) | (None, Some(config)) => Some(config),
        (Some(fallback), Some(primary)) => Some(BridgeConfig {
            verbose: primary.verbose.or(fallback.verbose),
            namespace: primary.namespace.or(fallback.namespace),
            callback_timeout_ms: primary.callback_timeout_ms.or(fallback.callback_timeout_ms),
            unknown_handler: primary.unknown_handler.or(fallback.unknown_handler),
        }),
    }
}

/// Turn a merged config into settings, falling back to defaults for
/// missing or invalid fields.
pub fn resolve(config: BridgeConfig, events: &mut Vec<SettingsEvent>) -> BridgeSettings {
    let defaults = BridgeSettings::default();

    let namespace = match config.namespace {
        Some(namespace) if is_valid_namespace(&namespace) => namespace,
        Some(namespace) => {
            events.push(SettingsEvent::warning(format!(
                "Ignoring invalid namespace {:?}, using {}",
                namespace, defaults.namespace
            )));
            defaults.namespace
        }
        None => defaults.namespace,
    };

    BridgeSettings {
        verbose: config.verbose.unwrap_or(defaults.verbose),
        namespace,
        callback_timeout: config
            .callback_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis),
        unknown_handler: config.unknown_handler.unwrap_or(defaults.unknown_handler),
    }
}

fn load_user_config_with_events(events: &mut Vec<SettingsEvent>) -> Option<BridgeConfig> {
    match load_user_config() {
        Ok(Some(config)) => {
            events.push(SettingsEvent::info("Loaded user config"));
            Some(config)
        }
        Ok(None) => None,
        Err(err) => {
            events.push(SettingsEvent::warning(format!(
                "Failed to load user config: {}",
                err
            )));
            None
        }
    }
}

fn load_project_config(
    root_path: Option<&Path>,
    events: &mut Vec<SettingsEvent>,
) -> Option<BridgeConfig> {
    let config_path = root_path?.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        return None;
    }

    events.push(SettingsEvent::info(format!(
        "Found config file: {}",
        config_path.display()
    )));

    match fs::read_to_string(&config_path) {
        Ok(contents) => match toml::from_str::<BridgeConfig>(&contents) {
            Ok(config) => {
                events.push(SettingsEvent::info(format!(
                    "Successfully loaded {}",
                    CONFIG_FILE_NAME
                )));
                Some(config)
            }
            Err(err) => {
                events.push(SettingsEvent::warning(format!(
                    "Failed to parse {}: {}",
                    CONFIG_FILE_NAME, err
                )));
                None
            }
        },
        Err(err) => {
            events.push(SettingsEvent::warning(format!(
                "Failed to read {}: {}",
                CONFIG_FILE_NAME, err
            )));
            None
        }
    }
}

fn parse_override(value: Value, events: &mut Vec<SettingsEvent>) -> Option<BridgeConfig> {
    match serde_json::from_value::<BridgeConfig>(value) {
        Ok(config) => {
            events.push(SettingsEvent::info("Parsed override settings"));
            Some(config)
        }
        Err(err) => {
            events.push(SettingsEvent::warning(format!(
                "Failed to parse override settings: {}",
                err
            )));
            None
        }
    }
}
