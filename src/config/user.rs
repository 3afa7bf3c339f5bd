//! User configuration loading for script-bridge.
//!
//! User config location: $XDG_CONFIG_HOME/script-bridge/script-bridge.toml
//! Fallback: the platform config directory from `dirs::config_dir()`

use std::fs;
use std::path::PathBuf;

use thiserror::Error;

use super::{BridgeConfig, CONFIG_FILE_NAME};

const CONFIG_DIR_NAME: &str = "script-bridge";

#[derive(Debug, Error)]
pub enum UserConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type UserConfigResult<T> = Result<T, UserConfigError>;

/// Returns the path to the user configuration file.
///
/// 1. If $XDG_CONFIG_HOME is set: $XDG_CONFIG_HOME/script-bridge/script-bridge.toml
/// 2. Otherwise: <config dir>/script-bridge/script-bridge.toml
///
/// Returns None if no config directory can be determined.
pub fn user_config_path() -> Option<PathBuf> {
    let base = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(xdg_config) if !xdg_config.is_empty() => PathBuf::from(xdg_config),
        _ => dirs::config_dir()?,
    };
    Some(base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load the user config layer.
///
/// A missing file is `Ok(None)`; an unreadable or invalid one is an error.
pub fn load_user_config() -> UserConfigResult<Option<BridgeConfig>> {
    let Some(path) = user_config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(&path).map_err(|source| UserConfigError::Read {
        path: path.clone(),
        source,
    })?;
    toml::from_str(&contents)
        .map(Some)
        .map_err(|source| UserConfigError::Parse { path, source })
}
