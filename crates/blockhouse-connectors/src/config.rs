//! Shared configuration types for sources and sinks.
//!
//! Connector configs are parsed from flat string maps (`bootstrap.servers`,
//! `url`, ...) so that the binary can build them from environment variables
//! and tests can build them inline.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, Result};

/// Lifecycle state of the consumer loop.
///
/// ```text
/// Disconnected -> Connected -> Subscribed -> Running -> Draining -> Disconnected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    Disconnected,
    Connected,
    Subscribed,
    Running,
    Draining,
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopState::Disconnected => write!(f, "DISCONNECTED"),
            LoopState::Connected => write!(f, "CONNECTED"),
            LoopState::Subscribed => write!(f, "SUBSCRIBED"),
            LoopState::Running => write!(f, "RUNNING"),
            LoopState::Draining => write!(f, "DRAINING"),
        }
    }
}

/// Fetch a required, non-blank key.
pub(crate) fn required(config: &HashMap<String, String>, key: &str) -> Result<String> {
    let value = config
        .get(key)
        .ok_or_else(|| ConnectorError::ConfigError(format!("missing required '{}'", key)))?;

    if value.trim().is_empty() {
        return Err(ConnectorError::ConfigError(format!(
            "'{}' must not be empty",
            key
        )));
    }

    Ok(value.trim().to_string())
}

/// Fetch an optional key, parsing it when present.
pub(crate) fn parsed_or<T>(config: &HashMap<String, String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    config
        .get(key)
        .map(|s| {
            s.trim()
                .parse::<T>()
                .map_err(|e| ConnectorError::ConfigError(format!("invalid {}: {}", key, e)))
        })
        .transpose()
        .map(|v| v.unwrap_or(default))
}

/// Store identifiers are interpolated into SQL, so only `[A-Za-z0-9_]` is
/// accepted.
pub(crate) fn identifier(config: &HashMap<String, String>, key: &str, default: &str) -> Result<String> {
    let value = config
        .get(key)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| default.to_string());

    let valid = !value.is_empty()
        && !value.starts_with(|c: char| c.is_ascii_digit())
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid {
        return Err(ConnectorError::ConfigError(format!(
            "invalid {} '{}': expected letters, digits and underscores",
            key, value
        )));
    }

    Ok(value)
}
