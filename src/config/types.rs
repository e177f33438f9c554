//! Core configuration type for the page pool
//!
//! `PoolConfig` is immutable once a pool has been built from it. Durations are
//! serialized as integer milliseconds so configuration files stay readable.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Pool sizing and eviction settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Handles created and parked in the idle list during construction
    pub(crate) init_active: usize,

    /// Maximum number of idle handles kept for reuse
    pub(crate) max_idle: usize,

    /// Maximum number of handles (idle + checked out) alive at once.
    /// Zero means unbounded.
    pub(crate) max_active: usize,

    /// Close handles that stayed idle longer than this. `None` disables it.
    #[serde(rename = "idle_timeout_ms", with = "optional_millis")]
    pub(crate) idle_timeout: Option<Duration>,

    /// Block in `acquire` when `max_active` is reached instead of failing
    pub(crate) wait: bool,

    /// Close handles older than this instead of reusing them. `None` disables it.
    #[serde(rename = "max_conn_lifetime_ms", with = "optional_millis")]
    pub(crate) max_conn_lifetime: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            init_active: 0,
            max_idle: 2,
            max_active: 0,
            idle_timeout: None,
            wait: false,
            max_conn_lifetime: None,
        }
    }
}

impl PoolConfig {
    /// Check cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InitExceedsMaxActive`] when more handles are
    /// requested at startup than `max_active` permits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_active > 0 && self.init_active > self.max_active {
            return Err(ConfigError::InitExceedsMaxActive {
                init_active: self.init_active,
                max_active: self.max_active,
            });
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration
    ///
    /// Missing fields fall back to [`PoolConfig::default`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed JSON and any validation error.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }
}

/// Serialize `Option<Duration>` as optional milliseconds; zero reads as `None`
mod optional_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => {
                serializer.serialize_some(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.filter(|ms| *ms > 0).map(Duration::from_millis))
    }
}
