//! Fluent builder for `PoolConfig`
//!
//! Every setter is optional; `build()` runs the cross-field validation so an
//! invalid combination is rejected before a pool ever sees it.

use std::time::Duration;

use super::types::PoolConfig;
use crate::error::ConfigError;

/// Builder for [`PoolConfig`]
#[derive(Debug, Clone, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfig {
    /// Create a builder starting from [`PoolConfig::default`]
    #[must_use]
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }
}

impl PoolConfigBuilder {
    /// Number of handles to create while the pool is being built
    ///
    /// Must not exceed `max_active` when `max_active` is non-zero. The value
    /// is rejected by [`build`](Self::build), never clamped.
    #[must_use]
    pub fn init_active(mut self, n: usize) -> Self {
        self.config.init_active = n;
        self
    }

    /// Maximum number of idle handles retained
    ///
    /// Releasing a handle into a full idle list evicts the least recently
    /// returned one. Zero disables reuse entirely.
    #[must_use]
    pub fn max_idle(mut self, n: usize) -> Self {
        self.config.max_idle = n;
        self
    }

    /// Admission limit; zero means unbounded
    #[must_use]
    pub fn max_active(mut self, n: usize) -> Self {
        self.config.max_active = n;
        self
    }

    /// Close handles idle for longer than `timeout`
    ///
    /// A zero duration disables idle eviction.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Block on exhaustion instead of returning `PoolError::Exhausted`
    ///
    /// Only meaningful together with a non-zero `max_active`.
    #[must_use]
    pub fn wait(mut self, wait: bool) -> Self {
        self.config.wait = wait;
        self
    }

    /// Discard handles older than `lifetime` when they come up for reuse
    ///
    /// A zero duration disables lifetime eviction.
    #[must_use]
    pub fn max_conn_lifetime(mut self, lifetime: Duration) -> Self {
        self.config.max_conn_lifetime = (!lifetime.is_zero()).then_some(lifetime);
        self
    }

    /// Validate and produce the configuration
    ///
    /// # Errors
    ///
    /// See [`PoolConfig::validate`].
    pub fn build(self) -> Result<PoolConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_unbounded_and_non_blocking() {
        let config = PoolConfig::builder().build().expect("default config is valid");
        assert_eq!(config.init_active(), 0);
        assert_eq!(config.max_idle(), 2);
        assert_eq!(config.max_active(), 0);
        assert!(!config.wait());
        assert_eq!(config.idle_timeout(), None);
        assert_eq!(config.max_conn_lifetime(), None);
    }

    #[test]
    fn init_active_above_max_active_is_rejected() {
        let err = PoolConfig::builder()
            .init_active(7)
            .max_active(6)
            .build()
            .expect_err("init_active > max_active must fail");
        assert_eq!(
            err,
            ConfigError::InitExceedsMaxActive {
                init_active: 7,
                max_active: 6
            }
        );
    }

    #[test]
    fn init_active_is_free_when_unbounded() {
        let config = PoolConfig::builder()
            .init_active(10)
            .max_idle(10)
            .build()
            .expect("unbounded pool accepts any init_active");
        assert_eq!(config.init_active(), 10);
    }

    #[test]
    fn zero_durations_disable_eviction() {
        let config = PoolConfig::builder()
            .idle_timeout(Duration::ZERO)
            .max_conn_lifetime(Duration::ZERO)
            .build()
            .expect("valid config");
        assert_eq!(config.idle_timeout(), None);
        assert_eq!(config.max_conn_lifetime(), None);
    }

    #[test]
    fn json_round_trips_through_millis() {
        let config = PoolConfig::builder()
            .init_active(3)
            .max_idle(5)
            .max_active(6)
            .idle_timeout(Duration::from_secs(60))
            .wait(true)
            .max_conn_lifetime(Duration::from_secs(3600))
            .build()
            .expect("valid config");

        let json = serde_json::to_string(&config).expect("serializable");
        assert!(json.contains("\"idle_timeout_ms\":60000"));
        assert!(json.contains("\"max_conn_lifetime_ms\":3600000"));

        let parsed = PoolConfig::from_json_str(&json).expect("parses back");
        assert_eq!(parsed, config);
    }

    #[test]
    fn json_missing_fields_use_defaults_and_are_validated() {
        let parsed = PoolConfig::from_json_str(r#"{"max_active": 4, "wait": true}"#)
            .expect("partial config parses");
        assert_eq!(parsed.max_active(), 4);
        assert!(parsed.wait());
        assert_eq!(parsed.max_idle(), 2);

        let err = PoolConfig::from_json_str(r#"{"init_active": 5, "max_active": 1}"#)
            .expect_err("invalid combination");
        assert!(matches!(err, ConfigError::InitExceedsMaxActive { .. }));

        let err = PoolConfig::from_json_str("{not json").expect_err("malformed");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn oversized_durations_saturate_in_json() {
        let config = PoolConfig::builder()
            .idle_timeout(Duration::MAX)
            .build()
            .expect("valid config");
        let json = serde_json::to_string(&config).expect("serializable");
        assert!(json.contains(&format!("\"idle_timeout_ms\":{}", u64::MAX)));

        let parsed = PoolConfig::from_json_str(&json).expect("parses back");
        assert_eq!(parsed.idle_timeout(), Some(Duration::from_millis(u64::MAX)));
    }
}
