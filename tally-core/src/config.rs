//! Configuration types

use crate::constants::{
    DEFAULT_CLEANUP_EVERY_CHECKS, DEFAULT_QUORUM_TTL_SECS, DEFAULT_SWEEP_INTERVAL_SECS,
    ENV_CLEANUP_EVERY_CHECKS, ENV_DEFAULT_TTL_SECS, ENV_SWEEP_INTERVAL_SECS, UNBOUNDED_TTL_SECS,
};
use crate::error::{ConfigError, TallyResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Registry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// TTL in seconds for quorum subscriptions registered without one.
    /// Non-positive values mean "never expires".
    pub default_ttl_secs: i64,

    /// Number of quorum checks between count-triggered cleanups
    /// (default: 10,000)
    pub cleanup_every_checks: u64,

    /// How often the periodic sweeper runs (default: 60 seconds)
    pub sweep_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: DEFAULT_QUORUM_TTL_SECS,
            cleanup_every_checks: DEFAULT_CLEANUP_EVERY_CHECKS,
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

impl RegistryConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create RegistryConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `TALLY_DEFAULT_TTL_SECS`: Default quorum TTL (default: unbounded)
    /// - `TALLY_CLEANUP_EVERY_CHECKS`: Checks between cleanups (default: 10000)
    /// - `TALLY_SWEEP_INTERVAL_SECS`: Periodic sweep interval (default: 60)
    ///
    /// Unset or unparseable variables fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let default_ttl_secs = std::env::var(ENV_DEFAULT_TTL_SECS)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.default_ttl_secs);

        let cleanup_every_checks = std::env::var(ENV_CLEANUP_EVERY_CHECKS)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.cleanup_every_checks);

        let sweep_interval = std::env::var(ENV_SWEEP_INTERVAL_SECS)
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.sweep_interval);

        Self {
            default_ttl_secs,
            cleanup_every_checks,
            sweep_interval,
        }
    }

    /// Set the default quorum TTL.
    pub fn with_default_ttl(mut self, secs: i64) -> Self {
        self.default_ttl_secs = secs;
        self
    }

    /// Set the cleanup trigger threshold.
    pub fn with_cleanup_every(mut self, checks: u64) -> Self {
        self.cleanup_every_checks = checks;
        self
    }

    /// Set the periodic sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// The default TTL actually applied, with non-positive values coerced
    /// to the unbounded TTL.
    pub fn effective_default_ttl(&self) -> i64 {
        if self.default_ttl_secs <= 0 {
            UNBOUNDED_TTL_SECS
        } else {
            self.default_ttl_secs
        }
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - cleanup_every_checks > 0
    /// - sweep_interval > 0
    pub fn validate(&self) -> TallyResult<()> {
        if self.cleanup_every_checks == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cleanup_every_checks".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            }
            .into());
        }

        if self.sweep_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "sweep_interval".to_string(),
                value: format!("{:?}", self.sweep_interval),
                reason: "must be positive".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TallyError;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    struct EnvVarGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let previous = std::env::var(key).ok();
            match value {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
            Self { key, previous }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.previous.as_deref() {
                Some(value) => std::env::set_var(self.key, value),
                None => std::env::remove_var(self.key),
            }
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = RegistryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cleanup_every_checks, 10_000);
    }

    #[test]
    fn test_non_positive_ttl_is_unbounded() {
        let config = RegistryConfig::new().with_default_ttl(0);
        assert_eq!(config.effective_default_ttl(), i32::MAX as i64);

        let config = RegistryConfig::new().with_default_ttl(-30);
        assert_eq!(config.effective_default_ttl(), i32::MAX as i64);

        let config = RegistryConfig::new().with_default_ttl(30);
        assert_eq!(config.effective_default_ttl(), 30);
    }

    #[test]
    fn test_zero_cleanup_threshold_rejected() {
        let err = RegistryConfig::new()
            .with_cleanup_every(0)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            TallyError::Config(ConfigError::InvalidValue { ref field, .. }) if field == "cleanup_every_checks"
        ));
    }

    #[test]
    fn test_zero_sweep_interval_rejected() {
        let result = RegistryConfig::new()
            .with_sweep_interval(Duration::ZERO)
            .validate();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = RegistryConfig::new()
            .with_default_ttl(120)
            .with_cleanup_every(500);
        let json = serde_json::to_string(&config).unwrap();
        let back: RegistryConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_from_env_reads_valid_values() {
        let _env_lock = ENV_MUTEX.lock().expect("env mutex should not be poisoned");
        let _ttl = EnvVarGuard::set(ENV_DEFAULT_TTL_SECS, Some("90"));
        let _every = EnvVarGuard::set(ENV_CLEANUP_EVERY_CHECKS, Some("250"));
        let _sweep = EnvVarGuard::set(ENV_SWEEP_INTERVAL_SECS, Some("15"));

        let config = RegistryConfig::from_env();
        assert_eq!(config.default_ttl_secs, 90);
        assert_eq!(config.cleanup_every_checks, 250);
        assert_eq!(config.sweep_interval, Duration::from_secs(15));
    }

    #[test]
    fn test_from_env_falls_back_on_garbage() {
        let _env_lock = ENV_MUTEX.lock().expect("env mutex should not be poisoned");
        let _ttl = EnvVarGuard::set(ENV_DEFAULT_TTL_SECS, Some("soon"));
        let _every = EnvVarGuard::set(ENV_CLEANUP_EVERY_CHECKS, Some("-3"));
        let _sweep = EnvVarGuard::set(ENV_SWEEP_INTERVAL_SECS, Some("1.5"));

        assert_eq!(RegistryConfig::from_env(), RegistryConfig::default());
    }

    #[test]
    fn test_from_env_unset_is_default() {
        let _env_lock = ENV_MUTEX.lock().expect("env mutex should not be poisoned");
        let _ttl = EnvVarGuard::set(ENV_DEFAULT_TTL_SECS, None);
        let _every = EnvVarGuard::set(ENV_CLEANUP_EVERY_CHECKS, None);
        let _sweep = EnvVarGuard::set(ENV_SWEEP_INTERVAL_SECS, None);

        assert_eq!(RegistryConfig::from_env(), RegistryConfig::default());
    }
}
