//! Ingest configuration
//!
//! Library defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder calls
//! 2. Environment variables (`from_env()` only)
//! 3. Library defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use ingest_runtime::IngestConfig;
//!
//! let config = IngestConfig::from_env()
//!     .staging_capacity(64 * 1024)
//!     .wake_threshold(0.75);
//! ```

use std::time::Duration;

use ingest_core::env::{env_get, env_get_bytes};
use thiserror::Error;

/// Library defaults
pub mod defaults {
    use ingest_core::constants;

    pub const STAGING_CAPACITY: usize = constants::DEFAULT_STAGING_CAPACITY;
    pub const WAKE_THRESHOLD: f32 = constants::DEFAULT_WAKE_THRESHOLD;
    pub const IDLE_POLL_MS: u64 = 100;
    pub const THREAD_NAME: &str = "ingest-drain";
}

/// Controller configuration with builder pattern.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Staging buffer capacity in bytes
    pub staging_capacity: usize,
    /// Fullness in (0, 1] at which the drain thread is woken
    pub wake_threshold: f32,
    /// How often an idle drain thread re-checks fullness (None = only on wake)
    pub idle_poll: Option<Duration>,
    /// Drain thread name
    pub thread_name: String,
    /// Drain thread stack size (None = system default)
    pub stack_size: Option<usize>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestConfig {
    /// Create config from library defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `INGEST_STAGING_CAPACITY` - Staging capacity, e.g. `4096`, `64k`, `1m`
    /// - `INGEST_WAKE_THRESHOLD` - Wake threshold fraction
    /// - `INGEST_IDLE_POLL_MS` - Idle re-check interval, 0 disables
    /// - `INGEST_THREAD_NAME` - Drain thread name
    pub fn from_env() -> Self {
        let idle_poll_ms: u64 = env_get("INGEST_IDLE_POLL_MS", defaults::IDLE_POLL_MS);
        Self {
            staging_capacity: env_get_bytes("INGEST_STAGING_CAPACITY", defaults::STAGING_CAPACITY),
            wake_threshold: env_get("INGEST_WAKE_THRESHOLD", defaults::WAKE_THRESHOLD),
            idle_poll: (idle_poll_ms > 0).then(|| Duration::from_millis(idle_poll_ms)),
            thread_name: env_get("INGEST_THREAD_NAME", defaults::THREAD_NAME.to_string()),
            stack_size: None,
        }
    }

    /// Create config with library defaults only (no env override).
    /// Useful for testing.
    pub fn new() -> Self {
        Self {
            staging_capacity: defaults::STAGING_CAPACITY,
            wake_threshold: defaults::WAKE_THRESHOLD,
            idle_poll: Some(Duration::from_millis(defaults::IDLE_POLL_MS)),
            thread_name: defaults::THREAD_NAME.to_string(),
            stack_size: None,
        }
    }

    // Builder methods

    pub fn staging_capacity(mut self, bytes: usize) -> Self {
        self.staging_capacity = bytes;
        self
    }

    pub fn wake_threshold(mut self, fraction: f32) -> Self {
        self.wake_threshold = fraction;
        self
    }

    pub fn idle_poll(mut self, interval: Option<Duration>) -> Self {
        self.idle_poll = interval;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn stack_size(mut self, size: Option<usize>) -> Self {
        self.stack_size = size;
        self
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.staging_capacity == 0 {
            return Err(ConfigError::InvalidValue("staging_capacity must be > 0"));
        }
        if self.staging_capacity > ingest_core::constants::MAX_STAGING_CAPACITY {
            return Err(ConfigError::InvalidValue("staging_capacity must be <= 1GiB"));
        }
        if !(self.wake_threshold > 0.0 && self.wake_threshold <= 1.0) {
            return Err(ConfigError::InvalidValue("wake_threshold must be in (0, 1]"));
        }
        if self.idle_poll == Some(Duration::ZERO) {
            return Err(ConfigError::InvalidValue("idle_poll must be non-zero when set"));
        }
        if self.thread_name.is_empty() {
            return Err(ConfigError::InvalidValue("thread_name must not be empty"));
        }
        Ok(())
    }

    /// Log configuration at info level
    pub fn log(&self) {
        tracing::info!(
            staging_capacity = self.staging_capacity,
            wake_threshold = self.wake_threshold,
            idle_poll = ?self.idle_poll,
            thread_name = %self.thread_name,
            stack_size = ?self.stack_size,
            "ingest configuration"
        );
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = IngestConfig::new();
        assert_eq!(config.staging_capacity, 1024);
        assert_eq!(config.wake_threshold, 0.5);
        assert_eq!(config.thread_name, "ingest-drain");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_ignores_env() {
        std::env::set_var("INGEST_THREAD_NAME", "from-env");
        let config = IngestConfig::default();
        std::env::remove_var("INGEST_THREAD_NAME");

        assert_eq!(config.thread_name, "ingest-drain");
        assert_eq!(config.staging_capacity, IngestConfig::new().staging_capacity);
        assert_eq!(config.idle_poll, Some(Duration::from_millis(defaults::IDLE_POLL_MS)));
    }

    #[test]
    fn test_from_env_override() {
        std::env::set_var("INGEST_STAGING_CAPACITY", "4k");
        std::env::set_var("INGEST_IDLE_POLL_MS", "0");
        let config = IngestConfig::from_env();
        std::env::remove_var("INGEST_STAGING_CAPACITY");
        std::env::remove_var("INGEST_IDLE_POLL_MS");

        assert_eq!(config.staging_capacity, 4096);
        assert_eq!(config.idle_poll, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = IngestConfig::new()
            .staging_capacity(16)
            .wake_threshold(0.75)
            .idle_poll(None)
            .thread_name("drain-test");

        assert_eq!(config.staging_capacity, 16);
        assert_eq!(config.wake_threshold, 0.75);
        assert_eq!(config.idle_poll, None);
        assert_eq!(config.thread_name, "drain-test");
    }

    #[test]
    fn test_validation() {
        assert!(IngestConfig::new().staging_capacity(0).validate().is_err());
        assert!(IngestConfig::new().staging_capacity(1 << 31).validate().is_err());
        assert!(IngestConfig::new().wake_threshold(0.0).validate().is_err());
        assert!(IngestConfig::new().wake_threshold(1.5).validate().is_err());
        assert!(IngestConfig::new().wake_threshold(f32::NAN).validate().is_err());
        assert!(IngestConfig::new().wake_threshold(1.0).validate().is_ok());
        assert!(IngestConfig::new()
            .idle_poll(Some(Duration::ZERO))
            .validate()
            .is_err());
        assert_eq!(
            IngestConfig::new().thread_name("").validate(),
            Err(ConfigError::InvalidValue("thread_name must not be empty"))
        );
    }

    #[test]
    fn test_error_display() {
        let e = ConfigError::InvalidValue("staging_capacity must be > 0");
        assert_eq!(e.to_string(), "invalid config: staging_capacity must be > 0");
    }
}
