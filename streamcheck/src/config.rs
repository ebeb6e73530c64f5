//! Configuration for the local engine and the tester.

use crate::errors::HarnessError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding [`EngineConfig::delivery_buffer`].
pub const ENV_DELIVERY_BUFFER: &str = "STREAMCHECK_DELIVERY_BUFFER";
/// Environment variable overriding [`EngineConfig::stop_grace_ms`].
pub const ENV_STOP_GRACE_MS: &str = "STREAMCHECK_STOP_GRACE_MS";
/// Environment variable overriding [`TesterConfig::default_timeout_ms`].
pub const ENV_TIMEOUT_MS: &str = "STREAMCHECK_TIMEOUT_MS";

/// Configuration for the in-process execution engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of each observer's delivery queue. A full queue stalls the
    /// producer.
    #[serde(default = "default_delivery_buffer")]
    pub delivery_buffer: usize,
    /// How long a stop request may take before it is a `StopFailure`.
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
}

fn default_delivery_buffer() -> usize {
    1024
}

fn default_stop_grace_ms() -> u64 {
    5_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            delivery_buffer: default_delivery_buffer(),
            stop_grace_ms: default_stop_grace_ms(),
        }
    }
}

impl EngineConfig {
    /// Creates an engine configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the delivery queue capacity.
    #[must_use]
    pub const fn with_delivery_buffer(mut self, capacity: usize) -> Self {
        self.delivery_buffer = capacity;
        self
    }

    /// Sets the stop grace period.
    #[must_use]
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Returns the stop grace period.
    #[must_use]
    pub const fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.delivery_buffer == 0 {
            return Err(HarnessError::Config(
                "delivery_buffer must be at least 1".to_string(),
            ));
        }
        if self.stop_grace_ms == 0 {
            return Err(HarnessError::Config(
                "stop_grace_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the completion controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TesterConfig {
    /// Deadline used when a caller does not pass one.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
        }
    }
}

impl TesterConfig {
    /// Sets the default timeout.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Returns the default timeout.
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Rejects a zero default timeout.
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.default_timeout_ms == 0 {
            return Err(HarnessError::Config(
                "default_timeout_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level harness configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Engine settings.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Tester settings.
    #[serde(default)]
    pub tester: TesterConfig,
}

impl HarnessConfig {
    /// Parses a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, HarnessError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| HarnessError::Config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Builds a configuration from defaults and `STREAMCHECK_*` variables.
    pub fn from_env() -> Result<Self, HarnessError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up by variable name.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, HarnessError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_DELIVERY_BUFFER) {
            self.engine.delivery_buffer = parse_var(ENV_DELIVERY_BUFFER, &value)?;
        }
        if let Some(value) = lookup(ENV_STOP_GRACE_MS) {
            self.engine.stop_grace_ms = parse_var(ENV_STOP_GRACE_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_TIMEOUT_MS) {
            self.tester.default_timeout_ms = parse_var(ENV_TIMEOUT_MS, &value)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), HarnessError> {
        self.engine.validate()?;
        self.tester.validate()
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, HarnessError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| HarnessError::Config(format!("{key}={value:?}: {e}")))
}
