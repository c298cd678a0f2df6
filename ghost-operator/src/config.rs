//! Operator configuration.

use crate::error::{OperatorError, OperatorResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable naming the controller in events.
pub const ENV_CONTROLLER_NAME: &str = "GHOST_CONTROLLER_NAME";
/// Environment variable holding the resync interval in seconds.
pub const ENV_RESYNC_SECS: &str = "GHOST_RESYNC_SECS";
/// Environment variable holding the first retry delay in seconds.
pub const ENV_BACKOFF_INITIAL_SECS: &str = "GHOST_BACKOFF_INITIAL_SECS";
/// Environment variable holding the maximum retry delay in seconds.
pub const ENV_BACKOFF_MAX_SECS: &str = "GHOST_BACKOFF_MAX_SECS";
/// Environment variable restricting the watch to one namespace.
pub const ENV_WATCH_NAMESPACE: &str = "GHOST_WATCH_NAMESPACE";

/// Configuration for the operator process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperatorConfig {
    /// Name reported as the source of Kubernetes Events.
    pub controller_name: String,

    /// Interval after which a reconciled Ghost is reconciled again.
    pub resync_interval: Duration,

    /// Delay before the first retry of a failed reconciliation.
    pub backoff_initial: Duration,

    /// Upper bound for the retry delay.
    pub backoff_max: Duration,

    /// Only watch this namespace. All namespaces when unset.
    pub watch_namespace: Option<String>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            controller_name: "ghost-controller".to_string(),
            resync_interval: Duration::from_secs(300),
            backoff_initial: Duration::from_secs(5),
            backoff_max: Duration::from_secs(300),
            watch_namespace: None,
        }
    }
}

impl OperatorConfig {
    /// Create a new configuration builder.
    pub fn builder() -> OperatorConfigBuilder {
        OperatorConfigBuilder::default()
    }

    /// Load the configuration from the process environment.
    pub fn from_env() -> OperatorResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the configuration from `lookup`, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> OperatorResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(name) = lookup(ENV_CONTROLLER_NAME) {
            config.controller_name = name;
        }
        if let Some(secs) = lookup(ENV_RESYNC_SECS) {
            config.resync_interval = parse_secs(ENV_RESYNC_SECS, &secs)?;
        }
        if let Some(secs) = lookup(ENV_BACKOFF_INITIAL_SECS) {
            config.backoff_initial = parse_secs(ENV_BACKOFF_INITIAL_SECS, &secs)?;
        }
        if let Some(secs) = lookup(ENV_BACKOFF_MAX_SECS) {
            config.backoff_max = parse_secs(ENV_BACKOFF_MAX_SECS, &secs)?;
        }
        config.watch_namespace = lookup(ENV_WATCH_NAMESPACE).filter(|ns| !ns.is_empty());

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> OperatorResult<()> {
        if self.controller_name.is_empty() {
            return Err(OperatorError::InvalidConfig(
                "controller_name must not be empty".into(),
            ));
        }
        if self.resync_interval.is_zero() {
            return Err(OperatorError::InvalidConfig(
                "resync_interval must be > 0".into(),
            ));
        }
        if self.backoff_initial.is_zero() {
            return Err(OperatorError::InvalidConfig(
                "backoff_initial must be > 0".into(),
            ));
        }
        if self.backoff_initial > self.backoff_max {
            return Err(OperatorError::InvalidConfig(format!(
                "backoff_initial ({:?}) must not exceed backoff_max ({:?})",
                self.backoff_initial, self.backoff_max
            )));
        }
        Ok(())
    }
}

fn parse_secs(key: &str, value: &str) -> OperatorResult<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| OperatorError::InvalidConfig(format!("{key}={value:?}: {e}")))
}

/// Builder for OperatorConfig.
#[derive(Debug, Default)]
pub struct OperatorConfigBuilder {
    config: OperatorConfig,
}

impl OperatorConfigBuilder {
    /// Set the controller name.
    pub fn controller_name(mut self, name: impl Into<String>) -> Self {
        self.config.controller_name = name.into();
        self
    }

    /// Set the resync interval.
    pub fn resync_interval(mut self, interval: Duration) -> Self {
        self.config.resync_interval = interval;
        self
    }

    /// Set the retry backoff bounds.
    pub fn backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.config.backoff_initial = initial;
        self.config.backoff_max = max;
        self
    }

    /// Restrict the watch to one namespace.
    pub fn watch_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.watch_namespace = Some(namespace.into());
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> OperatorResult<OperatorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
