//! # Dispatcher Configuration
//!
//! Layered configuration for the checkpoint tracker and the subscription dispatcher.
//!
//! ## Architecture
//!
//! - **Defaults**: every field has a default derived from [`crate::constants`]
//! - **Files**: optional `relay-dispatch.toml` plus an environment-specific override
//! - **Environment variables**: `RELAY_DISPATCH__<SECTION>__<FIELD>` wins over files
//! - **Explicit Validation**: invalid values are rejected at load time
//!
//! ## Usage
//!
//! ```rust,no_run
//! use relay_dispatch::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let interval = manager.config().checkpoint.flush_interval();
//! let tolerance = manager.config().subscriptions.created_at_tolerance_seconds;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{
    CHECKPOINT_KIND, CHECKPOINT_TAG_PREFIX, CREATED_AT_TOLERANCE_SECONDS,
    DEFAULT_HANDLER_CONCURRENCY, FLUSH_INTERVAL_SECONDS,
};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring relay-dispatch.toml
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Deployment environment (development, test, production)
    pub environment: String,

    /// Checkpoint record and flush settings
    pub checkpoint: CheckpointConfig,

    /// Per-handler subscription settings
    pub subscriptions: SubscriptionConfig,

    /// Structured logging settings
    pub logging: LoggingConfig,
}

/// Checkpoint record and flush cycle configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Event kind of published checkpoint records
    pub kind: u16,
    /// Prefix of the `d` tag value, followed by `:<handler>`
    pub tag_prefix: String,
    /// Seconds between flush cycles
    pub flush_interval_seconds: u64,
}

impl CheckpointConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_seconds)
    }
}

/// Subscription window and delivery configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Seconds subtracted from a resumed checkpoint
    pub created_at_tolerance_seconds: u64,
    /// Maximum in-flight handler invocations per subscription
    pub handler_concurrency: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive overriding the environment default (e.g. `info,relay_dispatch=debug`)
    pub level: Option<String>,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            checkpoint: CheckpointConfig::default(),
            subscriptions: SubscriptionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            kind: CHECKPOINT_KIND,
            tag_prefix: CHECKPOINT_TAG_PREFIX.to_string(),
            flush_interval_seconds: FLUSH_INTERVAL_SECONDS,
        }
    }
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            created_at_tolerance_seconds: CREATED_AT_TOLERANCE_SECONDS,
            handler_concurrency: DEFAULT_HANDLER_CONCURRENCY,
        }
    }
}

impl DispatcherConfig {
    /// Validate cross-field constraints
    pub fn validate(&self) -> ConfigResult<()> {
        if self.checkpoint.flush_interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "checkpoint.flush_interval_seconds",
                "0",
                "flush interval must be at least one second",
            ));
        }

        let prefix = &self.checkpoint.tag_prefix;
        if prefix.is_empty() || prefix.contains(':') {
            return Err(ConfigurationError::invalid_value(
                "checkpoint.tag_prefix",
                prefix.clone(),
                "tag prefix must be non-empty and must not contain ':'",
            ));
        }

        if self.subscriptions.handler_concurrency == 0 {
            return Err(ConfigurationError::invalid_value(
                "subscriptions.handler_concurrency",
                "0",
                "at least one event must be allowed in flight",
            ));
        }

        Ok(())
    }
}
