//! Engine configuration.
//!
//! Configuration is layered: built-in defaults, then an optional file, then
//! `DECISION_ENGINE__*` environment variables. Nested keys are separated by
//! `__`, e.g. `DECISION_ENGINE__EXPRESSION__MAX_CACHE_SIZE=5000`.

use crate::{Error, Result};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use validator::Validate;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "DECISION_ENGINE";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    /// Evaluator settings
    #[validate]
    pub engine: EngineConfig,
    /// Expression engine settings
    #[validate]
    pub expression: ExpressionConfig,
    /// Rule source and rule-set cache settings
    #[validate]
    pub rule_source: RuleSourceConfig,
    /// Logging and metrics settings
    pub telemetry: TelemetryConfig,
}

/// Evaluator settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EngineConfig {
    /// Longest root-to-leaf path a decision tree may have
    #[validate(range(min = 1))]
    pub max_tree_depth: usize,
    /// Compile every active rule's expressions when the engine is built
    pub prewarm_active_rules: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tree_depth: 256,
            prewarm_active_rules: false,
        }
    }
}

/// Expression engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ExpressionConfig {
    /// Maximum number of compiled expressions kept before a full flush
    #[validate(range(min = 1))]
    pub max_cache_size: usize,
    /// Expressions compiled eagerly at startup
    pub prewarm: Vec<String>,
}

impl Default for ExpressionConfig {
    fn default() -> Self {
        Self {
            max_cache_size: 10_000,
            prewarm: Vec::new(),
        }
    }
}

/// Rule source settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RuleSourceConfig {
    /// Rule document loaded by the file source
    pub rules_file: Option<PathBuf>,
    /// Time-to-live of cached rule sets, in seconds
    #[validate(range(min = 1))]
    pub cache_ttl_secs: u64,
    /// Maximum number of cached category pairs
    #[validate(range(min = 1))]
    pub cache_capacity: u64,
    /// Interval between scheduled reloads, in seconds
    #[validate(range(min = 1))]
    pub refresh_interval_secs: u64,
}

impl RuleSourceConfig {
    /// Rule-set cache TTL as a duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Reload interval as a duration.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl Default for RuleSourceConfig {
    fn default() -> Self {
        Self {
            rules_file: None,
            cache_ttl_secs: 20,
            cache_capacity: 1_000,
            refresh_interval_secs: 60,
        }
    }
}

/// Logging and metrics settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Record evaluation counters
    pub enabled: bool,
    /// Service name reported by telemetry and the daemon's startup log
    pub service_name: String,
    /// Default log level when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit logs as JSON
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_name: "decision-engine".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl Config {
    /// Load configuration from defaults and the environment.
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Load configuration from a file, overridden by the environment.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::load(Some(path.as_ref()))
    }

    fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all settings.
    pub fn validate(&self) -> Result<()> {
        <Self as Validate>::validate(self).map_err(|e| {
            let key = e
                .field_errors()
                .keys()
                .next()
                .map(|k| k.to_string())
                .unwrap_or_else(|| "config".to_string());
            Error::config_key(e.to_string(), key)
        })
    }
}
