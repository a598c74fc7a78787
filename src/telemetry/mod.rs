//! Telemetry and logging for the decision engine.
//!
//! Evaluation counters are kept in atomics so the hot path never takes a
//! lock. Log output goes through `tracing`; [`init_logging`] installs the
//! subscriber used by the daemon.

use crate::config::TelemetryConfig;
use crate::{Error, Result};

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Which evaluation entry point produced a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationKind {
    /// Decision-table evaluation
    Table,
    /// Decision-tree evaluation
    Tree,
}

/// Telemetry instance for recording evaluation metrics.
pub struct Telemetry {
    /// Configuration
    config: TelemetryConfig,
    /// Evaluation counters by kind
    table_evaluations: AtomicU64,
    tree_evaluations: AtomicU64,
    /// Rules evaluated and matched across all calls
    rules_evaluated: AtomicU64,
    rules_matched: AtomicU64,
    /// Failed calls
    errors: AtomicU64,
    validation_errors: AtomicU64,
    expression_errors: AtomicU64,
    /// Total evaluation time in microseconds
    total_evaluation_time_us: AtomicU64,
}

impl Telemetry {
    /// Create a new telemetry instance.
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        if config.service_name.trim().is_empty() {
            return Err(Error::config_key(
                "Service name cannot be empty",
                "telemetry.service_name",
            ));
        }

        Ok(Self {
            config: config.clone(),
            table_evaluations: AtomicU64::new(0),
            tree_evaluations: AtomicU64::new(0),
            rules_evaluated: AtomicU64::new(0),
            rules_matched: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            validation_errors: AtomicU64::new(0),
            expression_errors: AtomicU64::new(0),
            total_evaluation_time_us: AtomicU64::new(0),
        })
    }

    /// Record a completed evaluation call.
    pub fn record_evaluation(
        &self,
        kind: EvaluationKind,
        rules_evaluated: usize,
        rules_matched: usize,
        duration: Duration,
    ) {
        match kind {
            EvaluationKind::Table => self.table_evaluations.fetch_add(1, Ordering::Relaxed),
            EvaluationKind::Tree => self.tree_evaluations.fetch_add(1, Ordering::Relaxed),
        };

        self.rules_evaluated
            .fetch_add(rules_evaluated as u64, Ordering::Relaxed);
        self.rules_matched
            .fetch_add(rules_matched as u64, Ordering::Relaxed);
        self.total_evaluation_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record a failed evaluation call.
    pub fn record_error(&self, error: &Error) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        if error.is_validation() {
            self.validation_errors.fetch_add(1, Ordering::Relaxed);
        } else if error.is_expression() {
            self.expression_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get current metrics.
    pub fn metrics(&self) -> TelemetryMetrics {
        let table_evaluations = self.table_evaluations.load(Ordering::Relaxed);
        let tree_evaluations = self.tree_evaluations.load(Ordering::Relaxed);
        let total_evaluations = table_evaluations + tree_evaluations;

        let total_time_us = self.total_evaluation_time_us.load(Ordering::Relaxed);
        let avg_evaluation_time_ms = if total_evaluations > 0 {
            (total_time_us as f64 / total_evaluations as f64) / 1000.0
        } else {
            0.0
        };

        TelemetryMetrics {
            total_evaluations,
            table_evaluations,
            tree_evaluations,
            rules_evaluated: self.rules_evaluated.load(Ordering::Relaxed),
            rules_matched: self.rules_matched.load(Ordering::Relaxed),
            avg_evaluation_time_ms,
            errors: self.errors.load(Ordering::Relaxed),
            validation_errors: self.validation_errors.load(Ordering::Relaxed),
            expression_errors: self.expression_errors.load(Ordering::Relaxed),
        }
    }

    /// Check if telemetry is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Get the service name.
    pub fn service_name(&self) -> &str {
        &self.config.service_name
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("service_name", &self.config.service_name)
            .field("enabled", &self.config.enabled)
            .finish()
    }
}

/// Metrics collected by telemetry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetryMetrics {
    /// Total number of evaluation calls
    pub total_evaluations: u64,
    /// Decision-table evaluation calls
    pub table_evaluations: u64,
    /// Decision-tree evaluation calls
    pub tree_evaluations: u64,
    /// Rules (or tree roots) evaluated
    pub rules_evaluated: u64,
    /// Rules (or tree roots) that matched
    pub rules_matched: u64,
    /// Average evaluation time in milliseconds
    pub avg_evaluation_time_ms: f64,
    /// Total failed calls
    pub errors: u64,
    /// Calls rejected by input validation
    pub validation_errors: u64,
    /// Calls aborted by an expression error
    pub expression_errors: u64,
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `level`. Fails if a subscriber is
/// already installed.
pub fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| Error::config_key(e.to_string(), "telemetry.log_level"))?;

    let installed = if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    installed.map_err(|e| Error::internal(format!("Failed to install log subscriber: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_creation() {
        let config = TelemetryConfig::default();
        let telemetry = Telemetry::new(&config).unwrap();
        assert!(telemetry.is_enabled());
        assert_eq!(telemetry.service_name(), "decision-engine");
    }

    #[test]
    fn test_blank_service_name_rejected() {
        let config = TelemetryConfig {
            service_name: " ".to_string(),
            ..Default::default()
        };
        assert!(Telemetry::new(&config).is_err());
    }

    #[test]
    fn test_record_evaluation() {
        let telemetry = Telemetry::new(&TelemetryConfig::default()).unwrap();

        telemetry.record_evaluation(EvaluationKind::Table, 3, 1, Duration::from_millis(4));
        telemetry.record_evaluation(EvaluationKind::Tree, 2, 2, Duration::from_millis(2));
        telemetry.record_error(&Error::MissingCategory);
        telemetry.record_error(&Error::evaluation("x > 1", "no such key"));

        let metrics = telemetry.metrics();
        assert_eq!(metrics.total_evaluations, 2);
        assert_eq!(metrics.table_evaluations, 1);
        assert_eq!(metrics.tree_evaluations, 1);
        assert_eq!(metrics.rules_evaluated, 5);
        assert_eq!(metrics.rules_matched, 3);
        assert!((metrics.avg_evaluation_time_ms - 3.0).abs() < 0.01);
        assert_eq!(metrics.errors, 2);
        assert_eq!(metrics.validation_errors, 1);
        assert_eq!(metrics.expression_errors, 1);
    }
}
