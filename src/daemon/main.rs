//! Decision Engine Daemon
//!
//! Loads a rule document, keeps it refreshed on a schedule, and can evaluate
//! a single request from the command line.

use decision_engine::source::spawn_refresh;
use decision_engine::telemetry::init_logging;
use decision_engine::{
    CachedRuleSource, Config, Error, EvaluationRequest, FileRuleSource, InMemoryRuleSource, Result,
    RuleEngine, RuleSource,
};

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Decision Engine Daemon
#[derive(Parser, Debug)]
#[command(name = "decision-engine")]
#[command(about = "Decision table and decision tree rule engine")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Rule document to load (YAML or JSON)
    #[arg(short = 'f', long, env = "RULES_FILE")]
    rules_file: Option<PathBuf>,

    /// Evaluate one request (JSON, or @path to a JSON file) and exit
    #[arg(short, long)]
    request: Option<String>,

    /// Evaluation mode for --request
    #[arg(long, value_enum, default_value_t = Mode::Table)]
    mode: Mode,

    /// Log level
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON log format
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,

    /// Maximum number of compiled expressions to cache
    #[arg(long)]
    cache_size: Option<usize>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Decision tables
    Table,
    /// Decision trees
    Tree,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    // Apply command line overrides
    if let Some(level) = &args.log_level {
        config.telemetry.log_level = level.clone();
    }
    if args.json_logs {
        config.telemetry.json_logs = true;
    }
    if let Some(size) = args.cache_size {
        config.expression.max_cache_size = size;
    }
    if let Some(path) = &args.rules_file {
        config.rule_source.rules_file = Some(path.clone());
    }
    config.validate()?;

    init_logging(&config.telemetry.log_level, config.telemetry.json_logs)?;
    info!(
        service = %config.telemetry.service_name,
        "Starting Decision Engine v{}",
        decision_engine::VERSION
    );

    let cached = match &config.rule_source.rules_file {
        Some(path) => {
            info!("Loading rule file: {:?}", path);
            Some(Arc::new(CachedRuleSource::new(
                FileRuleSource::open(path)?,
                config.rule_source.cache_ttl(),
                config.rule_source.cache_capacity,
            )))
        }
        None => None,
    };
    let source: Arc<dyn RuleSource> = match &cached {
        Some(cached) => cached.clone(),
        None => Arc::new(InMemoryRuleSource::new()),
    };

    let engine = RuleEngine::builder()
        .with_config(config.clone())
        .with_source(source)
        .build()?;

    if let Some(request) = &args.request {
        return evaluate_once(&engine, request, args.mode);
    }

    info!(
        "Decision Engine ready. Active rules: {}",
        engine.metrics().active_rules.unwrap_or(0)
    );

    let refresh = cached.map(|source| {
        info!(
            "Reloading rules every {}s",
            config.rule_source.refresh_interval_secs
        );
        spawn_refresh(source, config.rule_source.refresh_interval())
    });

    // Keep running until shutdown signal
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| Error::internal(format!("Failed to listen for shutdown signal: {}", e)))?;

    if let Some(handle) = refresh {
        handle.abort();
    }
    info!("Shutting down Decision Engine");
    Ok(())
}

/// Evaluate a single request and print the results as JSON.
fn evaluate_once(engine: &RuleEngine, request: &str, mode: Mode) -> Result<()> {
    let body = match request.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)?,
        None => request.to_string(),
    };
    let request: EvaluationRequest = serde_json::from_str(&body)?;

    let output = match mode {
        Mode::Table => serde_json::to_string_pretty(&engine.evaluate_rules(&request)?)?,
        Mode::Tree => serde_json::to_string_pretty(&engine.evaluate_decision_tree(&request)?)?,
    };
    println!("{}", output);
    Ok(())
}
