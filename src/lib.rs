//! # Decision Engine
//!
//! Business rule evaluation over decision tables and decision trees. Rule
//! conditions and actions are written in CEL, compiled once and cached.
//!
//! ## Features
//!
//! - **Decision Tables**: AND-combined conditions returning a fixed result map
//! - **Decision Trees**: binary traversal down to a leaf action
//! - **Hit Policies**: stop at the first match or collect every result
//! - **Expression Cache**: bounded, concurrent, compile-once cache of expressions
//! - **Rule Sources**: in-memory, file-backed and TTL-cached rule sets with
//!   periodic refresh
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use decision_engine::{Condition, HitPolicy, InMemoryRuleSource, Rule, RuleEngine};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = Arc::new(InMemoryRuleSource::new());
//!     source.upsert(
//!         Rule::builder("Premium Customer Discount")
//!             .category("PRICING")
//!             .subcategory("DEFAULT")
//!             .condition(Condition::expr("customerType == 'premium'"))
//!             .condition(Condition::expr("orderTotal > 100"))
//!             .result("discountPercent", 20)
//!             .build(),
//!     );
//!
//!     let engine = RuleEngine::builder().with_source(source).build()?;
//!
//!     let mut input = decision_engine::Bindings::new();
//!     input.insert("customerType".into(), json!("premium"));
//!     input.insert("orderTotal".into(), json!(150));
//!
//!     for result in engine.evaluate(&input, "PRICING", "DEFAULT", HitPolicy::First)? {
//!         println!("{}: {:?}", result.rule.name, result.results);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod api;
pub mod cache;
pub mod config;
pub mod core;
pub mod error;
pub mod expression;
pub mod rule;
pub mod source;
pub mod telemetry;

use std::collections::HashMap;

// Re-export main types for convenience
pub use api::{
    EngineMetrics, EvaluationRequest, EvaluationRequestBuilder, ExecutionResult, RuleEngine,
    RuleEngineBuilder, TreeExecutionResult,
};
pub use cache::{CacheStats, ExpressionCache};
pub use config::Config;
pub use error::{Error, ErrorContext, Result};
pub use expression::{CelLanguage, CompiledExpression, ExpressionEngine, ExpressionLanguage};
pub use rule::{Category, Condition, HitPolicy, Metadata, Rule, RuleBuilder, RuleDocument, RuleType};
pub use source::{CachedRuleSource, FileRuleSource, InMemoryRuleSource, RuleSource};

/// Named input variables an expression is evaluated against.
pub type Bindings = HashMap<String, serde_json::Value>;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
