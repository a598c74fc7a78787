//! Public API for the decision engine.
//!
//! This module provides the main interface for evaluating rules, including
//! the `RuleEngine` struct, evaluation requests and result types.

mod engine;
mod request;
mod result;

pub use engine::{EngineMetrics, RuleEngine, RuleEngineBuilder};
pub use request::{EvaluationRequest, EvaluationRequestBuilder};
pub use result::{ExecutionResult, TreeExecutionResult};
