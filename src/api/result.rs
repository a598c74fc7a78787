//! Evaluation results.

use crate::rule::{Condition, Metadata, Rule};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome of evaluating one decision-table rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// The evaluated rule
    pub rule: Arc<Rule>,
    /// Whether every condition evaluated true
    pub rule_criteria_met: bool,
    /// The rule's results when matched, otherwise empty
    pub results: HashMap<String, serde_json::Value>,
    /// Input snapshot and timing
    pub metadata: Metadata,
}

impl ExecutionResult {
    /// Name of the evaluated rule.
    pub fn rule_name(&self) -> &str {
        &self.rule.name
    }
}

/// Outcome of one decision-tree traversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeExecutionResult {
    /// The rule the tree belongs to
    pub rule: Arc<Rule>,
    /// The leaf that was reached
    pub condition: Condition,
    /// Visited nodes from root to leaf inclusive, without their children
    pub executed_nodes: Vec<Condition>,
    /// Leaf action result keyed by the action text
    pub results: HashMap<String, serde_json::Value>,
    /// Always true once a leaf is reached
    pub rule_criteria_met: bool,
    /// Input snapshot and timing
    pub metadata: Metadata,
}

impl TreeExecutionResult {
    /// Name of the evaluated rule.
    pub fn rule_name(&self) -> &str {
        &self.rule.name
    }

    /// The leaf's action result, if it produced one.
    pub fn action_result(&self) -> Option<&serde_json::Value> {
        self.condition
            .action
            .as_ref()
            .and_then(|action| self.results.get(action))
    }
}
