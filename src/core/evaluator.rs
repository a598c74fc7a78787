//! Decision table and decision tree evaluator.

use crate::api::{ExecutionResult, TreeExecutionResult};
use crate::error::ErrorContext;
use crate::expression::ExpressionEngine;
use crate::rule::{Condition, HitPolicy, Metadata, Rule, RuleType};
use crate::{Bindings, Error, Result};

use std::collections::HashMap;
use std::sync::Arc;

/// Default limit on the number of nodes a tree traversal may visit.
pub const DEFAULT_MAX_TREE_DEPTH: usize = 256;

/// Evaluates candidate rules against a snapshot of input bindings.
///
/// The evaluator holds no per-call state; concurrent calls share only the
/// expression cache.
#[derive(Debug, Clone)]
pub struct Evaluator {
    expressions: Arc<ExpressionEngine>,
    max_tree_depth: usize,
}

impl Evaluator {
    /// Create a new evaluator.
    pub fn new(expressions: Arc<ExpressionEngine>) -> Self {
        Self {
            expressions,
            max_tree_depth: DEFAULT_MAX_TREE_DEPTH,
        }
    }

    /// Set the traversal depth limit.
    pub fn with_max_tree_depth(mut self, max_tree_depth: usize) -> Self {
        self.max_tree_depth = max_tree_depth.max(1);
        self
    }

    /// The shared expression engine.
    pub fn expressions(&self) -> &Arc<ExpressionEngine> {
        &self.expressions
    }

    /// Evaluate the decision-table rules among `rules`, in order.
    ///
    /// Under [`HitPolicy::First`] scanning stops after the first matching
    /// rule; earlier non-matches stay in the output. Any expression error
    /// aborts the scan.
    pub fn evaluate_table(
        &self,
        rules: &[Arc<Rule>],
        bindings: &Arc<Bindings>,
        hit_policy: HitPolicy,
    ) -> Result<Vec<ExecutionResult>> {
        let mut results = Vec::new();

        for rule in rules.iter().filter(|r| r.rule_type == RuleType::DecisionTable) {
            let result = self.evaluate_table_rule(rule, bindings)?;
            let matched = result.rule_criteria_met;
            results.push(result);

            if hit_policy.stops_at(matched) {
                break;
            }
        }

        Ok(results)
    }

    /// Evaluate one decision-table rule.
    ///
    /// Conditions are AND-ed left to right and short-circuit on the first false.
    pub fn evaluate_table_rule(&self, rule: &Arc<Rule>, bindings: &Arc<Bindings>) -> Result<ExecutionResult> {
        let metadata = Metadata::start(Arc::clone(bindings));

        let mut matched = true;
        for condition in &rule.conditions {
            let passed = self
                .expressions
                .evaluate_condition(
                    condition.condition.as_deref(),
                    bindings,
                    condition.in_values.as_deref(),
                )
                .with_rule(&rule.name)?;
            if !passed {
                matched = false;
                break;
            }
        }

        Ok(ExecutionResult {
            rule: Arc::clone(rule),
            rule_criteria_met: matched,
            results: if matched {
                rule.results.clone()
            } else {
                HashMap::new()
            },
            metadata: metadata.finish(),
        })
    }

    /// Evaluate the decision-tree rules among `rules`, one traversal per root.
    ///
    /// Under [`HitPolicy::First`] only the first traversal is returned.
    pub fn evaluate_trees(
        &self,
        rules: &[Arc<Rule>],
        bindings: &Arc<Bindings>,
        hit_policy: HitPolicy,
    ) -> Result<Vec<TreeExecutionResult>> {
        let mut results = Vec::new();

        for rule in rules.iter().filter(|r| r.rule_type == RuleType::DecisionTree) {
            for root in &rule.conditions {
                let result = self.traverse(rule, root, bindings)?;
                let matched = result.rule_criteria_met;
                results.push(result);

                if hit_policy.stops_at(matched) {
                    return Ok(results);
                }
            }
        }

        Ok(results)
    }

    /// Walk one tree from `root` to a leaf and execute the leaf's action.
    ///
    /// The action result is keyed by the action text. A leaf without an
    /// action produces an empty result map.
    pub fn traverse(
        &self,
        rule: &Arc<Rule>,
        root: &Condition,
        bindings: &Arc<Bindings>,
    ) -> Result<TreeExecutionResult> {
        let metadata = Metadata::start(Arc::clone(bindings));
        let mut executed_nodes = Vec::new();
        let mut node = root;

        loop {
            if executed_nodes.len() >= self.max_tree_depth {
                return Err(Error::TreeDepthExceeded {
                    rule: rule.name.clone(),
                    max_depth: self.max_tree_depth,
                });
            }
            executed_nodes.push(node.detached());

            node = match (&node.true_branch, &node.false_branch) {
                (None, None) => break,
                (Some(on_true), Some(on_false)) => {
                    let condition = match node.condition.as_deref() {
                        Some(text) if !text.trim().is_empty() => text,
                        _ => {
                            return Err(Error::MalformedTree {
                                rule: rule.name.clone(),
                                message: "branching node has no condition".to_string(),
                            })
                        }
                    };
                    let passed = self
                        .expressions
                        .evaluate_condition(
                            Some(condition),
                            bindings,
                            node.in_values.as_deref(),
                        )
                        .with_rule(&rule.name)?;
                    if passed {
                        &**on_true
                    } else {
                        &**on_false
                    }
                }
                _ => {
                    return Err(Error::MalformedTree {
                        rule: rule.name.clone(),
                        message: format!(
                            "node '{}' has only one branch",
                            node.condition.as_deref().unwrap_or_default()
                        ),
                    })
                }
            };
        }

        let mut results = HashMap::new();
        if let Some(value) = self
            .expressions
            .execute_action(node.action.as_deref(), bindings)
            .with_rule(&rule.name)?
        {
            if let Some(action) = node.action.as_ref() {
                results.insert(action.clone(), value);
            }
        }

        Ok(TreeExecutionResult {
            rule: Arc::clone(rule),
            condition: node.clone(),
            executed_nodes,
            results,
            rule_criteria_met: true,
            metadata: metadata.finish(),
        })
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(Arc::new(ExpressionEngine::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bindings(pairs: &[(&str, serde_json::Value)]) -> Arc<Bindings> {
        Arc::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    fn discount_rule() -> Arc<Rule> {
        Arc::new(
            Rule::builder("Premium Customer Discount")
                .category("PRICING")
                .condition(Condition::expr("customerType == 'premium'"))
                .condition(Condition::expr("orderTotal > 100"))
                .result("discountPercent", 20)
                .build(),
        )
    }

    fn loan_rule() -> Arc<Rule> {
        Arc::new(
            Rule::builder("Loan Approval")
                .tree(Condition::branch(
                    "age >= 21",
                    Condition::branch(
                        "income >= 50000",
                        Condition::leaf("'APPROVED'"),
                        Condition::leaf("'REJECTED_LOW_INCOME'"),
                    ),
                    Condition::leaf("'REJECTED'"),
                ))
                .build(),
        )
    }

    #[test]
    fn test_table_match() {
        let evaluator = Evaluator::default();
        let input = bindings(&[("customerType", json!("premium")), ("orderTotal", json!(150))]);

        let results = evaluator
            .evaluate_table(&[discount_rule()], &input, HitPolicy::First)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].rule_criteria_met);
        assert_eq!(results[0].results.get("discountPercent"), Some(&json!(20)));
        assert_eq!(results[0].metadata.input_variables, input);
    }

    #[test]
    fn test_table_no_match_has_empty_results() {
        let evaluator = Evaluator::default();
        let input = bindings(&[("customerType", json!("standard")), ("orderTotal", json!(150))]);

        let results = evaluator
            .evaluate_table(&[discount_rule()], &input, HitPolicy::Collect)
            .unwrap();
        assert!(!results[0].rule_criteria_met);
        assert!(results[0].results.is_empty());
    }

    #[test]
    fn test_short_circuit_skips_later_conditions() {
        let evaluator = Evaluator::default();
        let rule = Arc::new(
            Rule::builder("guarded")
                .condition(Condition::expr("false"))
                .condition(Condition::expr("undefined_name > 1"))
                .build(),
        );
        let results = evaluator
            .evaluate_table(&[rule], &bindings(&[("x", json!(1))]), HitPolicy::First)
            .unwrap();
        assert!(!results[0].rule_criteria_met);
    }

    #[test]
    fn test_empty_conditions_match() {
        let evaluator = Evaluator::default();
        let rule = Arc::new(Rule::builder("always").result("flag", true).build());
        let results = evaluator
            .evaluate_table(&[rule], &bindings(&[("x", json!(1))]), HitPolicy::First)
            .unwrap();
        assert!(results[0].rule_criteria_met);
        assert_eq!(results[0].results.get("flag"), Some(&json!(true)));
    }

    #[test]
    fn test_first_stops_collect_continues() {
        let evaluator = Evaluator::default();
        let miss = Arc::new(Rule::builder("miss").condition(Condition::expr("x > 10")).build());
        let hit = Arc::new(Rule::builder("hit").condition(Condition::expr("x > 0")).build());
        let also = Arc::new(Rule::builder("also").build());
        let rules = vec![miss, hit, also];
        let input = bindings(&[("x", json!(1))]);

        let first = evaluator.evaluate_table(&rules, &input, HitPolicy::First).unwrap();
        assert_eq!(first.len(), 2);
        assert!(!first[0].rule_criteria_met);
        assert!(first[1].rule_criteria_met);

        let all = evaluator.evaluate_table(&rules, &input, HitPolicy::Collect).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_table_ignores_tree_rules() {
        let evaluator = Evaluator::default();
        let input = bindings(&[("age", json!(30)), ("income", json!(1))]);
        let results = evaluator
            .evaluate_table(&[loan_rule()], &input, HitPolicy::Collect)
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_in_values_condition() {
        let evaluator = Evaluator::default();
        let rule = Arc::new(
            Rule::builder("tiers")
                .condition(Condition::expr("tier in inValues").with_in_values(["gold", "platinum"]))
                .result("priority", "high")
                .build(),
        );
        let results = evaluator
            .evaluate_table(&[rule], &bindings(&[("tier", json!("gold"))]), HitPolicy::First)
            .unwrap();
        assert!(results[0].rule_criteria_met);
    }

    #[test]
    fn test_expression_error_aborts_scan() {
        let evaluator = Evaluator::default();
        let broken = Arc::new(Rule::builder("broken").condition(Condition::expr("nope > 1")).build());
        let err = evaluator
            .evaluate_table(&[broken, discount_rule()], &bindings(&[("x", json!(1))]), HitPolicy::Collect)
            .unwrap_err();
        assert!(matches!(err, Error::ExpressionEvaluation { .. }));
        assert!(err.to_string().contains("rule 'broken'"));
    }

    #[test]
    fn test_tree_traversal() {
        let evaluator = Evaluator::default();
        let input = bindings(&[("age", json!(30)), ("income", json!(20000))]);

        let results = evaluator
            .evaluate_trees(&[loan_rule()], &input, HitPolicy::First)
            .unwrap();
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert!(result.rule_criteria_met);
        assert_eq!(result.executed_nodes.len(), 3);
        assert_eq!(result.executed_nodes[0].condition.as_deref(), Some("age >= 21"));
        assert_eq!(result.executed_nodes[1].condition.as_deref(), Some("income >= 50000"));
        assert_eq!(result.condition.action.as_deref(), Some("'REJECTED_LOW_INCOME'"));
        assert_eq!(
            result.results.get("'REJECTED_LOW_INCOME'"),
            Some(&json!("REJECTED_LOW_INCOME"))
        );
    }

    #[test]
    fn test_leaf_without_action() {
        let evaluator = Evaluator::default();
        let rule = Arc::new(
            Rule::builder("silent")
                .tree(Condition::branch("x > 0", Condition::default(), Condition::leaf("'neg'")))
                .build(),
        );
        let results = evaluator
            .evaluate_trees(&[rule], &bindings(&[("x", json!(1))]), HitPolicy::First)
            .unwrap();
        assert!(results[0].rule_criteria_met);
        assert!(results[0].results.is_empty());
        assert_eq!(results[0].executed_nodes.len(), 2);
    }

    #[test]
    fn test_multiple_roots_and_hit_policy() {
        let evaluator = Evaluator::default();
        let rule = Arc::new(
            Rule::builder("two roots")
                .tree(Condition::leaf("'first'"))
                .tree(Condition::leaf("'second'"))
                .build(),
        );
        let input = bindings(&[("x", json!(1))]);

        let first = evaluator
            .evaluate_trees(&[Arc::clone(&rule)], &input, HitPolicy::First)
            .unwrap();
        assert_eq!(first.len(), 1);

        let all = evaluator.evaluate_trees(&[rule], &input, HitPolicy::Collect).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].results.get("'second'"), Some(&json!("second")));
    }

    #[test]
    fn test_malformed_tree() {
        let evaluator = Evaluator::default();
        let mut root = Condition::expr("x > 0");
        root.true_branch = Some(Box::new(Condition::leaf("'yes'")));
        let rule = Arc::new(Rule::builder("lopsided").tree(root).build());

        let err = evaluator
            .evaluate_trees(&[rule], &bindings(&[("x", json!(1))]), HitPolicy::First)
            .unwrap_err();
        assert!(matches!(err, Error::MalformedTree { .. }));
    }

    #[test]
    fn test_branching_node_needs_condition() {
        let evaluator = Evaluator::default();
        for condition in [None, Some("  ".to_string())] {
            let mut root = Condition {
                condition,
                ..Default::default()
            };
            root.true_branch = Some(Box::new(Condition::leaf("'YES'")));
            root.false_branch = Some(Box::new(Condition::leaf("'NO'")));
            let rule = Arc::new(Rule::builder("headless").tree(root).build());

            let err = evaluator
                .evaluate_trees(&[rule], &bindings(&[("x", json!(false))]), HitPolicy::First)
                .unwrap_err();
            assert!(matches!(err, Error::MalformedTree { .. }));
        }
    }

    #[test]
    fn test_depth_limit() {
        let evaluator = Evaluator::default().with_max_tree_depth(2);
        let err = evaluator
            .evaluate_trees(
                &[loan_rule()],
                &bindings(&[("age", json!(30)), ("income", json!(1))]),
                HitPolicy::First,
            )
            .unwrap_err();
        assert!(matches!(err, Error::TreeDepthExceeded { max_depth: 2, .. }));

        let shallow = evaluator
            .evaluate_trees(&[loan_rule()], &bindings(&[("age", json!(18))]), HitPolicy::First)
            .unwrap();
        assert_eq!(shallow.len(), 1);
    }
}
