//! Rule engine implementation.

use super::{EvaluationRequest, ExecutionResult, TreeExecutionResult};
use crate::cache::CacheStats;
use crate::config::Config;
use crate::core::Evaluator;
use crate::expression::{ExpressionEngine, ExpressionLanguage};
use crate::rule::{Category, HitPolicy, Rule};
use crate::source::{CachedRuleSource, FileRuleSource, InMemoryRuleSource, RuleSource};
use crate::telemetry::{EvaluationKind, Telemetry, TelemetryMetrics};
use crate::{Bindings, Error, Result};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// The main entry point for evaluating decision tables and decision trees.
///
/// A `RuleEngine` is shared freely between threads. Each call takes its own
/// snapshot of the input bindings; the only state shared between calls is
/// the compiled-expression cache.
pub struct RuleEngine {
    /// Where candidate rules come from
    source: Arc<dyn RuleSource>,
    /// Rule evaluator
    evaluator: Evaluator,
    /// Telemetry instance
    telemetry: Option<Telemetry>,
    /// Configuration
    config: Config,
}

impl RuleEngine {
    /// Create a rule engine builder.
    pub fn builder() -> RuleEngineBuilder {
        RuleEngineBuilder::new()
    }

    /// Create a new rule engine over the given source.
    pub fn new(config: Config, source: Arc<dyn RuleSource>) -> Self {
        let expressions = Arc::new(ExpressionEngine::new(config.expression.max_cache_size));
        Self::with_expressions(config, source, expressions)
    }

    fn with_expressions(
        config: Config,
        source: Arc<dyn RuleSource>,
        expressions: Arc<ExpressionEngine>,
    ) -> Self {
        let evaluator =
            Evaluator::new(expressions).with_max_tree_depth(config.engine.max_tree_depth);
        Self {
            source,
            evaluator,
            telemetry: None,
            config,
        }
    }

    /// Evaluate the decision tables of a category pair.
    ///
    /// The request is validated before any rule is looked at; each missing
    /// field has its own error. An expression error in any candidate aborts
    /// the whole call.
    ///
    /// # Returns
    /// * `Ok(Vec<ExecutionResult>)` - One result per evaluated rule, in source order
    /// * `Err(Error)` - If validation or evaluation failed
    pub fn evaluate_rules(&self, request: &EvaluationRequest) -> Result<Vec<ExecutionResult>> {
        let (category, subcategory, hit_policy) = self.observe(request.required())?;
        self.evaluate(&request.input_variables, category.clone(), subcategory.clone(), hit_policy)
    }

    /// Evaluate the decision trees of a category pair.
    ///
    /// # Returns
    /// * `Ok(Vec<TreeExecutionResult>)` - One result per traversal, in source order
    /// * `Err(Error)` - If validation or evaluation failed
    pub fn evaluate_decision_tree(
        &self,
        request: &EvaluationRequest,
    ) -> Result<Vec<TreeExecutionResult>> {
        let (category, subcategory, hit_policy) = self.observe(request.required())?;
        self.evaluate_tree(&request.input_variables, category.clone(), subcategory.clone(), hit_policy)
    }

    /// Evaluate decision tables without building a request.
    pub fn evaluate(
        &self,
        bindings: &Bindings,
        category: impl Into<Category>,
        subcategory: impl Into<Category>,
        hit_policy: HitPolicy,
    ) -> Result<Vec<ExecutionResult>> {
        let start = Instant::now();
        let (category, subcategory) = self.observe(check_inputs(bindings, category, subcategory))?;
        let snapshot = Arc::new(bindings.clone());

        let results = self.observe(
            self.source
                .find_rules(&category, &subcategory)
                .and_then(|rules| self.evaluator.evaluate_table(&rules, &snapshot, hit_policy)),
        )?;

        let matched = results.iter().filter(|r| r.rule_criteria_met).count();
        debug!(
            %category,
            %subcategory,
            %hit_policy,
            evaluated = results.len(),
            matched,
            "Evaluated decision tables"
        );
        self.record(EvaluationKind::Table, results.len(), matched, start);
        Ok(results)
    }

    /// Evaluate decision trees without building a request.
    pub fn evaluate_tree(
        &self,
        bindings: &Bindings,
        category: impl Into<Category>,
        subcategory: impl Into<Category>,
        hit_policy: HitPolicy,
    ) -> Result<Vec<TreeExecutionResult>> {
        let start = Instant::now();
        let (category, subcategory) = self.observe(check_inputs(bindings, category, subcategory))?;
        let snapshot = Arc::new(bindings.clone());

        let results = self.observe(
            self.source
                .find_rules(&category, &subcategory)
                .and_then(|rules| self.evaluator.evaluate_trees(&rules, &snapshot, hit_policy)),
        )?;

        debug!(
            %category,
            %subcategory,
            %hit_policy,
            traversals = results.len(),
            "Evaluated decision trees"
        );
        self.record(EvaluationKind::Tree, results.len(), results.len(), start);
        Ok(results)
    }

    /// Evaluate every active decision table, regardless of category.
    ///
    /// Every rule is evaluated and returned, as with [`HitPolicy::Collect`].
    pub fn evaluate_active_rules(&self, bindings: &Bindings) -> Result<Vec<ExecutionResult>> {
        let start = Instant::now();
        if bindings.is_empty() {
            return self.observe(Err(Error::EmptyInput));
        }
        let snapshot = Arc::new(bindings.clone());

        let results = self.observe(self.source.find_active_rules().and_then(|rules| {
            self.evaluator
                .evaluate_table(&rules, &snapshot, HitPolicy::Collect)
        }))?;

        let matched = results.iter().filter(|r| r.rule_criteria_met).count();
        debug!(evaluated = results.len(), matched, "Evaluated all active decision tables");
        self.record(EvaluationKind::Table, results.len(), matched, start);
        Ok(results)
    }

    /// Evaluate a single condition expression.
    pub fn evaluate_condition(&self, expression: &str, bindings: &Bindings) -> Result<bool> {
        self.evaluator
            .expressions()
            .evaluate_condition(Some(expression), bindings, None)
    }

    /// Execute a single action expression.
    pub fn execute_action(
        &self,
        expression: &str,
        bindings: &Bindings,
    ) -> Result<Option<serde_json::Value>> {
        self.evaluator
            .expressions()
            .execute_action(Some(expression), bindings)
    }

    /// Compile a batch of expressions ahead of time.
    pub fn prewarm<I, S>(&self, expressions: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.evaluator.expressions().prewarm(expressions)
    }

    /// Compile every condition and action of every active rule.
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of expressions compiled
    /// * `Err(Error)` - The first expression that failed to compile
    pub fn prewarm_active_rules(&self) -> Result<usize> {
        let rules = self.source.find_active_rules()?;
        let count = self
            .evaluator
            .expressions()
            .prewarm(rules.iter().flat_map(|r| r.expressions()))?;
        debug!(rules = rules.len(), expressions = count, "Prewarmed expression cache");
        Ok(count)
    }

    /// Reload the rule source.
    pub fn reload_rules(&self) -> Result<()> {
        self.source.reload()
    }

    /// The rule source.
    pub fn source(&self) -> &Arc<dyn RuleSource> {
        &self.source
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get expression cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.evaluator.expressions().cache_stats()
    }

    /// Clear the compiled-expression cache.
    pub fn clear_expression_cache(&self) {
        self.evaluator.expressions().clear_cache();
    }

    /// Get engine metrics.
    pub fn metrics(&self) -> EngineMetrics {
        EngineMetrics {
            active_rules: self.source.find_active_rules().ok().map(|r| r.len()),
            telemetry_enabled: self.telemetry.is_some(),
            telemetry: self.telemetry.as_ref().map(|t| t.metrics()),
            cache_stats: self.cache_stats(),
        }
    }

    fn observe<T>(&self, result: Result<T>) -> Result<T> {
        if let (Err(e), Some(telemetry)) = (&result, &self.telemetry) {
            telemetry.record_error(e);
        }
        result
    }

    fn record(&self, kind: EvaluationKind, evaluated: usize, matched: usize, start: Instant) {
        if let Some(ref telemetry) = self.telemetry {
            telemetry.record_evaluation(kind, evaluated, matched, start.elapsed());
        }
    }
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field("evaluator", &self.evaluator)
            .field("telemetry", &self.telemetry)
            .finish()
    }
}

fn check_inputs(
    bindings: &Bindings,
    category: impl Into<Category>,
    subcategory: impl Into<Category>,
) -> Result<(Category, Category)> {
    if bindings.is_empty() {
        return Err(Error::EmptyInput);
    }
    let category = category.into();
    if category.is_blank() {
        return Err(Error::MissingCategory);
    }
    let subcategory = subcategory.into();
    if subcategory.is_blank() {
        return Err(Error::MissingSubcategory);
    }
    Ok((category, subcategory))
}

/// Builder for creating a RuleEngine.
#[derive(Default)]
pub struct RuleEngineBuilder {
    config: Option<Config>,
    source: Option<Arc<dyn RuleSource>>,
    rules: Vec<Rule>,
    rules_file: Option<PathBuf>,
    language: Option<Arc<dyn ExpressionLanguage>>,
    telemetry_enabled: Option<bool>,
    cache_size: Option<usize>,
    max_tree_depth: Option<usize>,
}

impl RuleEngineBuilder {
    /// Create a new rule engine builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a custom rule source.
    pub fn with_source(mut self, source: Arc<dyn RuleSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Add a rule to an in-memory source.
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Load rules from a document, cached with the configured TTL.
    pub fn with_rules_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.rules_file = Some(path.into());
        self
    }

    /// Use another expression language instead of CEL.
    pub fn with_language(mut self, language: Arc<dyn ExpressionLanguage>) -> Self {
        self.language = Some(language);
        self
    }

    /// Enable or disable telemetry.
    pub fn with_telemetry_enabled(mut self, enabled: bool) -> Self {
        self.telemetry_enabled = Some(enabled);
        self
    }

    /// Set the expression cache size.
    pub fn with_cache_size(mut self, size: usize) -> Self {
        self.cache_size = Some(size);
        self
    }

    /// Set the decision tree depth limit.
    pub fn with_max_tree_depth(mut self, depth: usize) -> Self {
        self.max_tree_depth = Some(depth);
        self
    }

    /// Build the rule engine.
    pub fn build(self) -> Result<RuleEngine> {
        let mut config = self.config.unwrap_or_default();

        // Apply builder overrides
        if let Some(size) = self.cache_size {
            config.expression.max_cache_size = size;
        }
        if let Some(depth) = self.max_tree_depth {
            config.engine.max_tree_depth = depth;
        }
        if let Some(enabled) = self.telemetry_enabled {
            config.telemetry.enabled = enabled;
        }
        if let Some(path) = self.rules_file {
            config.rule_source.rules_file = Some(path);
        }
        config.validate()?;

        let source: Arc<dyn RuleSource> = match (self.source, self.rules.is_empty()) {
            (Some(_), false) => {
                return Err(Error::config(
                    "Individual rules cannot be combined with a custom rule source",
                ))
            }
            (Some(source), true) => source,
            (None, false) => Arc::new(InMemoryRuleSource::with_rules(self.rules)),
            (None, true) => match config.rule_source.rules_file.clone() {
                Some(path) => Arc::new(CachedRuleSource::new(
                    FileRuleSource::open(path)?,
                    config.rule_source.cache_ttl(),
                    config.rule_source.cache_capacity,
                )),
                None => Arc::new(InMemoryRuleSource::new()),
            },
        };

        let expressions = Arc::new(match self.language {
            Some(language) => {
                ExpressionEngine::with_language(language, config.expression.max_cache_size)
            }
            None => ExpressionEngine::new(config.expression.max_cache_size),
        });

        let mut engine = RuleEngine::with_expressions(config, source, expressions);

        if engine.config.telemetry.enabled {
            engine.telemetry = Some(Telemetry::new(&engine.config.telemetry)?);
        }

        engine.prewarm(&engine.config.expression.prewarm)?;
        if engine.config.engine.prewarm_active_rules {
            engine.prewarm_active_rules()?;
        }

        Ok(engine)
    }
}

/// Engine metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineMetrics {
    /// Number of active rules, if the source could be queried
    pub active_rules: Option<usize>,
    /// Whether telemetry is enabled
    pub telemetry_enabled: bool,
    /// Evaluation counters (if telemetry is enabled)
    pub telemetry: Option<TelemetryMetrics>,
    /// Expression cache statistics
    pub cache_stats: CacheStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Condition;
    use serde_json::json;

    fn discount_rule() -> Rule {
        Rule::builder("Premium Customer Discount")
            .category("PRICING")
            .subcategory("DEFAULT")
            .condition(Condition::expr("customerType == 'premium'"))
            .condition(Condition::expr("orderTotal > 100"))
            .result("discountPercent", 20)
            .build()
    }

    fn premium_order() -> Bindings {
        let mut input = Bindings::new();
        input.insert("customerType".to_string(), json!("premium"));
        input.insert("orderTotal".to_string(), json!(150));
        input
    }

    #[test]
    fn test_engine_creation() {
        let engine = RuleEngine::builder().build().unwrap();
        assert_eq!(engine.metrics().active_rules, Some(0));
        assert!(engine.metrics().telemetry_enabled);
        assert_eq!(engine.cache_stats().max_size, 10_000);
    }

    #[test]
    fn test_basic_evaluation() {
        let engine = RuleEngine::builder()
            .with_rule(discount_rule())
            .build()
            .unwrap();

        let results = engine
            .evaluate(&premium_order(), "PRICING", "DEFAULT", HitPolicy::First)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].rule_criteria_met);
        assert_eq!(results[0].results.get("discountPercent"), Some(&json!(20)));
    }

    #[test]
    fn test_request_validation_precedes_lookup() {
        let engine = RuleEngine::builder()
            .with_rule(discount_rule())
            .build()
            .unwrap();

        let request = EvaluationRequest::builder()
            .with_category("PRICING")
            .with_subcategory("DEFAULT")
            .with_hit_policy(HitPolicy::First)
            .build();
        assert!(matches!(engine.evaluate_rules(&request), Err(Error::EmptyInput)));

        let request = EvaluationRequest::builder()
            .with_inputs(premium_order())
            .with_category("PRICING")
            .with_subcategory("DEFAULT")
            .build();
        assert!(matches!(
            engine.evaluate_decision_tree(&request),
            Err(Error::MissingHitPolicy)
        ));

        let metrics = engine.metrics().telemetry.unwrap();
        assert_eq!(metrics.validation_errors, 2);
        assert_eq!(metrics.total_evaluations, 0);
    }

    #[test]
    fn test_unknown_category_returns_empty() {
        let engine = RuleEngine::builder()
            .with_rule(discount_rule())
            .build()
            .unwrap();
        let results = engine
            .evaluate(&premium_order(), "SHIPPING", "DEFAULT", HitPolicy::Collect)
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_evaluate_active_rules() {
        let other = Rule::builder("Big Order")
            .category("SHIPPING")
            .subcategory("DEFAULT")
            .condition(Condition::expr("orderTotal > 1000"))
            .build();
        let engine = RuleEngine::builder()
            .with_rule(discount_rule())
            .with_rule(other)
            .build()
            .unwrap();

        let results = engine.evaluate_active_rules(&premium_order()).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].rule_criteria_met);
        assert!(!results[1].rule_criteria_met);

        assert!(matches!(
            engine.evaluate_active_rules(&Bindings::new()),
            Err(Error::EmptyInput)
        ));
    }

    #[test]
    fn test_prewarm_from_config() {
        let mut config = Config::default();
        config.expression.prewarm = vec!["value > 50".to_string()];
        config.engine.prewarm_active_rules = true;

        let engine = RuleEngine::builder()
            .with_config(config)
            .with_rule(discount_rule())
            .build()
            .unwrap();
        assert_eq!(engine.cache_stats().size, 3);
    }

    #[test]
    fn test_bad_prewarm_fails_build() {
        let mut config = Config::default();
        config.expression.prewarm = vec!["value >".to_string()];
        assert!(RuleEngine::builder().with_config(config).build().is_err());
    }

    #[test]
    fn test_source_and_rules_conflict() {
        let result = RuleEngine::builder()
            .with_source(Arc::new(InMemoryRuleSource::new()))
            .with_rule(discount_rule())
            .build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_single_expressions() {
        let engine = RuleEngine::builder().build().unwrap();
        let mut input = Bindings::new();
        input.insert("value".to_string(), json!(100));

        assert!(engine.evaluate_condition("value > 50", &input).unwrap());
        assert_eq!(
            engine.execute_action("value * 2", &input).unwrap(),
            Some(json!(200))
        );
        engine.clear_expression_cache();
        assert_eq!(engine.cache_stats().size, 0);
    }

    #[test]
    fn test_metrics_track_evaluations() {
        let engine = RuleEngine::builder()
            .with_rule(discount_rule())
            .build()
            .unwrap();
        engine
            .evaluate(&premium_order(), "PRICING", "DEFAULT", HitPolicy::First)
            .unwrap();

        let metrics = engine.metrics();
        let telemetry = metrics.telemetry.unwrap();
        assert_eq!(telemetry.table_evaluations, 1);
        assert_eq!(telemetry.rules_matched, 1);
        assert_eq!(metrics.cache_stats.size, 2);
    }
}
