//! Expression compilation and evaluation.
//!
//! [`ExpressionEngine`] compiles condition and action text once through an
//! [`ExpressionLanguage`], keeps the result in a shared [`ExpressionCache`],
//! and executes it against caller bindings.

mod cel;

pub use cel::CelLanguage;

use crate::cache::{CacheStats, ExpressionCache};
use crate::{Bindings, Error, Result};

use serde_json::Value;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::error;

/// Reserved binding name under which a condition's literal values are exposed.
pub const IN_VALUES_KEY: &str = "inValues";

/// A language that turns expression text into an executable form.
pub trait ExpressionLanguage: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Compile expression text.
    fn compile(&self, text: &str) -> Result<Arc<dyn CompiledExpression>>;
}

/// The executable form of an expression.
pub trait CompiledExpression: Send + Sync {
    /// Execute against a set of bindings.
    fn execute(&self, bindings: &Bindings) -> Result<Value>;
}

/// Compiles, caches and runs expressions.
pub struct ExpressionEngine {
    language: Arc<dyn ExpressionLanguage>,
    cache: ExpressionCache,
}

impl ExpressionEngine {
    /// Create a CEL engine whose cache holds at most `max_cache_size` entries.
    pub fn new(max_cache_size: usize) -> Self {
        Self::with_language(Arc::new(CelLanguage), max_cache_size)
    }

    /// Create an engine for another expression language.
    pub fn with_language(language: Arc<dyn ExpressionLanguage>, max_cache_size: usize) -> Self {
        Self {
            language,
            cache: ExpressionCache::new(max_cache_size),
        }
    }

    /// Compile `text`, or fetch it from the cache.
    pub fn compile(&self, text: &str) -> Result<Arc<dyn CompiledExpression>> {
        if let Some(compiled) = self.cache.get(text) {
            return Ok(compiled);
        }

        let compiled = self.language.compile(text).map_err(|e| {
            error!(expression = text, language = self.language.name(), error = %e, "Expression failed to compile");
            e
        })?;
        Ok(self.cache.insert(text, compiled))
    }

    /// Evaluate a boolean condition.
    ///
    /// A missing or blank expression is vacuously true. When `in_values` is
    /// given it is bound as `inValues` on a copy of `bindings`. A result that
    /// is not a boolean is an evaluation error.
    pub fn evaluate_condition(
        &self,
        expression: Option<&str>,
        bindings: &Bindings,
        in_values: Option<&[Value]>,
    ) -> Result<bool> {
        let Some(text) = non_blank(expression) else {
            return Ok(true);
        };

        let bindings: Cow<'_, Bindings> = match in_values {
            Some(values) => {
                let mut merged = bindings.clone();
                merged.insert(IN_VALUES_KEY.to_string(), Value::Array(values.to_vec()));
                Cow::Owned(merged)
            }
            None => Cow::Borrowed(bindings),
        };

        match self.run(text, &bindings)? {
            Value::Bool(b) => Ok(b),
            other => {
                let err = Error::evaluation(
                    text,
                    format!("condition must produce a boolean, got {}", other),
                );
                error!(expression = text, error = %err, "Condition produced a non-boolean result");
                Err(err)
            }
        }
    }

    /// Execute an action expression. A missing or blank expression yields `None`.
    pub fn execute_action(&self, expression: Option<&str>, bindings: &Bindings) -> Result<Option<Value>> {
        match non_blank(expression) {
            Some(text) => self.run(text, bindings).map(Some),
            None => Ok(None),
        }
    }

    /// Compile a batch of expressions eagerly, stopping at the first failure.
    ///
    /// Returns how many expressions were compiled.
    pub fn prewarm<I, S>(&self, expressions: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut count = 0;
        for text in expressions {
            if let Some(text) = non_blank(Some(text.as_ref())) {
                self.compile(text)?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Remove every compiled expression from the cache.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn run(&self, text: &str, bindings: &Bindings) -> Result<Value> {
        self.compile(text)?.execute(bindings).map_err(|e| {
            error!(expression = text, error = %e, "Expression failed to evaluate");
            e
        })
    }
}

impl Default for ExpressionEngine {
    fn default() -> Self {
        Self::new(crate::config::ExpressionConfig::default().max_cache_size)
    }
}

impl std::fmt::Debug for ExpressionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionEngine")
            .field("language", &self.language.name())
            .field("cache", &self.cache)
            .finish()
    }
}

fn non_blank(expression: Option<&str>) -> Option<&str> {
    expression.map(str::trim).filter(|s| !s.is_empty())
}
