//! Error types for the decision engine.
//!
//! This module defines all error types used throughout the crate. Input
//! validation, expression compilation and expression execution each get
//! their own variants so callers can tell a bad request from a bad rule.

use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the decision engine.
#[derive(Error, Debug)]
pub enum Error {
    /// The input bindings were empty
    #[error("Input variables cannot be empty")]
    EmptyInput,

    /// No category was supplied with the request
    #[error("Rule category cannot be empty")]
    MissingCategory,

    /// No subcategory was supplied with the request
    #[error("Rule subcategory cannot be empty")]
    MissingSubcategory,

    /// No hit policy was supplied with the request
    #[error("Hit policy must be specified")]
    MissingHitPolicy,

    /// Error during rule, document or request validation
    #[error("Validation error: {message}")]
    Validation {
        /// Detailed error message
        message: String,
        /// Field that caused the error, if applicable
        field: Option<String>,
    },

    /// Malformed expression text
    #[error("Failed to compile expression '{expression}': {message}")]
    ExpressionCompile {
        /// The expression that failed to compile
        expression: String,
        /// Underlying cause
        message: String,
    },

    /// Expression failed while executing against bindings
    #[error("Failed to evaluate expression '{expression}': {message}")]
    ExpressionEvaluation {
        /// The expression that failed
        expression: String,
        /// Underlying cause
        message: String,
    },

    /// A decision tree was deeper than the configured limit
    #[error("Decision tree '{rule}' exceeded maximum depth of {max_depth}")]
    TreeDepthExceeded {
        /// Name of the offending rule
        rule: String,
        /// Configured depth limit
        max_depth: usize,
    },

    /// A decision tree node had exactly one branch
    #[error("Malformed decision tree '{rule}': {message}")]
    MalformedTree {
        /// Name of the offending rule
        rule: String,
        /// Detailed error message
        message: String,
    },

    /// The rule source failed to produce rules
    #[error("Rule source error: {message}")]
    RuleSource {
        /// Detailed error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Detailed error message
        message: String,
        /// Configuration key that caused the error
        key: Option<String>,
    },

    /// Error parsing an enumerated value
    #[error("Parse error: {message}")]
    Parse {
        /// Detailed error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Internal error (unexpected condition)
    #[error("Internal error: {message}")]
    Internal {
        /// Detailed error message
        message: String,
    },
}

impl Error {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a validation error with field context.
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create an expression compilation error.
    pub fn compile(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ExpressionCompile {
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// Create an expression evaluation error.
    pub fn evaluation(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ExpressionEvaluation {
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// Create a rule source error.
    pub fn rule_source(message: impl Into<String>) -> Self {
        Error::RuleSource {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: None,
        }
    }

    /// Create a configuration error with key context.
    pub fn config_key(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Check if this error was raised before any rule was evaluated.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::EmptyInput
                | Error::MissingCategory
                | Error::MissingSubcategory
                | Error::MissingHitPolicy
                | Error::Validation { .. }
        )
    }

    /// Check if this error came from compiling or running an expression.
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            Error::ExpressionCompile { .. } | Error::ExpressionEvaluation { .. }
        )
    }

    /// The expression text carried by expression errors.
    pub fn expression(&self) -> Option<&str> {
        match self {
            Error::ExpressionCompile { expression, .. }
            | Error::ExpressionEvaluation { expression, .. } => Some(expression),
            _ => None,
        }
    }

    /// Get the error category for metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Error::EmptyInput
            | Error::MissingCategory
            | Error::MissingSubcategory
            | Error::MissingHitPolicy
            | Error::Validation { .. } => "validation",
            Error::ExpressionCompile { .. } => "expression_compile",
            Error::ExpressionEvaluation { .. } => "expression_evaluation",
            Error::TreeDepthExceeded { .. } | Error::MalformedTree { .. } => "tree",
            Error::RuleSource { .. } => "rule_source",
            Error::Config { .. } => "config",
            Error::Parse { .. } => "parse",
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
            Error::Yaml(_) => "yaml",
            Error::Internal { .. } => "internal",
        }
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Add field context to validation errors.
    fn with_field(self, field: impl Into<String>) -> Result<T>;

    /// Prefix expression errors with the rule they were raised from.
    fn with_rule(self, rule: &str) -> Result<T>;
}

impl<T> ErrorContext<T> for Result<T> {
    fn with_field(self, field: impl Into<String>) -> Result<T> {
        self.map_err(|e| match e {
            Error::Validation { message, .. } => Error::Validation {
                message,
                field: Some(field.into()),
            },
            other => other,
        })
    }

    fn with_rule(self, rule: &str) -> Result<T> {
        self.map_err(|e| match e {
            Error::ExpressionCompile {
                expression,
                message,
            } => Error::ExpressionCompile {
                expression,
                message: format!("{} (rule '{}')", message, rule),
            },
            Error::ExpressionEvaluation {
                expression,
                message,
            } => Error::ExpressionEvaluation {
                expression,
                message: format!("{} (rule '{}')", message, rule),
            },
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::validation("test error");
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(err.category(), "validation");
    }

    #[test]
    fn test_missing_field_errors_are_distinct() {
        let errors = [
            Error::EmptyInput,
            Error::MissingCategory,
            Error::MissingSubcategory,
            Error::MissingHitPolicy,
        ];
        for err in &errors {
            assert!(err.is_validation());
            assert!(!err.is_expression());
        }
        assert_eq!(Error::MissingCategory.to_string(), "Rule category cannot be empty");
        assert_eq!(Error::MissingHitPolicy.to_string(), "Hit policy must be specified");
    }

    #[test]
    fn test_expression_errors_carry_text() {
        let err = Error::evaluation("missing > 5", "undeclared reference to 'missing'");
        assert!(err.is_expression());
        assert_eq!(err.expression(), Some("missing > 5"));
        assert_eq!(err.category(), "expression_evaluation");
        assert!(err.to_string().contains("missing > 5"));

        let err = Error::compile("a >", "unexpected end of input");
        assert_eq!(err.category(), "expression_compile");
    }

    #[test]
    fn test_with_rule_context() {
        let result: Result<()> = Err(Error::evaluation("x > 1", "no such key"));
        let err = result.with_rule("Discount").unwrap_err();
        assert_eq!(err.expression(), Some("x > 1"));
        assert!(err.to_string().contains("rule 'Discount'"));

        let result: Result<()> = Err(Error::MissingCategory);
        assert!(matches!(
            result.with_rule("Discount").unwrap_err(),
            Error::MissingCategory
        ));
    }

    #[test]
    fn test_error_display() {
        let err = Error::validation_field("invalid value", "rule.name");
        assert!(err.to_string().contains("invalid value"));
    }
}
