//! Evaluation requests.

use crate::rule::{Category, HitPolicy};
use crate::{Bindings, Error, Result};

use serde::{Deserialize, Serialize};

/// A request to evaluate the rules of one category pair.
///
/// Every field is optional on the wire so that a missing field is reported
/// with its own error rather than as a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRequest {
    /// Input variables the rules are evaluated against
    #[serde(default)]
    pub input_variables: Bindings,
    /// Category of the candidate rules
    #[serde(default)]
    pub category: Option<Category>,
    /// Subcategory of the candidate rules
    #[serde(default)]
    pub subcategory: Option<Category>,
    /// How many matching rules to return
    #[serde(default)]
    pub hit_policy: Option<HitPolicy>,
}

impl EvaluationRequest {
    /// Create a request builder.
    pub fn builder() -> EvaluationRequestBuilder {
        EvaluationRequestBuilder::default()
    }

    /// Create a fully specified request.
    pub fn new(
        input_variables: Bindings,
        category: impl Into<Category>,
        subcategory: impl Into<Category>,
        hit_policy: HitPolicy,
    ) -> Self {
        Self {
            input_variables,
            category: Some(category.into()),
            subcategory: Some(subcategory.into()),
            hit_policy: Some(hit_policy),
        }
    }

    /// Check that every field is present.
    pub fn validate(&self) -> Result<()> {
        self.required().map(|_| ())
    }

    /// The validated category, subcategory and hit policy.
    pub(crate) fn required(&self) -> Result<(&Category, &Category, HitPolicy)> {
        if self.input_variables.is_empty() {
            return Err(Error::EmptyInput);
        }
        let category = self
            .category
            .as_ref()
            .filter(|c| !c.is_blank())
            .ok_or(Error::MissingCategory)?;
        let subcategory = self
            .subcategory
            .as_ref()
            .filter(|c| !c.is_blank())
            .ok_or(Error::MissingSubcategory)?;
        let hit_policy = self.hit_policy.ok_or(Error::MissingHitPolicy)?;
        Ok((category, subcategory, hit_policy))
    }
}

/// Builder for evaluation requests.
#[derive(Debug, Default)]
pub struct EvaluationRequestBuilder {
    request: EvaluationRequest,
}

impl EvaluationRequestBuilder {
    /// Add one input variable.
    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.request.input_variables.insert(name.into(), value.into());
        self
    }

    /// Add several input variables.
    pub fn with_inputs(mut self, inputs: Bindings) -> Self {
        self.request.input_variables.extend(inputs);
        self
    }

    /// Set the category.
    pub fn with_category(mut self, category: impl Into<Category>) -> Self {
        self.request.category = Some(category.into());
        self
    }

    /// Set the subcategory.
    pub fn with_subcategory(mut self, subcategory: impl Into<Category>) -> Self {
        self.request.subcategory = Some(subcategory.into());
        self
    }

    /// Set the hit policy.
    pub fn with_hit_policy(mut self, hit_policy: HitPolicy) -> Self {
        self.request.hit_policy = Some(hit_policy);
        self
    }

    /// Build the request.
    pub fn build(self) -> EvaluationRequest {
        self.request
    }
}
