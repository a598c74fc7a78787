//! Rule data structures and representations.
//!
//! This module defines rules, their conditions, categories and hit policies.
//! Rules are read-only from the evaluator's point of view; they are created
//! by an authoring surface and handed out by a [`RuleSource`](crate::source::RuleSource).

mod category;
mod condition;
mod document;
mod hit_policy;
mod metadata;

pub use category::Category;
pub use condition::Condition;
pub use document::RuleDocument;
pub use hit_policy::{HitPolicy, RuleType};
pub use metadata::Metadata;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A decision table or decision tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Unique identifier for the rule
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Human-readable name of the rule
    pub name: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Category used to select candidate rules
    pub category: Category,
    /// Subcategory used to select candidate rules
    pub subcategory: Category,
    /// How the conditions are interpreted
    #[serde(default)]
    pub rule_type: RuleType,
    /// Table row conditions, or tree roots
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Output returned verbatim when a decision table matches
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub results: HashMap<String, serde_json::Value>,
    /// Whether this rule is active
    #[serde(default = "default_active")]
    pub active: bool,
    /// Revision number
    #[serde(default = "default_version")]
    pub version: u32,
    /// User or system that last modified the rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<String>,
    /// Timestamp when the rule was created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Timestamp when the rule was last updated
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

fn default_version() -> u32 {
    1
}

impl Rule {
    /// Create a rule builder.
    pub fn builder(name: impl Into<String>) -> RuleBuilder {
        RuleBuilder::new(name)
    }

    /// Check whether this rule belongs to the given category pair.
    pub fn is_in(&self, category: &Category, subcategory: &Category) -> bool {
        &self.category == category && &self.subcategory == subcategory
    }

    /// Every expression the rule references, in condition order.
    pub fn expressions(&self) -> Vec<&str> {
        self.conditions.iter().flat_map(|c| c.expressions()).collect()
    }

    /// Update the updated_at timestamp and bump the version.
    pub fn touch(&mut self, modified_by: Option<String>) {
        self.updated_at = Utc::now();
        self.version += 1;
        self.modified_by = modified_by;
    }

    /// Validate the rule.
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::Error::validation_field("Rule name cannot be empty", "name"));
        }
        if self.category.is_blank() {
            return Err(crate::Error::validation_field(
                "Rule category cannot be empty",
                "category",
            ));
        }
        if self.subcategory.is_blank() {
            return Err(crate::Error::validation_field(
                "Rule subcategory cannot be empty",
                "subcategory",
            ));
        }

        match self.rule_type {
            RuleType::DecisionTable => {
                for condition in &self.conditions {
                    condition.validate_flat()?;
                }
            }
            RuleType::DecisionTree => {
                if self.conditions.is_empty() {
                    return Err(crate::Error::validation_field(
                        "Decision tree must have at least one root condition",
                        "conditions",
                    ));
                }
                for root in &self.conditions {
                    root.validate_tree()?;
                }
            }
        }

        Ok(())
    }
}

/// Builder for creating rules.
#[derive(Debug)]
pub struct RuleBuilder {
    name: String,
    description: Option<String>,
    category: Category,
    subcategory: Category,
    rule_type: RuleType,
    conditions: Vec<Condition>,
    results: HashMap<String, serde_json::Value>,
    active: bool,
    modified_by: Option<String>,
}

impl RuleBuilder {
    /// Create a new rule builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            category: Category::new("DEFAULT"),
            subcategory: Category::new("DEFAULT"),
            rule_type: RuleType::DecisionTable,
            conditions: Vec::new(),
            results: HashMap::new(),
            active: true,
            modified_by: None,
        }
    }

    /// Set the rule description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the rule category.
    pub fn category(mut self, category: impl Into<Category>) -> Self {
        self.category = category.into();
        self
    }

    /// Set the rule subcategory.
    pub fn subcategory(mut self, subcategory: impl Into<Category>) -> Self {
        self.subcategory = subcategory.into();
        self
    }

    /// Set the rule type.
    pub fn rule_type(mut self, rule_type: RuleType) -> Self {
        self.rule_type = rule_type;
        self
    }

    /// Mark the rule as a decision tree with the given root.
    pub fn tree(mut self, root: Condition) -> Self {
        self.rule_type = RuleType::DecisionTree;
        self.conditions.push(root);
        self
    }

    /// Add a condition.
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Add multiple conditions.
    pub fn conditions(mut self, conditions: impl IntoIterator<Item = Condition>) -> Self {
        self.conditions.extend(conditions);
        self
    }

    /// Add a result entry.
    pub fn result(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.results.insert(key.into(), value.into());
        self
    }

    /// Set whether the rule is active.
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Set who last modified the rule.
    pub fn modified_by(mut self, modified_by: impl Into<String>) -> Self {
        self.modified_by = Some(modified_by.into());
        self
    }

    /// Build the rule.
    pub fn build(self) -> Rule {
        let now = Utc::now();
        Rule {
            id: Uuid::new_v4(),
            name: self.name,
            description: self.description,
            category: self.category,
            subcategory: self.subcategory,
            rule_type: self.rule_type,
            conditions: self.conditions,
            results: self.results,
            active: self.active,
            version: default_version(),
            modified_by: self.modified_by,
            created_at: now,
            updated_at: now,
        }
    }
}
