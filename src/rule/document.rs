//! Rule document parsing and management.

use super::Rule;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// A document that can contain one or more rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDocument {
    /// API version of the rule document format
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Kind of document
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Rules defined in this document
    #[serde(default)]
    pub rules: Vec<Rule>,
}

fn default_api_version() -> String {
    "rules.decision-engine.io/v1".to_string()
}

fn default_kind() -> String {
    "RuleDocument".to_string()
}

/// On-disk encoding of a rule document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Json,
}

impl Format {
    /// Format implied by the file extension, if any.
    fn of(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        if extension.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else if extension.eq_ignore_ascii_case("yaml") || extension.eq_ignore_ascii_case("yml") {
            Some(Self::Yaml)
        } else {
            None
        }
    }
}

impl RuleDocument {
    /// Create a new empty rule document.
    pub fn new() -> Self {
        Self::with_rules(Vec::new())
    }

    /// Create a rule document with the given rules.
    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            rules,
        }
    }

    /// Add a rule to the document.
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Parse a rule document from YAML.
    pub fn from_yaml(yaml: &str) -> crate::Result<Self> {
        serde_yaml::from_str(yaml).map_err(crate::Error::from)
    }

    /// Parse a rule document from JSON.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(crate::Error::from)
    }

    /// Load a rule document from a file.
    ///
    /// Files without a `.yaml`, `.yml` or `.json` extension are tried as
    /// YAML first, then JSON.
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match Format::of(path) {
            Some(Format::Yaml) => Self::from_yaml(&content),
            Some(Format::Json) => Self::from_json(&content),
            None => Self::from_yaml(&content).or_else(|_| Self::from_json(&content)),
        }
    }

    /// Convert the document to YAML.
    pub fn to_yaml(&self) -> crate::Result<String> {
        serde_yaml::to_string(self).map_err(crate::Error::from)
    }

    /// Convert the document to JSON.
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(self).map_err(crate::Error::from)
    }

    /// Write the document to a file. Only a `.json` path is written as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        let path = path.as_ref();
        let content = match Format::of(path) {
            Some(Format::Json) => self.to_json()?,
            _ => self.to_yaml()?,
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate all rules in the document.
    pub fn validate(&self) -> crate::Result<()> {
        for rule in &self.rules {
            rule.validate().map_err(|e| {
                crate::Error::validation(format!("Rule '{}' validation failed: {}", rule.name, e))
            })?;
        }
        Ok(())
    }

    /// Active rules in document order.
    pub fn active_rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|r| r.active)
    }

    /// Find a rule by ID.
    pub fn get_rule(&self, id: &Uuid) -> Option<&Rule> {
        self.rules.iter().find(|r| &r.id == id)
    }
}

impl Default for RuleDocument {
    fn default() -> Self {
        Self::new()
    }
}
