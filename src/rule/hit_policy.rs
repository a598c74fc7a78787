//! Hit policies and rule types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Controls how many matching rules or tree paths an evaluation returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HitPolicy {
    /// Stop scanning at the first match
    First,
    /// Evaluate every candidate and return all results
    Collect,
}

impl HitPolicy {
    /// Whether scanning should stop after a result with this match flag.
    pub fn stops_at(&self, matched: bool) -> bool {
        matches!(self, HitPolicy::First) && matched
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            HitPolicy::First => "FIRST",
            HitPolicy::Collect => "COLLECT",
        }
    }
}

impl Default for HitPolicy {
    fn default() -> Self {
        HitPolicy::First
    }
}

impl fmt::Display for HitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for HitPolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "FIRST" => Ok(HitPolicy::First),
            "COLLECT" => Ok(HitPolicy::Collect),
            _ => Err(crate::Error::parse(format!("Unknown hit policy: {}", s))),
        }
    }
}

/// Discriminates how a rule's conditions are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    /// Conditions are AND-ed; a fixed result map is returned on match
    DecisionTable,
    /// Conditions are tree roots traversed down to a leaf action
    DecisionTree,
}

impl RuleType {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::DecisionTable => "DECISION_TABLE",
            RuleType::DecisionTree => "DECISION_TREE",
        }
    }
}

impl Default for RuleType {
    fn default() -> Self {
        RuleType::DecisionTable
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RuleType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "DECISION_TABLE" => Ok(RuleType::DecisionTable),
            "DECISION_TREE" => Ok(RuleType::DecisionTree),
            _ => Err(crate::Error::parse(format!("Unknown rule type: {}", s))),
        }
    }
}
