//! Rule condition definitions.

use serde::{Deserialize, Serialize};

/// A condition node.
///
/// Decision tables use flat conditions that only carry an expression.
/// Decision trees use the same type as a binary tree: an internal node has a
/// boolean `condition` and both branches, a leaf has neither branch and
/// usually an `action` expression.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Boolean expression tested at this node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Expression executed when this node is a reached leaf
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Literal values bound as `inValues` while the condition runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_values: Option<Vec<serde_json::Value>>,
    /// Node followed when the condition is true
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub true_branch: Option<Box<Condition>>,
    /// Node followed when the condition is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub false_branch: Option<Box<Condition>>,
}

impl Condition {
    /// Create a flat condition from an expression.
    pub fn expr(expression: impl Into<String>) -> Self {
        Self {
            condition: Some(expression.into()),
            ..Default::default()
        }
    }

    /// Create a leaf node with an action expression.
    pub fn leaf(action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            ..Default::default()
        }
    }

    /// Create an internal tree node.
    pub fn branch(expression: impl Into<String>, on_true: Condition, on_false: Condition) -> Self {
        Self {
            condition: Some(expression.into()),
            true_branch: Some(Box::new(on_true)),
            false_branch: Some(Box::new(on_false)),
            ..Default::default()
        }
    }

    /// Attach membership values to this condition.
    pub fn with_in_values(mut self, values: impl IntoIterator<Item = impl Into<serde_json::Value>>) -> Self {
        self.in_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// A node is a leaf iff both branches are absent.
    pub fn is_leaf(&self) -> bool {
        self.true_branch.is_none() && self.false_branch.is_none()
    }

    /// Copy of this node without its children, used for traversal traces.
    pub fn detached(&self) -> Self {
        Self {
            condition: self.condition.clone(),
            action: self.action.clone(),
            in_values: self.in_values.clone(),
            true_branch: None,
            false_branch: None,
        }
    }

    /// Depth of the tree rooted at this node (a single leaf has depth 1).
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self, 1usize)];
        while let Some((node, depth)) = stack.pop() {
            max = max.max(depth);
            for child in [&node.true_branch, &node.false_branch].into_iter().flatten() {
                stack.push((&**child, depth + 1));
            }
        }
        max
    }

    /// Every expression (conditions and actions) in the tree rooted here.
    pub fn expressions(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.extend(node.condition.as_deref());
            out.extend(node.action.as_deref());
            stack.extend(node.false_branch.as_deref());
            stack.extend(node.true_branch.as_deref());
        }
        out
    }

    /// Validate a condition used as a decision-table row entry.
    pub fn validate_flat(&self) -> crate::Result<()> {
        if !self.is_leaf() {
            return Err(crate::Error::validation_field(
                "Decision table conditions cannot have branches",
                "conditions",
            ));
        }
        if self.action.is_some() {
            return Err(crate::Error::validation_field(
                "Decision table conditions cannot have actions",
                "conditions",
            ));
        }
        Ok(())
    }

    /// Validate the tree rooted at this node.
    pub fn validate_tree(&self) -> crate::Result<()> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match (&node.true_branch, &node.false_branch) {
                (None, None) => {}
                (Some(t), Some(f)) => {
                    if node.condition.as_deref().map_or(true, |c| c.trim().is_empty()) {
                        return Err(crate::Error::validation_field(
                            "Internal tree node must have a condition",
                            "condition",
                        ));
                    }
                    stack.push(t);
                    stack.push(f);
                }
                _ => {
                    return Err(crate::Error::validation_field(
                        "Internal tree node must have both branches",
                        "trueBranch/falseBranch",
                    ))
                }
            }
        }
        Ok(())
    }
}
