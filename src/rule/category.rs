//! Rule category handles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// An application-defined classification used to select candidate rules.
///
/// Categories are an open set: any non-blank name is valid, and two
/// categories are equal when their names are equal. The same type is used
/// for both the category and the subcategory of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(Arc<str>);

impl Category {
    /// Create a category with the given name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Get the category name.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Check whether the name is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Key used to cache the rule set for a category/subcategory pair.
    pub fn pair_key(category: &Category, subcategory: &Category) -> String {
        format!("{}:{}", category.name(), subcategory.name())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Category {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Category {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl std::str::FromStr for Category {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let category = Category::new(s.trim());
        if category.is_blank() {
            return Err(crate::Error::parse("Category name cannot be blank"));
        }
        Ok(category)
    }
}
