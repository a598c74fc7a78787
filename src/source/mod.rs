//! Rule sources.
//!
//! The evaluator pulls candidate rules from a [`RuleSource`] on every call.
//! Sources return active rules only, in a stable order for the duration of
//! one call, and may cache or refresh on their own schedule.

mod cached;
mod file;
mod memory;
mod refresh;

pub use cached::{CachedRuleSource, ALL_RULES_KEY};
pub use file::FileRuleSource;
pub use memory::InMemoryRuleSource;
pub use refresh::spawn_refresh;

use crate::rule::{Category, Rule};
use crate::Result;

use std::sync::Arc;

/// Supplies the rules an evaluation runs against.
pub trait RuleSource: Send + Sync {
    /// Active rules in the given category pair.
    fn find_rules(&self, category: &Category, subcategory: &Category) -> Result<Vec<Arc<Rule>>>;

    /// Every active rule.
    fn find_active_rules(&self) -> Result<Vec<Arc<Rule>>>;

    /// Invalidate and repopulate whatever this source caches.
    fn reload(&self) -> Result<()> {
        Ok(())
    }
}

impl<S: RuleSource + ?Sized> RuleSource for Arc<S> {
    fn find_rules(&self, category: &Category, subcategory: &Category) -> Result<Vec<Arc<Rule>>> {
        (**self).find_rules(category, subcategory)
    }

    fn find_active_rules(&self) -> Result<Vec<Arc<Rule>>> {
        (**self).find_active_rules()
    }

    fn reload(&self) -> Result<()> {
        (**self).reload()
    }
}

/// Active rules of `rules` in the given category pair, preserving order.
pub(crate) fn select(rules: &[Arc<Rule>], category: &Category, subcategory: &Category) -> Vec<Arc<Rule>> {
    rules
        .iter()
        .filter(|r| r.active && r.is_in(category, subcategory))
        .cloned()
        .collect()
}

/// Active rules of `rules`, preserving order.
pub(crate) fn active(rules: &[Arc<Rule>]) -> Vec<Arc<Rule>> {
    rules.iter().filter(|r| r.active).cloned().collect()
}
