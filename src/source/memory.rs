//! In-memory rule source.

use super::RuleSource;
use crate::rule::{Category, Rule};
use crate::Result;

use arc_swap::ArcSwap;
use std::sync::Arc;
use uuid::Uuid;

/// Rules held in process memory.
///
/// Readers see an immutable snapshot; writers publish a new snapshot with a
/// single atomic swap, so an evaluation never observes a half-applied update.
#[derive(Debug)]
pub struct InMemoryRuleSource {
    rules: ArcSwap<Vec<Arc<Rule>>>,
}

impl InMemoryRuleSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::with_rules(Vec::new())
    }

    /// Create a source holding `rules` in order.
    pub fn with_rules(rules: impl IntoIterator<Item = Rule>) -> Self {
        Self {
            rules: ArcSwap::from_pointee(rules.into_iter().map(Arc::new).collect()),
        }
    }

    /// Replace every rule.
    pub fn replace(&self, rules: impl IntoIterator<Item = Rule>) {
        self.rules
            .store(Arc::new(rules.into_iter().map(Arc::new).collect()));
    }

    /// Insert a rule, or replace the rule with the same id in place.
    pub fn upsert(&self, rule: Rule) {
        let rule = Arc::new(rule);
        self.rules.rcu(|current| {
            let mut next = Vec::clone(current);
            match next.iter_mut().find(|r| r.id == rule.id) {
                Some(slot) => *slot = Arc::clone(&rule),
                None => next.push(Arc::clone(&rule)),
            }
            next
        });
    }

    /// Remove a rule by id. Returns whether it was present.
    pub fn remove(&self, id: &Uuid) -> bool {
        let previous = self.rules.rcu(|current| {
            current
                .iter()
                .filter(|r| &r.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
        previous.iter().any(|r| &r.id == id)
    }

    /// Find a rule by id, active or not.
    pub fn get(&self, id: &Uuid) -> Option<Arc<Rule>> {
        self.rules.load().iter().find(|r| &r.id == id).cloned()
    }

    /// Every rule, active or not.
    pub fn all_rules(&self) -> Vec<Arc<Rule>> {
        self.rules.load_full().to_vec()
    }

    /// Number of rules, active or not.
    pub fn len(&self) -> usize {
        self.rules.load().len()
    }

    /// Whether the source holds no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.load().is_empty()
    }
}

impl Default for InMemoryRuleSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleSource for InMemoryRuleSource {
    fn find_rules(&self, category: &Category, subcategory: &Category) -> Result<Vec<Arc<Rule>>> {
        Ok(super::select(&self.rules.load(), category, subcategory))
    }

    fn find_active_rules(&self) -> Result<Vec<Arc<Rule>>> {
        Ok(super::active(&self.rules.load()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str, category: &str, subcategory: &str) -> Rule {
        Rule::builder(name)
            .category(category)
            .subcategory(subcategory)
            .build()
    }

    #[test]
    fn test_find_rules_filters_and_keeps_order() {
        let mut inactive = rule("inactive", "PRICING", "DEFAULT");
        inactive.active = false;
        let source = InMemoryRuleSource::with_rules(vec![
            rule("a", "PRICING", "DEFAULT"),
            rule("other", "WORKFLOW", "DEFAULT"),
            inactive,
            rule("b", "PRICING", "DEFAULT"),
        ]);

        let found = source
            .find_rules(&"PRICING".into(), &"DEFAULT".into())
            .unwrap();
        let names: Vec<_> = found.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(source.find_active_rules().unwrap().len(), 3);
        assert_eq!(source.len(), 4);
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let source = InMemoryRuleSource::new();
        let mut first = rule("first", "PRICING", "DEFAULT");
        source.upsert(first.clone());
        source.upsert(rule("second", "PRICING", "DEFAULT"));

        first.name = "first v2".to_string();
        source.upsert(first.clone());

        let names: Vec<_> = source.all_rules().iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, vec!["first v2", "second"]);
        assert_eq!(source.get(&first.id).unwrap().name, "first v2");
    }

    #[test]
    fn test_remove_and_replace() {
        let kept = rule("kept", "PRICING", "DEFAULT");
        let dropped = rule("dropped", "PRICING", "DEFAULT");
        let dropped_id = dropped.id;
        let source = InMemoryRuleSource::with_rules(vec![kept, dropped]);

        assert!(source.remove(&dropped_id));
        assert!(!source.remove(&dropped_id));
        assert_eq!(source.len(), 1);

        source.replace(Vec::new());
        assert!(source.is_empty());
    }

    #[test]
    fn test_snapshot_survives_update() {
        let source = InMemoryRuleSource::with_rules(vec![rule("a", "PRICING", "DEFAULT")]);
        let snapshot = source.find_active_rules().unwrap();
        source.replace(Vec::new());
        assert_eq!(snapshot.len(), 1);
        assert!(source.find_active_rules().unwrap().is_empty());
    }
}
