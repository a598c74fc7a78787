//! TTL cache in front of another rule source.

use super::RuleSource;
use crate::rule::{Category, Rule};
use crate::Result;

use moka::sync::Cache;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Cache key for the unfiltered active rule set.
pub const ALL_RULES_KEY: &str = "allRules";

/// Caches rule sets per `"<category>:<subcategory>"` key for a fixed TTL.
///
/// Loads hold `fill` shared from the inner lookup until the insert, and
/// invalidation holds it exclusively, so a set read before a reload can
/// never land in the cache after it.
pub struct CachedRuleSource<S> {
    inner: S,
    cache: Cache<String, Arc<Vec<Arc<Rule>>>>,
    fill: RwLock<()>,
}

impl<S: RuleSource> CachedRuleSource<S> {
    /// Wrap `inner`, keeping at most `capacity` rule sets for `ttl` each.
    pub fn new(inner: S, ttl: Duration, capacity: u64) -> Self {
        Self {
            inner,
            cache: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
            fill: RwLock::new(()),
        }
    }

    /// The wrapped source.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Drop every cached rule set without reloading.
    pub fn invalidate_all(&self) {
        let _fill = self.fill.write();
        self.cache.invalidate_all();
    }

    /// Number of cached rule sets.
    pub fn cached_sets(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    fn cached(
        &self,
        key: String,
        load: impl FnOnce() -> Result<Vec<Arc<Rule>>>,
    ) -> Result<Vec<Arc<Rule>>> {
        if let Some(rules) = self.cache.get(&key) {
            return Ok(rules.to_vec());
        }
        let _fill = self.fill.read();
        let rules = load()?;
        self.cache.insert(key, Arc::new(rules.clone()));
        Ok(rules)
    }
}

impl<S: RuleSource> RuleSource for CachedRuleSource<S> {
    fn find_rules(&self, category: &Category, subcategory: &Category) -> Result<Vec<Arc<Rule>>> {
        self.cached(Category::pair_key(category, subcategory), || {
            self.inner.find_rules(category, subcategory)
        })
    }

    fn find_active_rules(&self) -> Result<Vec<Arc<Rule>>> {
        self.cached(ALL_RULES_KEY.to_string(), || self.inner.find_active_rules())
    }

    fn reload(&self) -> Result<()> {
        self.inner.reload()?;
        self.invalidate_all();
        let active = self.find_active_rules()?;
        debug!(active_rules = active.len(), "Rule cache reloaded");
        Ok(())
    }
}

impl<S> std::fmt::Debug for CachedRuleSource<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedRuleSource")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryRuleSource;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Barrier;

    /// Counts calls through to the wrapped source.
    struct Counting {
        inner: InMemoryRuleSource,
        calls: AtomicUsize,
        reloads: AtomicUsize,
    }

    impl RuleSource for Counting {
        fn find_rules(&self, category: &Category, subcategory: &Category) -> Result<Vec<Arc<Rule>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.find_rules(category, subcategory)
        }

        fn find_active_rules(&self) -> Result<Vec<Arc<Rule>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.find_active_rules()
        }

        fn reload(&self) -> Result<()> {
            self.reloads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn counting() -> Counting {
        Counting {
            inner: InMemoryRuleSource::with_rules(vec![Rule::builder("r")
                .category("PRICING")
                .subcategory("DEFAULT")
                .build()]),
            calls: AtomicUsize::new(0),
            reloads: AtomicUsize::new(0),
        }
    }

    #[test]
    fn test_rule_sets_are_cached() {
        let source = CachedRuleSource::new(counting(), Duration::from_secs(60), 100);
        let pricing = Category::new("PRICING");
        let default = Category::new("DEFAULT");

        assert_eq!(source.find_rules(&pricing, &default).unwrap().len(), 1);
        assert_eq!(source.find_rules(&pricing, &default).unwrap().len(), 1);
        assert_eq!(source.inner().calls.load(Ordering::SeqCst), 1);

        source.find_active_rules().unwrap();
        source.find_active_rules().unwrap();
        assert_eq!(source.inner().calls.load(Ordering::SeqCst), 2);
        assert_eq!(source.cached_sets(), 2);
    }

    #[test]
    fn test_reload_invalidates_and_repopulates() {
        let source = CachedRuleSource::new(counting(), Duration::from_secs(60), 100);
        let pricing = Category::new("PRICING");
        let default = Category::new("DEFAULT");
        source.find_rules(&pricing, &default).unwrap();

        source.inner().inner.replace(Vec::new());
        assert_eq!(source.find_rules(&pricing, &default).unwrap().len(), 1);

        source.reload().unwrap();
        assert_eq!(source.inner().reloads.load(Ordering::SeqCst), 1);
        assert_eq!(source.inner().calls.load(Ordering::SeqCst), 2);
        assert!(source.find_rules(&pricing, &default).unwrap().is_empty());
        assert_eq!(source.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_entries_expire() {
        let source = CachedRuleSource::new(counting(), Duration::from_millis(50), 100);
        let pricing = Category::new("PRICING");
        let default = Category::new("DEFAULT");

        source.find_rules(&pricing, &default).unwrap();
        std::thread::sleep(Duration::from_millis(120));
        source.find_rules(&pricing, &default).unwrap();
        assert_eq!(source.inner().calls.load(Ordering::SeqCst), 2);
    }

    /// Parks the first lookup after it has read the rules.
    struct Stalling {
        inner: InMemoryRuleSource,
        parked: AtomicBool,
        barrier: Barrier,
    }

    impl RuleSource for Stalling {
        fn find_rules(&self, category: &Category, subcategory: &Category) -> Result<Vec<Arc<Rule>>> {
            let rules = self.inner.find_rules(category, subcategory)?;
            if !self.parked.swap(true, Ordering::SeqCst) {
                self.barrier.wait();
            }
            Ok(rules)
        }

        fn find_active_rules(&self) -> Result<Vec<Arc<Rule>>> {
            self.inner.find_active_rules()
        }
    }

    #[test]
    fn test_lookup_in_flight_during_reload_is_not_kept() {
        let source = Arc::new(CachedRuleSource::new(
            Stalling {
                inner: InMemoryRuleSource::with_rules(vec![Rule::builder("r")
                    .category("P")
                    .subcategory("D")
                    .build()]),
                parked: AtomicBool::new(false),
                barrier: Barrier::new(2),
            },
            Duration::from_secs(60),
            100,
        ));
        let p = Category::new("P");
        let d = Category::new("D");

        let lookup = {
            let source = Arc::clone(&source);
            let (p, d) = (p.clone(), d.clone());
            std::thread::spawn(move || source.find_rules(&p, &d).unwrap().len())
        };

        source.inner().barrier.wait();
        source.inner().inner.replace(Vec::new());
        source.reload().unwrap();

        assert_eq!(lookup.join().unwrap(), 1);
        assert!(source.find_rules(&p, &d).unwrap().is_empty());
    }
}
