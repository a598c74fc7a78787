//! Compiled-expression cache.
//!
//! Maps expression text to its compiled form. Lookups and insertions are
//! sharded through [`DashMap`]; the size bound is enforced with an atomic
//! reservation counter. When the bound is reached the whole cache is flushed
//! before the next entry goes in, so hot expressions are evicted along with
//! cold ones.

use crate::expression::CompiledExpression;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A bounded cache of compiled expressions keyed by their source text.
pub struct ExpressionCache {
    entries: DashMap<String, Arc<dyn CompiledExpression>>,
    /// Inserts hold this shared; a flush holds it exclusively
    flush_lock: RwLock<()>,
    /// Reserved slots, always >= entries.len() while no flush is running
    reserved: AtomicUsize,
    max_size: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    flushes: AtomicU64,
}

impl ExpressionCache {
    /// Create a cache holding at most `max_size` entries (at least one).
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: DashMap::new(),
            flush_lock: RwLock::new(()),
            reserved: AtomicUsize::new(0),
            max_size: max_size.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
        }
    }

    /// Look up a compiled expression.
    pub fn get(&self, expression: &str) -> Option<Arc<dyn CompiledExpression>> {
        match self.entries.get(expression) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(entry.value()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert a compiled expression, returning the entry that ends up cached.
    ///
    /// If another thread cached the same text first, its entry wins and is
    /// returned. A full cache is flushed before the new entry is inserted.
    pub fn insert(
        &self,
        expression: &str,
        compiled: Arc<dyn CompiledExpression>,
    ) -> Arc<dyn CompiledExpression> {
        {
            let _shared = self.flush_lock.read();
            if let Some(existing) = self.existing(expression) {
                return existing;
            }
            if self.try_reserve() {
                return match self.entries.entry(expression.to_string()) {
                    Entry::Occupied(entry) => {
                        self.reserved.fetch_sub(1, Ordering::AcqRel);
                        Arc::clone(entry.get())
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(Arc::clone(&compiled));
                        compiled
                    }
                };
            }
        }

        let _exclusive = self.flush_lock.write();
        if let Some(existing) = self.existing(expression) {
            return existing;
        }
        if self.reserved.load(Ordering::Acquire) >= self.max_size {
            let evicted = self.entries.len();
            self.entries.clear();
            self.reserved.store(0, Ordering::Release);
            self.flushes.fetch_add(1, Ordering::Relaxed);
            debug!(evicted, max_size = self.max_size, "Expression cache full, flushed");
        }
        self.reserved.fetch_add(1, Ordering::AcqRel);
        self.entries
            .insert(expression.to_string(), Arc::clone(&compiled));
        compiled
    }

    /// Remove every entry. Counters are kept.
    pub fn clear(&self) {
        let _exclusive = self.flush_lock.write();
        self.entries.clear();
        self.reserved.store(0, Ordering::Release);
    }

    /// Number of cached expressions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured maximum number of entries.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        let size = self.entries.len();

        CacheStats {
            size,
            max_size: self.max_size,
            hits,
            misses,
            flushes: self.flushes.load(Ordering::Relaxed),
            hit_rate,
            utilization_percent: (size as f64 / self.max_size as f64) * 100.0,
        }
    }

    fn existing(&self, expression: &str) -> Option<Arc<dyn CompiledExpression>> {
        self.entries.get(expression).map(|e| Arc::clone(e.value()))
    }

    fn try_reserve(&self) -> bool {
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_size).then_some(n + 1)
            })
            .is_ok()
    }
}

impl std::fmt::Debug for ExpressionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionCache")
            .field("size", &self.entries.len())
            .field("max_size", &self.max_size)
            .finish()
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Current number of entries
    pub size: usize,
    /// Configured maximum number of entries
    pub max_size: usize,
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of full flushes triggered by the size bound
    pub flushes: u64,
    /// Hit rate percentage
    pub hit_rate: f64,
    /// Size as a percentage of the maximum
    pub utilization_percent: f64,
}
