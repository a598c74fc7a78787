//! Rule source backed by a rule document on disk.

use super::RuleSource;
use crate::rule::{Category, Rule, RuleDocument};
use crate::Result;

use arc_swap::ArcSwap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Rules loaded from a YAML or JSON [`RuleDocument`].
///
/// [`reload`](RuleSource::reload) re-reads the file. A document that fails
/// to parse or validate leaves the previous rules in place.
#[derive(Debug)]
pub struct FileRuleSource {
    path: PathBuf,
    rules: ArcSwap<Vec<Arc<Rule>>>,
}

impl FileRuleSource {
    /// Load rules from `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let rules = Self::load(&path)?;
        Ok(Self {
            path,
            rules: ArcSwap::from_pointee(rules),
        })
    }

    /// The document path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of rules in the current snapshot, active or not.
    pub fn len(&self) -> usize {
        self.rules.load().len()
    }

    /// Whether the current snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.rules.load().is_empty()
    }

    fn load(path: &Path) -> Result<Vec<Arc<Rule>>> {
        let document = RuleDocument::from_file(path)?;
        document.validate()?;
        debug!(path = %path.display(), rules = document.rules.len(), "Loaded rule document");
        Ok(document.rules.into_iter().map(Arc::new).collect())
    }
}

impl RuleSource for FileRuleSource {
    fn find_rules(&self, category: &Category, subcategory: &Category) -> Result<Vec<Arc<Rule>>> {
        Ok(super::select(&self.rules.load(), category, subcategory))
    }

    fn find_active_rules(&self) -> Result<Vec<Arc<Rule>>> {
        Ok(super::active(&self.rules.load()))
    }

    fn reload(&self) -> Result<()> {
        match Self::load(&self.path) {
            Ok(rules) => {
                self.rules.store(Arc::new(rules));
                Ok(())
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Keeping previous rules after failed reload");
                Err(crate::Error::rule_source(format!(
                    "Failed to reload {}: {}",
                    self.path.display(),
                    e
                )))
            }
        }
    }
}
