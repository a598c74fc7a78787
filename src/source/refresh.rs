//! Scheduled rule reloads.

use super::RuleSource;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Spawn a task that calls [`RuleSource::reload`] every `interval`.
///
/// The first reload happens one interval after spawning. Failures are
/// logged and the schedule continues. Abort the returned handle to stop.
pub fn spawn_refresh<S>(source: Arc<S>, interval: Duration) -> JoinHandle<()>
where
    S: RuleSource + ?Sized + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let source = Arc::clone(&source);
            match tokio::task::spawn_blocking(move || source.reload()).await {
                Ok(Ok(())) => debug!("Scheduled rule reload completed"),
                Ok(Err(e)) => warn!(error = %e, "Scheduled rule reload failed"),
                Err(e) => warn!(error = %e, "Scheduled rule reload panicked"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Category, Rule};
    use crate::{Error, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        reloads: AtomicUsize,
    }

    impl RuleSource for Flaky {
        fn find_rules(&self, _: &Category, _: &Category) -> Result<Vec<Arc<Rule>>> {
            Ok(Vec::new())
        }

        fn find_active_rules(&self) -> Result<Vec<Arc<Rule>>> {
            Ok(Vec::new())
        }

        fn reload(&self) -> Result<()> {
            let n = self.reloads.fetch_add(1, Ordering::SeqCst);
            if n % 2 == 0 {
                Err(Error::rule_source("store unavailable"))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_refresh_keeps_running_after_errors() {
        let source = Arc::new(Flaky {
            reloads: AtomicUsize::new(0),
        });
        let handle = spawn_refresh(Arc::clone(&source), Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.abort();

        assert!(source.reloads.load(Ordering::SeqCst) >= 3);
    }
}
