//! Concurrent commit stress helpers.
//!
//! These drive many threads appending to one object through a shared
//! [`MemoryStore`], retrying whenever a commit aborts on a conflict, so
//! every commit after the first races with the others and goes through a
//! merge.

use crate::store::MemoryStore;
use crate::types::ObjectId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use strata_core::Versioned;
use tracing::{debug, info, warn};

/// Outcome of a stress run, counted per item.
#[derive(Debug, Clone, Default)]
pub struct StressTestResult {
    /// Items whose commit landed.
    pub committed: usize,
    /// Aborted commits that were tried again from a fresh transaction.
    pub retries: usize,
    /// Items given up on after a non-conflict error or the last attempt.
    pub abandoned: usize,
    /// Wall time of the whole run.
    pub duration: Duration,
}

impl StressTestResult {
    /// Items every writer tried to append.
    #[must_use]
    pub fn items(&self) -> usize {
        self.committed + self.abandoned
    }

    /// Logs a summary of the run.
    pub fn log_summary(&self, name: &str) {
        info!(
            name,
            committed = self.committed,
            retries = self.retries,
            abandoned = self.abandoned,
            duration = ?self.duration,
            "stress run finished"
        );
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent threads.
    pub threads: usize,
    /// Items each thread appends, one per transaction.
    pub appends_per_thread: usize,
    /// Attempts per item before a thread gives up on it.
    pub max_attempts: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            appends_per_thread: 50,
            max_attempts: 8,
        }
    }
}

/// Item appended by `writer` for its `index`-th transaction.
///
/// Items are unique across threads so tests can check none were lost.
#[must_use]
pub fn stress_item(config: &StressConfig, writer: usize, index: usize) -> u32 {
    u32::try_from(writer * config.appends_per_thread + index).unwrap_or(u32::MAX)
}

/// Runs `config.threads` writers that each append to object `id` in their
/// own transactions.
///
/// `append` mutates the loaded structure. A commit that aborts on a
/// conflict is retried from a fresh transaction, up to `config.max_attempts`
/// attempts per item; any other error abandons the item at once.
pub fn stress_concurrent_appends<V, F>(
    store: Arc<MemoryStore>,
    id: ObjectId,
    config: &StressConfig,
    append: F,
) -> StressTestResult
where
    V: Versioned + 'static,
    F: Fn(&mut V, u32) + Send + Sync + 'static,
{
    let committed = Arc::new(AtomicUsize::new(0));
    let retries = Arc::new(AtomicUsize::new(0));
    let abandoned = Arc::new(AtomicUsize::new(0));
    let append = Arc::new(append);

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let store = Arc::clone(&store);
            let committed = Arc::clone(&committed);
            let retries = Arc::clone(&retries);
            let abandoned = Arc::clone(&abandoned);
            let append = Arc::clone(&append);
            let config = config.clone();

            thread::spawn(move || {
                for i in 0..config.appends_per_thread {
                    let item = stress_item(&config, t, i);
                    let mut attempts = 0;
                    loop {
                        attempts += 1;
                        let mut txn = store.begin();
                        let outcome = store
                            .load::<V>(&mut txn, id)
                            .and_then(|mut value| {
                                append(&mut value, item);
                                store.save(&mut txn, id, &value)
                            })
                            .and_then(|()| store.commit(&mut txn));
                        match outcome {
                            Ok(_) => {
                                committed.fetch_add(1, Ordering::Relaxed);
                                break;
                            }
                            Err(err) if err.is_conflict() && attempts < config.max_attempts => {
                                debug!(writer = t, item, attempts, "commit aborted, retrying");
                                retries.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(err) => {
                                warn!(writer = t, item, attempts, error = %err, "abandoning item");
                                abandoned.fetch_add(1, Ordering::Relaxed);
                                break;
                            }
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        if let Err(panic) = handle.join() {
            std::panic::resume_unwind(panic);
        }
    }

    StressTestResult {
        committed: committed.load(Ordering::Relaxed),
        retries: retries.load(Ordering::Relaxed),
        abandoned: abandoned.load(Ordering::Relaxed),
        duration: start.elapsed(),
    }
}
