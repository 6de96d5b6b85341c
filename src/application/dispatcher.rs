//! Batched task dispatch with per-entity mutual exclusion.
//!
//! Groups run strictly in order. Each group is cut into batches of at most
//! `max_batch_size` entities; a batch runs concurrently and is awaited as an
//! all-settle join, so one failing or slow entity never aborts its siblings.
//! A fixed pause follows every batch to rate-limit node and signer usage.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::domain::MarketKey;
use crate::error::Result;
use crate::port::KeeperMetrics;

/// Batch sizing and pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Maximum actions in flight at once.
    pub max_batch_size: usize,
    /// Pause after each batch.
    pub batch_wait: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 4,
            batch_wait: Duration::from_millis(1000),
        }
    }
}

/// Counters for one dispatch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub batches: usize,
    pub completed: usize,
    pub failed: usize,
    /// Entities skipped because an action for them was already in flight.
    pub skipped: usize,
}

/// Marks an entity as in flight; the marker is cleared on drop.
pub struct ActiveTask<'a> {
    id: String,
    active: &'a Mutex<HashSet<String>>,
}

impl Drop for ActiveTask<'_> {
    fn drop(&mut self) {
        self.active.lock().remove(&self.id);
    }
}

/// Runs keeper actions for one market and policy.
pub struct Dispatcher {
    market: MarketKey,
    action: &'static str,
    config: DispatchConfig,
    metrics: Arc<dyn KeeperMetrics>,
    active: Mutex<HashSet<String>>,
}

impl Dispatcher {
    pub fn new(
        market: MarketKey,
        action: &'static str,
        config: DispatchConfig,
        metrics: Arc<dyn KeeperMetrics>,
    ) -> Self {
        Self {
            market,
            action,
            config,
            metrics,
            active: Mutex::new(HashSet::new()),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Claim `id` for a new action. Returns `None` if one is already in flight.
    pub fn try_acquire(&self, id: &str) -> Option<ActiveTask<'_>> {
        let mut active = self.active.lock();
        if !active.insert(id.to_string()) {
            return None;
        }
        Some(ActiveTask {
            id: id.to_string(),
            active: &self.active,
        })
    }

    #[must_use]
    pub fn is_active(&self, id: &str) -> bool {
        self.active.lock().contains(id)
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    /// Forget all in-flight markers. Only used when the index is rebuilt.
    pub fn reset(&self) {
        self.active.lock().clear();
    }

    /// Run `act` for every entity, group by group, batch by batch.
    ///
    /// `settle` is called once per finished action, in batch order, after the
    /// whole batch has settled and before the inter-batch pause. Failed actions
    /// are logged and counted here; `settle` still sees the error so the
    /// caller can update its bookkeeping.
    pub async fn run<E, O, I, A, Fut, S>(
        &self,
        groups: Vec<Vec<E>>,
        id_of: I,
        act: A,
        mut settle: S,
    ) -> DispatchReport
    where
        I: Fn(&E) -> String,
        A: Fn(E) -> Fut,
        Fut: Future<Output = Result<O>>,
        S: FnMut(&str, Result<O>),
    {
        let mut report = DispatchReport::default();
        let batch_size = self.config.max_batch_size.max(1);

        for group in groups {
            if group.is_empty() {
                continue;
            }

            let mut entities = group.into_iter().peekable();
            while entities.peek().is_some() {
                let batch: Vec<E> = entities.by_ref().take(batch_size).collect();
                info!(
                    market = %self.market,
                    action = self.action,
                    size = batch.len(),
                    "Running keeper batch"
                );

                let mut tasks = Vec::with_capacity(batch.len());
                for entity in batch {
                    let id = id_of(&entity);
                    let Some(guard) = self.try_acquire(&id) else {
                        debug!(
                            market = %self.market,
                            action = self.action,
                            id = %id,
                            "Task already running, skipping"
                        );
                        report.skipped += 1;
                        continue;
                    };
                    let fut = act(entity);
                    tasks.push(async move {
                        let result = fut.await;
                        drop(guard);
                        (id, result)
                    });
                }

                report.batches += 1;
                for (id, result) in join_all(tasks).await {
                    match &result {
                        Ok(_) => report.completed += 1,
                        Err(e) => {
                            warn!(
                                market = %self.market,
                                action = self.action,
                                id = %id,
                                error = %e,
                                "Keeper task failed"
                            );
                            self.metrics.keeper_error(&self.market, self.action);
                            report.failed += 1;
                        }
                    }
                    settle(&id, result);
                }

                if !self.config.batch_wait.is_zero() {
                    tokio::time::sleep(self.config.batch_wait).await;
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ChainError, Error};
    use crate::port::NoopMetrics;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn dispatcher(max_batch_size: usize) -> Dispatcher {
        Dispatcher::new(
            MarketKey::from("sETHPERP"),
            "test",
            DispatchConfig {
                max_batch_size,
                batch_wait: Duration::ZERO,
            },
            Arc::new(NoopMetrics),
        )
    }

    #[derive(Default)]
    struct WorkTracker {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    impl WorkTracker {
        async fn work(&self, fail: bool) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if fail {
                Err(Error::Chain(ChainError::Rpc("boom".into())))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn batch_size_one_runs_sequential_batches() {
        let dispatcher = dispatcher(1);
        let tracker = WorkTracker::default();

        let report = dispatcher
            .run(
                vec![vec!["a", "b", "c", "d"]],
                |e| e.to_string(),
                |_| tracker.work(false),
                |_, _| {},
            )
            .await;

        assert_eq!(report.batches, 4);
        assert_eq!(report.completed, 4);
        assert_eq!(tracker.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn batches_never_exceed_max_size() {
        let dispatcher = dispatcher(2);
        let tracker = WorkTracker::default();

        let report = dispatcher
            .run(
                vec![vec!["a", "b", "c", "d", "e"]],
                |e| e.to_string(),
                |_| tracker.work(false),
                |_, _| {},
            )
            .await;

        assert_eq!(report.batches, 3);
        assert_eq!(tracker.max_in_flight.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn groups_run_in_order() {
        let dispatcher = dispatcher(10);
        let mut settled = Vec::new();

        dispatcher
            .run(
                vec![vec!["a", "b"], vec![], vec!["c"]],
                |e| e.to_string(),
                |_| async { Ok::<_, Error>(()) },
                |id, _| settled.push(id.to_string()),
            )
            .await;

        assert_eq!(settled, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn failure_does_not_abort_siblings() {
        let dispatcher = dispatcher(3);
        let tracker = WorkTracker::default();
        let mut failures = Vec::new();

        let report = dispatcher
            .run(
                vec![vec!["a", "bad", "c"]],
                |e| e.to_string(),
                |e| tracker.work(e == "bad"),
                |id, result| {
                    if result.is_err() {
                        failures.push(id.to_string());
                    }
                },
            )
            .await;

        assert_eq!(report.completed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(failures, vec!["bad"]);
        assert_eq!(tracker.calls.load(Ordering::SeqCst), 3);
        assert_eq!(dispatcher.active_count(), 0);
    }

    #[tokio::test]
    async fn duplicate_id_in_batch_runs_once() {
        let dispatcher = dispatcher(4);
        let tracker = WorkTracker::default();

        let report = dispatcher
            .run(
                vec![vec!["a", "a"]],
                |e| e.to_string(),
                |_| tracker.work(false),
                |_, _| {},
            )
            .await;

        assert_eq!(tracker.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn overlapping_runs_execute_entity_once() {
        let dispatcher = dispatcher(4);
        let calls = AtomicUsize::new(0);
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let release_rx = Mutex::new(Some(release_rx));

        let slow = dispatcher.run(
            vec![vec!["a"]],
            |e| e.to_string(),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                let rx = release_rx.lock().take();
                async move {
                    if let Some(rx) = rx {
                        let _ = rx.await;
                    }
                    Ok::<_, Error>(())
                }
            },
            |_, _: Result<()>| {},
        );
        let second = async {
            tokio::task::yield_now().await;
            let report = dispatcher
                .run(
                    vec![vec!["a"]],
                    |e| e.to_string(),
                    |_| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async { Ok::<_, Error>(()) }
                    },
                    |_, _: Result<()>| {},
                )
                .await;
            let _ = release_tx.send(());
            report
        };

        let (_, second_report) = tokio::join!(slow, second);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_report.skipped, 1);
        assert!(!dispatcher.is_active("a"));
    }

    #[test]
    fn guard_clears_marker_on_drop() {
        let dispatcher = dispatcher(1);
        let guard = dispatcher.try_acquire("a").unwrap();
        assert!(dispatcher.try_acquire("a").is_none());
        drop(guard);
        assert!(dispatcher.try_acquire("a").is_some());
    }
}
