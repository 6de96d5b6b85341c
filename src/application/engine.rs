//! Per-market, per-policy keeper engine.
//!
//! The engine owns one index and drives it through two phases:
//!
//! - [`Engine::rebuild`] folds the whole event history from a start block up
//!   to the current head.
//! - [`Engine::process_block`] runs one live cycle: fold the new events,
//!   refresh market context, report metrics, plan and dispatch actions.
//!
//! Cycles for one engine never overlap; the driver awaits each one before
//! starting the next. Events are always fetched from the first block not yet
//! folded, in windows of at most `max_block_range` blocks, so a cycle whose
//! fetch failed is caught up by the next one.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use super::dispatcher::{DispatchConfig, DispatchReport, Dispatcher};
use super::index::{ApplySummary, BlockTimes};
use super::policy::{BlockTip, Policy};
use crate::domain::{Event, MarketKey};
use crate::error::{ConfigError, Error, Result};
use crate::port::{BlockSource, EventSource, KeeperMetrics};

/// Concurrent block timestamp lookups while folding.
const TIMESTAMP_CONCURRENCY: usize = 8;

/// Engine tuning shared by all policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub dispatch: DispatchConfig,
    /// Largest block span fetched in one event query.
    pub max_block_range: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchConfig::default(),
            max_block_range: 10_000,
        }
    }
}

/// What one live cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub block: u64,
    pub events: usize,
    pub fold: ApplySummary,
    pub dispatch: DispatchReport,
    /// Catch-up stopped short of `block`; the index is behind the chain.
    pub index_lagging: bool,
}

/// Object-safe view of an engine, used by the block driver.
#[async_trait]
pub trait Keeper: Send {
    fn market(&self) -> &MarketKey;

    fn policy(&self) -> &'static str;

    /// Rebuild the index from `from_block` to the chain head. Returns the head.
    async fn rebuild(&mut self, from_block: u64) -> Result<u64>;

    /// Run one live cycle for `block`.
    async fn process_block(&mut self, block: u64) -> Result<CycleReport>;
}

pub struct Engine<P: Policy> {
    market: MarketKey,
    policy: P,
    index: P::Index,
    dispatcher: Dispatcher,
    events: Arc<dyn EventSource>,
    blocks: Arc<dyn BlockSource>,
    metrics: Arc<dyn KeeperMetrics>,
    max_block_range: u64,
    /// First block not yet folded into the index.
    next_block: u64,
}

impl<P: Policy> Engine<P> {
    pub fn new(
        market: MarketKey,
        policy: P,
        config: EngineConfig,
        events: Arc<dyn EventSource>,
        blocks: Arc<dyn BlockSource>,
        metrics: Arc<dyn KeeperMetrics>,
    ) -> Result<Self> {
        if config.max_block_range == 0 {
            return Err(ConfigError::InvalidValue {
                field: "keeper.max_block_range",
                reason: "must be greater than 0".into(),
            }
            .into());
        }

        let index = policy.new_index();
        let dispatcher = Dispatcher::new(
            market.clone(),
            policy.name(),
            config.dispatch,
            Arc::clone(&metrics),
        );

        Ok(Self {
            market,
            policy,
            index,
            dispatcher,
            events,
            blocks,
            metrics,
            max_block_range: config.max_block_range,
            next_block: 0,
        })
    }

    #[must_use]
    pub const fn index(&self) -> &P::Index {
        &self.index
    }

    pub fn index_mut(&mut self) -> &mut P::Index {
        &mut self.index
    }

    #[must_use]
    pub const fn policy(&self) -> &P {
        &self.policy
    }

    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// First block the next live cycle will fetch events from.
    #[must_use]
    pub const fn next_block(&self) -> u64 {
        self.next_block
    }

    /// Replace the index with a fold over `from_block..=head`.
    pub async fn rebuild(&mut self, from_block: u64) -> Result<u64> {
        self.policy.clear(&mut self.index);
        self.dispatcher.reset();

        let head = self.blocks.head().await?;
        info!(
            market = %self.market,
            policy = self.policy.name(),
            from_block,
            head,
            "Rebuilding index"
        );

        self.next_block = from_block;
        let (_, total) = self.catch_up(head).await?;
        self.policy
            .report(&mut self.index, &self.market, self.metrics.as_ref());

        info!(
            market = %self.market,
            policy = self.policy.name(),
            applied = total.applied,
            ignored = total.ignored,
            "Index rebuilt"
        );
        Ok(head)
    }

    /// Run one live cycle for `block`.
    pub async fn process_block(&mut self, block: u64) -> Result<CycleReport> {
        let mut report = CycleReport {
            block,
            ..CycleReport::default()
        };

        // A failed catch-up is retried next cycle from `next_block`; this
        // cycle still acts on the index as it stands.
        if block >= self.next_block {
            match self.catch_up(block).await {
                Ok((events, fold)) => {
                    report.events = events;
                    report.fold = fold;
                }
                Err(e) => {
                    warn!(
                        block,
                        next_block = self.next_block,
                        error = %e,
                        "Failed to catch up on events"
                    );
                    report.index_lagging = true;
                }
            }
        } else {
            debug!(block, next_block = self.next_block, "Block already indexed");
        }

        // A failed refresh leaves the previous context in place.
        match self.blocks.block_timestamp(block).await {
            Ok(timestamp) => {
                let tip = BlockTip {
                    number: block,
                    timestamp,
                };
                if let Err(e) = self.policy.observe(&mut self.index, tip).await {
                    warn!(block, error = %e, "Failed to refresh market context");
                }
            }
            Err(e) => warn!(block, error = %e, "Failed to fetch block timestamp"),
        }

        self.policy
            .report(&mut self.index, &self.market, self.metrics.as_ref());

        let groups = self.policy.plan(&self.index).await?;
        report.dispatch = self.dispatch(groups).await;

        if report.events > 0 || report.dispatch.batches > 0 {
            info!(
                events = report.events,
                applied = report.fold.applied,
                completed = report.dispatch.completed,
                failed = report.dispatch.failed,
                "Cycle complete"
            );
        }
        Ok(report)
    }

    /// Fold every event from `next_block` through `to`, window by window.
    ///
    /// `next_block` advances after each folded window, so an error keeps the
    /// progress made so far.
    async fn catch_up(&mut self, to: u64) -> Result<(usize, ApplySummary)> {
        let mut events_seen = 0;
        let mut total = ApplySummary::default();

        while self.next_block <= to {
            let start = self.next_block;
            let end = to.min(start.saturating_add(self.max_block_range - 1));
            let events = self
                .events
                .query_events(self.policy.events_of_interest(), start, end)
                .await?;
            debug!(start, end, events = events.len(), "Fetched event window");

            let summary = self.fold(&events).await?;
            for _ in 0..summary.liquidations {
                self.metrics.liquidation(&self.market);
            }
            events_seen += events.len();
            total.applied += summary.applied;
            total.ignored += summary.ignored;
            total.liquidations += summary.liquidations;
            self.next_block = end + 1;
        }

        Ok((events_seen, total))
    }

    /// Resolve the block timestamps `events` need, then fold them.
    async fn fold(&mut self, events: &[Event]) -> Result<ApplySummary> {
        let needed = self.policy.required_blocks(events);
        let blocks = &self.blocks;
        let block_times: BlockTimes = stream::iter(needed)
            .map(|number| async move {
                let timestamp = blocks.block_timestamp(number).await?;
                Ok::<_, Error>((number, timestamp))
            })
            .buffer_unordered(TIMESTAMP_CONCURRENCY)
            .try_collect()
            .await?;

        Ok(self.policy.apply(&mut self.index, events, &block_times))
    }

    async fn dispatch(&mut self, groups: Vec<Vec<P::Entity>>) -> DispatchReport {
        let Self {
            market,
            policy,
            index,
            dispatcher,
            metrics,
            ..
        } = self;
        let policy = &*policy;

        dispatcher
            .run(
                groups,
                |entity| policy.entity_id(entity),
                |entity| policy.act(entity),
                |id, result| policy.settle(index, market, metrics.as_ref(), id, result),
            )
            .await
    }
}

#[async_trait]
impl<P> Keeper for Engine<P>
where
    P: Policy + 'static,
{
    fn market(&self) -> &MarketKey {
        &self.market
    }

    fn policy(&self) -> &'static str {
        self.policy.name()
    }

    async fn rebuild(&mut self, from_block: u64) -> Result<u64> {
        Engine::rebuild(self, from_block).await
    }

    async fn process_block(&mut self, block: u64) -> Result<CycleReport> {
        Engine::process_block(self, block).await
    }
}
