//! Keeper policies.
//!
//! A policy bundles everything that differs between keeper kinds: which events
//! it folds, what index it keeps, how it plans a cycle and what action it runs
//! per entity. The [`Engine`](crate::application::Engine) supplies the rest
//! (event fetching, block timestamps, dispatch and metrics).
//!
//! Actions work on a snapshot of the entity and return an outcome. The engine
//! hands every outcome back to [`Policy::settle`], which is the only place a
//! policy mutates its index outside the event fold.

mod liquidation;
mod offchain;

use std::collections::BTreeSet;

use async_trait::async_trait;

use super::index::{ApplySummary, BlockTimes};
use crate::domain::{Event, EventKind, MarketKey};
use crate::error::Result;
use crate::port::KeeperMetrics;

pub use liquidation::{LiquidationOutcome, LiquidationPolicy};
pub use offchain::{DelayedOffchainPolicy, EvictReason, OrderOutcome, ScheduledOrder};

/// The block a live cycle runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockTip {
    pub number: u64,
    pub timestamp: u64,
}

#[async_trait]
pub trait Policy: Send + Sync {
    type Index: Send + Sync;
    type Entity: Send;
    type Outcome: Send;

    /// Short name used in logs, metrics and task keys.
    fn name(&self) -> &'static str;

    /// Event kinds the index folds.
    fn events_of_interest(&self) -> &'static [EventKind];

    /// A fresh, empty index.
    fn new_index(&self) -> Self::Index;

    /// Blocks whose timestamps [`Policy::apply`] needs for `events`.
    fn required_blocks(&self, _events: &[Event]) -> BTreeSet<u64> {
        BTreeSet::new()
    }

    /// Fold `events` into `index`. Must not perform I/O.
    fn apply(&self, index: &mut Self::Index, events: &[Event], block_times: &BlockTimes)
        -> ApplySummary;

    /// Drop all state from `index`.
    fn clear(&self, index: &mut Self::Index);

    /// Refresh per-cycle market context before planning.
    async fn observe(&self, index: &mut Self::Index, tip: BlockTip) -> Result<()>;

    /// Report gauges derived from `index`.
    fn report(&self, index: &mut Self::Index, market: &MarketKey, metrics: &dyn KeeperMetrics);

    /// Ordered groups of entities to act on this cycle.
    async fn plan(&self, index: &Self::Index) -> Result<Vec<Vec<Self::Entity>>>;

    /// Key used for per-entity mutual exclusion.
    fn entity_id(&self, entity: &Self::Entity) -> String;

    /// Run the keeper action for one entity.
    async fn act(&self, entity: Self::Entity) -> Result<Self::Outcome>;

    /// Write the result of [`Policy::act`] back into `index`.
    fn settle(
        &self,
        index: &mut Self::Index,
        market: &MarketKey,
        metrics: &dyn KeeperMetrics,
        entity_id: &str,
        result: Result<Self::Outcome>,
    );
}
