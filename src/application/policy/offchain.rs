//! Delayed off-chain order policy: execute pending orders with a fresh signed
//! price update once they are old enough.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{BlockTip, Policy};
use crate::application::index::{ApplySummary, BlockTimes, OrderIndex};
use crate::domain::{Account, DelayedOrder, Event, EventKind, MarketKey};
use crate::error::{KeeperError, Result};
use crate::port::{KeeperMetrics, KeeperTransactions, PerpsMarket, PriceOracle, TxReceipt};

const EVENTS: &[EventKind] = &[
    EventKind::DelayedOrderSubmitted,
    EventKind::DelayedOrderRemoved,
];

/// An eligible order, checked against the age bounds of this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledOrder {
    pub order: DelayedOrder,
    /// Past the maximum age; execution would revert.
    pub stale: bool,
}

/// Why an order was dropped from the index without executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictReason {
    ExceededAttempts,
    Stale,
}

impl EvictReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExceededAttempts => "exceeded_attempts",
            Self::Stale => "stale",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderOutcome {
    Executed(TxReceipt),
    Evicted(EvictReason),
}

pub struct DelayedOffchainPolicy {
    price_feed_id: String,
    max_exec_attempts: u32,
    confirmations: u64,
    market: Arc<dyn PerpsMarket>,
    transactions: Arc<dyn KeeperTransactions>,
    oracle: Arc<dyn PriceOracle>,
}

impl DelayedOffchainPolicy {
    pub fn new(
        price_feed_id: impl Into<String>,
        max_exec_attempts: u32,
        confirmations: u64,
        market: Arc<dyn PerpsMarket>,
        transactions: Arc<dyn KeeperTransactions>,
        oracle: Arc<dyn PriceOracle>,
    ) -> Self {
        Self {
            price_feed_id: price_feed_id.into(),
            max_exec_attempts,
            confirmations,
            market,
            transactions,
            oracle,
        }
    }
}

#[async_trait]
impl Policy for DelayedOffchainPolicy {
    type Index = OrderIndex;
    type Entity = ScheduledOrder;
    type Outcome = OrderOutcome;

    fn name(&self) -> &'static str {
        "delayed_offchain"
    }

    fn events_of_interest(&self) -> &'static [EventKind] {
        EVENTS
    }

    fn new_index(&self) -> OrderIndex {
        OrderIndex::new()
    }

    fn required_blocks(&self, events: &[Event]) -> BTreeSet<u64> {
        OrderIndex::required_blocks(events)
    }

    fn apply(
        &self,
        index: &mut OrderIndex,
        events: &[Event],
        block_times: &BlockTimes,
    ) -> ApplySummary {
        index.apply(events, block_times)
    }

    fn clear(&self, index: &mut OrderIndex) {
        index.clear();
    }

    async fn observe(&self, index: &mut OrderIndex, tip: BlockTip) -> Result<()> {
        index.set_block_tip(tip.timestamp);
        Ok(())
    }

    fn report(&self, index: &mut OrderIndex, market: &MarketKey, metrics: &dyn KeeperMetrics) {
        metrics.pending_orders(market, index.len());
    }

    async fn plan(&self, index: &OrderIndex) -> Result<Vec<Vec<ScheduledOrder>>> {
        if index.is_empty() {
            debug!("No off-chain orders pending");
            return Ok(Vec::new());
        }

        // Bounds are market settings and can change at any block.
        let bounds = self.market.offchain_order_age_bounds().await?;
        let now = index.block_tip();

        let mut executable: Vec<ScheduledOrder> = index
            .orders()
            .filter(|o| o.is_eligible(now, bounds.min_age))
            .map(|o| ScheduledOrder {
                stale: o.is_stale(now, bounds.max_age),
                order: o.clone(),
            })
            .collect();
        executable.sort_by(|a, b| {
            a.order
                .intention_time
                .cmp(&b.order.intention_time)
                .then_with(|| a.order.account.cmp(&b.order.account))
        });

        info!(
            executable = executable.len(),
            pending = index.len(),
            min_age = bounds.min_age,
            max_age = bounds.max_age,
            "Planned off-chain order execution"
        );
        Ok(vec![executable])
    }

    fn entity_id(&self, scheduled: &ScheduledOrder) -> String {
        scheduled.order.account.to_string()
    }

    async fn act(&self, scheduled: ScheduledOrder) -> Result<OrderOutcome> {
        let order = scheduled.order;
        let account = &order.account;

        if order.exceeded_attempts(self.max_exec_attempts) {
            info!(
                account = %account,
                failures = order.execution_failures,
                "Order exceeded max execution attempts, dropping"
            );
            return Ok(OrderOutcome::Evicted(EvictReason::ExceededAttempts));
        }
        if scheduled.stale {
            info!(
                account = %account,
                intention_time = order.intention_time,
                "Order is stale and can only be cancelled, dropping"
            );
            return Ok(OrderOutcome::Evicted(EvictReason::Stale));
        }

        debug!(account = %account, feed_id = %self.price_feed_id, "Fetching price update");
        let payload = self.oracle.price_update_payload(&self.price_feed_id).await?;
        let fee = self.market.price_update_fee(&payload).await?;

        info!(
            account = %account,
            target_round_id = order.target_round_id,
            fee,
            "Executing off-chain order"
        );
        let receipt = self
            .transactions
            .execute_offchain_order(account, payload, fee, self.confirmations)
            .await?;
        info!(account = %account, tx_hash = %receipt.tx_hash, "Off-chain order executed");
        Ok(OrderOutcome::Executed(receipt))
    }

    fn settle(
        &self,
        index: &mut OrderIndex,
        market: &MarketKey,
        metrics: &dyn KeeperMetrics,
        entity_id: &str,
        result: Result<OrderOutcome>,
    ) {
        let account = Account::new(entity_id);
        match result {
            Ok(OrderOutcome::Executed(_)) => {
                index.remove(&account);
            }
            Ok(OrderOutcome::Evicted(reason)) => {
                index.remove(&account);
                metrics.evicted(market, reason.as_str());
            }
            Err(_) => match index.get_mut(&account) {
                Some(order) => order.execution_failures += 1,
                None => warn!(
                    market = %market,
                    error = %KeeperError::UntrackedEntity {
                        policy: self.name(),
                        account: account.to_string(),
                    },
                    "Dropping execution failure"
                ),
            },
        }
    }
}
