//! Liquidation policy: keep an index of open positions and liquidate the ones
//! the market reports as liquidatable.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{BlockTip, Policy};
use crate::application::index::{ApplySummary, BlockTimes, PositionIndex};
use crate::application::prioritizer::{liquidation_groups, PriorityConfig};
use crate::domain::{Account, Event, EventKind, MarketKey, Position, Price};
use crate::error::{KeeperError, Result};
use crate::port::{KeeperMetrics, KeeperTransactions, PerpsMarket, TxReceipt};

const EVENTS: &[EventKind] = &[
    EventKind::PositionModified,
    EventKind::PositionLiquidated,
    EventKind::FundingRecomputed,
];

/// Result of checking one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiquidationOutcome {
    /// The position is healthy; its liquidation price was re-estimated.
    Healthy { liquidation_price: Price },
    /// The position was liquidated by this keeper.
    Liquidated(TxReceipt),
}

pub struct LiquidationPolicy {
    base_asset: String,
    volume_window_secs: u64,
    priority: PriorityConfig,
    confirmations: u64,
    market: Arc<dyn PerpsMarket>,
    transactions: Arc<dyn KeeperTransactions>,
}

impl LiquidationPolicy {
    pub fn new(
        base_asset: impl Into<String>,
        volume_window_secs: u64,
        priority: PriorityConfig,
        confirmations: u64,
        market: Arc<dyn PerpsMarket>,
        transactions: Arc<dyn KeeperTransactions>,
    ) -> Self {
        Self {
            base_asset: base_asset.into(),
            volume_window_secs,
            priority,
            confirmations,
            market,
            transactions,
        }
    }
}

#[async_trait]
impl Policy for LiquidationPolicy {
    type Index = PositionIndex;
    type Entity = Position;
    type Outcome = LiquidationOutcome;

    fn name(&self) -> &'static str {
        "liquidation"
    }

    fn events_of_interest(&self) -> &'static [EventKind] {
        EVENTS
    }

    fn new_index(&self) -> PositionIndex {
        PositionIndex::new(self.base_asset.clone(), self.volume_window_secs)
    }

    fn apply(&self, index: &mut PositionIndex, events: &[Event], _: &BlockTimes) -> ApplySummary {
        index.apply(events)
    }

    fn clear(&self, index: &mut PositionIndex) {
        index.clear();
    }

    async fn observe(&self, index: &mut PositionIndex, tip: BlockTip) -> Result<()> {
        index.set_block_tip(tip.timestamp);
        let price = self.market.asset_price().await?;
        index.set_asset_price(price);
        debug!(
            asset = %index.market().base_asset,
            price = %price,
            block = tip.number,
            "Refreshed asset price"
        );
        Ok(())
    }

    fn report(&self, index: &mut PositionIndex, market: &MarketKey, metrics: &dyn KeeperMetrics) {
        metrics.open_positions(market, index.len());
        metrics.market_size(market, index.market_size());
        metrics.market_skew(market, index.market_skew());
        metrics.recent_volume(market, index.recent_volume());
    }

    async fn plan(&self, index: &PositionIndex) -> Result<Vec<Vec<Position>>> {
        let snapshot: Vec<Position> = index.positions().cloned().collect();
        let [close, unknown, outdated] =
            liquidation_groups(&snapshot, index.market(), &self.priority);

        info!(
            close = close.len(),
            unknown = unknown.len(),
            outdated = outdated.len(),
            tracked = snapshot.len(),
            "Planned liquidation checks"
        );
        Ok(vec![close, unknown, outdated])
    }

    fn entity_id(&self, position: &Position) -> String {
        position.account().to_string()
    }

    async fn act(&self, position: Position) -> Result<LiquidationOutcome> {
        let account = position.account();

        if !self.market.can_liquidate(account).await? {
            let liquidation_price = self.market.liquidation_price(account).await?;
            debug!(
                account = %account,
                liquidation_price = %liquidation_price,
                "Cannot liquidate position"
            );
            return Ok(LiquidationOutcome::Healthy { liquidation_price });
        }

        info!(account = %account, size = %position.size(), "Liquidating position");
        let receipt = self
            .transactions
            .liquidate_position(account, self.confirmations)
            .await?;
        info!(
            account = %account,
            tx_hash = %receipt.tx_hash,
            signer = %receipt.signer,
            "Position liquidated"
        );
        Ok(LiquidationOutcome::Liquidated(receipt))
    }

    fn settle(
        &self,
        index: &mut PositionIndex,
        market: &MarketKey,
        _metrics: &dyn KeeperMetrics,
        entity_id: &str,
        result: Result<LiquidationOutcome>,
    ) {
        let account = Account::new(entity_id);
        match result {
            Ok(LiquidationOutcome::Healthy { liquidation_price }) => {
                let checked_at = index.market().block_tip_timestamp;
                match index.get_mut(&account) {
                    Some(position) => {
                        position.record_liquidation_price(liquidation_price, checked_at)
                    }
                    None => warn!(
                        market = %market,
                        error = %KeeperError::UntrackedEntity {
                            policy: self.name(),
                            account: account.to_string(),
                        },
                        "Dropping liquidation price"
                    ),
                }
            }
            Ok(LiquidationOutcome::Liquidated(_)) => {
                index.remove(&account);
            }
            // Already logged and counted by the dispatcher; retried next cycle.
            Err(_) => {}
        }
    }
}
