//! Open position index for the liquidation keeper.

use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::ApplySummary;
use crate::domain::{
    from_wei, Account, Event, EventArgs, MarketContext, Position, Price, VolumeTracker,
};
use crate::error::KeeperError;

/// Open positions keyed by account, plus the market context they are read with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionIndex {
    positions: HashMap<Account, Position>,
    market: MarketContext,
    volume: VolumeTracker,
}

impl PositionIndex {
    #[must_use]
    pub fn new(base_asset: impl Into<String>, volume_window_secs: u64) -> Self {
        Self {
            positions: HashMap::new(),
            market: MarketContext::new(base_asset),
            volume: VolumeTracker::new(volume_window_secs),
        }
    }

    /// Fold `events` into the index, in the order given.
    pub fn apply(&mut self, events: &[Event]) -> ApplySummary {
        let mut summary = ApplySummary::default();

        for event in events {
            match &event.args {
                EventArgs::FundingRecomputed { timestamp } => {
                    // Cheaper than fetching every block during a rebuild.
                    self.market.block_tip_timestamp = *timestamp;
                    summary.applied += 1;
                }
                EventArgs::PositionModified {
                    id,
                    account,
                    margin,
                    size,
                    trade_size,
                    last_price,
                } => match self.modify(*id, account, *margin, *size, *trade_size, *last_price) {
                    Ok(()) => summary.applied += 1,
                    Err(e) => {
                        warn!(
                            account = %account,
                            block = event.block_number,
                            error = %e,
                            "Skipping unrepresentable position update"
                        );
                        summary.ignored += 1;
                    }
                },
                EventArgs::PositionLiquidated { account, .. } => {
                    self.positions.remove(account);
                    summary.applied += 1;
                    summary.liquidations += 1;
                }
                _ => {
                    debug!(
                        event = %event.kind(),
                        block = event.block_number,
                        "No position handler for event"
                    );
                    summary.ignored += 1;
                }
            }
        }

        summary
    }

    fn modify(
        &mut self,
        id: u64,
        account: &Account,
        margin: i128,
        size: i128,
        trade_size: i128,
        last_price: i128,
    ) -> Result<(), KeeperError> {
        if margin == 0 || size == 0 {
            self.positions.remove(account);
        } else {
            let size = from_wei(size)?;
            let margin = from_wei(margin)?;
            let price = from_wei(last_price)?;
            let leverage = (size.abs() * price)
                .checked_div(margin)
                .ok_or_else(|| KeeperError::Overflow {
                    value: format!("{size} * {price} / {margin}"),
                })?;

            self.positions
                .entry(account.clone())
                .and_modify(|p| p.update(id, size, leverage))
                .or_insert_with(|| Position::new(id, account.clone(), size, leverage));
        }

        if trade_size != 0 {
            let trade_size = from_wei(trade_size)?;
            let price = from_wei(last_price)?;
            self.volume
                .push(trade_size, price, self.market.block_tip_timestamp);
        }

        Ok(())
    }

    /// Drop all positions and market state, keeping configuration.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.volume.clear();
        self.market.asset_price = Decimal::ZERO;
        self.market.block_tip_timestamp = 0;
    }

    pub fn set_block_tip(&mut self, timestamp: u64) {
        self.market.block_tip_timestamp = timestamp;
    }

    pub fn set_asset_price(&mut self, price: Price) {
        self.market.asset_price = price;
    }

    #[must_use]
    pub const fn market(&self) -> &MarketContext {
        &self.market
    }

    #[must_use]
    pub fn get(&self, account: &Account) -> Option<&Position> {
        self.positions.get(account)
    }

    pub fn get_mut(&mut self, account: &Account) -> Option<&mut Position> {
        self.positions.get_mut(account)
    }

    pub fn remove(&mut self, account: &Account) -> Option<Position> {
        self.positions.remove(account)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Open interest notional at the reference price.
    #[must_use]
    pub fn market_size(&self) -> Decimal {
        self.positions()
            .map(|p| p.notional(self.market.asset_price).abs())
            .sum()
    }

    /// Long minus short notional at the reference price.
    #[must_use]
    pub fn market_skew(&self) -> Decimal {
        self.positions()
            .map(|p| p.notional(self.market.asset_price))
            .sum()
    }

    /// Recent traded notional, pruned to the window ending at the block tip.
    pub fn recent_volume(&mut self) -> Decimal {
        self.volume.prune(self.market.block_tip_timestamp);
        self.volume.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EventKind;
    use rust_decimal_macros::dec;

    const UNIT: i128 = 1_000_000_000_000_000_000;

    fn modified(account: &str, size: i128, margin: i128, price: i128) -> Event {
        Event::new(
            1,
            0,
            EventArgs::PositionModified {
                id: 1,
                account: Account::from(account),
                margin,
                size,
                trade_size: size,
                last_price: price,
            },
        )
    }

    fn liquidated(account: &str) -> Event {
        Event::new(
            2,
            0,
            EventArgs::PositionLiquidated {
                id: 1,
                account: Account::from(account),
                liquidator: Account::from("0xkeeper"),
                size: UNIT,
                price: UNIT,
            },
        )
    }

    #[test]
    fn modified_event_computes_size_and_leverage() {
        let mut index = PositionIndex::new("sBTC", 86_400);
        let summary = index.apply(&[modified("0xa", UNIT, 20_000 * UNIT, 40_000 * UNIT)]);

        let position = index.get(&Account::from("0xa")).unwrap();
        assert_eq!(summary.applied, 1);
        assert_eq!(position.size(), dec!(1));
        assert_eq!(position.leverage(), dec!(2));
        assert_eq!(position.liquidation_price(), None);
    }

    #[test]
    fn zero_margin_closes_position() {
        let mut index = PositionIndex::new("sBTC", 86_400);
        index.apply(&[modified("0xa", UNIT, 10 * UNIT, 100 * UNIT)]);
        index.apply(&[modified("0xa", UNIT, 0, 100 * UNIT)]);

        assert!(index.get(&Account::from("0xa")).is_none());
    }

    #[test]
    fn zero_margin_on_unknown_account_is_a_no_op() {
        let mut index = PositionIndex::new("sBTC", 86_400);
        index.apply(&[modified("0xa", 0, 0, 100 * UNIT)]);

        assert!(index.is_empty());
    }

    #[test]
    fn update_keeps_cached_liquidation_price() {
        let mut index = PositionIndex::new("sBTC", 86_400);
        let account = Account::from("0xa");
        index.apply(&[modified("0xa", UNIT, 10 * UNIT, 100 * UNIT)]);
        index
            .get_mut(&account)
            .unwrap()
            .record_liquidation_price(dec!(91), 7);

        index.apply(&[modified("0xa", 2 * UNIT, 10 * UNIT, 100 * UNIT)]);

        let position = index.get(&account).unwrap();
        assert_eq!(position.size(), dec!(2));
        assert_eq!(position.liquidation_price(), Some(dec!(91)));
    }

    #[test]
    fn liquidation_removes_and_counts() {
        let mut index = PositionIndex::new("sBTC", 86_400);
        index.apply(&[modified("0xa", UNIT, 10 * UNIT, 100 * UNIT)]);

        let summary = index.apply(&[liquidated("0xa")]);

        assert!(index.is_empty());
        assert_eq!(summary.liquidations, 1);
    }

    #[test]
    fn funding_recomputed_moves_block_tip() {
        let mut index = PositionIndex::new("sBTC", 86_400);
        index.apply(&[Event::new(
            3,
            0,
            EventArgs::FundingRecomputed { timestamp: 100_000 },
        )]);
        assert_eq!(index.market().block_tip_timestamp, 100_000);
    }

    #[test]
    fn order_events_are_ignored() {
        let mut index = PositionIndex::new("sBTC", 86_400);
        let event = Event::new(
            3,
            0,
            EventArgs::DelayedOrderRemoved {
                account: Account::from("0xa"),
            },
        );
        assert_eq!(event.kind(), EventKind::DelayedOrderRemoved);

        let summary = index.apply(&[event]);

        assert_eq!(summary.ignored, 1);
        assert!(index.is_empty());
    }

    #[test]
    fn replay_is_deterministic() {
        let events = vec![
            modified("0xa", UNIT, 10 * UNIT, 100 * UNIT),
            modified("0xb", -3 * UNIT, 50 * UNIT, 100 * UNIT),
            Event::new(4, 0, EventArgs::FundingRecomputed { timestamp: 55 }),
            modified("0xa", 2 * UNIT, 10 * UNIT, 101 * UNIT),
            liquidated("0xb"),
            modified("0xc", UNIT, 0, 100 * UNIT),
        ];

        let mut first = PositionIndex::new("sBTC", 86_400);
        let mut second = PositionIndex::new("sBTC", 86_400);
        first.apply(&events);
        second.apply(&events);

        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn size_skew_and_volume_follow_reference_price() {
        let mut index = PositionIndex::new("sBTC", 86_400);
        index.apply(&[
            modified("0xa", 10 * UNIT, 100_000 * UNIT, 40_000 * UNIT),
            modified("0xb", 10 * UNIT, 100_000 * UNIT, 40_000 * UNIT),
            modified("0xc", -UNIT, 100_000 * UNIT, 40_000 * UNIT),
        ]);
        index.set_asset_price(dec!(40000));

        assert_eq!(index.market_size(), dec!(840000));
        assert_eq!(index.market_skew(), dec!(760000));
        assert_eq!(index.recent_volume(), dec!(840000));
    }

    #[test]
    fn clear_resets_market_state() {
        let mut index = PositionIndex::new("sBTC", 86_400);
        index.apply(&[modified("0xa", UNIT, 10 * UNIT, 100 * UNIT)]);
        index.set_asset_price(dec!(100));
        index.set_block_tip(9);

        index.clear();

        assert_eq!(index, PositionIndex::new("sBTC", 86_400));
    }
}
