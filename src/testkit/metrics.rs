//! Metrics sink that keeps what it was told.

use std::collections::HashMap;

use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::domain::MarketKey;
use crate::port::KeeperMetrics;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketMetrics {
    pub open_positions: usize,
    pub pending_orders: usize,
    pub liquidations: usize,
    pub market_size: Decimal,
    pub market_skew: Decimal,
    pub recent_volume: Decimal,
    /// Keeper errors by policy.
    pub errors: HashMap<String, usize>,
    /// Evictions by reason.
    pub evictions: HashMap<String, usize>,
}

#[derive(Default)]
pub struct RecordingMetrics {
    markets: Mutex<HashMap<MarketKey, MarketMetrics>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot for one market; empty if nothing was reported.
    pub fn market(&self, market: &MarketKey) -> MarketMetrics {
        self.markets.lock().get(market).cloned().unwrap_or_default()
    }

    fn update(&self, market: &MarketKey, f: impl FnOnce(&mut MarketMetrics)) {
        f(self.markets.lock().entry(market.clone()).or_default());
    }
}

impl KeeperMetrics for RecordingMetrics {
    fn open_positions(&self, market: &MarketKey, count: usize) {
        self.update(market, |m| m.open_positions = count);
    }

    fn pending_orders(&self, market: &MarketKey, count: usize) {
        self.update(market, |m| m.pending_orders = count);
    }

    fn liquidation(&self, market: &MarketKey) {
        self.update(market, |m| m.liquidations += 1);
    }

    fn market_size(&self, market: &MarketKey, notional: Decimal) {
        self.update(market, |m| m.market_size = notional);
    }

    fn market_skew(&self, market: &MarketKey, notional: Decimal) {
        self.update(market, |m| m.market_skew = notional);
    }

    fn recent_volume(&self, market: &MarketKey, notional: Decimal) {
        self.update(market, |m| m.recent_volume = notional);
    }

    fn keeper_error(&self, market: &MarketKey, policy: &str) {
        self.update(market, |m| *m.errors.entry(policy.to_string()).or_default() += 1);
    }

    fn evicted(&self, market: &MarketKey, reason: &str) {
        self.update(market, |m| *m.evictions.entry(reason.to_string()).or_default() += 1);
    }
}
