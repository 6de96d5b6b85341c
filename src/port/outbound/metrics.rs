//! Metrics sink port.
//!
//! All calls are synchronous and fire-and-forget: a sink must never fail the
//! caller and must be safe to share between engines of different markets.

use rust_decimal::Decimal;

use crate::domain::MarketKey;

/// Counters and gauges reported by keeper engines, labelled by market.
pub trait KeeperMetrics: Send + Sync {
    /// Number of open positions in the index.
    fn open_positions(&self, market: &MarketKey, count: usize);

    /// Number of pending off-chain orders in the index.
    fn pending_orders(&self, market: &MarketKey, count: usize);

    /// A position was liquidated (observed through the event log).
    fn liquidation(&self, market: &MarketKey);

    /// Total open interest notional.
    fn market_size(&self, market: &MarketKey, notional: Decimal);

    /// Net long minus short notional.
    fn market_skew(&self, market: &MarketKey, notional: Decimal);

    /// Traded notional inside the recent volume window.
    fn recent_volume(&self, market: &MarketKey, notional: Decimal);

    /// A keeper action failed.
    fn keeper_error(&self, market: &MarketKey, policy: &str);

    /// An entity was dropped without a successful action.
    fn evicted(&self, market: &MarketKey, reason: &str);
}

/// Metrics sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl KeeperMetrics for NoopMetrics {
    fn open_positions(&self, _market: &MarketKey, _count: usize) {}
    fn pending_orders(&self, _market: &MarketKey, _count: usize) {}
    fn liquidation(&self, _market: &MarketKey) {}
    fn market_size(&self, _market: &MarketKey, _notional: Decimal) {}
    fn market_skew(&self, _market: &MarketKey, _notional: Decimal) {}
    fn recent_volume(&self, _market: &MarketKey, _notional: Decimal) {}
    fn keeper_error(&self, _market: &MarketKey, _policy: &str) {}
    fn evicted(&self, _market: &MarketKey, _reason: &str) {}
}
