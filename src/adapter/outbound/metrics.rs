//! Prometheus metrics sink.
//!
//! One registry per process; every series is labelled by market. The registry
//! can be rendered in text exposition format or pushed to a push gateway.

use std::collections::HashMap;

use prometheus::{Encoder, GaugeVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

use crate::domain::MarketKey;
use crate::error::Result;
use crate::port::KeeperMetrics;

const NAMESPACE: &str = "perps_keeper";

#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    open_positions: IntGaugeVec,
    pending_orders: IntGaugeVec,
    liquidations: IntCounterVec,
    market_size: GaugeVec,
    market_skew: GaugeVec,
    recent_volume: GaugeVec,
    keeper_errors: IntCounterVec,
    evictions: IntCounterVec,
}

fn opts(name: &str, help: &str) -> Opts {
    Opts::new(name, help).namespace(NAMESPACE)
}

impl PrometheusMetrics {
    /// # Errors
    ///
    /// Returns an error if a metric cannot be registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let open_positions = IntGaugeVec::new(
            opts("open_positions", "Open positions tracked by the liquidation index"),
            &["market"],
        )?;
        let pending_orders = IntGaugeVec::new(
            opts("pending_offchain_orders", "Pending off-chain delayed orders"),
            &["market"],
        )?;
        let liquidations = IntCounterVec::new(
            opts("liquidations_total", "Liquidations observed in the event log"),
            &["market"],
        )?;
        let market_size = GaugeVec::new(
            opts("market_size_usd", "Open interest notional at the asset price"),
            &["market"],
        )?;
        let market_skew = GaugeVec::new(
            opts("market_skew_usd", "Long minus short notional at the asset price"),
            &["market"],
        )?;
        let recent_volume = GaugeVec::new(
            opts("recent_volume_usd", "Traded notional inside the volume window"),
            &["market"],
        )?;
        let keeper_errors = IntCounterVec::new(
            opts("keeper_errors_total", "Failed keeper actions"),
            &["market", "policy"],
        )?;
        let evictions = IntCounterVec::new(
            opts("evictions_total", "Entities dropped without a successful action"),
            &["market", "reason"],
        )?;

        registry.register(Box::new(open_positions.clone()))?;
        registry.register(Box::new(pending_orders.clone()))?;
        registry.register(Box::new(liquidations.clone()))?;
        registry.register(Box::new(market_size.clone()))?;
        registry.register(Box::new(market_skew.clone()))?;
        registry.register(Box::new(recent_volume.clone()))?;
        registry.register(Box::new(keeper_errors.clone()))?;
        registry.register(Box::new(evictions.clone()))?;

        Ok(Self {
            registry,
            open_positions,
            pending_orders,
            liquidations,
            market_size,
            market_skew,
            recent_volume,
            keeper_errors,
            evictions,
        })
    }

    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render every series in Prometheus text format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Push the current registry to a Prometheus push gateway.
    ///
    /// Blocks on HTTP; call from a blocking task.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway rejects the push.
    pub fn push(&self, gateway: &str, job: &str) -> Result<()> {
        prometheus::push_metrics(job, HashMap::new(), gateway, self.registry.gather(), None)?;
        debug!(gateway, job, "Pushed metrics");
        Ok(())
    }
}

fn gauge_value(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

fn count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl KeeperMetrics for PrometheusMetrics {
    fn open_positions(&self, market: &MarketKey, value: usize) {
        self.open_positions
            .with_label_values(&[market.as_str()])
            .set(count(value));
    }

    fn pending_orders(&self, market: &MarketKey, value: usize) {
        self.pending_orders
            .with_label_values(&[market.as_str()])
            .set(count(value));
    }

    fn liquidation(&self, market: &MarketKey) {
        self.liquidations.with_label_values(&[market.as_str()]).inc();
    }

    fn market_size(&self, market: &MarketKey, notional: Decimal) {
        self.market_size
            .with_label_values(&[market.as_str()])
            .set(gauge_value(notional));
    }

    fn market_skew(&self, market: &MarketKey, notional: Decimal) {
        self.market_skew
            .with_label_values(&[market.as_str()])
            .set(gauge_value(notional));
    }

    fn recent_volume(&self, market: &MarketKey, notional: Decimal) {
        self.recent_volume
            .with_label_values(&[market.as_str()])
            .set(gauge_value(notional));
    }

    fn keeper_error(&self, market: &MarketKey, policy: &str) {
        self.keeper_errors
            .with_label_values(&[market.as_str(), policy])
            .inc();
    }

    fn evicted(&self, market: &MarketKey, reason: &str) {
        self.evictions
            .with_label_values(&[market.as_str(), reason])
            .inc();
    }
}
