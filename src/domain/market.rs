//! Per-market scalar context shared by the index and the prioritizer.

use rust_decimal::Decimal;

use super::money::Price;

/// Scalar market state, mutated in place as events and blocks arrive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketContext {
    /// Base asset symbol, e.g. `sETH`.
    pub base_asset: String,
    /// Latest reference price of the base asset. Zero until first observed.
    pub asset_price: Price,
    /// Timestamp of the most recent block seen.
    pub block_tip_timestamp: u64,
}

impl MarketContext {
    pub fn new(base_asset: impl Into<String>) -> Self {
        Self {
            base_asset: base_asset.into(),
            ..Self::default()
        }
    }

    /// Relative distance of `price` from the reference price.
    ///
    /// Returns `None` while the reference price is unknown.
    #[must_use]
    pub fn relative_distance(&self, price: Price) -> Option<Decimal> {
        if self.asset_price.is_zero() {
            return None;
        }
        Some((price - self.asset_price).abs() / self.asset_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn relative_distance_needs_a_price() {
        let mut ctx = MarketContext::new("sETH");
        assert_eq!(ctx.relative_distance(dec!(100)), None);

        ctx.asset_price = dec!(100);
        assert_eq!(ctx.relative_distance(dec!(103)), Some(dec!(0.03)));
        assert_eq!(ctx.relative_distance(dec!(95)), Some(dec!(0.05)));
    }
}
