//! Liquidation check prioritization.
//!
//! Splits a snapshot of open positions into ordered groups. Groups are
//! processed to completion one after another, so the order here decides which
//! accounts are checked first when the backlog is long.

use std::cmp::Ordering;

use rust_decimal::Decimal;

use crate::domain::{MarketContext, Position};

/// Tuning for [`liquidation_groups`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityConfig {
    /// Relative distance from the reference price under which a cached
    /// liquidation price counts as close (0.05 = 5%).
    pub proximity_threshold: Decimal,
    /// Maximum number of far, outdated positions refreshed per cycle.
    pub max_far_updates: usize,
    /// Age after which a far liquidation price is refreshed.
    pub stale_after_secs: u64,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            proximity_threshold: Decimal::new(5, 2),
            max_far_updates: 1,
            stale_after_secs: 6 * 60 * 60,
        }
    }
}

/// Group positions by check priority.
///
/// Returns exactly three groups:
/// 1. known liquidation price within the threshold, closest first, ties by
///    higher leverage;
/// 2. unknown liquidation price, highest leverage first;
/// 3. at most `max_far_updates` far positions whose estimate is older than
///    `stale_after_secs`, oldest first.
///
/// Far positions with a recent estimate are left out entirely. While the
/// reference price is unknown every cached price counts as far.
#[must_use]
pub fn liquidation_groups(
    positions: &[Position],
    market: &MarketContext,
    config: &PriorityConfig,
) -> [Vec<Position>; 3] {
    let mut close = Vec::new();
    let mut unknown = Vec::new();
    let mut far = Vec::new();

    for position in positions {
        match position.liquidation_price() {
            None => unknown.push(position.clone()),
            Some(price) => match market.relative_distance(price) {
                Some(distance) if distance <= config.proximity_threshold => {
                    close.push(position.clone());
                }
                _ => far.push(position.clone()),
            },
        }
    }

    close.sort_by(|a, b| {
        distance_to(a, market)
            .cmp(&distance_to(b, market))
            .then_with(|| b.leverage().cmp(&a.leverage()))
            .then_with(|| a.account().cmp(b.account()))
    });

    unknown.sort_by(|a, b| by_leverage_desc(a, b).then_with(|| a.account().cmp(b.account())));

    let cutoff = market
        .block_tip_timestamp
        .saturating_sub(config.stale_after_secs);
    let mut outdated: Vec<Position> = far
        .into_iter()
        .filter(|p| p.liquidation_price_updated_at() < cutoff)
        .collect();
    outdated.sort_by(|a, b| {
        a.liquidation_price_updated_at()
            .cmp(&b.liquidation_price_updated_at())
            .then_with(|| a.account().cmp(b.account()))
    });
    outdated.truncate(config.max_far_updates);

    [close, unknown, outdated]
}

fn distance_to(position: &Position, market: &MarketContext) -> Decimal {
    position
        .liquidation_price()
        .map_or(Decimal::MAX, |price| (price - market.asset_price).abs())
}

fn by_leverage_desc(a: &Position, b: &Position) -> Ordering {
    b.leverage().cmp(&a.leverage())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Account;
    use rust_decimal_macros::dec;

    fn position(account: &str, leverage: Decimal) -> Position {
        Position::new(1, Account::from(account), dec!(1), leverage)
    }

    fn market(price: Decimal, tip: u64) -> MarketContext {
        MarketContext {
            base_asset: "sETH".into(),
            asset_price: price,
            block_tip_timestamp: tip,
        }
    }

    fn groups_at(positions: &[Position], price: Decimal, tip: u64) -> [Vec<Position>; 3] {
        liquidation_groups(positions, &market(price, tip), &PriorityConfig::default())
    }

    fn accounts(group: &[Position]) -> Vec<&str> {
        group.iter().map(|p| p.account().as_str()).collect()
    }

    #[test]
    fn close_then_unknown() {
        let positions = vec![
            position("0xa", dec!(5)).with_liquidation_price(dec!(100), 0),
            position("0xb", dec!(10)).with_liquidation_price(dec!(103), 0),
            position("0xc", dec!(20)),
        ];

        let groups = groups_at(&positions, dec!(100), 0);

        assert_eq!(groups.len(), 3);
        assert_eq!(accounts(&groups[0]), vec!["0xa", "0xb"]);
        assert_eq!(accounts(&groups[1]), vec!["0xc"]);
        assert!(groups[2].is_empty());
    }

    #[test]
    fn equal_distance_prefers_higher_leverage() {
        let positions = vec![
            position("0xa", dec!(2)).with_liquidation_price(dec!(98), 0),
            position("0xb", dec!(8)).with_liquidation_price(dec!(102), 0),
        ];

        let groups = groups_at(&positions, dec!(100), 0);

        assert_eq!(accounts(&groups[0]), vec!["0xb", "0xa"]);
    }

    #[test]
    fn threshold_boundary_counts_as_close() {
        let positions = vec![
            position("0xa", dec!(1)).with_liquidation_price(dec!(95), 0),
            position("0xb", dec!(1)).with_liquidation_price(dec!(94.9), 0),
        ];

        let groups = groups_at(&positions, dec!(100), 0);

        assert_eq!(accounts(&groups[0]), vec!["0xa"]);
    }

    #[test]
    fn unknown_sorted_by_leverage_desc() {
        let positions = vec![
            position("0xa", dec!(1)),
            position("0xb", dec!(3)),
            position("0xc", dec!(2)),
        ];

        let groups = groups_at(&positions, dec!(100), 0);

        assert_eq!(accounts(&groups[1]), vec!["0xb", "0xc", "0xa"]);
    }

    #[test]
    fn far_updates_are_capped_and_oldest_first() {
        let tip = 100_000;
        let positions = vec![
            position("0xa", dec!(1)).with_liquidation_price(dec!(50), 500),
            position("0xb", dec!(1)).with_liquidation_price(dec!(200), 100),
            position("0xc", dec!(1)).with_liquidation_price(dec!(10), 90_000),
        ];
        let config = PriorityConfig {
            max_far_updates: 2,
            ..PriorityConfig::default()
        };

        let groups = liquidation_groups(&positions, &market(dec!(100), tip), &config);

        assert!(groups[0].is_empty());
        assert!(groups[1].is_empty());
        // 0xc was refreshed less than 6h before the tip.
        assert_eq!(accounts(&groups[2]), vec!["0xb", "0xa"]);
    }

    #[test]
    fn default_cap_refreshes_one_far_position() {
        let positions = vec![
            position("0xa", dec!(1)).with_liquidation_price(dec!(50), 1),
            position("0xb", dec!(1)).with_liquidation_price(dec!(200), 2),
        ];

        let groups = groups_at(&positions, dec!(100), 100_000);

        assert_eq!(accounts(&groups[2]), vec!["0xa"]);
    }

    #[test]
    fn unknown_reference_price_treats_cached_prices_as_far() {
        let positions = vec![position("0xa", dec!(1)).with_liquidation_price(dec!(100), 1)];

        let groups = groups_at(&positions, Decimal::ZERO, 100_000);

        assert!(groups[0].is_empty());
        assert_eq!(accounts(&groups[2]), vec!["0xa"]);
    }

    #[test]
    fn empty_snapshot_gives_empty_groups() {
        let [close, unknown, outdated] = groups_at(&[], dec!(100), 0);
        assert!(close.is_empty() && unknown.is_empty() && outdated.is_empty());
    }
}
