//! Rolling window of recent trade volume.

use std::collections::VecDeque;

use rust_decimal::Decimal;

use super::money::{Price, Size};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Trade {
    timestamp: u64,
    notional: Decimal,
}

/// FIFO of trade notionals with a running total.
///
/// Trades are pushed in block order so the queue stays sorted by timestamp and
/// pruning only ever pops from the front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeTracker {
    window_secs: u64,
    trades: VecDeque<Trade>,
    total: Decimal,
}

impl VolumeTracker {
    #[must_use]
    pub fn new(window_secs: u64) -> Self {
        Self {
            window_secs,
            trades: VecDeque::new(),
            total: Decimal::ZERO,
        }
    }

    /// Record a trade of `trade_size` base units filled at `price`.
    ///
    /// Direction does not matter: volume counts the absolute notional.
    pub fn push(&mut self, trade_size: Size, price: Price, timestamp: u64) {
        let notional = trade_size.abs() * price;
        self.total += notional;
        self.trades.push_back(Trade {
            timestamp,
            notional,
        });
    }

    /// Drop trades older than the window relative to `now`.
    pub fn prune(&mut self, now: u64) {
        let cutoff = now.saturating_sub(self.window_secs);
        while let Some(front) = self.trades.front() {
            if front.timestamp >= cutoff {
                break;
            }
            self.total -= front.notional;
            self.trades.pop_front();
        }
    }

    /// Sum of notionals currently inside the window.
    #[must_use]
    pub const fn total(&self) -> Decimal {
        self.total
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.trades.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn clear(&mut self) {
        self.trades.clear();
        self.total = Decimal::ZERO;
    }
}

impl Default for VolumeTracker {
    fn default() -> Self {
        Self::new(24 * 60 * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn opposite_trades_add_magnitudes() {
        let mut volume = VolumeTracker::default();
        volume.push(dec!(40000), dec!(40000), 1);
        volume.push(dec!(-40000), dec!(40000), 1);

        assert_eq!(volume.total(), dec!(3_200_000_000));
    }

    #[test]
    fn prune_drops_trades_outside_window() {
        let mut volume = VolumeTracker::default();
        volume.push(dec!(40000), dec!(40000), 1);
        volume.push(dec!(40000), dec!(40000), 1);
        for _ in 0..3 {
            volume.push(dec!(40000), dec!(40000), 10_000_000);
        }

        volume.prune(10_000_000);

        assert_eq!(volume.len(), 3);
        assert_eq!(volume.total(), dec!(4_800_000_000));
    }

    #[test]
    fn prune_keeps_trades_on_the_boundary() {
        let mut volume = VolumeTracker::new(100);
        volume.push(dec!(1), dec!(10), 900);
        volume.prune(1000);
        assert_eq!(volume.total(), dec!(10));
        volume.prune(1001);
        assert!(volume.is_empty());
        assert_eq!(volume.total(), Decimal::ZERO);
    }
}
