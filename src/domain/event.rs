//! Market events as decoded from the ledger.
//!
//! Raw numeric fields keep the on-chain 18-decimal fixed point representation;
//! conversion to [`Decimal`](rust_decimal::Decimal) happens when an index folds
//! the event.

use std::fmt;

use super::id::Account;

/// Kinds of market events the keeper subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PositionModified,
    PositionLiquidated,
    FundingRecomputed,
    DelayedOrderSubmitted,
    DelayedOrderRemoved,
}

impl EventKind {
    /// Contract event name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PositionModified => "PositionModified",
            Self::PositionLiquidated => "PositionLiquidated",
            Self::FundingRecomputed => "FundingRecomputed",
            Self::DelayedOrderSubmitted => "DelayedOrderSubmitted",
            Self::DelayedOrderRemoved => "DelayedOrderRemoved",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventArgs {
    PositionModified {
        id: u64,
        account: Account,
        margin: i128,
        size: i128,
        trade_size: i128,
        last_price: i128,
    },
    PositionLiquidated {
        id: u64,
        account: Account,
        liquidator: Account,
        size: i128,
        price: i128,
    },
    FundingRecomputed {
        timestamp: u64,
    },
    DelayedOrderSubmitted {
        account: Account,
        is_offchain: bool,
        size_delta: i128,
        target_round_id: u128,
        executable_at_time: u64,
    },
    DelayedOrderRemoved {
        account: Account,
    },
}

/// One ledger event with its position in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub block_number: u64,
    pub log_index: u64,
    pub args: EventArgs,
}

impl Event {
    pub fn new(block_number: u64, log_index: u64, args: EventArgs) -> Self {
        Self {
            block_number,
            log_index,
            args,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self.args {
            EventArgs::PositionModified { .. } => EventKind::PositionModified,
            EventArgs::PositionLiquidated { .. } => EventKind::PositionLiquidated,
            EventArgs::FundingRecomputed { .. } => EventKind::FundingRecomputed,
            EventArgs::DelayedOrderSubmitted { .. } => EventKind::DelayedOrderSubmitted,
            EventArgs::DelayedOrderRemoved { .. } => EventKind::DelayedOrderRemoved,
        }
    }

    /// Log ordering key: block number, then log index within the block.
    #[must_use]
    pub const fn log_position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_args() {
        let event = Event::new(7, 0, EventArgs::FundingRecomputed { timestamp: 10 });
        assert_eq!(event.kind(), EventKind::FundingRecomputed);
        assert_eq!(event.kind().to_string(), "FundingRecomputed");
        assert_eq!(event.log_position(), (7, 0));
    }
}
