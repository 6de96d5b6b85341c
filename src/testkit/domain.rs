//! Builders for ledger events used across tests.
//!
//! Amounts are given in whole units and scaled to the 18-decimal on-chain
//! representation, so tests read in prices and sizes rather than wei.

use crate::domain::{Account, Event, EventArgs, UNIT_DECIMALS};

/// Scale whole units to 18-decimal fixed point.
pub fn wei(units: i64) -> i128 {
    i128::from(units) * 10_i128.pow(UNIT_DECIMALS)
}

/// Create an [`Account`] from a string.
pub fn account(address: &str) -> Account {
    Account::from(address)
}

/// A `PositionModified` event. A zero `size` closes the position.
pub fn position_modified(
    block: u64,
    log_index: u64,
    who: &str,
    margin: i64,
    size: i64,
    price: i64,
) -> Event {
    Event::new(
        block,
        log_index,
        EventArgs::PositionModified {
            id: block,
            account: account(who),
            margin: wei(margin),
            size: wei(size),
            trade_size: wei(size),
            last_price: wei(price),
        },
    )
}

/// A `PositionLiquidated` event.
pub fn position_liquidated(block: u64, log_index: u64, who: &str) -> Event {
    Event::new(
        block,
        log_index,
        EventArgs::PositionLiquidated {
            id: block,
            account: account(who),
            liquidator: account("0x00000000000000000000000000000000000000ff"),
            size: wei(1),
            price: wei(1_000),
        },
    )
}

/// A `FundingRecomputed` event.
pub fn funding_recomputed(block: u64, log_index: u64, timestamp: u64) -> Event {
    Event::new(block, log_index, EventArgs::FundingRecomputed { timestamp })
}

/// An off-chain `DelayedOrderSubmitted` event.
pub fn order_submitted(block: u64, log_index: u64, who: &str) -> Event {
    Event::new(
        block,
        log_index,
        EventArgs::DelayedOrderSubmitted {
            account: account(who),
            is_offchain: true,
            size_delta: wei(1),
            target_round_id: 1,
            executable_at_time: 0,
        },
    )
}

/// A `DelayedOrderRemoved` event.
pub fn order_removed(block: u64, log_index: u64, who: &str) -> Event {
    Event::new(
        block,
        log_index,
        EventArgs::DelayedOrderRemoved {
            account: account(who),
        },
    )
}
