//! Event-sourced indexes.
//!
//! Each index is a fold over the ordered event log: the same function is used
//! for the historical rebuild and for live per-block updates. Folding never
//! performs I/O; anything it needs from the chain (block timestamps) is passed
//! in through [`BlockTimes`].

mod order;
mod position;

use std::collections::HashMap;

pub use order::OrderIndex;
pub use position::PositionIndex;

/// Block number to block timestamp, resolved ahead of a fold.
pub type BlockTimes = HashMap<u64, u64>;

/// What a fold did with a slice of events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    /// Events that changed or confirmed index state.
    pub applied: usize,
    /// Events this index has no handler for, or could not use.
    pub ignored: usize,
    /// Liquidations observed in the log.
    pub liquidations: usize,
}
