//! Chain read ports: event logs and blocks.
//!
//! These are the engine's only view of the ledger. Implementations must return
//! events in log order (block number, then log index).

use async_trait::async_trait;

use crate::domain::{Event, EventKind};
use crate::error::Result;

/// Source of historical and live market events.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetch all events of the given kinds in `from_block..=to_block`.
    ///
    /// The returned events are ordered by block number and log index,
    /// interleaving kinds as they appear in the ledger.
    async fn query_events(
        &self,
        kinds: &[EventKind],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Event>>;
}

/// Source of block metadata.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Current chain head block number.
    async fn head(&self) -> Result<u64>;

    /// Timestamp (seconds) of the given block.
    async fn block_timestamp(&self, block_number: u64) -> Result<u64>;
}
