//! In-memory ledger.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{Event, EventKind};
use crate::error::{ChainError, Result};
use crate::port::{BlockSource, EventSource};

/// Seconds between blocks when no timestamp was scripted.
pub const BLOCK_TIME: u64 = 12;

#[derive(Default)]
struct State {
    events: Vec<Event>,
    head: u64,
    timestamps: HashMap<u64, u64>,
    failing_queries: usize,
    failing_heads: usize,
    queries: Vec<(u64, u64)>,
}

/// Event log and block clock driven by the test.
///
/// Blocks without a scripted timestamp are `BLOCK_TIME` seconds apart,
/// starting at zero.
#[derive(Default)]
pub struct ScriptedChain {
    state: Mutex<State>,
}

impl ScriptedChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append events; the head moves up to the highest block seen.
    pub fn push(&self, events: impl IntoIterator<Item = Event>) {
        let mut state = self.state.lock();
        for event in events {
            state.head = state.head.max(event.block_number);
            state.events.push(event);
        }
        state.events.sort_by_key(Event::log_position);
    }

    pub fn set_head(&self, head: u64) {
        self.state.lock().head = head;
    }

    pub fn set_timestamp(&self, block: u64, timestamp: u64) {
        self.state.lock().timestamps.insert(block, timestamp);
    }

    /// Fail the next `n` event queries.
    pub fn fail_queries(&self, n: usize) {
        self.state.lock().failing_queries = n;
    }

    /// Fail the next `n` head lookups.
    pub fn fail_heads(&self, n: usize) {
        self.state.lock().failing_heads = n;
    }

    /// Ranges of every successful event query, in call order.
    pub fn queries(&self) -> Vec<(u64, u64)> {
        self.state.lock().queries.clone()
    }
}

#[async_trait]
impl EventSource for ScriptedChain {
    async fn query_events(
        &self,
        kinds: &[EventKind],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Event>> {
        let mut state = self.state.lock();
        if state.failing_queries > 0 {
            state.failing_queries -= 1;
            return Err(ChainError::Rpc("scripted query failure".into()).into());
        }
        state.queries.push((from_block, to_block));
        Ok(state
            .events
            .iter()
            .filter(|e| (from_block..=to_block).contains(&e.block_number))
            .filter(|e| kinds.contains(&e.kind()))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BlockSource for ScriptedChain {
    async fn head(&self) -> Result<u64> {
        let mut state = self.state.lock();
        if state.failing_heads > 0 {
            state.failing_heads -= 1;
            return Err(ChainError::Rpc("scripted head failure".into()).into());
        }
        Ok(state.head)
    }

    async fn block_timestamp(&self, block_number: u64) -> Result<u64> {
        let state = self.state.lock();
        Ok(state
            .timestamps
            .get(&block_number)
            .copied()
            .unwrap_or(block_number * BLOCK_TIME))
    }
}
