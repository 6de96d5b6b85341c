//! Block driver.
//!
//! A single poller watches the chain head and emits every new block number,
//! in order, to one queue per market. Each market runs its own loop that
//! takes blocks off the queue and awaits a full cycle of all its keepers
//! before taking the next one, so cycles for a market never overlap while
//! markets progress independently.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::application::Keeper;
use crate::domain::MarketKey;
use crate::port::BlockSource;

/// Sender half of a market's block queue.
pub type BlockSender = mpsc::UnboundedSender<u64>;

/// Receiver half of a market's block queue.
pub type BlockReceiver = mpsc::UnboundedReceiver<u64>;

/// Polls the chain head and fans block numbers out to market loops.
pub struct BlockPoller {
    blocks: Arc<dyn BlockSource>,
    interval: Duration,
    subscribers: Vec<BlockSender>,
}

impl BlockPoller {
    pub fn new(blocks: Arc<dyn BlockSource>, interval: Duration) -> Self {
        Self {
            blocks,
            interval,
            subscribers: Vec::new(),
        }
    }

    /// Register a new block queue.
    pub fn subscribe(&mut self) -> BlockReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Poll until every subscriber is gone, emitting blocks after `last_seen`.
    pub async fn run(mut self, mut last_seen: u64) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let head = match self.blocks.head().await {
                Ok(head) => head,
                Err(e) => {
                    warn!(error = %e, "Failed to poll chain head");
                    continue;
                }
            };
            if head <= last_seen {
                continue;
            }

            if head - last_seen > 1 {
                debug!(from = last_seen + 1, to = head, "Catching up on blocks");
            }
            for block in (last_seen + 1)..=head {
                self.subscribers.retain(|tx| tx.send(block).is_ok());
            }
            last_seen = head;

            if self.subscribers.is_empty() {
                info!("No market loops left, stopping block poller");
                return;
            }
        }
    }
}

/// Run one cycle per queued block for every keeper of a market.
///
/// Keepers of one market have independent indexes and run their cycles
/// concurrently; the next block is only taken once all of them finished.
/// Cycle errors are logged and never stop the loop.
pub async fn run_market(
    market: MarketKey,
    mut keepers: Vec<Box<dyn Keeper>>,
    mut blocks: BlockReceiver,
) {
    info!(market = %market, keepers = keepers.len(), "Market loop started");

    while let Some(block) = blocks.recv().await {
        let cycles = keepers.iter_mut().map(|keeper| {
            let span = info_span!(
                "cycle",
                market = %keeper.market(),
                policy = keeper.policy(),
                block
            );
            async move {
                if let Err(e) = keeper.process_block(block).await {
                    warn!(error = %e, "Cycle failed");
                }
            }
            .instrument(span)
        });
        join_all(cycles).await;
    }

    info!(market = %market, "Market loop stopped");
}
