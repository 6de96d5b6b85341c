//! Pending off-chain delayed order index.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info, warn};

use super::{ApplySummary, BlockTimes};
use crate::domain::{Account, DelayedOrder, Event, EventArgs};

/// Pending off-chain orders keyed by account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderIndex {
    orders: HashMap<Account, DelayedOrder>,
    block_tip_timestamp: u64,
}

impl OrderIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks whose timestamps the fold needs for `events`.
    ///
    /// Only off-chain submissions take their intention time from the block.
    #[must_use]
    pub fn required_blocks(events: &[Event]) -> BTreeSet<u64> {
        events
            .iter()
            .filter(|e| {
                matches!(
                    e.args,
                    EventArgs::DelayedOrderSubmitted {
                        is_offchain: true,
                        ..
                    }
                )
            })
            .map(|e| e.block_number)
            .collect()
    }

    /// Fold `events` into the index, in the order given.
    pub fn apply(&mut self, events: &[Event], block_times: &BlockTimes) -> ApplySummary {
        let mut summary = ApplySummary::default();

        for event in events {
            match &event.args {
                EventArgs::DelayedOrderSubmitted {
                    account,
                    is_offchain,
                    target_round_id,
                    executable_at_time,
                    ..
                } => {
                    if !is_offchain {
                        debug!(account = %account, "Order is not off-chain, skipping");
                        summary.ignored += 1;
                        continue;
                    }
                    let Some(&intention_time) = block_times.get(&event.block_number) else {
                        warn!(
                            account = %account,
                            block = event.block_number,
                            "Missing block timestamp for submitted order, skipping"
                        );
                        summary.ignored += 1;
                        continue;
                    };

                    info!(account = %account, "New order submitted, adding to index");
                    self.orders.insert(
                        account.clone(),
                        DelayedOrder::new(
                            account.clone(),
                            *target_round_id,
                            *executable_at_time,
                            intention_time,
                        ),
                    );
                    summary.applied += 1;
                }
                EventArgs::DelayedOrderRemoved { account } => {
                    info!(account = %account, "Order cancelled or executed, removing from index");
                    self.orders.remove(account);
                    summary.applied += 1;
                }
                _ => {
                    debug!(
                        event = %event.kind(),
                        block = event.block_number,
                        "No order handler for event"
                    );
                    summary.ignored += 1;
                }
            }
        }

        summary
    }

    pub fn clear(&mut self) {
        self.orders.clear();
        self.block_tip_timestamp = 0;
    }

    /// Timestamp order ages are measured against.
    #[must_use]
    pub const fn block_tip(&self) -> u64 {
        self.block_tip_timestamp
    }

    pub fn set_block_tip(&mut self, timestamp: u64) {
        self.block_tip_timestamp = timestamp;
    }

    #[must_use]
    pub fn get(&self, account: &Account) -> Option<&DelayedOrder> {
        self.orders.get(account)
    }

    pub fn get_mut(&mut self, account: &Account) -> Option<&mut DelayedOrder> {
        self.orders.get_mut(account)
    }

    pub fn remove(&mut self, account: &Account) -> Option<DelayedOrder> {
        self.orders.remove(account)
    }

    pub fn orders(&self) -> impl Iterator<Item = &DelayedOrder> {
        self.orders.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submitted(block: u64, account: &str, is_offchain: bool) -> Event {
        Event::new(
            block,
            0,
            EventArgs::DelayedOrderSubmitted {
                account: Account::from(account),
                is_offchain,
                size_delta: 1,
                target_round_id: 9,
                executable_at_time: 1_000,
            },
        )
    }

    fn removed(block: u64, account: &str) -> Event {
        Event::new(
            block,
            1,
            EventArgs::DelayedOrderRemoved {
                account: Account::from(account),
            },
        )
    }

    #[test]
    fn required_blocks_only_covers_offchain_submissions() {
        let events = vec![
            submitted(10, "0xa", true),
            submitted(11, "0xb", false),
            submitted(10, "0xc", true),
            removed(12, "0xa"),
        ];
        assert_eq!(
            OrderIndex::required_blocks(&events).into_iter().collect::<Vec<_>>(),
            vec![10]
        );
    }

    #[test]
    fn offchain_submission_takes_block_timestamp() {
        let mut index = OrderIndex::new();
        let times = BlockTimes::from([(10, 777)]);

        index.apply(&[submitted(10, "0xa", true)], &times);

        let order = index.get(&Account::from("0xa")).unwrap();
        assert_eq!(order.intention_time, 777);
        assert_eq!(order.target_round_id, 9);
        assert_eq!(order.executable_at_time, 1_000);
        assert_eq!(order.execution_failures, 0);
    }

    #[test]
    fn onchain_submission_is_ignored() {
        let mut index = OrderIndex::new();
        let summary = index.apply(&[submitted(10, "0xa", false)], &BlockTimes::new());
        assert!(index.is_empty());
        assert_eq!(summary.ignored, 1);
    }

    #[test]
    fn removal_deletes_order() {
        let mut index = OrderIndex::new();
        let times = BlockTimes::from([(10, 777)]);
        index.apply(&[submitted(10, "0xa", true), removed(11, "0xa")], &times);
        assert!(index.is_empty());
    }

    #[test]
    fn resubmission_replaces_order() {
        let mut index = OrderIndex::new();
        let times = BlockTimes::from([(10, 100), (20, 200)]);
        index.apply(&[submitted(10, "0xa", true)], &times);
        index.get_mut(&Account::from("0xa")).unwrap().execution_failures = 2;

        index.apply(&[submitted(20, "0xa", true)], &times);

        let order = index.get(&Account::from("0xa")).unwrap();
        assert_eq!(order.intention_time, 200);
        assert_eq!(order.execution_failures, 0);
        assert_eq!(index.len(), 1);
    }
}
