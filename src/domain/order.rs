//! Pending delayed off-chain orders.

use super::id::Account;

/// A delayed order awaiting keeper execution. One per account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayedOrder {
    pub account: Account,
    pub target_round_id: u128,
    pub executable_at_time: u64,
    /// Timestamp of the block that contained the submission.
    pub intention_time: u64,
    pub execution_failures: u32,
}

impl DelayedOrder {
    pub fn new(
        account: Account,
        target_round_id: u128,
        executable_at_time: u64,
        intention_time: u64,
    ) -> Self {
        Self {
            account,
            target_round_id,
            executable_at_time,
            intention_time,
            execution_failures: 0,
        }
    }

    /// True once strictly more than `min_age` seconds passed since submission.
    #[must_use]
    pub const fn is_eligible(&self, now: u64, min_age: u64) -> bool {
        now.saturating_sub(self.intention_time) > min_age
    }

    /// True once `now` is past `intention_time + max_age`. Stale orders can only be cancelled.
    #[must_use]
    pub const fn is_stale(&self, now: u64, max_age: u64) -> bool {
        now > self.intention_time.saturating_add(max_age)
    }

    #[must_use]
    pub const fn exceeded_attempts(&self, max_attempts: u32) -> bool {
        self.execution_failures > max_attempts
    }
}
