//! Engine, dispatcher and prioritizer tuning.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::application::{DispatchConfig, EngineConfig, PriorityConfig};

/// `[keeper]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeeperConfig {
    /// Block the initial index rebuild starts from.
    pub from_block: u64,
    pub max_batch_size: usize,
    pub batch_wait_ms: u64,
    /// Confirmations awaited for every keeper transaction.
    pub confirmations: u64,
    pub block_poll_interval_ms: u64,
    /// Largest block span fetched in one log query.
    pub max_block_range: u64,
    pub max_exec_attempts: u32,
    pub volume_window_secs: u64,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            from_block: 0,
            max_batch_size: 4,
            batch_wait_ms: 1000,
            confirmations: 1,
            block_poll_interval_ms: 2000,
            max_block_range: 10_000,
            max_exec_attempts: 10,
            volume_window_secs: 86_400,
        }
    }
}

impl KeeperConfig {
    #[must_use]
    pub const fn engine(&self) -> EngineConfig {
        EngineConfig {
            dispatch: DispatchConfig {
                max_batch_size: self.max_batch_size,
                batch_wait: Duration::from_millis(self.batch_wait_ms),
            },
            max_block_range: self.max_block_range,
        }
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.block_poll_interval_ms)
    }
}

/// `[prioritizer]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrioritizerConfig {
    pub proximity_threshold: Decimal,
    pub max_far_updates: usize,
    pub stale_after_secs: u64,
}

impl Default for PrioritizerConfig {
    fn default() -> Self {
        let defaults = PriorityConfig::default();
        Self {
            proximity_threshold: defaults.proximity_threshold,
            max_far_updates: defaults.max_far_updates,
            stale_after_secs: defaults.stale_after_secs,
        }
    }
}

impl PrioritizerConfig {
    #[must_use]
    pub const fn priority(&self) -> PriorityConfig {
        PriorityConfig {
            proximity_threshold: self.proximity_threshold,
            max_far_updates: self.max_far_updates,
            stale_after_secs: self.stale_after_secs,
        }
    }
}
