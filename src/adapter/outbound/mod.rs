//! Outbound adapters (driven side).

pub mod evm;
pub mod metrics;
pub mod pyth;
