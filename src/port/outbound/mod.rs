//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe infrastructure dependencies such as the chain,
//! the market contracts, the off-chain price service and metrics.

pub mod chain;
pub mod market;
pub mod metrics;
pub mod oracle;
