//! Application services (use cases).
//!
//! These services fold the event log into indexes, decide what to act on and
//! run keeper actions through the outbound ports.

pub mod dispatcher;
pub mod engine;
pub mod index;
pub mod policy;
pub mod prioritizer;

pub use dispatcher::{DispatchConfig, DispatchReport, Dispatcher};
pub use engine::{CycleReport, Engine, EngineConfig, Keeper};
pub use index::{ApplySummary, BlockTimes, OrderIndex, PositionIndex};
pub use policy::{
    BlockTip, DelayedOffchainPolicy, EvictReason, LiquidationOutcome, LiquidationPolicy,
    OrderOutcome, Policy, ScheduledOrder,
};
pub use prioritizer::{liquidation_groups, PriorityConfig};
