//! Infrastructure layer.
//!
//! Provides technical concerns that support the application without containing
//! keeper logic: configuration, adapter wiring and the block driver.
//!
//! # Submodules
//!
//! - [`bootstrap`] - Composition root for runtime wiring
//! - [`config`] - Configuration loading and validation
//! - [`driver`] - Block polling and per-market cycle loops
//! - [`orchestrator`] - Process startup and supervision

pub mod bootstrap;
pub mod config;
pub mod driver;
pub mod orchestrator;

pub use bootstrap::{build_keepers, MarketPorts};
pub use driver::{run_market, BlockPoller, BlockReceiver, BlockSender};
pub use orchestrator::Orchestrator;
