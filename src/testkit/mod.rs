//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`chain`] - `ScriptedChain`, an in-memory event log and block clock.
//! - [`market`] - `FakeMarket`, `RecordingTransactions` and `StaticOracle`.
//! - [`metrics`] - `RecordingMetrics`.
//! - [`domain`] - Builders for ledger events.

pub mod chain;
pub mod domain;
pub mod market;
pub mod metrics;
