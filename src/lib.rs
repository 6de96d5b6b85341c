//! perps-keeper - keeper bot for perpetual futures markets.
//!
//! Each market is watched by one or more keepers. A keeper folds the market
//! contract's event log into an in-memory index, then on every new block picks
//! the entities worth acting on and dispatches bounded batches of on-chain
//! calls for them.
//!
//! # Modules
//!
//! - [`domain`] - Positions, delayed orders, events and market context
//! - [`port`] - Trait seams for the chain, market contracts, oracle and metrics
//! - [`application`] - Indexes, prioritizer, dispatcher, policies and the engine
//! - [`adapter`] - EVM, price service, Prometheus and CLI adapters
//! - [`infrastructure`] - Configuration, wiring and the block driver
//! - [`error`] - Error types for the crate
//!
//! # Features
//!
//! - `testkit` - Exposes in-memory port fakes for integration tests

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
