//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! Ports define the extension points in the hexagonal architecture.
//! They are traits that adapters implement to integrate with external
//! systems (nodes, contracts, price services, metrics backends).
//!
//! # Architecture
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │      Application        │
//!                    │  (index, dispatcher,    │
//!     ┌──────────────┤   policies, engine)     ├──────────────┐
//!     │              └─────────────────────────┘              │
//!     │                         │                             │
//!     ▼                         ▼                             ▼
//! ┌─────────┐            ┌─────────────┐              ┌───────────┐
//! │   EVM   │            │    Pyth     │              │  Metrics  │
//! │ Adapter │            │   Adapter   │              │  Adapter  │
//! └─────────┘            └─────────────┘              └───────────┘
//! ```
//!
//! # Available Ports
//!
//! - [`EventSource`], [`BlockSource`] - Ledger reads
//! - [`PerpsMarket`], [`KeeperTransactions`] - Market views and keeper transactions
//! - [`PriceOracle`] - Off-chain price updates
//! - [`KeeperMetrics`] - Metrics sink

pub mod outbound;

pub use outbound::chain::{BlockSource, EventSource};
pub use outbound::market::{KeeperTransactions, OrderAgeBounds, PerpsMarket, TxReceipt};
pub use outbound::metrics::{KeeperMetrics, NoopMetrics};
pub use outbound::oracle::PriceOracle;
