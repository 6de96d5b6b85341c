//! Market contract ports: read-only views and keeper transactions.

use async_trait::async_trait;

use crate::domain::{Account, Price};
use crate::error::Result;

/// Age window during which an off-chain delayed order may be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderAgeBounds {
    /// Minimum seconds since submission before execution is allowed.
    pub min_age: u64,
    /// Maximum seconds since submission; older orders can only be cancelled.
    pub max_age: u64,
}

/// Receipt of a confirmed keeper transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    /// Transaction hash as hex.
    pub tx_hash: String,
    /// Block the transaction was included in, if reported.
    pub block_number: Option<u64>,
    /// Address of the signer that sent it.
    pub signer: String,
}

/// Read-only market views used by the policies.
#[async_trait]
pub trait PerpsMarket: Send + Sync {
    /// Current reference price of the base asset.
    async fn asset_price(&self) -> Result<Price>;

    /// Whether the account's position can be liquidated right now.
    async fn can_liquidate(&self, account: &Account) -> Result<bool>;

    /// Estimated liquidation price of the account's position.
    async fn liquidation_price(&self, account: &Account) -> Result<Price>;

    /// Current off-chain delayed order age bounds from the market settings.
    async fn offchain_order_age_bounds(&self) -> Result<OrderAgeBounds>;

    /// Fee (wei) the price oracle charges to accept `payload`.
    async fn price_update_fee(&self, payload: &[Vec<u8>]) -> Result<u128>;
}

/// Submission of keeper transactions.
///
/// Implementations own signer selection, nonce handling and confirmation
/// waits. Every method returns only after `confirmations` blocks and fails on
/// revert.
#[async_trait]
pub trait KeeperTransactions: Send + Sync {
    /// Submit `liquidatePosition(account)`.
    async fn liquidate_position(&self, account: &Account, confirmations: u64) -> Result<TxReceipt>;

    /// Submit `executeOffchainDelayedOrder(account, payload)` paying `fee` as value.
    async fn execute_offchain_order(
        &self,
        account: &Account,
        payload: Vec<Vec<u8>>,
        fee: u128,
        confirmations: u64,
    ) -> Result<TxReceipt>;
}
