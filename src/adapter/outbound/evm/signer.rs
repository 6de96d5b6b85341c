//! Keeper transaction submission over a pool of signers.
//!
//! Each signer gets its own wallet provider and is leased to exactly one
//! transaction at a time, so nonces never race. Callers wait for a free
//! signer when all are busy.

use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use alloy_provider::network::EthereumWallet;
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};
use url::Url;

use super::contracts::PerpsV2Market;
use super::market::parse_account;
use crate::domain::Account;
use crate::error::{ChainError, ConfigError, Result};
use crate::port::{KeeperTransactions, TxReceipt};

struct SignerSlot {
    address: Address,
    provider: DynProvider,
}

/// Signers shared by every keeper in the process.
pub struct SignerPool {
    slots: Vec<SignerSlot>,
    free: Mutex<Vec<usize>>,
    permits: Arc<Semaphore>,
}

/// Exclusive use of one signer; returned to the pool on drop.
struct Lease<'a> {
    pool: &'a SignerPool,
    slot: usize,
    _permit: OwnedSemaphorePermit,
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        self.pool.free.lock().push(self.slot);
    }
}

impl Lease<'_> {
    fn slot(&self) -> &SignerSlot {
        &self.pool.slots[self.slot]
    }
}

impl SignerPool {
    /// Build a pool from comma-separated hex private keys.
    ///
    /// # Errors
    ///
    /// Returns an error if no key is given or a key does not parse.
    pub fn from_keys(keys: &str, rpc_url: &Url) -> Result<Self> {
        let mut slots = Vec::new();
        for key in keys.split(',').map(str::trim).filter(|k| !k.is_empty()) {
            let signer = PrivateKeySigner::from_str(key)
                .map_err(|e| ConfigError::InvalidValue {
                    field: "KEEPER_PRIVATE_KEYS",
                    reason: e.to_string(),
                })?;
            let address = signer.address();
            let provider = ProviderBuilder::new()
                .wallet(EthereumWallet::from(signer))
                .connect_http(rpc_url.clone())
                .erased();
            slots.push(SignerSlot { address, provider });
        }

        if slots.is_empty() {
            return Err(ConfigError::MissingField {
                field: "KEEPER_PRIVATE_KEYS",
            }
            .into());
        }

        info!(signers = slots.len(), "Signer pool ready");
        let free = (0..slots.len()).rev().collect();
        let permits = Arc::new(Semaphore::new(slots.len()));
        Ok(Self {
            slots,
            free: Mutex::new(free),
            permits,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn addresses(&self) -> Vec<Address> {
        self.slots.iter().map(|s| s.address).collect()
    }

    async fn lease(&self) -> Result<Lease<'_>> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ChainError::NoSigner)?;
        let slot = self.free.lock().pop().ok_or(ChainError::NoSigner)?;
        Ok(Lease {
            pool: self,
            slot,
            _permit: permit,
        })
    }
}

/// [`KeeperTransactions`] for one market contract.
pub struct EvmTransactions {
    market: Address,
    signers: Arc<SignerPool>,
}

impl EvmTransactions {
    pub fn new(market: Address, signers: Arc<SignerPool>) -> Self {
        Self { market, signers }
    }
}

#[async_trait]
impl KeeperTransactions for EvmTransactions {
    async fn liquidate_position(&self, account: &Account, confirmations: u64) -> Result<TxReceipt> {
        let target = parse_account(account)?;
        let lease = self.signers.lease().await?;
        let slot = lease.slot();
        debug!(signer = %slot.address, account = %account, "Sending liquidatePosition");

        let market = PerpsV2Market::new(self.market, &slot.provider);
        let pending = market
            .liquidatePosition(target)
            .send()
            .await
            .map_err(|e| ChainError::SubmissionFailed(format!("liquidatePosition: {e}")))?;

        let receipt = pending
            .with_required_confirmations(confirmations)
            .get_receipt()
            .await
            .map_err(|e| ChainError::SubmissionFailed(format!("Failed to get receipt: {e}")))?;

        let tx_hash = format!("{:?}", receipt.transaction_hash);
        if !receipt.status() {
            return Err(ChainError::Reverted { tx_hash }.into());
        }
        Ok(TxReceipt {
            tx_hash,
            block_number: receipt.block_number,
            signer: slot.address.to_string(),
        })
    }

    async fn execute_offchain_order(
        &self,
        account: &Account,
        payload: Vec<Vec<u8>>,
        fee: u128,
        confirmations: u64,
    ) -> Result<TxReceipt> {
        let target = parse_account(account)?;
        let update: Vec<Bytes> = payload.into_iter().map(Bytes::from).collect();
        let lease = self.signers.lease().await?;
        let slot = lease.slot();
        debug!(
            signer = %slot.address,
            account = %account,
            fee,
            "Sending executeOffchainDelayedOrder"
        );

        let market = PerpsV2Market::new(self.market, &slot.provider);
        let pending = market
            .executeOffchainDelayedOrder(target, update)
            .value(U256::from(fee))
            .send()
            .await
            .map_err(|e| {
                ChainError::SubmissionFailed(format!("executeOffchainDelayedOrder: {e}"))
            })?;

        let receipt = pending
            .with_required_confirmations(confirmations)
            .get_receipt()
            .await
            .map_err(|e| ChainError::SubmissionFailed(format!("Failed to get receipt: {e}")))?;

        let tx_hash = format!("{:?}", receipt.transaction_hash);
        if !receipt.status() {
            return Err(ChainError::Reverted { tx_hash }.into());
        }
        Ok(TxReceipt {
            tx_hash,
            block_number: receipt.block_number,
            signer: slot.address.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development keys; never funded on a real network.
    const KEY_A: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const KEY_B: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    fn url() -> Url {
        Url::parse("http://127.0.0.1:8545").unwrap()
    }

    #[test]
    fn parses_comma_separated_keys() {
        let pool = SignerPool::from_keys(&format!("{KEY_A}, {KEY_B},"), &url()).unwrap();
        assert_eq!(pool.len(), 2);
        assert_ne!(pool.addresses()[0], pool.addresses()[1]);
    }

    #[test]
    fn empty_key_list_is_rejected() {
        assert!(SignerPool::from_keys(" , ", &url()).is_err());
    }

    #[test]
    fn malformed_key_is_rejected() {
        assert!(SignerPool::from_keys("0x1234", &url()).is_err());
    }

    #[tokio::test]
    async fn leases_are_exclusive_and_returned() {
        let pool = SignerPool::from_keys(KEY_A, &url()).unwrap();

        let first = pool.lease().await.unwrap();
        let blocked =
            tokio::time::timeout(std::time::Duration::from_millis(20), pool.lease()).await;
        assert!(blocked.is_err());

        drop(first);
        assert!(pool.lease().await.is_ok());
    }
}
