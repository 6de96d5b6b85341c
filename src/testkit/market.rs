//! Fake market contracts, transaction sender and price service.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::domain::{Account, Price};
use crate::error::{ChainError, OracleError, Result};
use crate::port::{KeeperTransactions, OrderAgeBounds, PerpsMarket, PriceOracle, TxReceipt};

struct MarketState {
    asset_price: Price,
    liquidatable: HashSet<Account>,
    liquidation_prices: HashMap<Account, Price>,
    bounds: OrderAgeBounds,
    fee: u128,
    fail_price: bool,
    checks: Vec<Account>,
}

/// Market views answered from in-memory state.
pub struct FakeMarket {
    state: Mutex<MarketState>,
}

impl Default for FakeMarket {
    fn default() -> Self {
        Self {
            state: Mutex::new(MarketState {
                asset_price: Decimal::ZERO,
                liquidatable: HashSet::new(),
                liquidation_prices: HashMap::new(),
                bounds: OrderAgeBounds {
                    min_age: 12,
                    max_age: 60,
                },
                fee: 1,
                fail_price: false,
                checks: Vec::new(),
            }),
        }
    }
}

impl FakeMarket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_asset_price(&self, price: Price) {
        self.state.lock().asset_price = price;
    }

    pub fn set_liquidatable(&self, account: &Account, liquidatable: bool) {
        let mut state = self.state.lock();
        if liquidatable {
            state.liquidatable.insert(account.clone());
        } else {
            state.liquidatable.remove(account);
        }
    }

    pub fn set_liquidation_price(&self, account: &Account, price: Price) {
        self.state
            .lock()
            .liquidation_prices
            .insert(account.clone(), price);
    }

    pub fn set_age_bounds(&self, min_age: u64, max_age: u64) {
        self.state.lock().bounds = OrderAgeBounds { min_age, max_age };
    }

    pub fn set_update_fee(&self, fee: u128) {
        self.state.lock().fee = fee;
    }

    /// Make `asset_price` fail until reset.
    pub fn fail_asset_price(&self, fail: bool) {
        self.state.lock().fail_price = fail;
    }

    /// Accounts passed to `can_liquidate`, in call order.
    pub fn checks(&self) -> Vec<Account> {
        self.state.lock().checks.clone()
    }
}

#[async_trait]
impl PerpsMarket for FakeMarket {
    async fn asset_price(&self) -> Result<Price> {
        let state = self.state.lock();
        if state.fail_price {
            return Err(ChainError::Rpc("scripted price failure".into()).into());
        }
        Ok(state.asset_price)
    }

    async fn can_liquidate(&self, account: &Account) -> Result<bool> {
        let mut state = self.state.lock();
        state.checks.push(account.clone());
        Ok(state.liquidatable.contains(account))
    }

    async fn liquidation_price(&self, account: &Account) -> Result<Price> {
        let state = self.state.lock();
        Ok(state
            .liquidation_prices
            .get(account)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn offchain_order_age_bounds(&self) -> Result<OrderAgeBounds> {
        Ok(self.state.lock().bounds)
    }

    async fn price_update_fee(&self, _payload: &[Vec<u8>]) -> Result<u128> {
        Ok(self.state.lock().fee)
    }
}

/// One submitted keeper transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentTransaction {
    Liquidate { account: Account },
    ExecuteOrder { account: Account, fee: u128, payload: Vec<Vec<u8>> },
}

#[derive(Default)]
struct TxState {
    sent: Vec<SentTransaction>,
    failing: HashSet<Account>,
}

/// Records keeper transactions instead of sending them.
#[derive(Default)]
pub struct RecordingTransactions {
    state: Mutex<TxState>,
    delay: Duration,
}

impl RecordingTransactions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every transaction for `delay` before it confirms.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Revert every transaction for `account` until cleared.
    pub fn fail_for(&self, account: &Account, fail: bool) {
        let mut state = self.state.lock();
        if fail {
            state.failing.insert(account.clone());
        } else {
            state.failing.remove(account);
        }
    }

    pub fn sent(&self) -> Vec<SentTransaction> {
        self.state.lock().sent.clone()
    }

    fn record(&self, account: &Account, tx: SentTransaction) -> Result<TxReceipt> {
        let mut state = self.state.lock();
        if state.failing.contains(account) {
            return Err(ChainError::Reverted {
                tx_hash: format!("0xfailed{}", state.sent.len()),
            }
            .into());
        }
        state.sent.push(tx);
        Ok(TxReceipt {
            tx_hash: format!("0x{:064x}", state.sent.len()),
            block_number: None,
            signer: "0x0000000000000000000000000000000000000001".into(),
        })
    }

    async fn hold(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl KeeperTransactions for RecordingTransactions {
    async fn liquidate_position(
        &self,
        account: &Account,
        _confirmations: u64,
    ) -> Result<TxReceipt> {
        self.hold().await;
        self.record(
            account,
            SentTransaction::Liquidate {
                account: account.clone(),
            },
        )
    }

    async fn execute_offchain_order(
        &self,
        account: &Account,
        payload: Vec<Vec<u8>>,
        fee: u128,
        _confirmations: u64,
    ) -> Result<TxReceipt> {
        self.hold().await;
        self.record(
            account,
            SentTransaction::ExecuteOrder {
                account: account.clone(),
                fee,
                payload,
            },
        )
    }
}

/// Price service returning a fixed payload.
pub struct StaticOracle {
    payload: Vec<Vec<u8>>,
    failing: Mutex<bool>,
    calls: Mutex<usize>,
}

impl StaticOracle {
    pub fn new(payload: Vec<Vec<u8>>) -> Self {
        Self {
            payload,
            failing: Mutex::new(false),
            calls: Mutex::new(0),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl PriceOracle for StaticOracle {
    async fn price_update_payload(&self, feed_id: &str) -> Result<Vec<Vec<u8>>> {
        *self.calls.lock() += 1;
        if *self.failing.lock() {
            return Err(OracleError::Exhausted {
                attempts: 1,
                last_error: format!("{feed_id} unavailable"),
            }
            .into());
        }
        Ok(self.payload.clone())
    }
}
