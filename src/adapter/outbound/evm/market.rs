//! Read-only market views: prices, liquidation checks and settings.

use std::str::FromStr;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_provider::DynProvider;
use async_trait::async_trait;
use tracing::warn;

use super::contracts::{IPyth, PerpsV2Market, PerpsV2MarketSettings};
use crate::domain::{from_wei, Account, MarketKey, Price};
use crate::error::{ChainError, ConfigError, Result};
use crate::port::{OrderAgeBounds, PerpsMarket};

/// Contract addresses for one market.
///
/// The settings and oracle contracts are only needed for off-chain orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketAddresses {
    pub market: Address,
    pub settings: Option<Address>,
    pub pyth: Option<Address>,
}

pub struct EvmMarket {
    provider: DynProvider,
    addresses: MarketAddresses,
    market_key: B256,
}

impl EvmMarket {
    /// # Errors
    ///
    /// Returns an error if the market key does not fit in 32 bytes.
    pub fn new(provider: DynProvider, addresses: MarketAddresses, key: &MarketKey) -> Result<Self> {
        Ok(Self {
            provider,
            addresses,
            market_key: market_key_bytes(key)?,
        })
    }
}

/// Encode a market key the way the settings contract indexes it.
pub fn market_key_bytes(key: &MarketKey) -> Result<B256> {
    let raw = key.as_str().as_bytes();
    if raw.is_empty() || raw.len() > 32 {
        return Err(ConfigError::InvalidValue {
            field: "markets.key",
            reason: format!("{key} must be 1 to 32 bytes"),
        }
        .into());
    }
    Ok(B256::right_padding_from(raw))
}

pub(super) fn parse_account(account: &Account) -> Result<Address> {
    Address::from_str(account.as_str())
        .map_err(|_| ChainError::InvalidAddress(account.to_string()).into())
}

fn price(raw: U256, what: &str) -> Result<Price> {
    let raw =
        i128::try_from(raw).map_err(|_| ChainError::Rpc(format!("{what} {raw} out of range")))?;
    Ok(from_wei(raw)?)
}

fn seconds(raw: U256, what: &str) -> Result<u64> {
    u64::try_from(raw).map_err(|_| ChainError::Rpc(format!("{what} {raw} out of range")).into())
}

#[async_trait]
impl PerpsMarket for EvmMarket {
    async fn asset_price(&self) -> Result<Price> {
        let market = PerpsV2Market::new(self.addresses.market, &self.provider);
        let result = market
            .assetPrice()
            .call()
            .await
            .map_err(|e| ChainError::Rpc(format!("assetPrice: {e}")))?;
        if result.invalid {
            warn!(market = %self.addresses.market, "Asset price flagged invalid");
        }
        price(result.price, "assetPrice")
    }

    async fn can_liquidate(&self, account: &Account) -> Result<bool> {
        let market = PerpsV2Market::new(self.addresses.market, &self.provider);
        market
            .canLiquidate(parse_account(account)?)
            .call()
            .await
            .map_err(|e| ChainError::Rpc(format!("canLiquidate: {e}")).into())
    }

    async fn liquidation_price(&self, account: &Account) -> Result<Price> {
        let market = PerpsV2Market::new(self.addresses.market, &self.provider);
        let result = market
            .liquidationPrice(parse_account(account)?)
            .call()
            .await
            .map_err(|e| ChainError::Rpc(format!("liquidationPrice: {e}")))?;
        price(result.price, "liquidationPrice")
    }

    async fn offchain_order_age_bounds(&self) -> Result<OrderAgeBounds> {
        let settings = self.addresses.settings.ok_or(ConfigError::MissingField {
            field: "contracts.market_settings",
        })?;
        let settings = PerpsV2MarketSettings::new(settings, &self.provider);
        let min_call = settings.offchainDelayedOrderMinAge(self.market_key);
        let max_call = settings.offchainDelayedOrderMaxAge(self.market_key);
        let (min_age, max_age) = tokio::try_join!(
            async {
                min_call
                    .call()
                    .await
                    .map_err(|e| ChainError::Rpc(format!("offchainDelayedOrderMinAge: {e}")))
            },
            async {
                max_call
                    .call()
                    .await
                    .map_err(|e| ChainError::Rpc(format!("offchainDelayedOrderMaxAge: {e}")))
            },
        )?;

        Ok(OrderAgeBounds {
            min_age: seconds(min_age, "min age")?,
            max_age: seconds(max_age, "max age")?,
        })
    }

    async fn price_update_fee(&self, payload: &[Vec<u8>]) -> Result<u128> {
        let pyth = self.addresses.pyth.ok_or(ConfigError::MissingField {
            field: "contracts.pyth",
        })?;
        let pyth = IPyth::new(pyth, &self.provider);
        let update: Vec<Bytes> = payload.iter().cloned().map(Bytes::from).collect();
        let fee = pyth
            .getUpdateFee(update)
            .call()
            .await
            .map_err(|e| ChainError::Rpc(format!("getUpdateFee: {e}")))?;
        u128::try_from(fee)
            .map_err(|_| ChainError::Rpc(format!("update fee {fee} out of range")).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_key_is_right_padded() {
        let bytes = market_key_bytes(&MarketKey::from("sETHPERP")).unwrap();
        assert_eq!(&bytes[..8], b"sETHPERP");
        assert!(bytes[8..].iter().all(|b| *b == 0));
    }

    #[test]
    fn oversized_market_key_is_rejected() {
        let key = MarketKey::new("x".repeat(33));
        assert!(market_key_bytes(&key).is_err());
    }

    #[test]
    fn account_must_be_an_address() {
        let trader = Account::from("0x00000000000000000000000000000000000000aa");
        assert!(parse_account(&trader).is_ok());
        assert!(parse_account(&Account::from("not-an-address")).is_err());
    }
}
