//! EVM adapters: market logs, views and keeper transactions over JSON-RPC.

mod chain;
mod contracts;
mod market;
mod signer;

use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use url::Url;

pub use chain::EvmChain;
pub use market::{market_key_bytes, EvmMarket, MarketAddresses};
pub use signer::{EvmTransactions, SignerPool};

/// Read-only provider shared by the chain and market adapters.
#[must_use]
pub fn connect(rpc_url: &Url) -> DynProvider {
    ProviderBuilder::new().connect_http(rpc_url.clone()).erased()
}
