//! Infrastructure bootstrap helpers for runtime wiring.

use std::sync::Arc;

use tracing::{info, warn};
use url::Url;

use crate::adapter::outbound::evm::{
    EvmChain, EvmMarket, EvmTransactions, MarketAddresses, SignerPool,
};
use crate::adapter::outbound::metrics::PrometheusMetrics;
use crate::adapter::outbound::pyth::HermesClient;
use crate::application::{DelayedOffchainPolicy, Engine, Keeper, LiquidationPolicy};
use crate::domain::MarketKey;
use crate::error::{ConfigError, Result};
use crate::infrastructure::config::{
    parse_address, Config, MarketConfig, PolicyKind, PRIVATE_KEYS_ENV,
};
use crate::port::{
    BlockSource, EventSource, KeeperMetrics, KeeperTransactions, NoopMetrics, PerpsMarket,
    PriceOracle,
};

/// Port handles one market's keepers run against.
#[derive(Clone)]
pub struct MarketPorts {
    pub events: Arc<dyn EventSource>,
    pub blocks: Arc<dyn BlockSource>,
    pub market: Arc<dyn PerpsMarket>,
    pub transactions: Arc<dyn KeeperTransactions>,
    pub oracle: Option<Arc<dyn PriceOracle>>,
    pub metrics: Arc<dyn KeeperMetrics>,
}

/// Build the metrics sink. The Prometheus handle is returned for pushing.
pub(crate) fn build_metrics(
    config: &Config,
) -> Result<(Arc<dyn KeeperMetrics>, Option<PrometheusMetrics>)> {
    if !config.metrics.enabled {
        info!("Metrics disabled");
        return Ok((Arc::new(NoopMetrics), None));
    }
    let metrics = PrometheusMetrics::new()?;
    Ok((Arc::new(metrics.clone()), Some(metrics)))
}

/// Build the price service client if any market needs it.
pub(crate) fn build_oracle(config: &Config) -> Result<Option<Arc<dyn PriceOracle>>> {
    if !config.runs_offchain_orders() {
        return Ok(None);
    }
    let endpoint = config
        .oracle
        .endpoint
        .as_deref()
        .ok_or(ConfigError::MissingField {
            field: "oracle.endpoint",
        })?;
    let client = HermesClient::new(
        Url::parse(endpoint)?,
        config.oracle.timeout(),
        config.oracle.max_retries,
    )?;
    info!(endpoint, "Price service client ready");
    Ok(Some(Arc::new(client)))
}

/// Build the signer pool from `KEEPER_PRIVATE_KEYS`.
pub(crate) fn build_signers(config: &Config, rpc_url: &Url) -> Result<Arc<SignerPool>> {
    let keys = config
        .private_keys
        .as_deref()
        .ok_or(ConfigError::MissingField {
            field: PRIVATE_KEYS_ENV,
        })?;
    Ok(Arc::new(SignerPool::from_keys(keys, rpc_url)?))
}

/// Wire the EVM adapters for one market.
pub(crate) fn build_market_ports(
    config: &Config,
    market: &MarketConfig,
    provider: &alloy_provider::DynProvider,
    signers: &Arc<SignerPool>,
    oracle: Option<Arc<dyn PriceOracle>>,
    metrics: Arc<dyn KeeperMetrics>,
) -> Result<MarketPorts> {
    let address = parse_address("markets.address", &market.address)?;
    let addresses = MarketAddresses {
        market: address,
        settings: config
            .contracts
            .market_settings
            .as_deref()
            .map(|a| parse_address("contracts.market_settings", a))
            .transpose()?,
        pyth: config
            .contracts
            .pyth
            .as_deref()
            .map(|a| parse_address("contracts.pyth", a))
            .transpose()?,
    };

    let chain = Arc::new(EvmChain::new(provider.clone(), address));
    let key = MarketKey::new(market.key.clone());
    Ok(MarketPorts {
        events: chain.clone(),
        blocks: chain,
        market: Arc::new(EvmMarket::new(provider.clone(), addresses, &key)?),
        transactions: Arc::new(EvmTransactions::new(address, Arc::clone(signers))),
        oracle,
        metrics,
    })
}

/// Build one engine per policy the market runs.
///
/// # Errors
///
/// Returns an error if a policy lacks a required port or setting.
pub fn build_keepers(
    config: &Config,
    market: &MarketConfig,
    ports: &MarketPorts,
) -> Result<Vec<Box<dyn Keeper>>> {
    let key = MarketKey::new(market.key.clone());
    let engine_config = config.keeper.engine();
    let mut keepers: Vec<Box<dyn Keeper>> = Vec::new();

    for policy in market.policies() {
        match policy {
            PolicyKind::Liquidation => {
                let policy = LiquidationPolicy::new(
                    market.base_asset.clone(),
                    config.keeper.volume_window_secs,
                    config.prioritizer.priority(),
                    config.keeper.confirmations,
                    Arc::clone(&ports.market),
                    Arc::clone(&ports.transactions),
                );
                keepers.push(Box::new(Engine::new(
                    key.clone(),
                    policy,
                    engine_config,
                    Arc::clone(&ports.events),
                    Arc::clone(&ports.blocks),
                    Arc::clone(&ports.metrics),
                )?));
            }
            PolicyKind::DelayedOffchain => {
                let feed_id = market
                    .price_feed_id
                    .clone()
                    .ok_or(ConfigError::MissingField {
                        field: "markets.price_feed_id",
                    })?;
                let Some(oracle) = ports.oracle.clone() else {
                    warn!(market = %key, "No price service configured");
                    return Err(ConfigError::MissingField {
                        field: "oracle.endpoint",
                    }
                    .into());
                };
                let policy = DelayedOffchainPolicy::new(
                    feed_id,
                    config.keeper.max_exec_attempts,
                    config.keeper.confirmations,
                    Arc::clone(&ports.market),
                    Arc::clone(&ports.transactions),
                    oracle,
                );
                keepers.push(Box::new(Engine::new(
                    key.clone(),
                    policy,
                    engine_config,
                    Arc::clone(&ports.events),
                    Arc::clone(&ports.blocks),
                    Arc::clone(&ports.metrics),
                )?));
            }
        }
    }

    info!(market = %key, keepers = keepers.len(), "Keepers built");
    Ok(keepers)
}
