//! Process orchestration: build every market's keepers, rebuild their
//! indexes and hand them to the block driver.

use std::sync::Arc;
use std::time::Duration;

use alloy_provider::Provider;
use futures_util::future::try_join_all;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use super::bootstrap::{
    build_keepers, build_market_ports, build_metrics, build_oracle, build_signers,
};
use super::driver::{run_market, BlockPoller};
use crate::adapter::outbound::evm::{self, EvmChain};
use crate::adapter::outbound::metrics::PrometheusMetrics;
use crate::application::Keeper;
use crate::domain::MarketKey;
use crate::error::{ChainError, ConfigError, Result};
use crate::infrastructure::config::{parse_address, Config};

/// Main keeper process.
pub struct Orchestrator;

impl Orchestrator {
    /// Run until the block poller stops.
    ///
    /// # Errors
    ///
    /// Returns an error if wiring fails or any initial index rebuild fails.
    pub async fn run(config: Config) -> Result<()> {
        let rpc_url = config.rpc_url()?;
        let provider = evm::connect(&rpc_url);

        if let Some(expected) = config.network.chain_id {
            let actual = provider
                .get_chain_id()
                .await
                .map_err(|e| ChainError::Rpc(format!("eth_chainId: {e}")))?;
            if actual != expected {
                return Err(ConfigError::InvalidValue {
                    field: "network.chain_id",
                    reason: format!("node reports chain {actual}, expected {expected}"),
                }
                .into());
            }
        }

        let signers = build_signers(&config, &rpc_url)?;
        let oracle = build_oracle(&config)?;
        let (metrics, prometheus) = build_metrics(&config)?;

        let mut markets: Vec<(MarketKey, Vec<Box<dyn Keeper>>)> = Vec::new();
        for market in &config.markets {
            let ports = build_market_ports(
                &config,
                market,
                &provider,
                &signers,
                oracle.clone(),
                Arc::clone(&metrics),
            )?;
            let keepers = build_keepers(&config, market, &ports)?;
            markets.push((MarketKey::new(market.key.clone()), keepers));
        }

        let from_block = config.keeper.from_block;
        info!(from_block, markets = markets.len(), "Building initial indexes");
        let heads = try_join_all(
            markets
                .iter_mut()
                .flat_map(|(_, keepers)| keepers.iter_mut())
                .map(|keeper| keeper.rebuild(from_block)),
        )
        .await
        .inspect_err(|e| error!(error = %e, "Initial index rebuild failed"))?;
        let last_seen = heads.into_iter().min().unwrap_or(from_block);

        let _pusher = match (prometheus, config.metrics.push_gateway.clone()) {
            (Some(metrics), Some(gateway)) => Some(spawn_metrics_push(
                metrics,
                gateway,
                config.metrics.job.clone(),
                Duration::from_secs(config.metrics.push_interval_secs),
            )),
            _ => None,
        };

        // Head polling is market independent; any market's chain view works.
        let head_source = match config.markets.first() {
            Some(market) => Arc::new(EvmChain::new(
                provider.clone(),
                parse_address("markets.address", &market.address)?,
            )),
            None => return Err(ConfigError::MissingField { field: "markets" }.into()),
        };
        let mut poller = BlockPoller::new(head_source, config.keeper.poll_interval());

        let mut loops = Vec::with_capacity(markets.len());
        for (key, keepers) in markets {
            let blocks = poller.subscribe();
            loops.push(tokio::spawn(run_market(key, keepers, blocks)));
        }

        info!(block = last_seen, "Keeper running");
        poller.run(last_seen).await;

        for handle in loops {
            if let Err(e) = handle.await {
                warn!(error = %e, "Market loop ended abnormally");
            }
        }
        Ok(())
    }
}

fn spawn_metrics_push(
    metrics: PrometheusMetrics,
    gateway: String,
    job: String,
    interval: Duration,
) -> JoinHandle<()> {
    info!(gateway = %gateway, "Pushing metrics");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let (metrics, gateway, job) = (metrics.clone(), gateway.clone(), job.clone());
            match tokio::task::spawn_blocking(move || metrics.push(&gateway, &job)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Metrics push failed"),
                Err(e) => warn!(error = %e, "Metrics push task failed"),
            }
        }
    })
}
