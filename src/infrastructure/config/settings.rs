//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all settings.
//! Configuration is loaded from a TOML file; signer keys are read from the
//! `KEEPER_PRIVATE_KEYS` environment variable and never from the file.
//!
//! # Example
//!
//! ```no_run
//! use perps_keeper::infrastructure::config::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use url::Url;

use super::keeper::{KeeperConfig, PrioritizerConfig};
use super::logging::LoggingConfig;
use super::market::{
    parse_address, require_address, ContractsConfig, MarketConfig, OracleConfig, PolicyKind,
};
use crate::adapter::outbound::evm::market_key_bytes;
use crate::domain::MarketKey;
use crate::error::{ConfigError, Result};

/// Environment variable holding comma-separated signer keys.
pub const PRIVATE_KEYS_ENV: &str = "KEEPER_PRIVATE_KEYS";

/// `[network]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: String,
    /// Expected chain id; checked against the node at startup when set.
    #[serde(default)]
    pub chain_id: Option<u64>,
}

/// `[metrics]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Prometheus push gateway URL. Metrics are only collected when unset.
    pub push_gateway: Option<String>,
    pub push_interval_secs: u64,
    pub job: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            push_gateway: None,
            push_interval_secs: 15,
            job: "perps-keeper".into(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub keeper: KeeperConfig,

    #[serde(default)]
    pub prioritizer: PrioritizerConfig,

    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub contracts: ContractsConfig,

    #[serde(default)]
    pub markets: Vec<MarketConfig>,

    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Signer keys from the environment.
    #[serde(skip)]
    pub private_keys: Option<String>,
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or validation fails.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;

        config.private_keys = std::env::var(PRIVATE_KEYS_ENV)
            .ok()
            .filter(|keys| !keys.trim().is_empty());

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML is malformed or
    /// validation fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Initialize logging from the `[logging]` section.
    pub fn init_logging(&self) {
        self.logging.init();
    }

    /// Parsed RPC endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse.
    pub fn rpc_url(&self) -> Result<Url> {
        Url::parse(self.network.rpc_url.trim()).map_err(|e| {
            ConfigError::InvalidValue {
                field: "network.rpc_url",
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Whether any market runs the delayed off-chain order policy.
    #[must_use]
    pub fn runs_offchain_orders(&self) -> bool {
        self.markets
            .iter()
            .any(|m| m.runs(PolicyKind::DelayedOffchain))
    }

    fn validate(&self) -> Result<()> {
        if self.network.rpc_url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "network.rpc_url",
            }
            .into());
        }
        self.rpc_url()?;

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::InvalidValue {
                field: "logging.format",
                reason: "must be \"pretty\" or \"json\"".to_string(),
            }
            .into());
        }

        self.validate_keeper()?;
        self.validate_markets()?;

        if self.runs_offchain_orders() {
            match self.oracle.endpoint.as_deref() {
                Some(endpoint) if !endpoint.trim().is_empty() => {
                    Url::parse(endpoint).map_err(|e| ConfigError::InvalidValue {
                        field: "oracle.endpoint",
                        reason: e.to_string(),
                    })?;
                }
                _ => {
                    return Err(ConfigError::MissingField {
                        field: "oracle.endpoint",
                    }
                    .into())
                }
            }
            require_address(
                "contracts.market_settings",
                self.contracts.market_settings.as_deref(),
            )?;
            require_address("contracts.pyth", self.contracts.pyth.as_deref())?;
        }

        if self.metrics.enabled {
            if let Some(gateway) = &self.metrics.push_gateway {
                Url::parse(gateway).map_err(|e| ConfigError::InvalidValue {
                    field: "metrics.push_gateway",
                    reason: e.to_string(),
                })?;
                if self.metrics.push_interval_secs == 0 {
                    return Err(ConfigError::InvalidValue {
                        field: "metrics.push_interval_secs",
                        reason: "must be greater than 0".to_string(),
                    }
                    .into());
                }
            }
        }

        Ok(())
    }

    fn validate_keeper(&self) -> Result<()> {
        let keeper = &self.keeper;
        if keeper.max_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "keeper.max_batch_size",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if keeper.max_block_range == 0 {
            return Err(ConfigError::InvalidValue {
                field: "keeper.max_block_range",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if keeper.block_poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "keeper.block_poll_interval_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        let threshold = self.prioritizer.proximity_threshold;
        if threshold <= Decimal::ZERO || threshold > Decimal::ONE {
            return Err(ConfigError::InvalidValue {
                field: "prioritizer.proximity_threshold",
                reason: "must be in (0, 1]".to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn validate_markets(&self) -> Result<()> {
        if self.markets.is_empty() {
            return Err(ConfigError::MissingField { field: "markets" }.into());
        }

        let mut seen = HashSet::new();
        for market in &self.markets {
            if !seen.insert(market.key.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "markets.key",
                    reason: format!("duplicate market {}", market.key),
                }
                .into());
            }
            market_key_bytes(&MarketKey::new(market.key.clone()))?;
            if market.base_asset.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: "markets.base_asset",
                }
                .into());
            }
            parse_address("markets.address", &market.address)?;

            if market.policies().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "markets.policies",
                    reason: format!("{} runs no policy", market.key),
                }
                .into());
            }
            let has_feed = market
                .price_feed_id
                .as_deref()
                .is_some_and(|id| !id.trim().is_empty());
            if market.runs(PolicyKind::DelayedOffchain) && !has_feed {
                return Err(ConfigError::MissingField {
                    field: "markets.price_feed_id",
                }
                .into());
            }
        }
        Ok(())
    }
}
