//! Markets, contract addresses and the off-chain price service.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::Address;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Keeper policies a market can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    Liquidation,
    DelayedOffchain,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Liquidation => write!(f, "liquidation"),
            Self::DelayedOffchain => write!(f, "delayed_offchain"),
        }
    }
}

/// One `[[markets]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    /// Market key as registered in the settings contract, e.g. `sETHPERP`.
    pub key: String,
    pub base_asset: String,
    pub address: String,
    /// Pyth feed id, required for `delayed_offchain`.
    #[serde(default)]
    pub price_feed_id: Option<String>,
    #[serde(default)]
    pub policies: Option<Vec<PolicyKind>>,
}

impl MarketConfig {
    /// Policies to run: the configured list, or every policy the market has
    /// configuration for.
    #[must_use]
    pub fn policies(&self) -> Vec<PolicyKind> {
        match &self.policies {
            Some(policies) => policies.clone(),
            None if self.price_feed_id.is_some() => {
                vec![PolicyKind::Liquidation, PolicyKind::DelayedOffchain]
            }
            None => vec![PolicyKind::Liquidation],
        }
    }

    #[must_use]
    pub fn runs(&self, policy: PolicyKind) -> bool {
        self.policies().contains(&policy)
    }
}

/// `[contracts]` section: addresses shared by all markets.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContractsConfig {
    #[serde(default)]
    pub market_settings: Option<String>,
    #[serde(default)]
    pub pyth: Option<String>,
}

/// `[oracle]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
    pub max_retries: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: 3000,
            max_retries: 5,
        }
    }
}

impl OracleConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Parse a hex address, naming `field` on failure.
pub fn parse_address(field: &'static str, value: &str) -> Result<Address> {
    Address::from_str(value.trim()).map_err(|e| {
        ConfigError::InvalidValue {
            field,
            reason: format!("{value}: {e}"),
        }
        .into()
    })
}

/// Parse an optional address that `field` requires.
pub fn require_address(field: &'static str, value: Option<&str>) -> Result<Address> {
    match value {
        Some(v) if !v.trim().is_empty() => parse_address(field, v),
        _ => Err(ConfigError::MissingField { field }.into()),
    }
}
