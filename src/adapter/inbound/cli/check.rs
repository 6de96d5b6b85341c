//! Handler for the `check-config` command.

use std::path::Path;

use crate::error::Result;
use crate::infrastructure::config::{Config, PRIVATE_KEYS_ENV};

/// Validate a configuration file without connecting to anything.
pub fn execute_config<P: AsRef<Path>>(config_path: P) -> Result<()> {
    let path = config_path.as_ref();
    let config = Config::load(path)?;

    println!("Configuration file is valid: {}", path.display());
    println!("  RPC:      {}", config.network.rpc_url);
    if let Some(chain_id) = config.network.chain_id {
        println!("  Chain ID: {chain_id}");
    }
    for market in &config.markets {
        let policies: Vec<String> = market.policies().iter().map(ToString::to_string).collect();
        println!("  Market:   {} ({})", market.key, policies.join(", "));
    }
    if config.private_keys.is_none() {
        println!(
            "  Warning:  {PRIVATE_KEYS_ENV} is not set, the keeper cannot submit transactions"
        );
    }

    Ok(())
}
