use std::io::Write;

use perps_keeper::error::{ConfigError, Error};
use perps_keeper::infrastructure::config::{Config, PolicyKind};
use rust_decimal_macros::dec;
use tempfile::NamedTempFile;

const MARKET: &str = "0x2B3bb4c683BFc5239B029131EEf3B1d214478d93";

fn write_temp_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

fn liquidation_only() -> String {
    format!(
        r#"
[network]
rpc_url = "http://localhost:8545"

[[markets]]
key = "sETHPERP"
base_asset = "sETH"
address = "{MARKET}"
"#
    )
}

#[test]
fn minimal_config_gets_defaults() {
    let file = write_temp_config(&liquidation_only());
    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.keeper.max_batch_size, 4);
    assert_eq!(config.keeper.batch_wait_ms, 1000);
    assert_eq!(config.keeper.max_block_range, 10_000);
    assert_eq!(config.keeper.max_exec_attempts, 10);
    assert_eq!(config.prioritizer.proximity_threshold, dec!(0.05));
    assert_eq!(config.prioritizer.max_far_updates, 1);
    assert_eq!(config.logging.format, "pretty");
    assert!(config.metrics.enabled);
    assert_eq!(config.metrics.push_gateway, None);
    assert_eq!(config.markets[0].policies(), vec![PolicyKind::Liquidation]);
    assert!(!config.runs_offchain_orders());
}

#[test]
fn full_config_parses() {
    let toml = format!(
        r#"
[network]
rpc_url = "http://localhost:8545"
chain_id = 10

[logging]
level = "debug"
format = "json"

[keeper]
from_block = 52456507
max_batch_size = 2
batch_wait_ms = 250
confirmations = 2

[prioritizer]
proximity_threshold = "0.1"
max_far_updates = 3

[oracle]
endpoint = "https://hermes.pyth.network"
timeout_ms = 1500

[contracts]
market_settings = "0x09793Aad1518B8d8CC72FDd356479E3CBa7B4Ad1"
pyth = "0xff1a0f4744e8582DF1aE09D5611b887B6a12925C"

[metrics]
push_gateway = "http://localhost:9091"
push_interval_secs = 30

[[markets]]
key = "sETHPERP"
base_asset = "sETH"
address = "{MARKET}"
price_feed_id = "0xff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace"
"#
    );
    let file = write_temp_config(&toml);
    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.network.chain_id, Some(10));
    assert_eq!(config.keeper.from_block, 52_456_507);
    assert_eq!(config.keeper.engine().dispatch.max_batch_size, 2);
    assert_eq!(config.prioritizer.priority().proximity_threshold, dec!(0.1));
    assert_eq!(config.oracle.max_retries, 5);
    assert_eq!(config.metrics.push_interval_secs, 30);
    assert_eq!(
        config.markets[0].policies(),
        vec![PolicyKind::Liquidation, PolicyKind::DelayedOffchain]
    );
    assert!(config.runs_offchain_orders());
}

#[test]
fn missing_file_is_a_read_error() {
    let result = Config::load("/nonexistent/perps-keeper.toml");
    assert!(matches!(result, Err(Error::Config(ConfigError::ReadFile(_)))));
}

#[test]
fn no_markets_is_rejected() {
    let file = write_temp_config(
        r#"
[network]
rpc_url = "http://localhost:8545"
"#,
    );
    match Config::load(file.path()) {
        Err(Error::Config(ConfigError::MissingField { field: "markets" })) => {}
        other => panic!("Expected missing markets, got {other:?}"),
    }
}

#[test]
fn zero_batch_size_is_rejected() {
    let toml = format!("[keeper]\nmax_batch_size = 0\n{}", liquidation_only());
    let file = write_temp_config(&toml);
    match Config::load(file.path()) {
        Err(Error::Config(ConfigError::InvalidValue {
            field: "keeper.max_batch_size",
            ..
        })) => {}
        other => panic!("Expected invalid batch size, got {other:?}"),
    }
}

#[test]
fn offchain_policy_needs_price_service() {
    let toml = format!(
        r#"
[network]
rpc_url = "http://localhost:8545"

[[markets]]
key = "sETHPERP"
base_asset = "sETH"
address = "{MARKET}"
price_feed_id = "0xff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace"
"#
    );
    let file = write_temp_config(&toml);
    match Config::load(file.path()) {
        Err(Error::Config(ConfigError::MissingField {
            field: "oracle.endpoint",
        })) => {}
        other => panic!("Expected missing oracle endpoint, got {other:?}"),
    }
}

#[test]
fn bad_market_address_is_rejected() {
    let toml = liquidation_only().replace(MARKET, "0x1234");
    let file = write_temp_config(&toml);
    match Config::load(file.path()) {
        Err(Error::Config(ConfigError::InvalidValue {
            field: "markets.address",
            ..
        })) => {}
        other => panic!("Expected invalid address, got {other:?}"),
    }
}

#[test]
fn duplicate_markets_are_rejected() {
    let toml = format!(
        "{}\n[[markets]]\nkey = \"sETHPERP\"\nbase_asset = \"sETH\"\naddress = \"{MARKET}\"\n",
        liquidation_only()
    );
    let file = write_temp_config(&toml);
    match Config::load(file.path()) {
        Err(Error::Config(ConfigError::InvalidValue {
            field: "markets.key",
            ..
        })) => {}
        other => panic!("Expected duplicate market, got {other:?}"),
    }
}

#[test]
fn unknown_log_format_is_rejected() {
    let toml = format!("[logging]\nformat = \"xml\"\n{}", liquidation_only());
    let file = write_temp_config(&toml);
    match Config::load(file.path()) {
        Err(Error::Config(ConfigError::InvalidValue {
            field: "logging.format",
            ..
        })) => {}
        other => panic!("Expected invalid log format, got {other:?}"),
    }
}
