//! Infrastructure configuration modules.

pub mod keeper;
pub mod logging;
pub mod market;
pub mod settings;

pub use keeper::{KeeperConfig, PrioritizerConfig};
pub use logging::LoggingConfig;
pub use market::{
    parse_address, require_address, ContractsConfig, MarketConfig, OracleConfig, PolicyKind,
};
pub use settings::{Config, MetricsConfig, NetworkConfig, PRIVATE_KEYS_ENV};
