//! Handler for the `run` command.

use tokio::signal;
use tracing::info;

use crate::error::Result;
use crate::infrastructure::config::Config;
use crate::infrastructure::Orchestrator;

/// Run the keeper until it stops or a shutdown signal arrives.
///
/// Logging must already be initialised from `config`.
pub async fn execute(config: Config) -> Result<()> {
    info!(
        markets = config.markets.len(),
        chain_id = config.network.chain_id,
        "perps-keeper starting"
    );

    tokio::select! {
        result = Orchestrator::run(config) => result?,
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    info!("perps-keeper stopped");
    Ok(())
}
