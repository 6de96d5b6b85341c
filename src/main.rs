use clap::Parser;
use perps_keeper::adapter::inbound::cli::{check, run, Cli, Commands};
use perps_keeper::infrastructure::config::Config;
use tracing::error;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    match Cli::parse().command() {
        Commands::CheckConfig(args) => {
            if let Err(e) = check::execute_config(&args.config) {
                eprintln!("Invalid config: {e}");
                std::process::exit(1);
            }
        }
        Commands::Run(args) => {
            let config = match Config::load(&args.config) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("Failed to load config: {e}");
                    std::process::exit(1);
                }
            };

            config.init_logging();

            if let Err(e) = run::execute(config).await {
                error!(error = %e, "Fatal error");
                std::process::exit(1);
            }
        }
    }
}
