//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Keeper for perpetual futures markets
#[derive(Parser, Debug)]
#[command(name = "perps-keeper")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// The subcommand to run; `run` with the default config when omitted.
    pub fn command(self) -> Commands {
        self.command
            .unwrap_or_else(|| Commands::Run(ConfigPathArg::default()))
    }
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the keeper until interrupted
    Run(ConfigPathArg),

    /// Validate the configuration file and exit
    CheckConfig(ConfigPathArg),
}

/// Shared argument for commands that only need a configuration path.
#[derive(Parser, Debug)]
pub struct ConfigPathArg {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,
}

impl Default for ConfigPathArg {
    fn default() -> Self {
        Self {
            config: PathBuf::from("config.toml"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_defaults_to_run() {
        let cli = Cli::parse_from(["perps-keeper"]);
        match cli.command() {
            Commands::Run(args) => assert_eq!(args.config, PathBuf::from("config.toml")),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn check_config_takes_a_path() {
        let cli = Cli::parse_from(["perps-keeper", "check-config", "--config", "keeper.toml"]);
        match cli.command() {
            Commands::CheckConfig(args) => assert_eq!(args.config, PathBuf::from("keeper.toml")),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
