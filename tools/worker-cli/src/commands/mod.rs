//! CLI command implementations.

pub mod config;
pub mod manifest;
pub mod replay;

use clap::{Args, Subcommand};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration.
    Show,
    /// Write a default config file.
    Init {
        /// Where to write it (default: worker.toml).
        path: Option<String>,

        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}

/// Arguments for the replay command.
#[derive(Args)]
pub struct ReplayArgs {
    /// Path to the TOML replay script.
    pub script: String,
}
