//! Worker CLI - Command line tool for the intercepting worker router.
//!
//! Commands:
//! - `worker config` - Manage configuration
//! - `worker manifest` - Show the cache generation and manifest
//! - `worker replay` - Run a request script against the in-memory host

mod commands;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{ConfigArgs, ReplayArgs};

/// Worker CLI - Inspect and exercise the intercepting worker
#[derive(Parser)]
#[command(name = "worker")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config(ConfigArgs),

    /// Show the cache generation and pre-warmed assets
    Manifest,

    /// Run a request script against an in-memory worker
    Replay(ReplayArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Setup output formatting
    let output = output::Output::new(cli.verbose, cli.json);

    // Load config
    let config_path = cli.config.as_deref();
    let ctx = context::Context::load(config_path, output)?;

    // Execute command
    let result = match cli.command {
        Commands::Config(args) => commands::config::run(args, &ctx).await,
        Commands::Manifest => commands::manifest::run(&ctx).await,
        Commands::Replay(args) => commands::replay::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
