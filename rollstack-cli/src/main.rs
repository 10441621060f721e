//! Rollstack CLI
//!
//! Command-line interface for operating stacks through the Rollstack
//! orchestrator.

mod commands;
mod config;
mod id_resolver;
mod types;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "rollstack")]
#[command(about = "Rollup stack deployment CLI", long_about = None)]
struct Cli {
    /// Orchestrator URL
    #[arg(long, env = "ROLLSTACK_URL", default_value = "http://localhost:8000")]
    orchestrator_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        orchestrator_url: cli.orchestrator_url,
    };

    handle_command(cli.command, &config).await
}
