//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod deployment;
mod display;
mod integration;
mod logs;
mod stack;

pub use deployment::DeploymentCommands;
pub use integration::IntegrationCommands;
pub use stack::StackCommands;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::de::DeserializeOwned;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Stack lifecycle and queries
    Stack {
        #[command(subcommand)]
        command: StackCommands,
    },
    /// Deployment steps of a stack
    Deployment {
        #[command(subcommand)]
        command: DeploymentCommands,
    },
    /// Add-ons installed on a stack
    Integration {
        #[command(subcommand)]
        command: IntegrationCommands,
    },
    /// Show the logs of a stack or one of its deployments
    Logs {
        /// Stack ID or unambiguous prefix
        stack: String,

        /// Deployment ID or prefix; all deployments when omitted
        #[arg(short, long)]
        deployment: Option<String>,

        /// Number of lines to show
        #[arg(short = 'n', long, default_value_t = 100)]
        limit: u32,

        /// Keep polling for new lines
        #[arg(short, long)]
        follow: bool,
    },
}

/// Route a command to its handler module
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Stack { command } => stack::handle_stack_command(command, config).await,
        Commands::Deployment { command } => {
            deployment::handle_deployment_command(command, config).await
        }
        Commands::Integration { command } => {
            integration::handle_integration_command(command, config).await
        }
        Commands::Logs {
            stack,
            deployment,
            limit,
            follow,
        } => logs::show_logs(config, &stack, deployment.as_deref(), limit, follow).await,
    }
}

/// Read a JSON request body from a file
async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}
