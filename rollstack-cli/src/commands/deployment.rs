//! Deployment command handlers

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use rollstack_client::RollstackClient;

use super::display;
use crate::config::Config;
use crate::id_resolver::{resolve_deployment_id, resolve_stack_id};

/// Deployment subcommands
#[derive(Subcommand)]
pub enum DeploymentCommands {
    /// List the deployment steps of a stack
    List {
        /// Stack ID or unambiguous prefix
        stack: String,
    },
    /// Show one deployment step
    Get {
        /// Stack ID or unambiguous prefix
        stack: String,
        /// Deployment ID or unambiguous prefix
        id: String,
    },
}

pub async fn handle_deployment_command(command: DeploymentCommands, config: &Config) -> Result<()> {
    let client = RollstackClient::new(&config.orchestrator_url);

    match command {
        DeploymentCommands::List { stack } => {
            let stack_id = resolve_stack_id(&client, &stack).await?;
            let deployments = client.list_deployments(stack_id).await?;

            if deployments.is_empty() {
                println!("{}", "No deployments found.".yellow());
                return Ok(());
            }
            for deployment in deployments {
                println!(
                    "  {} {:<26} {:<12} {}",
                    "▸".cyan(),
                    deployment.step.to_string(),
                    display::deployment_status(deployment.status),
                    deployment.id.to_string().dimmed()
                );
            }
            Ok(())
        }
        DeploymentCommands::Get { stack, id } => {
            let stack_id = resolve_stack_id(&client, &stack).await?;
            let id = resolve_deployment_id(&client, stack_id, &id).await?;
            let deployment = client.get_deployment(stack_id, id).await?;

            println!("{}", "Deployment Details:".bold());
            println!("  ID:       {}", deployment.id.to_string().cyan());
            println!("  Step:     {}", deployment.step);
            println!("  Status:   {}", display::deployment_status(deployment.status));
            if let Some(started) = deployment.started_at {
                println!("  Started:  {}", started.format("%Y-%m-%d %H:%M:%S"));
            }
            if let Some(finished) = deployment.finished_at {
                println!("  Finished: {}", finished.format("%Y-%m-%d %H:%M:%S"));
                if let Some(started) = deployment.started_at {
                    let seconds = finished.signed_duration_since(started).num_seconds();
                    println!("  Duration: {}s", seconds);
                }
            }
            if !deployment.log_path.is_empty() {
                println!("  Log file: {}", deployment.log_path.dimmed());
            }
            Ok(())
        }
    }
}
