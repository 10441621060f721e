//! Stack command handlers

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use rollstack_client::RollstackClient;
use rollstack_core::domain::stack::Stack;
use rollstack_core::dto::stack::{DeployStackRequest, UpdateNetworkRequest};

use super::display;
use crate::config::Config;
use crate::id_resolver::resolve_stack_id;

/// Stack subcommands
#[derive(Subcommand)]
pub enum StackCommands {
    /// List all stacks
    List,
    /// Show stack details
    Get {
        /// Stack ID or unambiguous prefix
        id: String,
    },
    /// Show the current status of a stack
    Status {
        /// Stack ID or unambiguous prefix
        id: String,
    },
    /// Create a stack from a JSON deploy request and start deploying it
    Deploy {
        /// Path to the deploy request
        file: PathBuf,
    },
    /// Stop a running deployment
    Stop {
        /// Stack ID or unambiguous prefix
        id: String,
    },
    /// Resume a stopped or failed deployment
    Resume {
        /// Stack ID or unambiguous prefix
        id: String,
    },
    /// Destroy the infrastructure of a stack
    Terminate {
        /// Stack ID or unambiguous prefix
        id: String,
    },
    /// Point a deployed stack at new L1 endpoints
    UpdateNetwork {
        /// Stack ID or unambiguous prefix
        id: String,

        #[arg(long)]
        l1_rpc_url: String,

        #[arg(long)]
        l1_beacon_url: String,
    },
}

pub async fn handle_stack_command(command: StackCommands, config: &Config) -> Result<()> {
    let client = RollstackClient::new(&config.orchestrator_url);

    match command {
        StackCommands::List => list_stacks(&client).await,
        StackCommands::Get { id } => get_stack(&client, &id).await,
        StackCommands::Status { id } => {
            let id = resolve_stack_id(&client, &id).await?;
            let status = client.get_stack_status(id).await?;
            println!("{}", display::stack_status(status.status));
            if let Some(reason) = status.reason {
                println!("{}", reason.red());
            }
            Ok(())
        }
        StackCommands::Deploy { file } => {
            let req: DeployStackRequest = super::read_json(&file).await?;
            let accepted = client.create_stack(&req).await?;
            display::accepted("Deployment scheduled for stack", accepted.id);
            Ok(())
        }
        StackCommands::Stop { id } => {
            let id = resolve_stack_id(&client, &id).await?;
            display::accepted("Stopping stack", client.stop_stack(id).await?.id);
            Ok(())
        }
        StackCommands::Resume { id } => {
            let id = resolve_stack_id(&client, &id).await?;
            display::accepted("Resuming stack", client.resume_stack(id).await?.id);
            Ok(())
        }
        StackCommands::Terminate { id } => {
            let id = resolve_stack_id(&client, &id).await?;
            display::accepted("Terminating stack", client.terminate_stack(id).await?.id);
            Ok(())
        }
        StackCommands::UpdateNetwork {
            id,
            l1_rpc_url,
            l1_beacon_url,
        } => {
            let id = resolve_stack_id(&client, &id).await?;
            let req = UpdateNetworkRequest {
                l1_rpc_url,
                l1_beacon_url,
            };
            display::accepted("Updating network of stack", client.update_network(id, &req).await?.id);
            Ok(())
        }
    }
}

async fn list_stacks(client: &RollstackClient) -> Result<()> {
    let stacks = client.list_stacks().await?;

    if stacks.is_empty() {
        println!("{}", "No stacks found.".yellow());
        return Ok(());
    }

    println!("{}", format!("Found {} stack(s):", stacks.len()).bold());
    println!();
    for stack in stacks {
        println!("  {} {} {}", "▸".cyan(), stack.name.bold(), stack.id.to_string().dimmed());
        println!("    Network: {}", stack.network);
        println!("    Status:  {}", display::stack_status(stack.status));
        println!();
    }
    Ok(())
}

async fn get_stack(client: &RollstackClient, id: &str) -> Result<()> {
    let id = resolve_stack_id(client, id).await?;
    let stack = client.get_stack(id).await?;
    print_stack_details(&stack);
    Ok(())
}

fn print_stack_details(stack: &Stack) {
    println!("{}", "Stack Details:".bold());
    println!("  ID:       {}", stack.id.to_string().cyan());
    println!("  Name:     {}", stack.name);
    println!("  Type:     {}", stack.stack_type);
    println!("  Network:  {}", stack.network);
    println!("  Status:   {}", display::stack_status(stack.status));
    if let Some(reason) = &stack.reason {
        println!("  Reason:   {}", reason.red());
    }
    println!(
        "  Created:  {}",
        stack.created_at.format("%Y-%m-%d %H:%M:%S")
    );

    if let Some(metadata) = &stack.metadata {
        println!("\n{}", "Endpoints:".bold());
        let endpoints = [
            ("L2 RPC", &metadata.l2_rpc_url),
            ("Bridge", &metadata.bridge_url),
            ("Explorer", &metadata.explorer_url),
            ("Grafana", &metadata.grafana_url),
        ];
        for (name, url) in endpoints {
            if let Some(url) = url {
                println!("  {:<9} {}", format!("{name}:"), url);
            }
        }
    }

    println!("\n{}", "Config:".bold());
    match serde_json::to_string_pretty(&stack.config) {
        Ok(pretty) => println!("{}", pretty),
        Err(_) => println!("{}", stack.config),
    }
}
