//! Integration command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use rollstack_client::RollstackClient;
use rollstack_core::domain::integration::{Integration, IntegrationType};
use rollstack_core::dto::integration::InstallRequest;

use super::display;
use crate::config::Config;
use crate::id_resolver::{resolve_integration_id, resolve_stack_id};

/// Integration subcommands
#[derive(Subcommand)]
pub enum IntegrationCommands {
    /// List the active integrations of a stack
    List {
        /// Stack ID or unambiguous prefix
        stack: String,
    },
    /// Show one integration
    Get {
        /// Stack ID or unambiguous prefix
        stack: String,
        /// Integration ID or unambiguous prefix
        id: String,
    },
    /// Install an add-on
    Install {
        /// Stack ID or unambiguous prefix
        stack: String,
        /// bridge, block-explorer, monitoring, register-candidate or register-metadata-dao
        kind: String,
        /// JSON file with the install parameters
        file: Option<PathBuf>,
    },
    /// Remove an add-on
    Uninstall {
        /// Stack ID or unambiguous prefix
        stack: String,
        kind: String,
    },
    /// Show the metadata registration of a stack
    Metadata {
        /// Stack ID or unambiguous prefix
        stack: String,
    },
}

fn parse_kind(raw: &str) -> Result<IntegrationType> {
    raw.parse()
        .with_context(|| format!("Unsupported integration type: {raw}"))
}

pub async fn handle_integration_command(
    command: IntegrationCommands,
    config: &Config,
) -> Result<()> {
    let client = RollstackClient::new(&config.orchestrator_url);

    match command {
        IntegrationCommands::List { stack } => {
            let stack_id = resolve_stack_id(&client, &stack).await?;
            let integrations = client.list_integrations(stack_id).await?;

            if integrations.is_empty() {
                println!("{}", "No integrations found.".yellow());
                return Ok(());
            }
            for integration in &integrations {
                print_integration_summary(integration);
            }
            Ok(())
        }
        IntegrationCommands::Get { stack, id } => {
            let stack_id = resolve_stack_id(&client, &stack).await?;
            let id = resolve_integration_id(&client, stack_id, &id).await?;
            let integration = client.get_integration(stack_id, id).await?;

            print_integration_summary(&integration);
            if let Some(reason) = &integration.reason {
                println!("    Reason: {}", reason.red());
            }
            println!("{}", "Info:".bold());
            println!("{}", serde_json::to_string_pretty(&integration.info)?);
            Ok(())
        }
        IntegrationCommands::Install { stack, kind, file } => {
            let stack_id = resolve_stack_id(&client, &stack).await?;
            let kind = parse_kind(&kind)?;
            let params = match file {
                Some(path) => super::read_json(&path).await?,
                None => serde_json::Value::Null,
            };
            let req = InstallRequest::from_parts(kind, params)
                .with_context(|| format!("Invalid parameters for {kind}"))?;

            let accepted = client.install_integration(stack_id, &req).await?;
            display::accepted(&format!("Installing {kind} as"), accepted.id);
            Ok(())
        }
        IntegrationCommands::Uninstall { stack, kind } => {
            let stack_id = resolve_stack_id(&client, &stack).await?;
            let kind = parse_kind(&kind)?;
            let accepted = client.uninstall_integration(stack_id, kind).await?;
            display::accepted(&format!("Uninstalling {kind} from"), accepted.id);
            Ok(())
        }
        IntegrationCommands::Metadata { stack } => {
            let stack_id = resolve_stack_id(&client, &stack).await?;
            match client.get_metadata_dao(stack_id).await {
                Ok(registration) => {
                    println!("{}", serde_json::to_string_pretty(&registration)?);
                    Ok(())
                }
                Err(e) if e.is_not_found() => {
                    println!("{}", "No metadata registration.".yellow());
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}

fn print_integration_summary(integration: &Integration) {
    println!(
        "  {} {} {}",
        "▸".cyan(),
        integration.integration_type.to_string().bold(),
        integration.id.to_string().dimmed()
    );
    println!(
        "    Status: {}",
        display::integration_status(integration.status)
    );
    if let Some(url) = integration.info.get("url").and_then(|u| u.as_str()) {
        println!("    URL:    {}", url);
    }
}
