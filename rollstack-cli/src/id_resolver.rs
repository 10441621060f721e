//! ID resolver module
//!
//! Resolves UUID prefixes to full UUIDs by querying the API, so users can
//! type short, unambiguous prefixes instead of full ids.

use anyhow::{Context, Result, anyhow};
use rollstack_client::RollstackClient;
use uuid::Uuid;

use crate::types::IdOrPrefix;

/// Pick the single id matching `wanted` among `candidates`
fn pick(kind: &str, wanted: &IdOrPrefix, candidates: impl IntoIterator<Item = Uuid>) -> Result<Uuid> {
    let matches: Vec<Uuid> = candidates.into_iter().filter(|id| wanted.matches(*id)).collect();

    match matches.as_slice() {
        [] => Err(anyhow!("No {} found with ID starting with '{}'", kind, wanted)),
        [id] => Ok(*id),
        _ => {
            let ids: Vec<String> = matches.iter().map(Uuid::to_string).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple {}s: {}",
                wanted,
                kind,
                ids.join(", ")
            ))
        }
    }
}

/// Resolve a stack ID or prefix to a full UUID
pub async fn resolve_stack_id(client: &RollstackClient, input: &str) -> Result<Uuid> {
    let wanted = IdOrPrefix::parse(input);
    if let IdOrPrefix::Full(uuid) = wanted {
        return Ok(uuid);
    }

    let stacks = client
        .list_stacks()
        .await
        .context("Failed to fetch stacks for ID resolution")?;
    pick("stack", &wanted, stacks.iter().map(|s| s.id))
}

/// Resolve a deployment ID or prefix within one stack
pub async fn resolve_deployment_id(
    client: &RollstackClient,
    stack_id: Uuid,
    input: &str,
) -> Result<Uuid> {
    let wanted = IdOrPrefix::parse(input);
    if let IdOrPrefix::Full(uuid) = wanted {
        return Ok(uuid);
    }

    let deployments = client
        .list_deployments(stack_id)
        .await
        .context("Failed to fetch deployments for ID resolution")?;
    pick("deployment", &wanted, deployments.iter().map(|d| d.id))
}

/// Resolve an integration ID or prefix within one stack
pub async fn resolve_integration_id(
    client: &RollstackClient,
    stack_id: Uuid,
    input: &str,
) -> Result<Uuid> {
    let wanted = IdOrPrefix::parse(input);
    if let IdOrPrefix::Full(uuid) = wanted {
        return Ok(uuid);
    }

    let integrations = client
        .list_integrations(stack_id)
        .await
        .context("Failed to fetch integrations for ID resolution")?;
    pick("integration", &wanted, integrations.iter().map(|i| i.id))
}
