//! Read-side queries
//!
//! Everything nested under a stack is checked to belong to it, so a foreign
//! id reads as missing.

use std::path::PathBuf;

use rollstack_core::domain::deployment::Deployment;
use rollstack_core::domain::integration::{Integration, IntegrationStatus, IntegrationType};
use rollstack_core::domain::stack::Stack;
use rollstack_core::dto::log::{LogPage, LogQuery};
use rollstack_core::dto::stack::{DeploymentStatusView, StackStatusView};
use uuid::Uuid;

use super::{Context, ServiceError, ServiceResult};
use crate::repository::IntegrationFilter;

/// Config keys never returned to callers
const SECRET_KEYS: [&str; 6] = [
    "adminAccount",
    "sequencerAccount",
    "batcherAccount",
    "proposerAccount",
    "awsAccessKey",
    "awsSecretAccessKey",
];

const REDACTED: &str = "********";

// =============================================================================
// Stacks
// =============================================================================

pub async fn list_stacks(ctx: &Context) -> ServiceResult<Vec<Stack>> {
    let stacks = ctx.repos.stacks.list().await?;
    Ok(stacks.into_iter().map(redact).collect())
}

pub async fn get_stack(ctx: &Context, id: Uuid) -> ServiceResult<Stack> {
    ctx.stack(id).await.map(redact)
}

pub async fn get_stack_status(ctx: &Context, id: Uuid) -> ServiceResult<StackStatusView> {
    let stack = ctx.stack(id).await?;
    Ok(StackStatusView {
        status: stack.status,
        reason: stack.reason,
    })
}

fn redact(mut stack: Stack) -> Stack {
    redact_config(&mut stack.config);
    stack
}

/// Mask every secret key present in a stored config
fn redact_config(config: &mut serde_json::Value) {
    if let Some(fields) = config.as_object_mut() {
        for key in SECRET_KEYS {
            if let Some(value) = fields.get_mut(key) {
                *value = REDACTED.into();
            }
        }
    }
}

// =============================================================================
// Deployments
// =============================================================================

pub async fn list_deployments(ctx: &Context, stack_id: Uuid) -> ServiceResult<Vec<Deployment>> {
    ctx.stack(stack_id).await?;
    let deployments = ctx.repos.deployments.list_by_stack(stack_id, None).await?;
    Ok(deployments.into_iter().map(redact_deployment).collect())
}

pub async fn get_deployment(
    ctx: &Context,
    stack_id: Uuid,
    deployment_id: Uuid,
) -> ServiceResult<Deployment> {
    owned_deployment(ctx, stack_id, deployment_id)
        .await
        .map(redact_deployment)
}

/// The stored deployment, checked to belong to the stack
async fn owned_deployment(
    ctx: &Context,
    stack_id: Uuid,
    deployment_id: Uuid,
) -> ServiceResult<Deployment> {
    ctx.stack(stack_id).await?;
    ctx.repos
        .deployments
        .get(deployment_id)
        .await?
        .filter(|d| d.stack_id == stack_id)
        .ok_or_else(|| ServiceError::not_found("Deployment not found"))
}

fn redact_deployment(mut deployment: Deployment) -> Deployment {
    redact_config(&mut deployment.config);
    deployment
}

pub async fn get_deployment_status(
    ctx: &Context,
    stack_id: Uuid,
    deployment_id: Uuid,
) -> ServiceResult<DeploymentStatusView> {
    let deployment = owned_deployment(ctx, stack_id, deployment_id).await?;
    Ok(DeploymentStatusView {
        status: deployment.status,
    })
}

/// Location of a deployment's log file, checked to exist
pub async fn deployment_log_file(
    ctx: &Context,
    stack_id: Uuid,
    deployment_id: Uuid,
) -> ServiceResult<PathBuf> {
    let deployment = owned_deployment(ctx, stack_id, deployment_id).await?;
    if deployment.log_path.is_empty() {
        return Err(ServiceError::not_found(
            "No log file available for this deployment",
        ));
    }

    let path = PathBuf::from(&deployment.log_path);
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(ServiceError::not_found("Log file not found"));
    }
    Ok(path)
}

// =============================================================================
// Logs
// =============================================================================

pub async fn deployment_logs(
    ctx: &Context,
    stack_id: Uuid,
    deployment_id: Uuid,
    query: LogQuery,
) -> ServiceResult<LogPage> {
    owned_deployment(ctx, stack_id, deployment_id).await?;
    let logs = ctx
        .repos
        .logs
        .page_by_deployment(deployment_id, query.effective_limit(), query.after_id)
        .await?;
    Ok(LogPage::new(logs))
}

pub async fn stack_logs(ctx: &Context, stack_id: Uuid, query: LogQuery) -> ServiceResult<LogPage> {
    ctx.stack(stack_id).await?;
    let logs = ctx
        .repos
        .logs
        .page_by_stack(stack_id, query.effective_limit(), query.after_id)
        .await?;
    Ok(LogPage::new(logs))
}

// =============================================================================
// Integrations
// =============================================================================

/// Active integrations of a stack
///
/// The metadata registration has its own endpoint and is left out.
pub async fn list_integrations(ctx: &Context, stack_id: Uuid) -> ServiceResult<Vec<Integration>> {
    ctx.stack(stack_id).await?;
    let filter = IntegrationFilter::new()
        .except_type(IntegrationType::RegisterMetadataDao)
        .except_status(IntegrationStatus::Terminated);
    Ok(ctx.repos.integrations.list_by_stack(stack_id, &filter).await?)
}

pub async fn get_integration(
    ctx: &Context,
    stack_id: Uuid,
    integration_id: Uuid,
) -> ServiceResult<Integration> {
    ctx.stack(stack_id).await?;
    ctx.repos
        .integrations
        .get(integration_id)
        .await?
        .filter(|i| i.stack_id == stack_id)
        .ok_or_else(|| ServiceError::not_found("Integration not found"))
}

// =============================================================================
// Files
// =============================================================================

/// The rollup config the driver wrote for a deployed stack
pub async fn rollup_config_file(ctx: &Context, stack_id: Uuid) -> ServiceResult<PathBuf> {
    let stack = ctx.stack(stack_id).await?;

    let path = stack
        .metadata
        .and_then(|m| m.rollup_config_url)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| {
            ServiceError::not_found("Rollup config file not available for this stack")
        })?;

    let path = PathBuf::from(path);
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(ServiceError::not_found(
            "Rollup config file not found on filesystem",
        ));
    }
    Ok(path)
}
