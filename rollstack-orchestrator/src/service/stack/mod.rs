//! Stack Service
//!
//! Lifecycle operations on stacks. Each operation checks the current status,
//! writes the acknowledgement synchronously and schedules the work as a task
//! named after the operation and the stack.

mod deploy;
mod network;
mod terminate;

pub use network::update_network;
pub use terminate::terminate_stack;

use std::path::Path;

use chrono::Utc;
use rollstack_core::domain::deployment::{Deployment, DeploymentStatus, DeploymentStep};
use rollstack_core::domain::integration::{IntegrationStatus, IntegrationType};
use rollstack_core::domain::stack::{Stack, StackStatus, StackType};
use rollstack_core::dto::stack::{
    Accepted, DeployInfraConfig, DeployL1ContractsConfig, DeployStackRequest,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    Context, ServiceError, ServiceResult, new_deployment, new_integration, paths, transitions,
    validation,
};
use crate::repository::{IntegrationFilter, RepositoryResult};
use crate::scheduler::SchedulerError;

pub fn deploy_task_id(stack_id: Uuid) -> String {
    format!("deploy-stack-{stack_id}")
}

pub fn update_network_task_id(stack_id: Uuid) -> String {
    format!("update-network-{stack_id}")
}

pub fn terminate_task_id(stack_id: Uuid) -> String {
    format!("terminate-stack-{stack_id}")
}

/// Create a stack and schedule its deployment
pub async fn create_stack(ctx: &Context, req: DeployStackRequest) -> ServiceResult<Accepted> {
    validation::validate_deploy_request(&req)?;

    let id = Uuid::new_v4();
    let stack_type = StackType::OptimisticRollup;
    let deployment_path = paths::deployment_path(&ctx.storage_root, stack_type, req.network, id);
    let now = Utc::now();

    let stack = Stack {
        id,
        name: req.chain_name.clone(),
        stack_type,
        network: req.network,
        config: serde_json::to_value(&req).map_err(|e| ServiceError::Internal(e.to_string()))?,
        deployment_path: deployment_path.to_string_lossy().into_owned(),
        metadata: None,
        status: StackStatus::Pending,
        reason: None,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };

    let deployments = plan_deployments(ctx, id, &req, &[])?;
    let mut integrations = vec![new_integration(
        id,
        IntegrationType::Bridge,
        serde_json::json!({}),
        Path::new(""),
    )];
    if let Some(params) = candidate_params(&req) {
        integrations.push(new_integration(
            id,
            IntegrationType::RegisterCandidate,
            params,
            Path::new(""),
        ));
    }

    ctx.repos
        .stacks
        .create_with_related(&stack, &deployments, &integrations)
        .await?;

    info!(
        "Stack {} created with {} deployment steps",
        id,
        deployments.len()
    );

    schedule_deploy(ctx, id).await?;
    Ok(Accepted { id })
}

/// Cancel a running deployment
pub async fn stop_stack(ctx: &Context, id: Uuid) -> ServiceResult<Accepted> {
    let stack = ctx.stack(id).await?;
    transitions::check_stop(stack.status)?;

    if !ctx.scheduler.stop_task(&deploy_task_id(id)) {
        warn!("No deploy task tracked for stack {}", id);
    }

    ctx.repos
        .stacks
        .update_status(id, StackStatus::Stopped, None)
        .await?;
    let stopped = ctx
        .repos
        .deployments
        .update_statuses_by_stack(id, DeploymentStatus::Stopped)
        .await?;
    ctx.repos
        .integrations
        .update_statuses_by_stack(
            id,
            IntegrationStatus::Stopped,
            &IntegrationFilter::new()
                .except_status(IntegrationStatus::Completed)
                .except_status(IntegrationStatus::Terminated),
        )
        .await?;

    info!("Stack {} stopped, {} deployments stopped", id, stopped);
    Ok(Accepted { id })
}

/// Redeploy a stopped or failed stack from where it left off
pub async fn resume_stack(ctx: &Context, id: Uuid) -> ServiceResult<Accepted> {
    let stack = ctx.stack(id).await?;
    transitions::check_resume(stack.status)?;

    let req = stored_request(&stack)?;
    let existing = ctx.repos.deployments.list_by_stack(id, None).await?;

    // Leftovers of the interrupted attempt never run
    for deployment in existing.iter().filter(|d| {
        d.status == DeploymentStatus::Pending && d.step.deploy_order().is_some()
    }) {
        ctx.repos
            .deployments
            .update_status(deployment.id, DeploymentStatus::Stopped)
            .await?;
    }

    let deployments = plan_deployments(ctx, id, &req, &existing)?;
    for deployment in &deployments {
        ctx.repos.deployments.create(deployment).await?;
    }

    if ctx
        .repos
        .integrations
        .get_active(id, IntegrationType::Bridge)
        .await?
        .is_none()
    {
        ctx.repos
            .integrations
            .create(&new_integration(
                id,
                IntegrationType::Bridge,
                serde_json::json!({}),
                Path::new(""),
            ))
            .await?;
    }

    if let Some(params) = candidate_params(&req) {
        let active = ctx
            .repos
            .integrations
            .get_active(id, IntegrationType::RegisterCandidate)
            .await?;
        if active.is_none() {
            ctx.repos
                .integrations
                .create(&new_integration(
                    id,
                    IntegrationType::RegisterCandidate,
                    params,
                    Path::new(""),
                ))
                .await?;
        }
    }

    ctx.repos
        .stacks
        .update_status(id, StackStatus::Pending, None)
        .await?;

    info!(
        "Stack {} resumed with {} remaining steps",
        id,
        deployments.len()
    );

    schedule_deploy(ctx, id).await?;
    Ok(Accepted { id })
}

// =============================================================================
// Helper Functions
// =============================================================================

/// The deploy request the stack was created with
pub(crate) fn stored_request(stack: &Stack) -> ServiceResult<DeployStackRequest> {
    serde_json::from_value(stack.config.clone()).map_err(|e| {
        ServiceError::Internal(format!("stack {} has an unreadable config: {e}", stack.id))
    })
}

fn candidate_params(req: &DeployStackRequest) -> Option<serde_json::Value> {
    if !req.register_candidate {
        return None;
    }
    req.register_candidate_params
        .as_ref()
        .and_then(|params| serde_json::to_value(params).ok())
}

/// Fresh `Pending` rows for the deploy steps still to run
///
/// The contracts step is skipped once it succeeded. Infrastructure is always
/// provisioned again.
fn plan_deployments(
    ctx: &Context,
    stack_id: Uuid,
    req: &DeployStackRequest,
    existing: &[Deployment],
) -> ServiceResult<Vec<Deployment>> {
    let contracts_done = existing.iter().any(|d| {
        d.step == DeploymentStep::DeployL1Contracts && d.status == DeploymentStatus::Success
    });

    let to_value = |v: serde_json::Result<serde_json::Value>| {
        v.map_err(|e| ServiceError::Internal(e.to_string()))
    };

    let mut planned = Vec::with_capacity(2);
    if !contracts_done {
        let step = DeploymentStep::DeployL1Contracts;
        planned.push(new_deployment(
            stack_id,
            step,
            DeploymentStatus::Pending,
            &ctx.log_path(stack_id, step.as_str()),
            to_value(serde_json::to_value(DeployL1ContractsConfig::from(req)))?,
        ));
    }

    let step = DeploymentStep::DeployAwsInfra;
    planned.push(new_deployment(
        stack_id,
        step,
        DeploymentStatus::Pending,
        &ctx.log_path(stack_id, step.as_str()),
        to_value(serde_json::to_value(DeployInfraConfig::from(req)))?,
    ));

    Ok(planned)
}

async fn schedule_deploy(ctx: &Context, id: Uuid) -> ServiceResult<()> {
    if let Err(e) = ctx.scheduler.add_task(deploy::deploy_task(ctx.clone(), id)) {
        record_deploy_rejection(ctx, id, &e).await;
        return Err(e.into());
    }
    Ok(())
}

/// Leave a stack the scheduler refused in a resumable state
async fn record_deploy_rejection(ctx: &Context, id: Uuid, err: &SchedulerError) {
    let reason = err.to_string();
    let result: RepositoryResult<u64> = async {
        ctx.repos
            .stacks
            .update_status(id, StackStatus::Deploying, None)
            .await?;
        ctx.repos
            .stacks
            .update_status(id, StackStatus::FailedToDeploy, Some(&reason))
            .await?;
        ctx.repos
            .deployments
            .update_statuses_by_stack(id, DeploymentStatus::Stopped)
            .await
    }
    .await;

    if let Err(e) = result {
        error!("Failed to record rejected deployment of stack {}: {:#}", id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_ids() {
        let id = Uuid::nil();
        assert_eq!(
            deploy_task_id(id),
            "deploy-stack-00000000-0000-0000-0000-000000000000"
        );
        assert!(update_network_task_id(id).starts_with("update-network-"));
        assert!(terminate_task_id(id).starts_with("terminate-stack-"));
    }
}
