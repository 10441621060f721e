//! Stack termination

use rollstack_core::domain::deployment::{DeploymentStatus, DeploymentStep};
use rollstack_core::domain::integration::{IntegrationStatus, IntegrationType};
use rollstack_core::domain::stack::StackStatus;
use rollstack_core::dto::stack::Accepted;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::terminate_task_id;
use crate::ingest::TailTarget;
use crate::service::integration::{install_task_id, uninstall_task_id};
use crate::repository::IntegrationFilter;
use crate::scheduler::Task;
use crate::service::{Context, ServiceResult, new_deployment, transitions};

const INTERRUPTED: &str = "termination interrupted";

/// Integrations torn down together with the stack
///
/// Registrations live on chain and are never touched.
fn teardown_filter() -> IntegrationFilter {
    IntegrationFilter::new()
        .except_type(IntegrationType::RegisterCandidate)
        .except_type(IntegrationType::RegisterMetadataDao)
        .except_status(IntegrationStatus::Terminated)
}

/// Destroy the infrastructure of a stack
pub async fn terminate_stack(ctx: &Context, id: Uuid) -> ServiceResult<Accepted> {
    let stack = ctx.stack(id).await?;
    transitions::check_terminate(stack.status)?;

    ctx.repos
        .stacks
        .update_status(id, StackStatus::Terminating, None)
        .await?;

    for kind in IntegrationType::ALL.into_iter().filter(|k| !k.is_registration()) {
        ctx.scheduler.stop_task(&install_task_id(kind, id));
        ctx.scheduler.stop_task(&uninstall_task_id(kind, id));
    }

    let task_ctx = ctx.clone();
    let panic_ctx = ctx.clone();
    let task = Task::new(terminate_task_id(id), move |token| async move {
        if let Err(e) = run(&task_ctx, id, token).await {
            fail(&task_ctx, id, &format!("{e:#}")).await;
        }
    })
    .on_panic(move |message| async move {
        fail(&panic_ctx, id, &message).await;
    });

    if let Err(e) = ctx.scheduler.add_task(task) {
        fail(ctx, id, &e.to_string()).await;
        return Err(e.into());
    }

    info!("Termination of stack {} scheduled", id);
    Ok(Accepted { id })
}

async fn run(ctx: &Context, id: Uuid, token: CancellationToken) -> anyhow::Result<()> {
    let stack = ctx.stack(id).await?;
    let log_path = ctx.log_path(id, "destroy");

    let deployment = new_deployment(
        id,
        DeploymentStep::DestroyChain,
        DeploymentStatus::InProgress,
        &log_path,
        serde_json::Value::Null,
    );
    ctx.repos.deployments.create(&deployment).await?;

    ctx.repos
        .integrations
        .update_statuses_by_stack(id, IntegrationStatus::Terminating, &teardown_filter())
        .await?;

    let client = match ctx.driver.connect(ctx.session(&stack, &log_path)).await {
        Ok(client) => client,
        Err(e) => {
            finish_deployment(ctx, deployment.id, DeploymentStatus::Failed).await;
            return Err(e.into());
        }
    };

    let tail = ctx.tailer.spawn(
        TailTarget {
            stack_id: id,
            deployment_id: deployment.id,
            path: log_path,
        },
        &token,
    );

    let result = tokio::select! {
        _ = token.cancelled() => None,
        result = client.destroy_aws_infrastructure() => Some(result),
    };

    tail.finish().await;

    match result {
        None => {
            finish_deployment(ctx, deployment.id, DeploymentStatus::Stopped).await;
            anyhow::bail!(INTERRUPTED);
        }
        Some(Err(e)) => {
            finish_deployment(ctx, deployment.id, DeploymentStatus::Failed).await;
            Err(e.into())
        }
        Some(Ok(())) => {
            ctx.repos
                .stacks
                .update_status(id, StackStatus::Terminated, None)
                .await?;
            let terminated = ctx
                .repos
                .integrations
                .update_statuses_by_stack(id, IntegrationStatus::Terminated, &teardown_filter())
                .await?;
            finish_deployment(ctx, deployment.id, DeploymentStatus::Success).await;

            info!(
                "Stack {} terminated with {} integrations",
                id, terminated
            );
            Ok(())
        }
    }
}

async fn finish_deployment(ctx: &Context, deployment_id: Uuid, status: DeploymentStatus) {
    if let Err(e) = ctx
        .repos
        .deployments
        .update_status(deployment_id, status)
        .await
    {
        error!(
            "Failed to mark destroy deployment {} as {}: {:#}",
            deployment_id, status, e
        );
    }
}

/// Leave the stack retryable through another termination
async fn fail(ctx: &Context, id: Uuid, reason: &str) {
    warn!("Termination of stack {} failed: {}", id, reason);

    if let Err(e) = ctx
        .repos
        .stacks
        .update_status(id, StackStatus::FailedToTerminate, Some(reason))
        .await
    {
        error!("Failed to mark stack {} as failed to terminate: {:#}", id, e);
    }
}
