//! Network update of a deployed stack

use rollstack_core::domain::stack::StackStatus;
use rollstack_core::dto::stack::{Accepted, UpdateNetworkRequest};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::update_network_task_id;
use crate::scheduler::Task;
use crate::service::{Context, ServiceResult, transitions, validation};

const INTERRUPTED: &str = "network update interrupted";

/// Point a deployed stack at new L1 endpoints
pub async fn update_network(
    ctx: &Context,
    id: Uuid,
    req: UpdateNetworkRequest,
) -> ServiceResult<Accepted> {
    let stack = ctx.stack(id).await?;
    transitions::check_update_network(stack.status)?;
    validation::validate_update_network(&req)?;

    ctx.repos
        .stacks
        .update_status(id, StackStatus::Updating, None)
        .await?;

    let panic_ctx = ctx.clone();
    let task_ctx = ctx.clone();
    let task = Task::new(update_network_task_id(id), move |token| async move {
        let outcome = run(&task_ctx, id, &req, token).await;
        finish(&task_ctx, id, outcome).await;
    })
    .on_panic(move |message| async move {
        finish(&panic_ctx, id, Err(anyhow::anyhow!(message))).await;
    });

    if let Err(e) = ctx.scheduler.add_task(task) {
        finish(ctx, id, Err(anyhow::anyhow!(e.to_string()))).await;
        return Err(e.into());
    }

    info!("Network update of stack {} scheduled", id);
    Ok(Accepted { id })
}

async fn run(
    ctx: &Context,
    id: Uuid,
    req: &UpdateNetworkRequest,
    token: CancellationToken,
) -> anyhow::Result<()> {
    let stack = ctx.stack(id).await?;
    let log_path = ctx.log_path(id, "update-network");
    let client = ctx.driver.connect(ctx.session(&stack, &log_path)).await?;

    tokio::select! {
        _ = token.cancelled() => anyhow::bail!(INTERRUPTED),
        result = client.update_network(req) => result?,
    }

    let mut config = stack.config;
    if let Some(fields) = config.as_object_mut() {
        fields.insert("l1RpcUrl".to_string(), req.l1_rpc_url.clone().into());
        fields.insert("l1BeaconUrl".to_string(), req.l1_beacon_url.clone().into());
    }
    ctx.repos.stacks.update_config(id, &config).await?;

    Ok(())
}

/// `Deployed` on success, `FailedToUpdate` with the reason otherwise
async fn finish(ctx: &Context, id: Uuid, outcome: anyhow::Result<()>) {
    let result = match outcome {
        Ok(()) => {
            info!("Network of stack {} updated", id);
            ctx.repos
                .stacks
                .update_status(id, StackStatus::Deployed, None)
                .await
        }
        Err(e) => {
            warn!("Network update of stack {} failed: {:#}", id, e);
            ctx.repos
                .stacks
                .update_status(id, StackStatus::FailedToUpdate, Some(&e.to_string()))
                .await
        }
    };

    if let Err(e) = result {
        error!("Failed to record network update of stack {}: {:#}", id, e);
    }
}
