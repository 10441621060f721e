//! The deploy task
//!
//! Runs the pending deploy steps of one stack in order. Step statuses flow
//! through a channel to a single writer so every status of one run is
//! persisted in the order it was produced.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use rollstack_core::domain::deployment::{Deployment, DeploymentStatus, DeploymentStep};
use rollstack_core::domain::integration::{IntegrationStatus, IntegrationType};
use rollstack_core::domain::stack::{Stack, StackMetadata, StackStatus};
use rollstack_core::dto::stack::{DeployInfraConfig, DeployL1ContractsConfig, DeployStackRequest};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{deploy_task_id, stored_request};
use crate::driver::{ChainInformation, DriverClient, DriverError, DriverResult};
use crate::ingest::TailTarget;
use crate::repository::{DeploymentRepository, RepositoryError};
use crate::scheduler::Task;
use crate::service::Context;

/// One status write for the writer task
#[derive(Debug)]
struct StatusUpdate {
    deployment_id: Uuid,
    status: DeploymentStatus,
}

/// How a run of the step sequence ended
#[derive(Debug)]
enum Outcome {
    /// `last` is the log of the final step that ran, if any
    Completed { last: Option<TailTarget> },
    Cancelled,
    Failed(String),
}

pub(super) fn deploy_task(ctx: Context, stack_id: Uuid) -> Task {
    let panic_ctx = ctx.clone();

    Task::new(deploy_task_id(stack_id), move |token| async move {
        if let Err(e) = run(&ctx, stack_id, token).await {
            record_failure(&ctx, stack_id, &format!("{e:#}")).await;
        }
    })
    .on_panic(move |message| async move {
        record_failure(&panic_ctx, stack_id, &message).await;
    })
}

/// Every error returned here fails the stack
async fn run(ctx: &Context, stack_id: Uuid, token: CancellationToken) -> anyhow::Result<()> {
    match ctx
        .repos
        .stacks
        .update_status(stack_id, StackStatus::Deploying, None)
        .await
    {
        Ok(()) => {}
        Err(RepositoryError::InvalidTransition { from, .. }) => {
            // Stopped or terminated before the task got to run
            warn!("Stack {} is {}, skipping its deployment", stack_id, from);
            return Ok(());
        }
        Err(e) => return Err(e).context("failed to mark stack as deploying"),
    }

    let stack = ctx.stack(stack_id).await?;
    let request = stored_request(&stack)?;

    let mut steps: Vec<Deployment> = ctx
        .repos
        .deployments
        .list_by_stack(stack_id, Some(DeploymentStatus::Pending))
        .await?
        .into_iter()
        .filter(|d| d.step.deploy_order().is_some())
        .collect();
    steps.sort_by_key(|d| d.step.deploy_order());

    info!("Deploying stack {} in {} steps", stack_id, steps.len());

    let (tx, rx) = mpsc::channel(16);
    let writer = tokio::spawn(write_statuses(ctx.repos.deployments.clone(), rx));

    let outcome = run_steps(ctx, &stack, &steps, &tx, &token).await;

    drop(tx);
    if let Err(e) = writer.await {
        error!("Status writer of stack {} failed: {}", stack_id, e);
    }

    match outcome {
        Outcome::Completed { last } => {
            ctx.repos
                .stacks
                .update_status(stack_id, StackStatus::Deployed, None)
                .await?;
            info!("Stack {} deployed", stack_id);

            publish_chain(ctx, &stack, &request, last, &token).await;
        }
        Outcome::Cancelled => {
            info!("Deployment of stack {} stopped", stack_id);
            // A stop request records its own outcome and the stack may
            // already be resumed. Only a shutdown leaves it to this task.
            if ctx.scheduler.is_shutting_down() {
                ctx.repos
                    .stacks
                    .update_status(stack_id, StackStatus::Stopped, None)
                    .await?;
                ctx.repos
                    .deployments
                    .update_statuses_by_stack(stack_id, DeploymentStatus::Stopped)
                    .await?;
            }
        }
        Outcome::Failed(reason) => record_failure(ctx, stack_id, &reason).await,
    }

    Ok(())
}

/// Run every step in order until one fails or the token is cancelled
async fn run_steps(
    ctx: &Context,
    stack: &Stack,
    steps: &[Deployment],
    tx: &mpsc::Sender<StatusUpdate>,
    token: &CancellationToken,
) -> Outcome {
    let mut last = None;

    for step in steps {
        if token.is_cancelled() {
            return Outcome::Cancelled;
        }

        let log_path = PathBuf::from(&step.log_path);
        let report = |status: DeploymentStatus| {
            let update = StatusUpdate {
                deployment_id: step.id,
                status,
            };
            async move {
                if tx.send(update).await.is_err() {
                    warn!("Status writer is gone, dropping {} for {}", status, step.id);
                }
            }
        };

        let client = match ctx.driver.connect(ctx.session(stack, &log_path)).await {
            Ok(client) => client,
            Err(e) => {
                report(DeploymentStatus::Failed).await;
                return Outcome::Failed(e.to_string());
            }
        };

        let target = TailTarget {
            stack_id: stack.id,
            deployment_id: step.id,
            path: log_path.clone(),
        };
        let tail = ctx.tailer.spawn(target.clone(), token);

        report(DeploymentStatus::InProgress).await;
        info!("Running step {} of stack {}", step.step, stack.id);

        let result = tokio::select! {
            _ = token.cancelled() => None,
            result = run_step(client.as_ref(), step) => Some(result),
        };

        tail.finish().await;

        match result {
            None => {
                report(DeploymentStatus::Stopped).await;
                return Outcome::Cancelled;
            }
            Some(Err(e)) => {
                error!("Step {} of stack {} failed: {:#}", step.step, stack.id, e);
                report(DeploymentStatus::Failed).await;
                return Outcome::Failed(e.to_string());
            }
            Some(Ok(())) => {
                report(DeploymentStatus::Success).await;
                last = Some(target);
            }
        }
    }

    Outcome::Completed { last }
}

async fn run_step(client: &dyn DriverClient, step: &Deployment) -> DriverResult<()> {
    match step.step {
        DeploymentStep::DeployL1Contracts => {
            let config: DeployL1ContractsConfig = serde_json::from_value(step.config.clone())?;
            client.deploy_l1_contracts(&config).await
        }
        DeploymentStep::DeployAwsInfra => {
            let config: DeployInfraConfig = serde_json::from_value(step.config.clone())?;
            client.deploy_aws_infrastructure(&config).await
        }
        other => Err(DriverError::operation(
            "deploy",
            format!("{other} is not a deploy step"),
        )),
    }
}

async fn write_statuses(
    deployments: Arc<dyn DeploymentRepository>,
    mut rx: mpsc::Receiver<StatusUpdate>,
) {
    while let Some(update) = rx.recv().await {
        match deployments
            .update_status(update.deployment_id, update.status)
            .await
        {
            Ok(true) => debug!("Deployment {} is {}", update.deployment_id, update.status),
            Ok(false) => debug!(
                "Deployment {} already finished, ignoring {}",
                update.deployment_id, update.status
            ),
            Err(e) => error!(
                "Failed to write status {} of deployment {}: {:#}",
                update.status, update.deployment_id, e
            ),
        }
    }
}

/// Fail the stack, stop what never ran and fail the candidate registration
///
/// The bridge integration is left as it is.
async fn record_failure(ctx: &Context, stack_id: Uuid, reason: &str) {
    warn!("Deployment of stack {} failed: {}", stack_id, reason);

    if let Err(e) = ctx
        .repos
        .stacks
        .update_status(stack_id, StackStatus::FailedToDeploy, Some(reason))
        .await
    {
        error!("Failed to mark stack {} as failed: {:#}", stack_id, e);
    }

    if let Err(e) = ctx
        .repos
        .deployments
        .update_statuses_by_stack(stack_id, DeploymentStatus::Stopped)
        .await
    {
        error!("Failed to stop remaining steps of stack {}: {:#}", stack_id, e);
    }

    match ctx
        .repos
        .integrations
        .get_active(stack_id, IntegrationType::RegisterCandidate)
        .await
    {
        Ok(Some(candidate)) => {
            if let Err(e) = ctx
                .repos
                .integrations
                .update_status(
                    candidate.id,
                    IntegrationStatus::Failed,
                    Some(reason),
                )
                .await
            {
                error!("Failed to fail candidate registration of {}: {:#}", stack_id, e);
            }
        }
        Ok(None) => {}
        Err(e) => error!("Failed to load candidate registration of {}: {:#}", stack_id, e),
    }
}

/// Record what the driver reports about the freshly deployed chain
///
/// The driver's output lands in the last step's log and is ingested from
/// where that step's tail stopped. Failures here are logged only. The stack
/// stays `Deployed`.
async fn publish_chain(
    ctx: &Context,
    stack: &Stack,
    request: &DeployStackRequest,
    last: Option<TailTarget>,
    token: &CancellationToken,
) {
    let log_path = last
        .as_ref()
        .map(|target| target.path.clone())
        .unwrap_or_else(|| ctx.log_path(stack.id, "information"));

    let client = match ctx.driver.connect(ctx.session(stack, &log_path)).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to connect driver for stack {}: {:#}", stack.id, e);
            return;
        }
    };

    let tail = match last {
        Some(target) => {
            let start = tokio::fs::metadata(&target.path)
                .await
                .map(|m| m.len())
                .unwrap_or(0);
            Some(ctx.tailer.spawn_at(target, start, token))
        }
        None => None,
    };

    let chain = client.show_chain_information().await;
    if let Some(tail) = tail {
        tail.finish().await;
    }

    let chain = match chain {
        Ok(chain) => chain,
        Err(e) => {
            error!("Failed to read chain information of {}: {:#}", stack.id, e);
            return;
        }
    };

    let metadata = chain_metadata(stack, &chain);
    if let Err(e) = ctx.repos.stacks.update_metadata(stack.id, &metadata).await {
        error!("Failed to store metadata of stack {}: {:#}", stack.id, e);
    }

    if let Err(e) = complete_bridge(ctx, stack.id, &chain.bridge_url).await {
        error!("Failed to complete bridge of stack {}: {:#}", stack.id, e);
    }

    if let Err(e) = complete_candidate(ctx, stack.id, client.as_ref(), request).await {
        error!("Failed to complete candidate registration of {}: {:#}", stack.id, e);
    }
}

fn chain_metadata(stack: &Stack, chain: &ChainInformation) -> StackMetadata {
    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());

    StackMetadata {
        layer1: Some(stack.network.layer1_name().to_string()),
        layer2: Some("Thanos Stack".to_string()),
        l2_rpc_url: non_empty(&chain.l2_rpc_url),
        l1_chain_id: Some(chain.l1_chain_id),
        l2_chain_id: Some(chain.l2_chain_id),
        bridge_url: non_empty(&chain.bridge_url),
        explorer_url: non_empty(&chain.block_explorer_url),
        grafana_url: stack.metadata.as_ref().and_then(|m| m.grafana_url.clone()),
        monitoring_url: non_empty(&chain.monitoring_url),
        rollup_config_url: non_empty(&chain.rollup_config_url),
    }
}

async fn complete_bridge(ctx: &Context, stack_id: Uuid, url: &str) -> anyhow::Result<()> {
    let Some(bridge) = ctx
        .repos
        .integrations
        .get_active(stack_id, IntegrationType::Bridge)
        .await?
    else {
        debug!("Stack {} has no bridge integration to complete", stack_id);
        return Ok(());
    };

    if url.is_empty() {
        ctx.repos
            .integrations
            .update_status(
                bridge.id,
                IntegrationStatus::Failed,
                Some("bridge url is empty"),
            )
            .await?;
        anyhow::bail!("bridge url is empty");
    }

    ctx.repos
        .integrations
        .complete(
            bridge.id,
            &bridge.config,
            &serde_json::json!({ "url": url }),
        )
        .await?;
    Ok(())
}

async fn complete_candidate(
    ctx: &Context,
    stack_id: Uuid,
    client: &dyn DriverClient,
    request: &DeployStackRequest,
) -> anyhow::Result<()> {
    let Some(params) = request
        .register_candidate_params
        .as_ref()
        .filter(|_| request.register_candidate)
    else {
        return Ok(());
    };

    let Some(candidate) = ctx
        .repos
        .integrations
        .get_active(stack_id, IntegrationType::RegisterCandidate)
        .await?
    else {
        return Ok(());
    };

    match client.register_candidate_info(params).await {
        Ok(info) => {
            ctx.repos
                .integrations
                .complete(candidate.id, &serde_json::to_value(params)?, &info)
                .await?;
            Ok(())
        }
        Err(e) => {
            ctx.repos
                .integrations
                .update_status(
                    candidate.id,
                    IntegrationStatus::Failed,
                    Some(&e.to_string()),
                )
                .await?;
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rollstack_core::domain::stack::{Network, StackType};

    fn stack(network: Network) -> Stack {
        Stack {
            id: Uuid::new_v4(),
            name: "chain".to_string(),
            stack_type: StackType::OptimisticRollup,
            network,
            config: serde_json::Value::Null,
            deployment_path: String::new(),
            metadata: None,
            status: StackStatus::Deploying,
            reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_chain_metadata_names_layers() {
        let chain = ChainInformation {
            l2_rpc_url: "http://l2".to_string(),
            bridge_url: "http://bridge".to_string(),
            block_explorer_url: String::new(),
            rollup_config_url: "rollup.json".to_string(),
            l1_chain_id: 1,
            l2_chain_id: 111_551_119,
            monitoring_url: String::new(),
        };

        let metadata = chain_metadata(&stack(Network::Mainnet), &chain);
        assert_eq!(metadata.layer1.as_deref(), Some("Ethereum"));
        assert_eq!(metadata.layer2.as_deref(), Some("Thanos Stack"));
        assert_eq!(metadata.bridge_url.as_deref(), Some("http://bridge"));
        assert_eq!(metadata.explorer_url, None);
        assert_eq!(metadata.l2_chain_id, Some(111_551_119));

        let metadata = chain_metadata(&stack(Network::Testnet), &chain);
        assert_eq!(metadata.layer1.as_deref(), Some("Ethereum Sepolia"));
    }
}
