//! Integration Service
//!
//! Every add-on follows the same two-phase protocol. The request path checks
//! the stack, writes a `Pending` row and schedules a task; the task moves the
//! row through `InProgress` (or `Terminating` on uninstall), records a
//! deployment for the step, tails the driver's log and persists the outcome.
//!
//! What differs per add-on lives behind [`IntegrationHandler`]. The generic
//! [`Installer`] runs the protocol for any handler, and the free functions at
//! the bottom dispatch requests to the right one.

mod block_explorer;
mod bridge;
mod candidate;
mod metadata;
mod monitoring;

pub use block_explorer::BlockExplorer;
pub use bridge::Bridge;
pub use candidate::CandidateRegistration;
pub use metadata::MetadataRegistration;
pub use monitoring::Monitoring;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use rollstack_core::domain::deployment::{DeploymentStatus, DeploymentStep};
use rollstack_core::domain::integration::{IntegrationStatus, IntegrationType};
use rollstack_core::domain::stack::StackMetadata;
use rollstack_core::dto::integration::{InstallRequest, MetadataDaoRegistration};
use rollstack_core::dto::stack::Accepted;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{Context, ServiceError, ServiceResult, new_deployment, new_integration, transitions};
use crate::driver::{DriverClient, DriverResult};
use crate::ingest::{TailHandle, TailTarget};
use crate::scheduler::Task;

/// Per add-on behaviour plugged into the shared install protocol
#[async_trait]
pub trait IntegrationHandler: Send + Sync + 'static {
    /// Install request payload
    type Params: Serialize + Send + Sync + 'static;

    /// What a successful install reports
    type Info: Serialize + Send + Sync + 'static;

    const KIND: IntegrationType;
    const INSTALL_STEP: DeploymentStep;

    /// `None` for add-ons that cannot be removed once installed
    const UNINSTALL_STEP: Option<DeploymentStep>;

    /// Check the request, possibly filling in defaults
    fn validate(&self, params: Self::Params) -> ServiceResult<Self::Params> {
        Ok(params)
    }

    /// Whether an active row in `status` may be replaced by a new install
    fn supersedes(&self, _status: IntegrationStatus) -> bool {
        false
    }

    async fn install(
        &self,
        client: &dyn DriverClient,
        params: &Self::Params,
    ) -> DriverResult<Self::Info>;

    async fn uninstall(&self, _client: &dyn DriverClient) -> DriverResult<()> {
        Ok(())
    }

    /// Write the install result into the stack metadata, or clear it on `None`
    fn project(&self, _metadata: &mut StackMetadata, _info: Option<&Self::Info>) {}
}

/// Display name with its first letter upper-cased
fn title(kind: IntegrationType) -> String {
    let name = kind.display_name();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn install_task_id(kind: IntegrationType, stack_id: Uuid) -> String {
    format!("install-{kind}-{stack_id}")
}

pub fn uninstall_task_id(kind: IntegrationType, stack_id: Uuid) -> String {
    format!("uninstall-{kind}-{stack_id}")
}

fn to_json<T: Serialize>(value: &T) -> ServiceResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| ServiceError::Internal(e.to_string()))
}

// =============================================================================
// Installer
// =============================================================================

/// Runs the install protocol for one handler
pub struct Installer<H> {
    ctx: Context,
    handler: Arc<H>,
}

impl<H> Clone for Installer<H> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

/// Rows a running install or uninstall reports to
#[derive(Debug, Clone)]
struct Run {
    stack_id: Uuid,
    integration_id: Uuid,
    deployment_id: Uuid,
    log_path: PathBuf,
}

impl<H: IntegrationHandler> Installer<H> {
    pub fn new(ctx: Context, handler: H) -> Self {
        Self {
            ctx,
            handler: Arc::new(handler),
        }
    }

    pub async fn install(&self, stack_id: Uuid, params: H::Params) -> ServiceResult<Accepted> {
        let stack = self.ctx.stack(stack_id).await?;
        transitions::check_install(stack.status)?;
        let params = self.handler.validate(params)?;

        let already_active =
            || ServiceError::bad_request(format!("There is already an active {}", H::KIND.display_name()));

        if let Some(active) = self
            .ctx
            .repos
            .integrations
            .get_active(stack_id, H::KIND)
            .await?
        {
            if !self.handler.supersedes(active.status) {
                return Err(already_active());
            }
            info!(
                "Replacing {} integration {} of stack {} in status {}",
                H::KIND,
                active.id,
                stack_id,
                active.status
            );
            self.ctx
                .repos
                .integrations
                .update_status(active.id, IntegrationStatus::Terminated, None)
                .await?;
        }

        let log_path = self.ctx.log_path(stack_id, H::INSTALL_STEP.as_str());
        let row = new_integration(stack_id, H::KIND, serde_json::json!({}), &log_path);
        if let Err(e) = self.ctx.repos.integrations.create(&row).await {
            return Err(if e.is_conflict() { already_active() } else { e.into() });
        }

        let run = Run {
            stack_id,
            integration_id: row.id,
            deployment_id: Uuid::new_v4(),
            log_path,
        };
        let task = self.install_task(run.clone(), params);
        self.schedule(task, &run).await?;

        info!("{} install for stack {} scheduled", H::KIND, stack_id);
        Ok(Accepted { id: row.id })
    }

    pub async fn uninstall(&self, stack_id: Uuid) -> ServiceResult<Accepted> {
        self.ctx.stack(stack_id).await?;

        let Some(step) = H::UNINSTALL_STEP else {
            return Err(ServiceError::bad_request(format!(
                "{} cannot be uninstalled",
                title(H::KIND)
            )));
        };

        let row = self
            .ctx
            .repos
            .integrations
            .get_installed(stack_id, H::KIND)
            .await?
            .ok_or_else(|| {
                ServiceError::not_found(format!("{} integration not found", title(H::KIND)))
            })?;

        self.ctx
            .repos
            .integrations
            .update_status(row.id, IntegrationStatus::Pending, None)
            .await?;

        let run = Run {
            stack_id,
            integration_id: row.id,
            deployment_id: Uuid::new_v4(),
            log_path: self.ctx.log_path(stack_id, step.as_str()),
        };
        let task = self.uninstall_task(run.clone(), step);
        self.schedule(task, &run).await?;

        info!("{} uninstall for stack {} scheduled", H::KIND, stack_id);
        Ok(Accepted { id: row.id })
    }

    async fn schedule(&self, task: Task, run: &Run) -> ServiceResult<()> {
        if let Err(e) = self.ctx.scheduler.add_task(task) {
            self.fail(run, &e.to_string()).await;
            return Err(e.into());
        }
        Ok(())
    }

    fn install_task(&self, run: Run, params: H::Params) -> Task {
        let installer = self.clone();
        let guard = self.clone();
        let panic_run = run.clone();

        Task::new(install_task_id(H::KIND, run.stack_id), move |token| async move {
            if let Err(e) = installer.run_install(&run, &params, token).await {
                installer.fail(&run, &format!("{e:#}")).await;
            }
        })
        .on_panic(move |message| async move {
            guard.fail(&panic_run, &message).await;
        })
    }

    fn uninstall_task(&self, run: Run, step: DeploymentStep) -> Task {
        let installer = self.clone();
        let guard = self.clone();
        let panic_run = run.clone();

        Task::new(uninstall_task_id(H::KIND, run.stack_id), move |token| async move {
            if let Err(e) = installer.run_uninstall(&run, step, token).await {
                installer.fail(&run, &format!("{e:#}")).await;
            }
        })
        .on_panic(move |message| async move {
            guard.fail(&panic_run, &message).await;
        })
    }

    async fn run_install(
        &self,
        run: &Run,
        params: &H::Params,
        token: CancellationToken,
    ) -> anyhow::Result<()> {
        let repos = &self.ctx.repos;
        let config = to_json(params)?;

        repos
            .integrations
            .update_status(run.integration_id, IntegrationStatus::InProgress, None)
            .await?;

        let mut deployment = new_deployment(
            run.stack_id,
            H::INSTALL_STEP,
            DeploymentStatus::InProgress,
            &run.log_path,
            config.clone(),
        );
        deployment.id = run.deployment_id;
        repos.deployments.create(&deployment).await?;

        let (client, tail) = self.attach(run, &token).await?;
        let result = tokio::select! {
            _ = token.cancelled() => None,
            result = self.handler.install(client.as_ref(), params) => Some(result),
        };
        tail.finish().await;

        let Some(result) = result else {
            self.stop(run).await;
            return Ok(());
        };
        let info = result?;

        let completed = repos
            .integrations
            .complete(run.integration_id, &config, &to_json(&info)?)
            .await?;
        if !completed {
            warn!(
                "{} on stack {} changed status while installing, discarding the result",
                H::KIND,
                run.stack_id
            );
            self.finish_deployment(run, DeploymentStatus::Stopped).await;
            return Ok(());
        }
        self.update_metadata(run.stack_id, Some(&info)).await?;
        self.finish_deployment(run, DeploymentStatus::Success).await;

        info!("{} installed on stack {}", H::KIND, run.stack_id);
        Ok(())
    }

    async fn run_uninstall(
        &self,
        run: &Run,
        step: DeploymentStep,
        token: CancellationToken,
    ) -> anyhow::Result<()> {
        let repos = &self.ctx.repos;

        repos
            .integrations
            .update_status(run.integration_id, IntegrationStatus::Terminating, None)
            .await?;

        let mut deployment = new_deployment(
            run.stack_id,
            step,
            DeploymentStatus::InProgress,
            &run.log_path,
            serde_json::json!({}),
        );
        deployment.id = run.deployment_id;
        repos.deployments.create(&deployment).await?;

        let (client, tail) = self.attach(run, &token).await?;
        let result = tokio::select! {
            _ = token.cancelled() => None,
            result = self.handler.uninstall(client.as_ref()) => Some(result),
        };
        tail.finish().await;

        let Some(result) = result else {
            self.stop(run).await;
            return Ok(());
        };
        result?;

        repos
            .integrations
            .update_status(run.integration_id, IntegrationStatus::Terminated, None)
            .await?;
        self.update_metadata(run.stack_id, None).await?;
        self.finish_deployment(run, DeploymentStatus::Success).await;

        info!("{} uninstalled from stack {}", H::KIND, run.stack_id);
        Ok(())
    }

    /// Connect a driver client for the run and start tailing its log
    async fn attach(
        &self,
        run: &Run,
        token: &CancellationToken,
    ) -> anyhow::Result<(Arc<dyn DriverClient>, TailHandle)> {
        let stack = self.ctx.stack(run.stack_id).await?;
        let client = self
            .ctx
            .driver
            .connect(self.ctx.session(&stack, &run.log_path))
            .await?;

        let tail = self.ctx.tailer.spawn(
            TailTarget {
                stack_id: run.stack_id,
                deployment_id: run.deployment_id,
                path: run.log_path.clone(),
            },
            token,
        );
        Ok((client, tail))
    }

    async fn update_metadata(&self, stack_id: Uuid, info: Option<&H::Info>) -> anyhow::Result<()> {
        let stack = self.ctx.stack(stack_id).await?;
        let before = stack.metadata.unwrap_or_default();
        let mut metadata = before.clone();
        self.handler.project(&mut metadata, info);

        if metadata != before {
            self.ctx
                .repos
                .stacks
                .update_metadata(stack_id, &metadata)
                .await?;
        }
        Ok(())
    }

    async fn finish_deployment(&self, run: &Run, status: DeploymentStatus) {
        match self
            .ctx
            .repos
            .deployments
            .update_status(run.deployment_id, status)
            .await
        {
            Ok(_) => {}
            Err(e) => debug!(
                "Could not mark deployment {} as {}: {:#}",
                run.deployment_id, status, e
            ),
        }
    }

    /// Cancelled work leaves both rows `Stopped`
    async fn stop(&self, run: &Run) {
        info!("{} task for stack {} was cancelled", H::KIND, run.stack_id);
        if let Err(e) = self
            .ctx
            .repos
            .integrations
            .update_status(run.integration_id, IntegrationStatus::Stopped, None)
            .await
        {
            error!("Failed to stop integration {}: {:#}", run.integration_id, e);
        }
        self.finish_deployment(run, DeploymentStatus::Stopped).await;
    }

    /// Record `reason` on the integration and fail its deployment
    async fn fail(&self, run: &Run, reason: &str) {
        warn!("{} task for stack {} failed: {}", H::KIND, run.stack_id, reason);
        if let Err(e) = self
            .ctx
            .repos
            .integrations
            .update_status(run.integration_id, IntegrationStatus::Failed, Some(reason))
            .await
        {
            error!("Failed to fail integration {}: {:#}", run.integration_id, e);
        }
        self.finish_deployment(run, DeploymentStatus::Failed).await;
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Install any add-on
pub async fn install(ctx: &Context, stack_id: Uuid, req: InstallRequest) -> ServiceResult<Accepted> {
    let ctx = ctx.clone();
    match req {
        InstallRequest::Bridge(p) => Installer::new(ctx, Bridge).install(stack_id, p).await,
        InstallRequest::BlockExplorer(p) => {
            Installer::new(ctx, BlockExplorer).install(stack_id, p).await
        }
        InstallRequest::Monitoring(p) => Installer::new(ctx, Monitoring).install(stack_id, p).await,
        InstallRequest::RegisterCandidate(p) => {
            Installer::new(ctx, CandidateRegistration)
                .install(stack_id, p)
                .await
        }
        InstallRequest::RegisterMetadataDao(p) => {
            Installer::new(ctx, MetadataRegistration)
                .install(stack_id, p)
                .await
        }
    }
}

/// Uninstall any add-on by type
pub async fn uninstall(
    ctx: &Context,
    stack_id: Uuid,
    kind: IntegrationType,
) -> ServiceResult<Accepted> {
    let ctx = ctx.clone();
    match kind {
        IntegrationType::Bridge => Installer::new(ctx, Bridge).uninstall(stack_id).await,
        IntegrationType::BlockExplorer => {
            Installer::new(ctx, BlockExplorer).uninstall(stack_id).await
        }
        IntegrationType::Monitoring => Installer::new(ctx, Monitoring).uninstall(stack_id).await,
        IntegrationType::RegisterCandidate => {
            Installer::new(ctx, CandidateRegistration)
                .uninstall(stack_id)
                .await
        }
        IntegrationType::RegisterMetadataDao => {
            Installer::new(ctx, MetadataRegistration)
                .uninstall(stack_id)
                .await
        }
    }
}

/// Stored state of the active metadata registration
pub async fn get_metadata_dao(
    ctx: &Context,
    stack_id: Uuid,
) -> ServiceResult<MetadataDaoRegistration> {
    ctx.stack(stack_id).await?;
    let row = ctx
        .repos
        .integrations
        .get_active(stack_id, IntegrationType::RegisterMetadataDao)
        .await?
        .ok_or_else(|| ServiceError::not_found("Register metadata dao not found"))?;

    Ok(MetadataDaoRegistration {
        config: row.config,
        info: row.info,
    })
}
