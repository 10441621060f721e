//! Deployment API Handlers

use axum::{
    extract::{Query, State, rejection::QueryRejection},
    response::Response,
};
use rollstack_core::domain::deployment::Deployment;
use rollstack_core::dto::log::{LogPage, LogQuery};
use rollstack_core::dto::stack::DeploymentStatusView;
use uuid::Uuid;

use crate::api::error::{ApiJson, ApiResult, ok};
use crate::api::extract::ApiPath;
use crate::api::file;
use crate::service::{Context, query};

/// GET /{id}/deployments
pub async fn list_deployments(
    State(ctx): State<Context>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiJson<Vec<Deployment>> {
    tracing::debug!("Listing deployments of stack {}", id);
    ok(query::list_deployments(&ctx, id).await?)
}

/// GET /{id}/deployments/{did}
pub async fn get_deployment(
    State(ctx): State<Context>,
    ApiPath((id, deployment_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiJson<Deployment> {
    ok(query::get_deployment(&ctx, id, deployment_id).await?)
}

/// GET /{id}/deployments/{did}/status
pub async fn get_deployment_status(
    State(ctx): State<Context>,
    ApiPath((id, deployment_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiJson<DeploymentStatusView> {
    ok(query::get_deployment_status(&ctx, id, deployment_id).await?)
}

/// GET /{id}/deployments/{did}/logs
/// Page through the ingested log lines of one deployment
pub async fn get_deployment_logs(
    State(ctx): State<Context>,
    ApiPath((id, deployment_id)): ApiPath<(Uuid, Uuid)>,
    params: Result<Query<LogQuery>, QueryRejection>,
) -> ApiJson<LogPage> {
    let Query(params) = params?;
    ok(query::deployment_logs(&ctx, id, deployment_id, params).await?)
}

/// GET /{id}/deployments/{did}/logs/download
/// Stream the raw log file of one deployment
pub async fn download_deployment_logs(
    State(ctx): State<Context>,
    ApiPath((id, deployment_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Response> {
    let path = query::deployment_log_file(&ctx, id, deployment_id).await?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{deployment_id}.txt"));

    file::attachment(&path, &filename, "text/plain; charset=utf-8").await
}
