//! Integration API Handlers
//!
//! `{integration}` is an integration id on reads and an integration type on
//! install and uninstall.

use axum::{
    body::Bytes,
    extract::State,
};
use rollstack_core::domain::integration::{Integration, IntegrationType};
use rollstack_core::dto::integration::{InstallRequest, MetadataDaoRegistration};
use rollstack_core::dto::stack::Accepted;
use uuid::Uuid;

use crate::api::error::{ApiJson, ok};
use crate::api::extract::ApiPath;
use crate::service::{Context, ServiceError, integration, query};

fn parse_type(raw: &str) -> Result<IntegrationType, ServiceError> {
    raw.parse()
        .map_err(|_| ServiceError::bad_request(format!("Unsupported integration type: {raw}")))
}

/// GET /{id}/integrations
pub async fn list_integrations(
    State(ctx): State<Context>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiJson<Vec<Integration>> {
    tracing::debug!("Listing integrations of stack {}", id);
    ok(query::list_integrations(&ctx, id).await?)
}

/// GET /{id}/integrations/{integration}
pub async fn get_integration(
    State(ctx): State<Context>,
    ApiPath((id, integration_id)): ApiPath<(Uuid, String)>,
) -> ApiJson<Integration> {
    let integration_id = Uuid::parse_str(&integration_id)
        .map_err(|_| ServiceError::bad_request("Invalid integration id"))?;
    ok(query::get_integration(&ctx, id, integration_id).await?)
}

/// POST /{id}/integrations/{integration}
/// Install an add-on; the body holds its parameters and may be empty
pub async fn install_integration(
    State(ctx): State<Context>,
    ApiPath((id, kind)): ApiPath<(Uuid, String)>,
    body: Bytes,
) -> ApiJson<Accepted> {
    install(&ctx, id, parse_type(&kind)?, &body).await
}

/// DELETE /{id}/integrations/{integration}
pub async fn uninstall_integration(
    State(ctx): State<Context>,
    ApiPath((id, kind)): ApiPath<(Uuid, String)>,
) -> ApiJson<Accepted> {
    uninstall(&ctx, id, parse_type(&kind)?).await
}

/// POST /{id}/integrations/register-metadata-dao
pub async fn install_metadata_dao(
    State(ctx): State<Context>,
    ApiPath(id): ApiPath<Uuid>,
    body: Bytes,
) -> ApiJson<Accepted> {
    install(&ctx, id, IntegrationType::RegisterMetadataDao, &body).await
}

/// DELETE /{id}/integrations/register-metadata-dao
pub async fn uninstall_metadata_dao(
    State(ctx): State<Context>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiJson<Accepted> {
    uninstall(&ctx, id, IntegrationType::RegisterMetadataDao).await
}

/// GET /{id}/integrations/register-metadata-dao
pub async fn get_metadata_dao(
    State(ctx): State<Context>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiJson<MetadataDaoRegistration> {
    ok(integration::get_metadata_dao(&ctx, id).await?)
}

// =============================================================================
// Helper Functions
// =============================================================================

async fn install(ctx: &Context, id: Uuid, kind: IntegrationType, body: &[u8]) -> ApiJson<Accepted> {
    let params = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(body)
            .map_err(|e| ServiceError::bad_request(format!("Invalid request body: {e}")))?
    };
    let req = InstallRequest::from_parts(kind, params)
        .map_err(|e| ServiceError::bad_request(format!("Invalid request body: {e}")))?;

    tracing::info!("Installing {} on stack {}", kind, id);
    ok(integration::install(ctx, id, req).await?)
}

async fn uninstall(ctx: &Context, id: Uuid, kind: IntegrationType) -> ApiJson<Accepted> {
    tracing::info!("Uninstalling {} from stack {}", kind, id);
    ok(integration::uninstall(ctx, id, kind).await?)
}
