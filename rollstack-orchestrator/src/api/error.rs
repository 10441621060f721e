//! API Error Handling
//!
//! Service errors are reported in the response envelope with the matching
//! HTTP status.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rollstack_core::dto::envelope::Envelope;

use crate::service::ServiceError;

/// API error type
#[derive(Debug)]
pub struct ApiError(ServiceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.status_code();
        if code >= 500 {
            tracing::error!("Request failed: {:#}", self.0);
        } else {
            tracing::debug!("Request rejected: {}", self.0);
        }

        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Envelope = Envelope::error(code, self.0.public_message());
        (status, Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(ServiceError::bad_request(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError(ServiceError::bad_request(format!(
            "Invalid query: {}",
            rejection.body_text()
        )))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError(ServiceError::bad_request(format!(
            "Invalid path: {}",
            rejection.body_text()
        )))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Successful response with a payload
pub type ApiJson<T> = ApiResult<Json<Envelope<T>>>;

pub fn ok<T>(data: T) -> ApiJson<T> {
    Ok(Json(Envelope::ok(data)))
}
