//! File downloads

use std::path::Path;

use axum::{
    body::Body,
    http::header,
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;

use crate::api::error::ApiResult;
use crate::service::ServiceError;

/// Stream a file from disk as an attachment
pub async fn attachment(path: &Path, filename: &str, content_type: &str) -> ApiResult<Response> {
    let file = tokio::fs::File::open(path).await.map_err(|e| {
        ServiceError::Internal(format!(
            "failed to prepare {} for download: {e}",
            path.display()
        ))
    })?;

    tracing::debug!("Streaming {} as {}", path.display(), filename);
    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}
