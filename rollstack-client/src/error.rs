//! Error types for the Rollstack client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when using the Rollstack client
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API answered with a non-success envelope
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// Status reported by the API
        status: u16,
        /// Message from the envelope, or the raw body if there was none
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { status: 404, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_not_found() {
        assert!(ClientError::api_error(404, "Register metadata dao not found").is_not_found());
        assert!(!ClientError::api_error(400, "Stack not found").is_not_found());
        assert!(!ClientError::ParseError("bad json".to_string()).is_not_found());
    }
}
