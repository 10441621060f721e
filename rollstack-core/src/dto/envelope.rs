//! Uniform response envelope

use serde::{Deserialize, Serialize};

/// Message attached to every successful response
pub const SUCCESS_MESSAGE: &str = "Successfully";

/// Body of every API response: a numeric status, a message and an optional
/// payload. Failures are reported through the same shape instead of a
/// separate error document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Envelope<T = serde_json::Value> {
    pub status: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// 200 with a payload
    pub fn ok(data: T) -> Self {
        Self {
            status: 200,
            message: SUCCESS_MESSAGE.to_string(),
            data: Some(data),
        }
    }

    /// 200 without a payload
    pub fn empty() -> Self {
        Self {
            status: 200,
            message: SUCCESS_MESSAGE.to_string(),
            data: None,
        }
    }

    /// Non-success status with a message and no payload
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_envelope_shape() {
        let envelope = Envelope::ok(serde_json::json!({ "id": "abc" }));
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["status"], 200);
        assert_eq!(json["message"], "Successfully");
        assert_eq!(json["data"]["id"], "abc");
    }

    #[test]
    fn test_error_envelope_omits_data() {
        let envelope: Envelope = Envelope::error(404, "Stack not found");
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["status"], 404);
        assert!(json.get("data").is_none());
        assert!(!envelope.is_success());
    }
}
