//! Transport shapes for the request/response entry points.

use serde::{Deserialize, Serialize};

use super::page::ElementDescriptor;

/// Response envelope: `{"status": "success", "data": ...}` or
/// `{"status": "error", "detail": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ApiEnvelope<T> {
    Success { data: T },
    Error { detail: String },
}

impl<T> ApiEnvelope<T> {
    pub fn success(data: T) -> Self {
        ApiEnvelope::Success { data }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        ApiEnvelope::Error {
            detail: detail.into(),
        }
    }

    pub fn from_result<E: std::fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => ApiEnvelope::success(data),
            Err(err) => ApiEnvelope::error(err.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ApiEnvelope::Success { .. })
    }
}

/// Liveness marker, serialized as `{"status": "ok"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NavigateRequest {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuggestActionRequest {
    pub goal: String,
    pub current_url: String,
    #[serde(default)]
    pub elements: Vec<ElementDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapeRequest {
    pub goal: String,
    pub html_content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelopes_match_wire_shape() {
        let ok = serde_json::to_value(ApiEnvelope::success(json!({"a": 1}))).expect("ok");
        assert_eq!(ok, json!({"status": "success", "data": {"a": 1}}));

        let err = serde_json::to_value(ApiEnvelope::<()>::error("boom")).expect("err");
        assert_eq!(err, json!({"status": "error", "detail": "boom"}));

        let health = serde_json::to_value(HealthStatus::ok()).expect("health");
        assert_eq!(health, json!({"status": "ok"}));
    }

    #[test]
    fn suggest_request_parses_elements_by_wire_id() {
        let request: SuggestActionRequest = serde_json::from_value(json!({
            "goal": "find pricing",
            "current_url": "https://example.com",
            "elements": [{"ai_id": "ai-id-0", "tag": "a", "text": "Pricing"}]
        }))
        .expect("parse");
        assert_eq!(request.elements.len(), 1);
        assert_eq!(request.elements[0].text.as_deref(), Some("Pricing"));
    }
}
