//! HTTP response envelopes
//!
//! Field names are part of the wire contract and must not change:
//! success responses are `{status, message, data, timestamp}` and error
//! responses are `{status, errorCode, message, path, timestamp, traceId,
//! details}`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Standard success envelope.
#[derive(Debug, Serialize, ToSchema)]
pub struct ServerResponse<T> {
    pub status: String,
    pub message: String,
    pub data: Option<T>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ServerResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data: Some(data),
            timestamp: Utc::now(),
        }
    }

    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data: None,
            timestamp: Utc::now(),
        }
    }
}

/// Standard error envelope.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status: u16,
    pub error_code: String,
    pub message: String,
    pub path: String,
    pub timestamp: DateTime<Utc>,
    pub trace_id: String,
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(
        status: u16,
        error_code: impl Into<String>,
        message: impl Into<String>,
        path: impl Into<String>,
        trace_id: impl Into<String>,
    ) -> Self {
        Self {
            status,
            error_code: error_code.into(),
            message: message.into(),
            path: path.into(),
            timestamp: Utc::now(),
            trace_id: trace_id.into(),
            details: None,
        }
    }

    pub fn with_detail(mut self, key: &str, value: serde_json::Value) -> Self {
        let details = self
            .details
            .get_or_insert_with(|| serde_json::Value::Object(Default::default()));
        if let Some(map) = details.as_object_mut() {
            map.insert(key.to_string(), value);
        }
        self
    }
}
