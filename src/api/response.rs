use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Envelope shared by every endpoint, success or failure.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// Numeric status clients branch on. Mirrors the HTTP status except for the
    /// custom MFA and token codes.
    pub status: u16,
    pub message: String,
    pub data: Option<String>,
    /// UTC, `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
}

impl ApiResponse {
    #[must_use]
    pub fn new(status: u16, message: &str, data: Option<String>) -> Self {
        Self {
            status,
            message: message.to_string(),
            data,
            timestamp: Utc::now().format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    #[must_use]
    pub fn ok(message: &str, data: Option<String>) -> Self {
        Self::new(StatusCode::OK.as_u16(), message, data)
    }

    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}
