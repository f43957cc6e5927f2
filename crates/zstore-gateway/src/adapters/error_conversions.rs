//! Error conversions from infrastructure types.
//!
//! These conversions involve HTTP types and belong in the adapters layer.

use crate::domain::error::{ApiError, ErrorBody, ErrorFormat, PlatformError, PolicyStoreError};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        match self.format {
            ErrorFormat::Json => (
                status,
                Json(ErrorBody {
                    error: &self.message,
                }),
            )
                .into_response(),
            ErrorFormat::Text => (status, self.message).into_response(),
            ErrorFormat::Html => (status, Html(self.message)).into_response(),
        }
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            PlatformError::Decode(e.to_string())
        } else {
            PlatformError::Http(e.to_string())
        }
    }
}

impl From<reqwest::Error> for PolicyStoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            PolicyStoreError::Decode(e.to_string())
        } else {
            PolicyStoreError::Http(e.to_string())
        }
    }
}
