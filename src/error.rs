//! Errors returned by the HTTP endpoints.
//!
//! Every variant is a client-visible failure with no side effects: a request
//! that ends in an `ApiError` never reaches the subscriber registry.

use axum::{
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Failed to read request body")]
    UnreadableBody(#[source] BytesRejection),

    #[error("Invalid JSON")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Failed to encode alert")]
    Encode(#[source] serde_json::Error),

    #[error("Dashboard not found")]
    DashboardNotFound,
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::UnreadableBody(_) | Self::InvalidJson(_) => StatusCode::BAD_REQUEST,
            Self::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::DashboardNotFound => StatusCode::NOT_FOUND,
        }
    }

    /// Short label used for the `alerts_rejected_total` metric.
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::MethodNotAllowed => "method_not_allowed",
            Self::UnreadableBody(_) => "unreadable_body",
            Self::InvalidJson(_) => "invalid_json",
            Self::Encode(_) => "encode_failed",
            Self::DashboardNotFound => "dashboard_not_found",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Some(source) = std::error::Error::source(&self) {
            debug!(error = %self, cause = %source, "Request failed");
        }
        (self.status_code(), self.to_string()).into_response()
    }
}
