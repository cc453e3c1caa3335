// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.
//!
//! Every variant carries a stable string code. The frontend keys its
//! messages off these codes, so they must not change.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("{0}")]
    XeroAuthRequired(String),

    #[error("Xero is not connected")]
    NotConnected,

    #[error("OAuth state does not match an authorization in progress")]
    InvalidState,

    #[error("Authorization code missing from callback")]
    MissingCode,

    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("No Xero organizations are available for this connection")]
    NoOrganizations,

    #[error("Xero API error (HTTP {status})")]
    XeroApi { status: u16, body: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Message used whenever Xero rejects our credentials.
    pub const RECONNECT_MESSAGE: &'static str = "Xero authorization expired, please reconnect";

    /// Stable error code surfaced to clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::XeroAuthRequired(_) => "XERO_AUTH_REQUIRED",
            AppError::NotConnected => "NOT_CONNECTED",
            AppError::InvalidState => "INVALID_STATE",
            AppError::MissingCode => "MISSING_CODE",
            AppError::TokenExchangeFailed(_) => "TOKEN_EXCHANGE_FAILED",
            AppError::NoOrganizations => "NO_ORGANIZATIONS",
            AppError::XeroApi { .. } => "XERO_API_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Error for a 401 returned by any Xero endpoint.
    pub fn reconnect() -> Self {
        AppError::XeroAuthRequired(Self::RECONNECT_MESSAGE.to_string())
    }

    /// True when the user has to run the consent flow again.
    pub fn requires_reconnect(&self) -> bool {
        matches!(self, AppError::XeroAuthRequired(_) | AppError::NotConnected)
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized | AppError::XeroAuthRequired(_) | AppError::NotConnected => {
                StatusCode::UNAUTHORIZED
            }
            AppError::InvalidState
            | AppError::MissingCode
            | AppError::Validation(_)
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::TokenExchangeFailed(_)
            | AppError::NoOrganizations
            | AppError::XeroApi { .. }
            | AppError::Database(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (message, details) = match &self {
            AppError::XeroApi { status, body } => {
                tracing::warn!(status, body = %body, "Xero API error");
                (self.to_string(), Some(body.clone()))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                ("A database error occurred".to_string(), None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                ("An internal error occurred".to_string(), None)
            }
            _ => (self.to_string(), None),
        };

        let body = ErrorResponse {
            success: false,
            error: self.code(),
            message,
            details,
        };

        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
