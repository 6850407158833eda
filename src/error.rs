// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
///
/// Ingestion recovers from every variant at the athlete-cycle boundary;
/// only `BudgetExceeded` is also checked globally before a batch starts.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Network failure, timeout, rate limiting or unexpected HTTP status
    /// from the remote activity source.
    #[error("Strava transport error: {0}")]
    Transport(String),

    /// Expired or revoked bearer token.
    #[error("Strava authorization error: {0}")]
    Authorization(String),

    #[error("api limit exceeded ({consumed}/{cap} calls)")]
    BudgetExceeded { consumed: u64, cap: u64 },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Error text Strava returns for a revoked or expired token.
    pub const STRAVA_TOKEN_ERROR: &'static str = "Invalid or expired Strava token";
    /// Error text used when Strava answers 429.
    pub const STRAVA_RATE_LIMIT: &'static str = "Strava rate limit exceeded";

    /// True for failures of a remote call (transport or authorization).
    ///
    /// Both classes roll the athlete back to `none` and are retried on the
    /// next scheduled invocation.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, AppError::Transport(_) | AppError::Authorization(_))
    }

    /// True if the error was caused by the remote token being rejected.
    pub fn is_strava_token_error(&self) -> bool {
        matches!(self, AppError::Authorization(_))
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Transport(msg) => {
                (StatusCode::BAD_GATEWAY, "strava_error", Some(msg.clone()))
            }
            AppError::Authorization(msg) => {
                (StatusCode::UNAUTHORIZED, "strava_unauthorized", Some(msg.clone()))
            }
            AppError::BudgetExceeded { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "api_limit_exceeded",
                Some(self.to_string()),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers and services
pub type Result<T> = std::result::Result<T, AppError>;
