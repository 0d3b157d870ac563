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
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Role not permitted: {0}")]
    Forbidden(String),

    #[error("Activity not found: {0}")]
    ActivityNotFound(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Activity is full: {0}")]
    ActivityFull(String),

    #[error("Already joined activity: {0}")]
    AlreadyJoined(String),

    #[error("Not a participant of activity: {0}")]
    NotAParticipant(String),

    #[error("Activity has ended: {0}")]
    ActivityEnded(String),

    #[error("Reports already submitted for activity: {0}")]
    AlreadyReported(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Transient store faults; the whole operation may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::StoreUnavailable(_))
    }

    /// Stable machine-readable code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthenticated => "unauthenticated",
            AppError::InvalidToken => "invalid_token",
            AppError::Forbidden(_) => "forbidden",
            AppError::ActivityNotFound(_) => "activity_not_found",
            AppError::NotFound(_) => "not_found",
            AppError::ActivityFull(_) => "activity_full",
            AppError::AlreadyJoined(_) => "already_joined",
            AppError::NotAParticipant(_) => "not_a_participant",
            AppError::ActivityEnded(_) => "activity_ended",
            AppError::AlreadyReported(_) => "already_reported",
            AppError::BadRequest(_) => "bad_request",
            AppError::StoreUnavailable(_) => "store_unavailable",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::BadRequest(errors.to_string())
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
        let (status, details) = match &self {
            AppError::Unauthenticated | AppError::InvalidToken => {
                (StatusCode::UNAUTHORIZED, None)
            }
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, Some(msg.clone())),
            AppError::ActivityNotFound(msg) | AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Some(msg.clone()))
            }
            AppError::ActivityFull(msg)
            | AppError::AlreadyJoined(msg)
            | AppError::NotAParticipant(msg)
            | AppError::ActivityEnded(msg)
            | AppError::AlreadyReported(msg) => (StatusCode::CONFLICT, Some(msg.clone())),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, Some(msg.clone())),
            AppError::StoreUnavailable(msg) => {
                tracing::error!(error = %msg, "Store unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };

        let body = ErrorResponse {
            error: self.code().to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
