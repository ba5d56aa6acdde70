//! API error handling.
//!
//! Structured error responses with proper HTTP status codes and request
//! tracking.

use crate::errors::{CrashError, FairnessError, GameError, LedgerError, StakehouseError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level API error response with request tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

/// Error body with structured information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error code (NOT_FOUND, BAD_REQUEST, CONFLICT, INTERNAL_ERROR).
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error with request tracking.
#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub request_id: String,
}

#[derive(Debug)]
pub enum ApiErrorKind {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    InternalError(String),
}

impl ApiError {
    pub fn not_found(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::NotFound(message),
            request_id,
        }
    }

    pub fn bad_request(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::BadRequest(message),
            request_id,
        }
    }

    pub fn conflict(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::Conflict(message),
            request_id,
        }
    }

    pub fn internal_error(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::InternalError(message),
            request_id,
        }
    }

    /// Map a service-level error onto the right HTTP category.
    pub fn from_service(request_id: String, error: StakehouseError) -> Self {
        let message = error.to_string();
        match &error {
            StakehouseError::Game(GameError::InvalidStake { .. })
            | StakehouseError::Game(GameError::StakeOutOfRange { .. })
            | StakehouseError::Game(GameError::InvalidTarget { .. }) => {
                Self::bad_request(request_id, message)
            }
            StakehouseError::Ledger(LedgerError::InsufficientFunds { .. }) => {
                Self::conflict(request_id, message)
            }
            StakehouseError::Ledger(LedgerError::UnknownAccount(_)) => {
                Self::not_found(request_id, message)
            }
            StakehouseError::Ledger(LedgerError::InvalidAmount(_))
            | StakehouseError::Ledger(LedgerError::InvalidPayout(_)) => {
                Self::bad_request(request_id, message)
            }
            StakehouseError::Crash(CrashError::RoundNotFound(_)) => {
                Self::not_found(request_id, message)
            }
            StakehouseError::Crash(CrashError::TooLate)
            | StakehouseError::Crash(CrashError::RoundNotRunning { .. })
            | StakehouseError::Crash(CrashError::InvalidTransition { .. }) => {
                Self::conflict(request_id, message)
            }
            StakehouseError::Crash(CrashError::WorkerGone) => {
                Self::internal_error(request_id, message)
            }
            StakehouseError::Fairness(FairnessError::Malformed(_)) => {
                Self::bad_request(request_id, message)
            }
            // Integrity failures and configuration issues are server faults.
            StakehouseError::Fairness(_) | StakehouseError::Configuration(_) => {
                Self::internal_error(request_id, message)
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ApiErrorKind::NotFound(msg) => write!(f, "[{}] Not Found: {}", self.request_id, msg),
            ApiErrorKind::BadRequest(msg) => {
                write!(f, "[{}] Bad Request: {}", self.request_id, msg)
            }
            ApiErrorKind::Conflict(msg) => write!(f, "[{}] Conflict: {}", self.request_id, msg),
            ApiErrorKind::InternalError(msg) => {
                write!(f, "[{}] Internal Error: {}", self.request_id, msg)
            }
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self.kind {
            ApiErrorKind::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiErrorKind::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiErrorKind::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            ApiErrorKind::InternalError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        };

        let body = Json(ErrorResponse {
            request_id: self.request_id.clone(),
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_funds_maps_to_conflict() {
        let err = ApiError::from_service(
            "req-1".to_string(),
            LedgerError::InsufficientFunds {
                required: 10.0,
                available: 5.0,
            }
            .into(),
        );
        assert!(matches!(err.kind, ApiErrorKind::Conflict(_)));
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err = ApiError::from_service(
            "req-2".to_string(),
            GameError::InvalidTarget { target: 1, min: 2, max: 95 }.into(),
        );
        assert!(matches!(err.kind, ApiErrorKind::BadRequest(_)));
    }

    #[test]
    fn test_integrity_maps_to_internal() {
        let err = ApiError::from_service(
            "req-3".to_string(),
            FairnessError::OutOfRange { kind: "dice roll", value: "200".to_string() }.into(),
        );
        assert!(matches!(err.kind, ApiErrorKind::InternalError(_)));
    }
}
