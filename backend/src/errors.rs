use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use thiserror::Error;
use zkbalance_common::protocol::{ErrorBody, ErrorCode};

/// Bearer or session failures. The client answers any of these by purging its tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("session invalid or expired")]
    SessionInvalid,

    #[error("bearer token expired")]
    Expired,

    #[error("bearer token invalid")]
    Invalid,

    #[error("missing bearer token")]
    Missing,
}

/// Freshness and single-use failures. Terminal for the request, credentials untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReplayError {
    #[error("unexpected balance source")]
    BadSource,

    #[error("request timestamp outside the allowed window")]
    Expired,

    #[error("request id already used")]
    Reused,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Replay(#[from] ReplayError),

    #[error("malformed public signal: {0}")]
    MalformedSignal(String),

    #[error("verifier error: {0}")]
    Verifier(String),

    #[error("internal error")]
    Internal,
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::Validation(_) => ErrorCode::Validation,
            ApiError::Auth(_) => ErrorCode::Auth,
            ApiError::Replay(_) => ErrorCode::Replay,
            ApiError::MalformedSignal(_) => ErrorCode::MalformedSignal,
            ApiError::Verifier(_) => ErrorCode::Verifier,
            ApiError::Internal => ErrorCode::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Replay(_) | ApiError::MalformedSignal(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Verifier(_) | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let msg = match &self {
            // Verifier internals stay in the logs.
            ApiError::Verifier(_) => "verification failed".to_string(),
            other => other.to_string(),
        };

        (self.status(), Json(ErrorBody { error: msg, code: self.code() })).into_response()
    }
}
