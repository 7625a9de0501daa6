//! Admission error taxonomy and the HTTP rejection built from it.
//!
//! Gates fail closed: every collaborator error becomes one of the four
//! [`GateError`] classes. [`Rejection`] pairs a class with the status code
//! the route family uses (management routes keep the legacy `200` envelope).

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;

/// Rejection class. The inner string is the human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// No identity, or the presented credential is invalid
    #[error("{0}")]
    Unauthenticated(String),

    /// Identity resolved but not allowed (ban, subnet, model, channel, device)
    #[error("{0}")]
    Forbidden(String),

    /// Malformed request, e.g. a required model name is missing
    #[error("{0}")]
    BadRequest(String),

    /// A collaborator failed unexpectedly
    #[error("{0}")]
    Internal(String),
}

impl GateError {
    /// Status code used by relay (token-authenticated) routes
    pub fn status(&self) -> StatusCode {
        match self {
            GateError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            GateError::Forbidden(_) => StatusCode::FORBIDDEN,
            GateError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-checkable class name
    pub fn kind(&self) -> &'static str {
        match self {
            GateError::Unauthenticated(_) => "unauthenticated",
            GateError::Forbidden(_) => "forbidden",
            GateError::BadRequest(_) => "bad_request",
            GateError::Internal(_) => "internal_error",
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            GateError::Unauthenticated(m)
            | GateError::Forbidden(m)
            | GateError::BadRequest(m)
            | GateError::Internal(m) => m,
        }
    }
}

impl From<StoreError> for GateError {
    fn from(e: StoreError) -> Self {
        GateError::Internal(e.to_string())
    }
}

/// A verdict that stops the request, with the status it is rendered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub error: GateError,
    pub status: StatusCode,
}

impl Rejection {
    /// Rejection using the class status (401/403/400/500)
    pub fn new(error: GateError) -> Self {
        let status = error.status();
        Self { error, status }
    }

    /// Legacy management-route rejection: `200` with `success: false`.
    ///
    /// Internal failures keep their `500`.
    pub fn legacy(error: GateError) -> Self {
        let status = match error {
            GateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::OK,
        };
        Self { error, status }
    }
}

impl From<GateError> for Rejection {
    fn from(error: GateError) -> Self {
        Rejection::new(error)
    }
}

#[derive(Serialize)]
struct RejectionBody<'a> {
    success: bool,
    message: &'a str,
    kind: &'static str,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let body = RejectionBody {
            success: false,
            message: self.error.reason(),
            kind: self.error.kind(),
        };
        let mut response = (self.status, Json(&body)).into_response();
        if self.status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}

/// Failure reported by an external store or cache.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Backend could not be reached or answered with an error
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Referenced record does not exist
    #[error("record not found: {0}")]
    NotFound(String),

    /// Call did not finish within the configured deadline
    #[error("{0} timed out")]
    Timeout(&'static str),
}

/// Why a bearer key did not resolve to a usable token.
///
/// The message is surfaced to the caller as the `Unauthenticated` detail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenLookupError {
    #[error("invalid token")]
    NotFound,

    #[error("token is disabled")]
    Disabled,

    #[error("token has expired")]
    Expired,

    #[error("token quota is exhausted")]
    Exhausted,

    #[error("token lookup failed: {0}")]
    Backend(String),
}

/// Gateway-level errors (startup and wiring, not per-request)
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Logging / tracing setup failed
    #[error("telemetry error: {0}")]
    Telemetry(String),
}
