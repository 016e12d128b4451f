//! Unified application error model and mapping helpers.
//! One error enum is shared by the HTTP handlers, the middlewares and the gRPC
//! session service, with mappers to HTTP status codes and gRPC codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::identity::SessionError;
use crate::storage::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    Unauthorized { code: String, message: String },
    Forbidden { code: String, message: String },
    UserInput { code: String, message: String },
    NotFound { code: String, message: String },
    Conflict { code: String, message: String },
    StoreUnavailable { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Unauthorized { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::UserInput { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::StoreUnavailable { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Unauthorized { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::UserInput { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Conflict { message, .. }
            | AppError::StoreUnavailable { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn unauthorized(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Unauthorized { code: code.into(), message: msg.into() } }
    pub fn forbidden(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn user(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn not_found(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn conflict(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Conflict { code: code.into(), message: msg.into() } }
    pub fn store_unavailable(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::StoreUnavailable { code: code.into(), message: msg.into() } }
    pub fn internal(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    ///
    /// A store outage surfaces as 401: on the trust boundary the request is
    /// denied, and the status does not reveal why.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Unauthorized { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::UserInput { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 409,
            AppError::StoreUnavailable { .. } => 401,
            AppError::Internal { .. } => 500,
        }
    }

    /// gRPC mapping used by the session service.
    pub fn grpc_code(&self) -> tonic::Code {
        match self {
            AppError::Unauthorized { .. } => tonic::Code::Unauthenticated,
            AppError::Forbidden { .. } => tonic::Code::PermissionDenied,
            AppError::UserInput { .. } => tonic::Code::InvalidArgument,
            AppError::NotFound { .. } => tonic::Code::NotFound,
            AppError::Conflict { .. } => tonic::Code::AlreadyExists,
            AppError::StoreUnavailable { .. } => tonic::Code::Unavailable,
            AppError::Internal { .. } => tonic::Code::Internal,
        }
    }

    /// Trust-boundary failures carry no body; the status code is the whole answer.
    pub fn is_status_only(&self) -> bool {
        matches!(self, AppError::Unauthorized { .. } | AppError::Forbidden { .. } | AppError::StoreUnavailable { .. })
    }

    /// Map a store failure on a business path. Outside the trust boundary an
    /// outage is a server error, not an auth verdict.
    pub fn from_business(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(m) => AppError::internal("store_unavailable", m),
            StoreError::Conflict(m) => AppError::conflict("conflict", m),
            StoreError::Unexpected(m) => AppError::internal("store_error", m),
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.is_status_only() {
            return status.into_response();
        }
        (status, Json(serde_json::json!({"status": "error", "code": self.code_str(), "error": self.message()}))).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal".into(), message: err.to_string() }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(m) => AppError::StoreUnavailable { code: "store_unavailable".into(), message: m },
            StoreError::Conflict(m) => AppError::Conflict { code: "conflict".into(), message: m },
            StoreError::Unexpected(m) => AppError::Internal { code: "store_error".into(), message: m },
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Unauthorized => AppError::unauthorized("session_invalid", "session missing or expired"),
            SessionError::InvalidArgument(m) => AppError::UserInput { code: "invalid_argument".into(), message: m },
            SessionError::Unavailable(m) => AppError::StoreUnavailable { code: "session_unavailable".into(), message: m },
            SessionError::Internal(m) => AppError::Internal { code: "session_internal".into(), message: m },
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
