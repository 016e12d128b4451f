//! API versions. Both share every middleware and handler; they differ in
//! response shape and in how login bodies are decoded.
//!
//! - v1: bare JSON payloads, errors as `{status, code, error}`.
//! - v2: `{"data": <payload>, "error": null}` / `{"data": null, "error": {code, message}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V1,
    V2,
}

impl ApiVersion {
    pub fn prefix(&self) -> &'static str {
        match self {
            ApiVersion::V1 => "/api/v1",
            ApiVersion::V2 => "/api/v2",
        }
    }

    /// Successful payload in this version's shape.
    pub fn ok(&self, status: StatusCode, payload: Value) -> Response {
        match self {
            ApiVersion::V1 => (status, Json(payload)).into_response(),
            ApiVersion::V2 => (status, Json(json!({"data": payload, "error": null}))).into_response(),
        }
    }

    /// Error in this version's shape. Trust-boundary errors stay status-only.
    pub fn fail(&self, err: AppError) -> Response {
        if err.is_status_only() {
            return err.status().into_response();
        }
        match self {
            ApiVersion::V1 => err.into_response(),
            ApiVersion::V2 => {
                let status = err.status();
                (status, Json(json!({"data": null, "error": {"code": err.code_str(), "message": err.message()}}))).into_response()
            }
        }
    }

    pub fn respond(&self, status: StatusCode, result: AppResult<Value>) -> Response {
        match result {
            Ok(payload) => self.ok(status, payload),
            Err(err) => self.fail(err),
        }
    }

    /// Decode a login body with this version's decoder.
    pub fn decode_login(&self, body: &[u8]) -> AppResult<LoginBody> {
        match self {
            ApiVersion::V1 => {
                let b: LoginBodyV1 = serde_json::from_slice(body).map_err(|e| AppError::user("malformed_body", e.to_string()))?;
                Ok(LoginBody { login: b.login, password: b.password, extra: Map::new() })
            }
            ApiVersion::V2 => {
                let b: LoginBodyV2 = serde_json::from_slice(body).map_err(|e| AppError::user("malformed_body", e.to_string()))?;
                if !b.extra.is_empty() {
                    debug!(fields = ?b.extra.keys().collect::<Vec<_>>(), "v2 login carried extra fields");
                }
                Ok(LoginBody { login: b.login, password: b.password, extra: b.extra })
            }
        }
    }
}

/// Decoded login body, version-independent.
#[derive(Debug, Clone)]
pub struct LoginBody {
    pub login: String,
    pub password: String,
    /// Additional v2 fields, kept verbatim.
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoginBodyV1 {
    login: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginBodyV2 {
    login: String,
    password: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}
