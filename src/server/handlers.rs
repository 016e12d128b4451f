//! Session, CSRF and registration endpoints.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{ACCESS_CONTROL_EXPOSE_HEADERS, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use axum::Extension;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use super::cookies::{parse_cookie, CSRF_HEADER, SESSION_COOKIE};
use super::versioning::ApiVersion;
use super::AppState;
use crate::error::{AppError, AppResult};
use crate::identity::{LoginRequest, RequestContext, Role};

/// Decode a JSON body; anything malformed is a 400.
pub(crate) fn decode_json<T: DeserializeOwned>(body: &[u8]) -> AppResult<T> {
    serde_json::from_slice(body).map_err(|e| AppError::user("malformed_body", e.to_string()))
}

/// POST /sessions: verify credentials, create a session, set `session_id`.
pub async fn create_session(State(state): State<AppState>, Extension(version): Extension<ApiVersion>, body: Bytes) -> Response {
    match login(&state, version, &body).await {
        Ok(resp) => resp,
        Err(err) => version.fail(err),
    }
}

async fn login(state: &AppState, version: ApiVersion, body: &[u8]) -> AppResult<Response> {
    let body = version.decode_login(body)?;
    let principal_id = state.login.login(&LoginRequest { login: body.login, password: body.password }).await?;
    let session_name = state.sessions.create(&principal_id).await.map_err(|e| {
        error!(error = %e, principal = %principal_id, "session create failed");
        AppError::internal("session_create", e.to_string())
    })?;
    let cookie = state.cookies.session_cookie(&session_name)?;
    let mut resp = version.ok(StatusCode::OK, json!({"status": "ok", "user_id": principal_id}));
    resp.headers_mut().append(SET_COOKIE, cookie);
    Ok(resp)
}

/// DELETE /sessions: drop the session named by the cookie and clear cookies.
/// Without a cookie there is nothing to drop; the call still succeeds.
pub async fn delete_session(State(state): State<AppState>, Extension(version): Extension<ApiVersion>, headers: HeaderMap) -> Response {
    match logout(&state, version, &headers).await {
        Ok(resp) => resp,
        Err(err) => version.fail(err),
    }
}

async fn logout(state: &AppState, version: ApiVersion, headers: &HeaderMap) -> AppResult<Response> {
    if let Some(session_name) = parse_cookie(headers, SESSION_COOKIE) {
        state.sessions.delete(&session_name).await.map_err(|e| {
            error!(error = %e, "session delete failed");
            AppError::internal("session_delete", e.to_string())
        })?;
        info!("session deleted");
    }
    let mut resp = version.ok(StatusCode::OK, json!({"status": "ok"}));
    resp.headers_mut().append(SET_COOKIE, state.cookies.clear_session_cookie()?);
    resp.headers_mut().append(SET_COOKIE, state.cookies.clear_csrf_cookie()?);
    Ok(resp)
}

/// GET /csrf: mint a token bound to the caller's session. Returned in the
/// `X-CSRF-Token` header (exposed to scripts) and the `csrf_token` cookie.
pub async fn issue_csrf(
    State(state): State<AppState>,
    Extension(version): Extension<ApiVersion>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    match csrf(&state, version, &ctx).await {
        Ok(resp) => resp,
        Err(err) => version.fail(err),
    }
}

async fn csrf(state: &AppState, version: ApiVersion, ctx: &RequestContext) -> AppResult<Response> {
    let token = state.csrf.add(&ctx.session_name).await?;
    let header = HeaderValue::from_str(&token).map_err(|e| AppError::internal("csrf_header", e.to_string()))?;
    let mut resp = version.ok(StatusCode::OK, json!({"status": "ok"}));
    let h = resp.headers_mut();
    h.insert(CSRF_HEADER, header);
    h.insert(ACCESS_CONTROL_EXPOSE_HEADERS, HeaderValue::from_static("X-CSRF-Token"));
    h.append(SET_COOKIE, state.cookies.csrf_cookie(&token)?);
    Ok(resp)
}

#[derive(Debug, Deserialize)]
struct RegisterBody {
    login: String,
    password: String,
    #[serde(default)]
    role: Option<Role>,
}

/// POST /users: self-registration as customer (default) or partner.
pub async fn register_user(State(state): State<AppState>, Extension(version): Extension<ApiVersion>, body: Bytes) -> Response {
    let result = async {
        let body: RegisterBody = decode_json(&body)?;
        let id = state.login.register(&body.login, &body.password, body.role.unwrap_or(Role::Customer)).await?;
        Ok::<_, AppError>(json!({"user_id": id}))
    }
    .await;
    version.respond(StatusCode::CREATED, result)
}
