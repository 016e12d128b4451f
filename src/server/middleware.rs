//! Request middlewares: access log, session authentication, CSRF double-submit
//! and role gating.
//!
//! Stacks compose as `access_log -> require_csrf -> require_role -> handler` or
//! `access_log -> require_auth -> handler`. `require_csrf` runs the session
//! check itself, after its cookie/header checks and before the binding check, so
//! the failure precedence is: missing CSRF cookie (403), cookie/header mismatch
//! (403), session invalid (401), binding invalid (403).

use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use super::cookies::{header_value, parse_cookie, CSRF_COOKIE, CSRF_HEADER, SESSION_COOKIE};
use super::AppState;
use crate::error::AppError;
use crate::identity::{RequestContext, RequestId, Role, RoleSet, SessionError};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Outermost layer: mint a request id, open a span for the rest of the stack and
/// log the terminal status.
pub async fn access_log(mut req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    req.extensions_mut().insert(RequestId(request_id.clone()));
    let span = tracing::info_span!("request", method = %req.method(), path = %req.uri().path(), request_id = %request_id);
    async move {
        let started = Instant::now();
        let mut response = next.run(req).await;
        let status = response.status();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if status.is_server_error() {
            error!(status = status.as_u16(), elapsed_ms, "request failed");
        } else if status.is_client_error() {
            warn!(status = status.as_u16(), elapsed_ms, "request rejected");
        } else {
            info!(status = status.as_u16(), elapsed_ms, "request served");
        }
        if let Ok(v) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, v);
        }
        response
    }
    .instrument(span)
    .await
}

/// Terminal rejection from a core middleware: log it and answer with the status only.
fn reject(err: AppError) -> Response {
    if err.http_status() >= 500 {
        error!(status = err.http_status(), code = err.code_str(), "{}", err.message());
    } else {
        warn!(status = err.http_status(), code = err.code_str(), "{}", err.message());
    }
    err.status().into_response()
}

/// Session cookie and request id, copied out of the request. Only owned values
/// cross the session RPC: `&Request` is not `Sync`, and holding it over an
/// await would make the middleware futures non-`Send`.
fn session_credentials(req: &Request) -> (Option<String>, Option<String>) {
    let session_name = parse_cookie(req.headers(), SESSION_COOKIE);
    let request_id = req.extensions().get::<RequestId>().map(|r| r.0.clone());
    (session_name, request_id)
}

/// Resolve the session cookie into a `RequestContext`.
///
/// Any failure is 401: absent cookie (no RPC made), unknown or expired session,
/// and backend outages alike. Outages are additionally logged as errors.
pub(crate) async fn authenticate(
    state: &AppState,
    session_name: Option<String>,
    request_id: Option<String>,
) -> Result<RequestContext, AppError> {
    let Some(session_name) = session_name else {
        return Err(AppError::unauthorized("no_session", "missing session cookie"));
    };
    match state.sessions.check(&session_name).await {
        Ok(principal_id) => Ok(RequestContext { principal_id, session_name, request_id }),
        Err(SessionError::Unauthorized) => Err(AppError::unauthorized("session_invalid", "session missing or expired")),
        Err(e) => {
            error!(error = %e, "session check failed; denying request");
            Err(AppError::store_unavailable("session_unavailable", e.to_string()))
        }
    }
}

/// Authentication only.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let (session_name, request_id) = session_credentials(&req);
    match authenticate(&state, session_name, request_id).await {
        Ok(ctx) => {
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        Err(err) => reject(err),
    }
}

fn is_mutating(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE)
}

/// CSRF double-submit plus session binding; contains authentication.
/// Safe methods skip the CSRF part but are still authenticated.
pub async fn require_csrf(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = if is_mutating(req.method()) {
        let Some(cookie) = parse_cookie(req.headers(), CSRF_COOKIE) else {
            return reject(AppError::forbidden("csrf_cookie_missing", "missing csrf cookie"));
        };
        let header = header_value(req.headers(), CSRF_HEADER);
        let matches = header.as_ref().map(|h| bool::from(h.as_bytes().ct_eq(cookie.as_bytes()))).unwrap_or(false);
        if !matches {
            return reject(AppError::forbidden("csrf_mismatch", "csrf header missing or different from cookie"));
        }
        Some(cookie)
    } else {
        None
    };

    let (session_name, request_id) = session_credentials(&req);
    let ctx = match authenticate(&state, session_name, request_id).await {
        Ok(ctx) => ctx,
        Err(err) => return reject(err),
    };

    if let Some(token) = token {
        if !state.csrf.check(&token, &ctx.session_name).await {
            return reject(AppError::forbidden("csrf_binding", "csrf token not bound to this session"));
        }
    }
    req.extensions_mut().insert(ctx);
    next.run(req).await
}

/// Role gate. Runs inside `require_csrf`, so the caller is already authenticated;
/// the resolved `Role` is attached for handlers.
pub async fn require_role(State((state, allowed)): State<(AppState, RoleSet)>, mut req: Request, next: Next) -> Response {
    let Some(ctx) = req.extensions().get::<RequestContext>().cloned() else {
        error!("role gate reached without an authenticated context");
        return reject(AppError::internal("stack_misconfigured", "role gate without authentication"));
    };
    let role: Role = match state.roles.role_of(&ctx.principal_id).await {
        Ok(Some(role)) => role,
        Ok(None) => return reject(AppError::forbidden("unknown_principal", "principal has no role")),
        Err(e) => {
            error!(error = %e, principal = %ctx.principal_id, "role lookup failed");
            return reject(AppError::internal("role_lookup", "role lookup failed"));
        }
    };
    if !allowed.permits(role) {
        return reject(AppError::forbidden("role_denied", format!("role {} not permitted", role)));
    }
    req.extensions_mut().insert(role);
    next.run(req).await
}
