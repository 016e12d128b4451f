//!
//! foodcourt HTTP/WS server
//! ------------------------
//! Axum router for the public API, served identically under `/api/v1` and
//! `/api/v2`.
//!
//! Responsibilities:
//! - Session cookie login/logout backed by the session service.
//! - CSRF double-submit tokens bound to sessions.
//! - Role gating for partner/admin endpoints.
//! - Profile, cart, vendor and product endpoints.
//! - A websocket chat relay.
//!
//! Every route is declared once in [`route_table`] together with its middleware
//! stack. State-changing methods must go through the CSRF stack unless the route
//! is explicitly exempt (login, logout, registration).

use std::sync::Arc;

use anyhow::Context;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, post, put, MethodRouter};
use axum::{Extension, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info, warn};

use crate::catalog::{CartRepository, ProductRepository, ProfileRepository, VendorRepository};
use crate::config::Config;
use crate::identity::{CsrfIssuer, LoginProvider, Role, RoleLookup, RoleSet, SessionClient};

pub mod chat;
pub mod cookies;
pub mod grpc;
pub mod handlers;
pub mod middleware;
pub mod resources;
pub mod versioning;

use chat::ChatHub;
use cookies::CookieSettings;
use middleware::{access_log, require_auth, require_csrf, require_role};
use versioning::ApiVersion;

/// Shared server state injected into all handlers and middlewares.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionClient>,
    pub csrf: CsrfIssuer,
    pub login: LoginProvider,
    pub roles: Arc<dyn RoleLookup>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub vendors: Arc<dyn VendorRepository>,
    pub products: Arc<dyn ProductRepository>,
    pub cookies: CookieSettings,
    pub chat: ChatHub,
}

/// Middleware stack guarding a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stack {
    /// No authentication.
    Public,
    /// Session required.
    Auth,
    /// Session plus CSRF double-submit on mutating methods.
    Csrf,
    /// CSRF stack, then one of the listed roles.
    Role(&'static [Role]),
    /// State-changing but deliberately outside the CSRF stack.
    Exempt,
}

const VENDOR_ROLES: &[Role] = &[Role::Partner, Role::Admin];

/// One registered endpoint. The path is relative to the version prefix.
pub struct RouteEntry {
    pub method: Method,
    pub path: &'static str,
    pub stack: Stack,
    handler: fn() -> MethodRouter<AppState>,
}

impl RouteEntry {
    fn new(method: Method, path: &'static str, stack: Stack, handler: fn() -> MethodRouter<AppState>) -> Self {
        Self { method, path, stack, handler }
    }

    pub fn is_mutating(&self) -> bool {
        !matches!(self.method, Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE)
    }

    /// A mutating route must sit behind the CSRF stack or be explicitly exempt.
    pub fn is_csrf_covered(&self) -> bool {
        !self.is_mutating() || matches!(self.stack, Stack::Csrf | Stack::Role(_) | Stack::Exempt)
    }
}

/// Every endpoint of the API, shared by both versions.
pub fn route_table() -> Vec<RouteEntry> {
    vec![
        RouteEntry::new(Method::POST, "/sessions", Stack::Exempt, || post(handlers::create_session)),
        RouteEntry::new(Method::DELETE, "/sessions", Stack::Exempt, || delete(handlers::delete_session)),
        RouteEntry::new(Method::POST, "/users", Stack::Exempt, || post(handlers::register_user)),
        RouteEntry::new(Method::GET, "/csrf", Stack::Auth, || get(handlers::issue_csrf)),
        RouteEntry::new(Method::GET, "/profiles", Stack::Auth, || get(resources::get_profile)),
        RouteEntry::new(Method::PUT, "/profiles", Stack::Csrf, || put(resources::update_profile)),
        RouteEntry::new(Method::GET, "/carts", Stack::Auth, || get(resources::get_cart)),
        RouteEntry::new(Method::PUT, "/carts", Stack::Csrf, || put(resources::replace_cart)),
        RouteEntry::new(Method::GET, "/vendors", Stack::Public, || get(resources::list_vendors)),
        RouteEntry::new(Method::POST, "/vendors", Stack::Role(VENDOR_ROLES), || post(resources::create_vendor)),
        RouteEntry::new(Method::GET, "/vendors/{vendor_id}/products", Stack::Public, || get(resources::list_products)),
        RouteEntry::new(
            Method::POST,
            "/vendors/{vendor_id}/products",
            Stack::Role(VENDOR_ROLES),
            || post(resources::create_product),
        ),
        RouteEntry::new(Method::GET, "/chats/ws", Stack::Auth, || get(chat::chat_socket)),
    ]
}

/// Wrap a method router in the middlewares its stack names. Layers added later
/// run first, so the CSRF check precedes the role gate.
fn guard(state: &AppState, stack: Stack, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    match stack {
        Stack::Public | Stack::Exempt => route,
        Stack::Auth => route.route_layer(from_fn_with_state(state.clone(), require_auth)),
        Stack::Csrf => route.route_layer(from_fn_with_state(state.clone(), require_csrf)),
        Stack::Role(roles) => route
            .route_layer(from_fn_with_state((state.clone(), RoleSet(roles)), require_role))
            .route_layer(from_fn_with_state(state.clone(), require_csrf)),
    }
}

/// Routes for one API version, ready to be nested under its prefix.
pub fn api_routes(version: ApiVersion, state: &AppState) -> Router<AppState> {
    let mut router = Router::new();
    for entry in route_table() {
        if !entry.is_csrf_covered() {
            // route_table is static; a miss here is a programming error caught by tests
            error!(method = %entry.method, path = entry.path, "mutating route outside the csrf stack; skipping");
            continue;
        }
        router = router.route(entry.path, guard(state, entry.stack, (entry.handler)()));
    }
    router.layer(Extension(version))
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let csrf_header = HeaderName::from_static(cookies::CSRF_HEADER);
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, csrf_header.clone()])
        .expose_headers([csrf_header, HeaderName::from_static(middleware::REQUEST_ID_HEADER)])
}

/// Full application router: both versions, CORS and the access log.
pub fn router(state: AppState, config: &Config) -> Router {
    Router::new()
        .nest(ApiVersion::V1.prefix(), api_routes(ApiVersion::V1, &state))
        .nest(ApiVersion::V2.prefix(), api_routes(ApiVersion::V2, &state))
        .layer(cors_layer(config))
        .layer(from_fn(access_log))
        .with_state(state)
}

/// Bind the API listener and serve until a shutdown signal arrives.
pub async fn serve(config: &Config, state: AppState) -> anyhow::Result<()> {
    let app = router(state, config);
    let listener = tokio::net::TcpListener::bind(&config.api_listen_addr)
        .await
        .with_context(|| format!("bind API listener on {}", config.api_listen_addr))?;
    info!(addr = %config.api_listen_addr, "foodcourt API listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!("foodcourt API stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
