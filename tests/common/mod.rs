//! Shared harness for the HTTP integration tests: an in-memory relational fake,
//! a memory key-value store and helpers to drive the router with `oneshot`.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use parking_lot::Mutex;
use serde_json::Value;
use tower::ServiceExt;

use foodcourt::catalog::{
    Cart, CartRepository, NewProduct, NewVendor, Product, ProductRepository, Profile, ProfileRepository, ProfileUpdate,
    Vendor, VendorActor, VendorRepository,
};
use foodcourt::config::Config;
use foodcourt::identity::{
    Credentials, CsrfIssuer, LocalSessionClient, LoginProvider, NewUser, Role, RoleLookup, SessionClient, SessionError,
    SessionManager, UserRepository,
};
use foodcourt::security::hash_password;
use foodcourt::server::chat::ChatHub;
use foodcourt::server::cookies::{CookieSettings, SameSite};
use foodcourt::server::{router, AppState};
use foodcourt::storage::{MemoryKv, SharedKv, StoreError};

#[derive(Default)]
struct Tables {
    users: HashMap<String, (String, String, Role)>,
    profiles: HashMap<String, Profile>,
    carts: HashMap<String, Cart>,
    vendors: Vec<Vendor>,
    products: Vec<Product>,
}

/// In-memory stand-in for Postgres. Counts writes and role lookups so tests can
/// assert that rejected requests never reached a repository.
#[derive(Default)]
pub struct FakeDb {
    tables: Mutex<Tables>,
    pub writes: AtomicUsize,
    pub role_lookups: AtomicUsize,
    pub roles_down: AtomicBool,
}

impl FakeDb {
    pub fn seed_user(&self, login: &str, password: &str, role: Role) -> String {
        let hash = hash_password(password).unwrap();
        let mut t = self.tables.lock();
        let id = (t.users.len() + 1).to_string();
        t.users.insert(login.to_string(), (id.clone(), hash, role));
        id
    }

    pub fn writes(&self) -> usize { self.writes.load(Ordering::SeqCst) }

    fn wrote(&self) { self.writes.fetch_add(1, Ordering::SeqCst); }
}

#[async_trait]
impl UserRepository for FakeDb {
    async fn find_credentials(&self, login: &str) -> Result<Option<Credentials>, StoreError> {
        Ok(self.tables.lock().users.get(login).map(|(id, hash, _)| Credentials {
            principal_id: id.clone(),
            password_hash: hash.clone(),
        }))
    }

    async fn create_user(&self, user: NewUser) -> Result<String, StoreError> {
        let mut t = self.tables.lock();
        if t.users.contains_key(&user.login) {
            return Err(StoreError::Conflict(user.login));
        }
        let id = (t.users.len() + 1).to_string();
        t.users.insert(user.login, (id.clone(), user.password_hash, user.role));
        self.wrote();
        Ok(id)
    }
}

#[async_trait]
impl RoleLookup for FakeDb {
    async fn role_of(&self, principal_id: &str) -> Result<Option<Role>, StoreError> {
        self.role_lookups.fetch_add(1, Ordering::SeqCst);
        if self.roles_down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("postgres gone".into()));
        }
        Ok(self.tables.lock().users.values().find(|(id, _, _)| id == principal_id).map(|(_, _, r)| *r))
    }
}

#[async_trait]
impl ProfileRepository for FakeDb {
    async fn get(&self, principal_id: &str) -> Result<Option<Profile>, StoreError> {
        Ok(self.tables.lock().profiles.get(principal_id).cloned())
    }

    async fn update(&self, principal_id: &str, update: ProfileUpdate) -> Result<Profile, StoreError> {
        let profile = Profile {
            principal_id: principal_id.to_string(),
            display_name: update.display_name,
            phone: update.phone,
            address: update.address,
        };
        self.tables.lock().profiles.insert(principal_id.to_string(), profile.clone());
        self.wrote();
        Ok(profile)
    }
}

#[async_trait]
impl CartRepository for FakeDb {
    async fn get(&self, principal_id: &str) -> Result<Cart, StoreError> {
        Ok(self.tables.lock().carts.get(principal_id).cloned().unwrap_or_default())
    }

    async fn replace(&self, principal_id: &str, cart: Cart) -> Result<Cart, StoreError> {
        self.tables.lock().carts.insert(principal_id.to_string(), cart.clone());
        self.wrote();
        Ok(cart)
    }
}

#[async_trait]
impl VendorRepository for FakeDb {
    async fn list(&self) -> Result<Vec<Vendor>, StoreError> { Ok(self.tables.lock().vendors.clone()) }

    async fn create(&self, owner_id: &str, vendor: NewVendor) -> Result<Vendor, StoreError> {
        let mut t = self.tables.lock();
        let v = Vendor {
            id: t.vendors.len() as i64 + 1,
            owner_id: owner_id.to_string(),
            name: vendor.name,
            description: vendor.description,
            address: vendor.address,
        };
        t.vendors.push(v.clone());
        self.wrote();
        Ok(v)
    }
}

#[async_trait]
impl ProductRepository for FakeDb {
    async fn list(&self, vendor_id: i64) -> Result<Vec<Product>, StoreError> {
        Ok(self.tables.lock().products.iter().filter(|p| p.vendor_id == vendor_id).cloned().collect())
    }

    async fn create(&self, vendor_id: i64, actor: &VendorActor, product: NewProduct) -> Result<Option<Product>, StoreError> {
        let mut t = self.tables.lock();
        let allowed = t.vendors.iter().any(|v| v.id == vendor_id && (actor.any_vendor || v.owner_id == actor.principal_id));
        if !allowed {
            return Ok(None);
        }
        let p = Product {
            id: t.products.len() as i64 + 1,
            vendor_id,
            name: product.name,
            description: product.description,
            price_cents: product.price_cents,
        };
        t.products.push(p.clone());
        self.wrote();
        Ok(Some(p))
    }
}

/// Session client that counts calls before delegating.
pub struct CountingSessions {
    inner: Arc<dyn SessionClient>,
    pub checks: AtomicUsize,
}

impl CountingSessions {
    pub fn new(inner: Arc<dyn SessionClient>) -> Self { Self { inner, checks: AtomicUsize::new(0) } }

    pub fn checks(&self) -> usize { self.checks.load(Ordering::SeqCst) }
}

#[async_trait]
impl SessionClient for CountingSessions {
    async fn create(&self, principal_id: &str) -> Result<String, SessionError> { self.inner.create(principal_id).await }
    async fn check(&self, session_name: &str) -> Result<String, SessionError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.inner.check(session_name).await
    }
    async fn delete(&self, session_name: &str) -> Result<(), SessionError> { self.inner.delete(session_name).await }
}

/// Session backend that is unreachable.
pub struct DownSessions;

#[async_trait]
impl SessionClient for DownSessions {
    async fn create(&self, _: &str) -> Result<String, SessionError> { Err(SessionError::Unavailable("connection refused".into())) }
    async fn check(&self, _: &str) -> Result<String, SessionError> { Err(SessionError::Unavailable("connection refused".into())) }
    async fn delete(&self, _: &str) -> Result<(), SessionError> { Err(SessionError::Unavailable("connection refused".into())) }
}

pub struct Harness {
    pub app: Router,
    pub db: Arc<FakeDb>,
    pub kv: MemoryKv,
    pub sessions: Arc<CountingSessions>,
}

pub fn harness() -> Harness { harness_with_ttl(Duration::from_secs(86_400)) }

pub fn harness_with_ttl(session_ttl: Duration) -> Harness {
    let kv = MemoryKv::new();
    let shared: SharedKv = Arc::new(kv.clone());
    let local: Arc<dyn SessionClient> = Arc::new(LocalSessionClient::new(SessionManager::new(shared, session_ttl)));
    let sessions = Arc::new(CountingSessions::new(local));
    let db = Arc::new(FakeDb::default());
    let app = app_with(db.clone(), kv.clone(), sessions.clone(), session_ttl);
    Harness { app, db, kv, sessions }
}

pub fn app_with(db: Arc<FakeDb>, kv: MemoryKv, sessions: Arc<dyn SessionClient>, session_ttl: Duration) -> Router {
    let csrf_ttl = session_ttl.min(Duration::from_secs(3600));
    let state = AppState {
        sessions,
        csrf: CsrfIssuer::new(Arc::new(kv), csrf_ttl),
        login: LoginProvider::new(db.clone()),
        roles: db.clone(),
        profiles: db.clone(),
        carts: db.clone(),
        vendors: db.clone(),
        products: db,
        cookies: CookieSettings { same_site: SameSite::Lax, secure: false, session_ttl, csrf_ttl },
        chat: ChatHub::new(),
    };
    let config = Config { allowed_origins: vec!["http://localhost:3000".into()], ..Config::default() };
    router(state, &config)
}

pub async fn send(app: &Router, req: Request<Body>) -> Response<Body> { app.clone().oneshot(req).await.unwrap() }

pub async fn body_json(resp: Response<Body>) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_len(resp: Response<Body>) -> usize { to_bytes(resp.into_body(), usize::MAX).await.unwrap().len() }

pub fn set_cookies(resp: &Response<Body>) -> Vec<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// Value of `name` among a response's Set-Cookie headers.
pub fn cookie_value(resp: &Response<Body>, name: &str) -> Option<String> {
    set_cookies(resp).iter().find_map(|c| {
        let first = c.split(';').next()?;
        let (k, v) = first.split_once('=')?;
        (k == name).then(|| v.to_string())
    })
}

pub fn json_request(method: &str, uri: &str, cookie: Option<&str>, csrf_header: Option<&str>, body: Value) -> Request<Body> {
    let mut b = Request::builder().method(method).uri(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(c) = cookie {
        b = b.header(header::COOKIE, c);
    }
    if let Some(t) = csrf_header {
        b = b.header("X-CSRF-Token", t);
    }
    b.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut b = Request::builder().method("GET").uri(uri);
    if let Some(c) = cookie {
        b = b.header(header::COOKIE, c);
    }
    b.body(Body::empty()).unwrap()
}

/// Log in and return the session name from the `session_id` cookie.
pub async fn login(app: &Router, prefix: &str, login: &str, password: &str) -> String {
    let resp = send(
        app,
        json_request("POST", &format!("{prefix}/sessions"), None, None, serde_json::json!({"login": login, "password": password})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK, "login failed for {login}");
    cookie_value(&resp, "session_id").expect("session cookie")
}

/// Fetch a CSRF token for a session; returns the header value.
pub async fn fetch_csrf(app: &Router, prefix: &str, session: &str) -> String {
    let resp = send(app, get_request(&format!("{prefix}/csrf"), Some(&format!("session_id={session}")))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    resp.headers().get("x-csrf-token").unwrap().to_str().unwrap().to_string()
}

pub fn cookies(session: &str, csrf: &str) -> String { format!("session_id={session}; csrf_token={csrf}") }
