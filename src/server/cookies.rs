//! Cookie formatting and parsing for the session and CSRF cookies.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue};
use chrono::Utc;

use crate::error::{AppError, AppResult};

pub const SESSION_COOKIE: &str = "session_id";
pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

const EXPIRED: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Lax,
    /// Cross-origin clients. Browsers only honour it together with `Secure`.
    None,
}

impl FromStr for SameSite {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lax" => Ok(SameSite::Lax),
            "none" => Ok(SameSite::None),
            other => Err(format!("unsupported SameSite '{}', expected lax|none", other)),
        }
    }
}

impl Display for SameSite {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SameSite::Lax => f.write_str("Lax"),
            SameSite::None => f.write_str("None"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub same_site: SameSite,
    pub secure: bool,
    pub session_ttl: Duration,
    pub csrf_ttl: Duration,
}

impl CookieSettings {
    fn attrs(&self) -> String {
        let secure = self.secure || self.same_site == SameSite::None;
        format!("Path=/; SameSite={}{}", self.same_site, if secure { "; Secure" } else { "" })
    }

    /// `session_id=<name>`, HttpOnly, expiring with the session.
    pub fn session_cookie(&self, session_name: &str) -> AppResult<HeaderValue> {
        header(format!(
            "{}={}; Expires={}; Max-Age={}; HttpOnly; {}",
            SESSION_COOKIE,
            session_name,
            expires_in(self.session_ttl),
            self.session_ttl.as_secs(),
            self.attrs()
        ))
    }

    pub fn clear_session_cookie(&self) -> AppResult<HeaderValue> {
        header(format!("{}=; Expires={}; Max-Age=0; HttpOnly; {}", SESSION_COOKIE, EXPIRED, self.attrs()))
    }

    /// `csrf_token=<token>`; readable by client script, so never HttpOnly.
    pub fn csrf_cookie(&self, token: &str) -> AppResult<HeaderValue> {
        header(format!(
            "{}={}; Expires={}; Max-Age={}; {}",
            CSRF_COOKIE,
            token,
            expires_in(self.csrf_ttl),
            self.csrf_ttl.as_secs(),
            self.attrs()
        ))
    }

    pub fn clear_csrf_cookie(&self) -> AppResult<HeaderValue> {
        header(format!("{}=; Expires={}; Max-Age=0; {}", CSRF_COOKIE, EXPIRED, self.attrs()))
    }
}

fn expires_in(ttl: Duration) -> String {
    let at = Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64);
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn header(raw: String) -> AppResult<HeaderValue> {
    HeaderValue::from_str(&raw).map_err(|e| AppError::internal("cookie_format", e.to_string()))
}

/// Value of the named cookie across all `Cookie` headers. Empty values count as absent.
pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all(axum::http::header::COOKIE) {
        let Ok(s) = cookie.to_str() else { continue };
        for part in s.split(';') {
            let p = part.trim();
            if let Some((k, v)) = p.split_once('=') {
                if k.trim() == name {
                    let v = v.trim();
                    return if v.is_empty() { None } else { Some(v.to_string()) };
                }
            }
        }
    }
    None
}

/// Value of a request header, if present, valid UTF-8 and non-empty.
pub fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
