//! Environment-driven configuration for the API server and the session service.
//!
//! Every knob has a default that is logged when the variable is absent, so a bare
//! `foodcourt` invocation starts a usable development server.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use tracing::{info, warn};

use crate::server::cookies::SameSite;

pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_CSRF_TTL_SECS: u64 = 60 * 60;

/// Where sessions are resolved: through the gRPC session service, or in-process
/// over a memory store (single-node development).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Remote,
    Local,
}

impl FromStr for SessionMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" | "grpc" => Ok(SessionMode::Remote),
            "local" | "memory" => Ok(SessionMode::Local),
            other => Err(format!("unknown session mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub session_ttl: Duration,
    pub csrf_ttl: Duration,
    pub session_mode: SessionMode,
    /// Endpoint the API dials for SessionService, e.g. `http://127.0.0.1:8081`.
    pub session_service_addr: String,
    /// Address the session service binary listens on.
    pub session_listen_addr: String,
    pub store_addr: String,
    pub database_url: String,
    pub api_listen_addr: String,
    pub cookie_same_site: SameSite,
    pub session_cookie_secure: bool,
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Load from process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; used by tests to avoid touching the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let session_ttl_secs: u64 = load(&lookup, "FOODCOURT_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?;
        let csrf_ttl_secs: u64 = load(&lookup, "FOODCOURT_CSRF_TTL_SECS", DEFAULT_CSRF_TTL_SECS)?;
        let origins: String = load(&lookup, "FOODCOURT_ALLOWED_ORIGINS", String::new())?;

        let config = Config {
            session_ttl: Duration::from_secs(session_ttl_secs),
            csrf_ttl: Duration::from_secs(csrf_ttl_secs),
            session_mode: load(&lookup, "FOODCOURT_SESSION_MODE", SessionMode::Remote)?,
            session_service_addr: load(&lookup, "FOODCOURT_SESSION_SERVICE_ADDR", "http://127.0.0.1:8081".to_string())?,
            session_listen_addr: load(&lookup, "FOODCOURT_SESSION_LISTEN_ADDR", "0.0.0.0:8081".to_string())?,
            store_addr: load(&lookup, "FOODCOURT_REDIS_URL", "redis://127.0.0.1:6379".to_string())?,
            database_url: load(&lookup, "FOODCOURT_DATABASE_URL", "host=127.0.0.1 user=foodcourt dbname=foodcourt".to_string())?,
            api_listen_addr: load(&lookup, "FOODCOURT_API_LISTEN_ADDR", "0.0.0.0:9000".to_string())?,
            cookie_same_site: load(&lookup, "FOODCOURT_COOKIE_SAMESITE", SameSite::Lax)?,
            session_cookie_secure: load(&lookup, "FOODCOURT_COOKIE_SECURE", false)?,
            allowed_origins: origins.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.session_ttl.is_zero() || self.csrf_ttl.is_zero() {
            bail!("session and csrf TTLs must be non-zero");
        }
        // a CSRF token must not outlive the session it is bound to
        if self.csrf_ttl > self.session_ttl {
            bail!(
                "csrf TTL ({}s) exceeds session TTL ({}s)",
                self.csrf_ttl.as_secs(),
                self.session_ttl.as_secs()
            );
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            csrf_ttl: Duration::from_secs(DEFAULT_CSRF_TTL_SECS),
            session_mode: SessionMode::Local,
            session_service_addr: "http://127.0.0.1:8081".into(),
            session_listen_addr: "0.0.0.0:8081".into(),
            store_addr: "redis://127.0.0.1:6379".into(),
            database_url: String::new(),
            api_listen_addr: "0.0.0.0:9000".into(),
            cookie_same_site: SameSite::Lax,
            session_cookie_secure: false,
            allowed_origins: Vec::new(),
        }
    }
}

fn load<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr + Display,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|e| {
            warn!("Invalid {key} value: {e}");
            anyhow!("invalid value for {}: {}", key, e)
        }),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

impl Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionMode::Remote => write!(f, "remote"),
            SessionMode::Local => write!(f, "local"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(cfg.session_ttl, Duration::from_secs(86_400));
        assert_eq!(cfg.csrf_ttl, Duration::from_secs(3_600));
        assert_eq!(cfg.api_listen_addr, "0.0.0.0:9000");
        assert_eq!(cfg.cookie_same_site, SameSite::Lax);
        assert!(!cfg.session_cookie_secure);
        assert_eq!(cfg.session_mode, SessionMode::Remote);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("FOODCOURT_SESSION_TTL_SECS", "7200"),
            ("FOODCOURT_CSRF_TTL_SECS", "600"),
            ("FOODCOURT_COOKIE_SAMESITE", "none"),
            ("FOODCOURT_COOKIE_SECURE", "true"),
            ("FOODCOURT_SESSION_MODE", "local"),
            ("FOODCOURT_ALLOWED_ORIGINS", "https://a.example, https://b.example"),
        ]))
        .unwrap();
        assert_eq!(cfg.session_ttl.as_secs(), 7200);
        assert_eq!(cfg.csrf_ttl.as_secs(), 600);
        assert_eq!(cfg.cookie_same_site, SameSite::None);
        assert!(cfg.session_cookie_secure);
        assert_eq!(cfg.session_mode, SessionMode::Local);
        assert_eq!(cfg.allowed_origins, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn csrf_ttl_longer_than_session_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("FOODCOURT_SESSION_TTL_SECS", "60"),
            ("FOODCOURT_CSRF_TTL_SECS", "120"),
        ]));
        assert!(err.is_err());
    }

    #[test]
    fn garbage_values_fail_loading() {
        assert!(Config::from_lookup(lookup_from(&[("FOODCOURT_COOKIE_SAMESITE", "strictest")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("FOODCOURT_SESSION_TTL_SECS", "a day")])).is_err());
    }
}
