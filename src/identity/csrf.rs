use std::time::Duration;

use tracing::warn;

use super::token::mint_token;
use crate::error::{AppError, AppResult};
use crate::storage::SharedKv;

const CSRF_KEY_PREFIX: &str = "csrf:";

/// Issues CSRF tokens bound to a session (`csrf:<token> -> sessionName`) and
/// verifies the binding. Tokens expire with their TTL only; there is no revoke.
///
/// The `csrf:` prefix keeps tokens out of the session keyspace, so a CSRF cookie
/// can never be replayed as a session cookie.
#[derive(Clone)]
pub struct CsrfIssuer {
    store: SharedKv,
    ttl: Duration,
}

impl CsrfIssuer {
    pub fn new(store: SharedKv, ttl: Duration) -> Self { Self { store, ttl } }

    pub fn ttl(&self) -> Duration { self.ttl }

    pub fn key(token: &str) -> String { format!("{CSRF_KEY_PREFIX}{token}") }

    /// Mint a token bound to `session_name`. The session is not re-checked:
    /// callers sit behind the auth middleware.
    pub async fn add(&self, session_name: &str) -> AppResult<String> {
        let token = mint_token().map_err(|e| AppError::internal("token_mint", &e.to_string()))?;
        self.store
            .put(&Self::key(&token), session_name, self.ttl)
            .await
            .map_err(|e| AppError::internal("csrf_store", &e.to_string()))?;
        Ok(token)
    }

    /// True iff the token exists and is bound to `session_name`. Store errors deny.
    pub async fn check(&self, token: &str, session_name: &str) -> bool {
        if token.is_empty() || session_name.is_empty() {
            return false;
        }
        match self.store.get(&Self::key(token)).await {
            Ok(Some(bound)) => bound == session_name,
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "csrf binding lookup failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KvStore, MemoryKv, StoreError};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct DownKv;

    #[async_trait]
    impl KvStore for DownKv {
        async fn put(&self, _: &str, _: &str, _: Duration) -> Result<(), StoreError> { Err(StoreError::Unavailable("down".into())) }
        async fn get(&self, _: &str) -> Result<Option<String>, StoreError> { Err(StoreError::Unavailable("down".into())) }
        async fn delete(&self, _: &str) -> Result<(), StoreError> { Ok(()) }
    }

    #[tokio::test]
    async fn token_verifies_only_for_its_session() {
        let kv = MemoryKv::new();
        let issuer = CsrfIssuer::new(Arc::new(kv.clone()), Duration::from_secs(3600));
        let token = issuer.add("sess-a").await.unwrap();
        assert!(issuer.check(&token, "sess-a").await);
        assert!(!issuer.check(&token, "sess-b").await);
        assert!(!issuer.check("made-up", "sess-a").await);
        assert!(kv.ttl_of(&CsrfIssuer::key(&token)).unwrap() <= Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn expired_token_fails() {
        let issuer = CsrfIssuer::new(Arc::new(MemoryKv::new()), Duration::from_millis(20));
        let token = issuer.add("s").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!issuer.check(&token, "s").await);
    }

    #[tokio::test]
    async fn store_outage_fails_closed() {
        let issuer = CsrfIssuer::new(Arc::new(DownKv), Duration::from_secs(60));
        assert!(!issuer.check("any", "s").await);
        assert_eq!(issuer.add("s").await.unwrap_err().http_status(), 500);
    }
}
