use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use super::token::mint_token;
use crate::storage::{SharedKv, StoreError};
use crate::tprintln;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Session absent or expired; the two are indistinguishable.
    #[error("unauthorized")]
    Unauthorized,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Store or transport outage.
    #[error("session backend unavailable: {0}")]
    Unavailable(String),
    #[error("session backend error: {0}")]
    Internal(String),
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(m) => SessionError::Unavailable(m),
            StoreError::Conflict(m) | StoreError::Unexpected(m) => SessionError::Internal(m),
        }
    }
}

/// Session lifecycle over the key-value store: `sessionName -> principalID`
/// with a fixed TTL.
///
/// ```text
/// [created] --put--> [active] --TTL expiry--> [absent]
///                       |--delete-----------> [absent]
/// ```
///
/// No retries happen here; callers decide.
#[derive(Clone)]
pub struct SessionManager {
    store: SharedKv,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(store: SharedKv, ttl: Duration) -> Self { Self { store, ttl } }

    pub fn ttl(&self) -> Duration { self.ttl }

    /// Issue a new session for the principal. Other sessions of the same principal stay valid.
    pub async fn create(&self, principal_id: &str) -> Result<String, SessionError> {
        if principal_id.is_empty() {
            return Err(SessionError::InvalidArgument("principal id is empty".into()));
        }
        let name = mint_token().map_err(|e| SessionError::Internal(format!("token mint: {e}")))?;
        self.store.put(&name, principal_id, self.ttl).await?;
        tprintln!("session.create principal={} ttl_secs={}", principal_id, self.ttl.as_secs());
        Ok(name)
    }

    /// Resolve a session name to its principal.
    pub async fn check(&self, session_name: &str) -> Result<String, SessionError> {
        // minted names are base64url; anything with ':' belongs to another keyspace
        if session_name.is_empty() || session_name.contains(':') {
            return Err(SessionError::Unauthorized);
        }
        match self.store.get(session_name).await? {
            Some(principal_id) => Ok(principal_id),
            None => {
                debug!("session lookup missed");
                Err(SessionError::Unauthorized)
            }
        }
    }

    /// Drop a session; succeeds whether or not it exists.
    pub async fn delete(&self, session_name: &str) -> Result<(), SessionError> {
        if session_name.is_empty() {
            return Ok(());
        }
        self.store.delete(session_name).await?;
        Ok(())
    }
}
