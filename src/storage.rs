//!
//! foodcourt storage module
//! ------------------------
//! Two stores back the service:
//!
//! - a key-value store with per-key TTL holding sessions (`sessionName -> principalID`)
//!   and CSRF bindings (`token -> sessionName`). Production uses Redis; tests and the
//!   single-node development mode use the in-memory `MemoryKv`.
//! - a relational store (Postgres) holding users, roles and the catalog collaborators.
//!
//! Both surface failures as `StoreError`, which separates transport outages
//! (`Unavailable`) from everything else so the trust boundary can fail closed.

use std::sync::Arc;

use thiserror::Error;

pub mod kv;
pub mod redis_kv;
pub mod postgres;

pub use kv::{KvStore, MemoryKv};
pub use postgres::PgStore;
pub use redis_kv::RedisKv;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Transport or network failure reaching the store.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("store error: {0}")]
    Unexpected(String),
}

pub type SharedKv = Arc<dyn KvStore>;
