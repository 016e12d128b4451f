use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::StoreError;

/// Key-value contract shared by the session service and the CSRF issuer.
///
/// - `put` overwrites any existing value and replaces its TTL.
/// - `get` returns `None` once the TTL has elapsed, deleted or not.
/// - `delete` of a missing key succeeds.
///
/// Each call is atomic on its key; there are no multi-key operations.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Clone, Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process TTL store. Expiry is enforced on read; `sweep` reclaims memory
/// for keys nobody reads again.
#[derive(Clone, Default)]
pub struct MemoryKv {
    map: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryKv {
    pub fn new() -> Self { Self::default() }

    /// Remove every expired key, returning how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut w = self.map.write();
        let before = w.len();
        w.retain(|_, e| e.expires_at > now);
        before - w.len()
    }

    /// Spawn a background task sweeping expired keys at the given interval.
    pub fn spawn_sweeper(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let removed = this.sweep();
                if removed > 0 { tracing::debug!(removed = removed, "kv_sweep"); }
            }
        })
    }

    /// Remaining lifetime of a live key.
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.map.read().get(key).and_then(|e| {
            if e.expires_at > now { Some(e.expires_at - now) } else { None }
        })
    }

    /// Number of keys currently held, expired or not.
    pub fn len(&self) -> usize { self.map.read().len() }

    pub fn is_empty(&self) -> bool { self.map.read().is_empty() }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let ent = Entry { value: value.to_string(), expires_at: Instant::now() + ttl };
        self.map.write().insert(key.to_string(), ent);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let expired = {
            let r = self.map.read();
            match r.get(key) {
                Some(ent) if ent.expires_at > now => return Ok(Some(ent.value.clone())),
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            // re-check under the write lock; a concurrent put may have refreshed it
            let mut w = self.map.write();
            if w.get(key).map(|e| e.expires_at <= now).unwrap_or(false) {
                w.remove(key);
            }
        }
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.map.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[path = "kv_tests.rs"]
mod kv_tests;
