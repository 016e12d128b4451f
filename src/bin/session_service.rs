//! Standalone session service: gRPC `SessionService` over Redis.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use foodcourt::config::Config;
use foodcourt::identity::SessionManager;
use foodcourt::server::{grpc, shutdown_signal};
use foodcourt::storage::{RedisKv, SharedKv};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    let config = Config::from_env()?;
    let addr: SocketAddr = config
        .session_listen_addr
        .parse()
        .with_context(|| format!("invalid session listen address '{}'", config.session_listen_addr))?;

    let kv: SharedKv = Arc::new(RedisKv::connect(&config.store_addr).await.context("connect redis")?);
    let manager = SessionManager::new(kv, config.session_ttl);
    info!(session_ttl = config.session_ttl.as_secs(), "session service starting");

    grpc::serve(addr, manager, shutdown_signal()).await
}
