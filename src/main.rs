use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use foodcourt::config::{Config, SessionMode};
use foodcourt::identity::{CsrfIssuer, GrpcSessionClient, LocalSessionClient, LoginProvider, SessionClient, SessionManager};
use foodcourt::server::chat::ChatHub;
use foodcourt::server::cookies::CookieSettings;
use foodcourt::server::{self, AppState};
use foodcourt::storage::{MemoryKv, PgStore, RedisKv, SharedKv};

const SESSION_RPC_TIMEOUT: Duration = Duration::from_secs(2);
const MEMORY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    info!(
        target: "foodcourt",
        "foodcourt starting: api={}, session_mode={}, session_ttl={}s, csrf_ttl={}s",
        config.api_listen_addr,
        config.session_mode,
        config.session_ttl.as_secs(),
        config.csrf_ttl.as_secs()
    );

    let (kv, sessions): (SharedKv, Arc<dyn SessionClient>) = match config.session_mode {
        SessionMode::Remote => {
            let kv: SharedKv = Arc::new(RedisKv::connect(&config.store_addr).await.context("connect redis")?);
            let client = GrpcSessionClient::connect_lazy(&config.session_service_addr, SESSION_RPC_TIMEOUT)
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            (kv, Arc::new(client))
        }
        SessionMode::Local => {
            let memory = MemoryKv::new();
            memory.spawn_sweeper(MEMORY_SWEEP_INTERVAL);
            let kv: SharedKv = Arc::new(memory);
            let manager = SessionManager::new(kv.clone(), config.session_ttl);
            (kv, Arc::new(LocalSessionClient::new(manager)))
        }
    };

    let db = Arc::new(PgStore::connect(&config.database_url).await?);
    db.ensure_schema().await?;

    let state = AppState {
        sessions,
        csrf: CsrfIssuer::new(kv, config.csrf_ttl),
        login: LoginProvider::new(db.clone()),
        roles: db.clone(),
        profiles: db.clone(),
        carts: db.clone(),
        vendors: db.clone(),
        products: db,
        cookies: CookieSettings {
            same_site: config.cookie_same_site,
            secure: config.session_cookie_secure,
            session_ttl: config.session_ttl,
            csrf_ttl: config.csrf_ttl,
        },
        chat: ChatHub::new(),
    };

    server::serve(&config, state).await
}
