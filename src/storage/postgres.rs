//! Postgres-backed repositories: users and roles, profiles, carts, vendors, products.

use std::sync::Arc;

use parking_lot::RwLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::Json;
use tokio_postgres::{Client, Config, NoTls, Row};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::StoreError;
use crate::catalog::{
    Cart, CartItem, CartRepository, NewProduct, NewVendor, Product, ProductRepository, Profile, ProfileRepository,
    ProfileUpdate, Vendor, VendorActor, VendorRepository,
};
use crate::identity::{Credentials, NewUser, Role, RoleLookup, UserRepository};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY,
    login         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role          TEXT NOT NULL CHECK (role IN ('customer', 'partner', 'admin')),
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE TABLE IF NOT EXISTS profiles (
    principal_id  TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
    display_name  TEXT NOT NULL DEFAULT '',
    phone         TEXT NOT NULL DEFAULT '',
    address       TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS carts (
    principal_id  TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
    items         JSONB NOT NULL DEFAULT '[]'::jsonb
);
CREATE TABLE IF NOT EXISTS vendors (
    id            BIGSERIAL PRIMARY KEY,
    owner_id      TEXT NOT NULL REFERENCES users(id),
    name          TEXT NOT NULL,
    description   TEXT NOT NULL DEFAULT '',
    address       TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS products (
    id            BIGSERIAL PRIMARY KEY,
    vendor_id     BIGINT NOT NULL REFERENCES vendors(id) ON DELETE CASCADE,
    name          TEXT NOT NULL,
    description   TEXT NOT NULL DEFAULT '',
    price_cents   BIGINT NOT NULL CHECK (price_cents >= 0)
);
"#;

/// Shared Postgres handle. The connection task runs in the background; once it
/// ends the next query dials a fresh connection.
#[derive(Clone)]
pub struct PgStore {
    config: Config,
    client: Arc<RwLock<Arc<Client>>>,
    reconnect: Arc<Mutex<()>>,
}

impl PgStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let config: Config = url.parse().context("invalid postgres url")?;
        let client = open(&config).await.context("connecting to postgres")?;
        info!("Connected to postgres");
        Ok(Self { config, client: Arc::new(RwLock::new(Arc::new(client))), reconnect: Arc::new(Mutex::new(())) })
    }

    /// Create tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        self.client().await?.batch_execute(SCHEMA).await.context("installing schema")?;
        Ok(())
    }

    /// Live client, reconnecting first if the previous connection closed.
    async fn client(&self) -> Result<Arc<Client>, StoreError> {
        let current = self.client.read().clone();
        if !current.is_closed() {
            return Ok(current);
        }
        let _dialing = self.reconnect.lock().await;
        // another caller may have reconnected while we waited
        let current = self.client.read().clone();
        if !current.is_closed() {
            return Ok(current);
        }
        let fresh = Arc::new(open(&self.config).await.map_err(|e| classify("reconnect", e))?);
        *self.client.write() = fresh.clone();
        warn!("Reconnected to postgres after the previous connection closed");
        Ok(fresh)
    }
}

async fn open(config: &Config) -> Result<Client, tokio_postgres::Error> {
    let (client, conn) = config.connect(NoTls).await?;
    // drive the connection in background
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            error!("postgres connection error: {}", e);
        }
    });
    Ok(client)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    Conflict,
    Transport,
    Unexpected,
}

fn failure_kind(code: Option<&SqlState>, closed: bool, io: bool) -> Failure {
    match code {
        Some(state) if *state == SqlState::UNIQUE_VIOLATION => Failure::Conflict,
        Some(_) => Failure::Unexpected,
        None if closed || io => Failure::Transport,
        None => Failure::Unexpected,
    }
}

fn classify(op: &str, err: tokio_postgres::Error) -> StoreError {
    let io = std::error::Error::source(&err).map(|s| s.is::<std::io::Error>()).unwrap_or(false);
    let msg = format!("{op}: {err}");
    match failure_kind(err.code(), err.is_closed(), io) {
        Failure::Conflict => StoreError::Conflict(msg),
        Failure::Transport => StoreError::Unavailable(msg),
        Failure::Unexpected => StoreError::Unexpected(msg),
    }
}

fn vendor_from_row(row: &Row) -> Vendor {
    Vendor { id: row.get("id"), owner_id: row.get("owner_id"), name: row.get("name"), description: row.get("description"), address: row.get("address") }
}

fn product_from_row(row: &Row) -> Product {
    Product { id: row.get("id"), vendor_id: row.get("vendor_id"), name: row.get("name"), description: row.get("description"), price_cents: row.get("price_cents") }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find_credentials(&self, login: &str) -> Result<Option<Credentials>, StoreError> {
        let row = self
            .client()
            .await?
            .query_opt("SELECT id, password_hash FROM users WHERE login = $1", &[&login])
            .await
            .map_err(|e| classify("find_credentials", e))?;
        Ok(row.map(|r| Credentials { principal_id: r.get("id"), password_hash: r.get("password_hash") }))
    }

    async fn create_user(&self, user: NewUser) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        self.client()
            .await?
            .execute(
                "INSERT INTO users (id, login, password_hash, role) VALUES ($1, $2, $3, $4)",
                &[&id, &user.login, &user.password_hash, &user.role.as_str()],
            )
            .await
            .map_err(|e| classify("create_user", e))?;
        Ok(id)
    }
}

#[async_trait]
impl RoleLookup for PgStore {
    async fn role_of(&self, principal_id: &str) -> Result<Option<Role>, StoreError> {
        let row = self
            .client()
            .await?
            .query_opt("SELECT role FROM users WHERE id = $1", &[&principal_id])
            .await
            .map_err(|e| classify("role_of", e))?;
        match row {
            Some(r) => {
                let raw: String = r.get("role");
                raw.parse::<Role>().map(Some).map_err(StoreError::Unexpected)
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ProfileRepository for PgStore {
    async fn get(&self, principal_id: &str) -> Result<Option<Profile>, StoreError> {
        let row = self
            .client()
            .await?
            .query_opt("SELECT principal_id, display_name, phone, address FROM profiles WHERE principal_id = $1", &[&principal_id])
            .await
            .map_err(|e| classify("profile_get", e))?;
        Ok(row.map(|r| Profile { principal_id: r.get("principal_id"), display_name: r.get("display_name"), phone: r.get("phone"), address: r.get("address") }))
    }

    async fn update(&self, principal_id: &str, update: ProfileUpdate) -> Result<Profile, StoreError> {
        self.client()
            .await?
            .execute(
                "INSERT INTO profiles (principal_id, display_name, phone, address) VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (principal_id) DO UPDATE SET display_name = EXCLUDED.display_name, phone = EXCLUDED.phone, address = EXCLUDED.address",
                &[&principal_id, &update.display_name, &update.phone, &update.address],
            )
            .await
            .map_err(|e| classify("profile_update", e))?;
        Ok(Profile { principal_id: principal_id.to_string(), display_name: update.display_name, phone: update.phone, address: update.address })
    }
}

#[async_trait]
impl CartRepository for PgStore {
    async fn get(&self, principal_id: &str) -> Result<Cart, StoreError> {
        let row = self
            .client()
            .await?
            .query_opt("SELECT items FROM carts WHERE principal_id = $1", &[&principal_id])
            .await
            .map_err(|e| classify("cart_get", e))?;
        match row {
            Some(r) => {
                let Json(items): Json<Vec<CartItem>> = r.try_get("items").map_err(|e| classify("cart_decode", e))?;
                Ok(Cart { items })
            }
            None => Ok(Cart::default()),
        }
    }

    async fn replace(&self, principal_id: &str, cart: Cart) -> Result<Cart, StoreError> {
        self.client()
            .await?
            .execute(
                "INSERT INTO carts (principal_id, items) VALUES ($1, $2) ON CONFLICT (principal_id) DO UPDATE SET items = EXCLUDED.items",
                &[&principal_id, &Json(&cart.items)],
            )
            .await
            .map_err(|e| classify("cart_replace", e))?;
        Ok(cart)
    }
}

#[async_trait]
impl VendorRepository for PgStore {
    async fn list(&self) -> Result<Vec<Vendor>, StoreError> {
        let rows = self
            .client()
            .await?
            .query("SELECT id, owner_id, name, description, address FROM vendors ORDER BY id", &[])
            .await
            .map_err(|e| classify("vendor_list", e))?;
        Ok(rows.iter().map(vendor_from_row).collect())
    }

    async fn create(&self, owner_id: &str, vendor: NewVendor) -> Result<Vendor, StoreError> {
        let row = self
            .client()
            .await?
            .query_one(
                "INSERT INTO vendors (owner_id, name, description, address) VALUES ($1, $2, $3, $4) \
                 RETURNING id, owner_id, name, description, address",
                &[&owner_id, &vendor.name, &vendor.description, &vendor.address],
            )
            .await
            .map_err(|e| classify("vendor_create", e))?;
        Ok(vendor_from_row(&row))
    }
}

#[async_trait]
impl ProductRepository for PgStore {
    async fn list(&self, vendor_id: i64) -> Result<Vec<Product>, StoreError> {
        let rows = self
            .client()
            .await?
            .query("SELECT id, vendor_id, name, description, price_cents FROM products WHERE vendor_id = $1 ORDER BY id", &[&vendor_id])
            .await
            .map_err(|e| classify("product_list", e))?;
        Ok(rows.iter().map(product_from_row).collect())
    }

    async fn create(&self, vendor_id: i64, actor: &VendorActor, product: NewProduct) -> Result<Option<Product>, StoreError> {
        // insert only when the vendor exists and the actor may write under it
        let row = self
            .client()
            .await?
            .query_opt(
                "INSERT INTO products (vendor_id, name, description, price_cents) \
                 SELECT v.id, $2, $3, $4 FROM vendors v WHERE v.id = $1 AND (v.owner_id = $5 OR $6) \
                 RETURNING id, vendor_id, name, description, price_cents",
                &[&vendor_id, &product.name, &product.description, &product.price_cents, &actor.principal_id, &actor.any_vendor],
            )
            .await
            .map_err(|e| classify("product_create", e))?;
        Ok(row.as_ref().map(product_from_row))
    }
}
