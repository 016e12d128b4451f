//! Business collaborators of the API: profiles, carts, vendors and products.
//!
//! These are plain persistence contracts. Handlers decode a model, run it through
//! [`Sanitize`] and validate it before any repository sees it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::storage::StoreError;

mod sanitize;
pub use sanitize::{clean_text, Sanitize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub principal_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CartItem {
    pub product_id: i64,
    pub quantity: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cart {
    #[serde(default)]
    pub items: Vec<CartItem>,
}

impl Cart {
    pub fn validate(&self) -> AppResult<()> {
        if self.items.iter().any(|i| i.quantity == 0) {
            return Err(AppError::user("invalid_quantity", "cart quantities must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vendor {
    pub id: i64,
    pub owner_id: String,
    pub name: String,
    pub description: String,
    pub address: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewVendor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub address: String,
}

impl NewVendor {
    pub fn validate(&self) -> AppResult<()> {
        if self.name.is_empty() {
            return Err(AppError::user("missing_name", "vendor name is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: i64,
    pub vendor_id: i64,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price_cents: i64,
}

impl NewProduct {
    pub fn validate(&self) -> AppResult<()> {
        if self.name.is_empty() {
            return Err(AppError::user("missing_name", "product name is required"));
        }
        if self.price_cents < 0 {
            return Err(AppError::user("invalid_price", "price must not be negative"));
        }
        Ok(())
    }
}

/// Who is asking to write under a vendor. Admins may write under any vendor;
/// partners only under their own.
#[derive(Debug, Clone)]
pub struct VendorActor {
    pub principal_id: String,
    pub any_vendor: bool,
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get(&self, principal_id: &str) -> Result<Option<Profile>, StoreError>;
    async fn update(&self, principal_id: &str, update: ProfileUpdate) -> Result<Profile, StoreError>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    /// An absent cart is an empty cart, not an error.
    async fn get(&self, principal_id: &str) -> Result<Cart, StoreError>;
    async fn replace(&self, principal_id: &str, cart: Cart) -> Result<Cart, StoreError>;
}

#[async_trait]
pub trait VendorRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Vendor>, StoreError>;
    async fn create(&self, owner_id: &str, vendor: NewVendor) -> Result<Vendor, StoreError>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list(&self, vendor_id: i64) -> Result<Vec<Product>, StoreError>;
    /// Returns `None` when the vendor does not exist or the actor may not write under it.
    async fn create(&self, vendor_id: i64, actor: &VendorActor, product: NewProduct) -> Result<Option<Product>, StoreError>;
}
