//! Profile, cart, vendor and product endpoints. Bodies are decoded, sanitized
//! and validated here before any repository is called.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Extension;
use serde_json::json;

use super::handlers::decode_json;
use super::versioning::ApiVersion;
use super::AppState;
use crate::catalog::{Cart, NewProduct, NewVendor, Profile, ProfileUpdate, Sanitize, VendorActor};
use crate::error::{AppError, AppResult};
use crate::identity::{RequestContext, Role};

fn to_value<T: serde::Serialize>(v: &T) -> AppResult<serde_json::Value> {
    serde_json::to_value(v).map_err(|e| AppError::internal("encode", e.to_string()))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(version): Extension<ApiVersion>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    let result = async {
        let profile = state.profiles.get(&ctx.principal_id).await.map_err(AppError::from_business)?;
        let profile = profile.unwrap_or(Profile { principal_id: ctx.principal_id.clone(), ..Default::default() });
        to_value(&profile)
    }
    .await;
    version.respond(StatusCode::OK, result)
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(version): Extension<ApiVersion>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> Response {
    let result = async {
        let update: ProfileUpdate = decode_json::<ProfileUpdate>(&body)?.sanitize();
        let profile = state.profiles.update(&ctx.principal_id, update).await.map_err(AppError::from_business)?;
        to_value(&profile)
    }
    .await;
    version.respond(StatusCode::OK, result)
}

pub async fn get_cart(
    State(state): State<AppState>,
    Extension(version): Extension<ApiVersion>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    let result = async {
        let cart = state.carts.get(&ctx.principal_id).await.map_err(AppError::from_business)?;
        to_value(&cart)
    }
    .await;
    version.respond(StatusCode::OK, result)
}

pub async fn replace_cart(
    State(state): State<AppState>,
    Extension(version): Extension<ApiVersion>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> Response {
    let result = async {
        let cart: Cart = decode_json::<Cart>(&body)?.sanitize();
        cart.validate()?;
        let cart = state.carts.replace(&ctx.principal_id, cart).await.map_err(AppError::from_business)?;
        to_value(&cart)
    }
    .await;
    version.respond(StatusCode::OK, result)
}

pub async fn list_vendors(State(state): State<AppState>, Extension(version): Extension<ApiVersion>) -> Response {
    let result = async {
        let vendors = state.vendors.list().await.map_err(AppError::from_business)?;
        Ok::<_, AppError>(json!({"vendors": vendors}))
    }
    .await;
    version.respond(StatusCode::OK, result)
}

pub async fn create_vendor(
    State(state): State<AppState>,
    Extension(version): Extension<ApiVersion>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> Response {
    let result = async {
        let vendor: NewVendor = decode_json::<NewVendor>(&body)?.sanitize();
        vendor.validate()?;
        let created = state.vendors.create(&ctx.principal_id, vendor).await.map_err(AppError::from_business)?;
        to_value(&created)
    }
    .await;
    version.respond(StatusCode::CREATED, result)
}

pub async fn list_products(
    State(state): State<AppState>,
    Extension(version): Extension<ApiVersion>,
    Path(vendor_id): Path<i64>,
) -> Response {
    let result = async {
        let products = state.products.list(vendor_id).await.map_err(AppError::from_business)?;
        Ok::<_, AppError>(json!({"products": products}))
    }
    .await;
    version.respond(StatusCode::OK, result)
}

pub async fn create_product(
    State(state): State<AppState>,
    Extension(version): Extension<ApiVersion>,
    Extension(ctx): Extension<RequestContext>,
    Extension(role): Extension<Role>,
    Path(vendor_id): Path<i64>,
    body: Bytes,
) -> Response {
    let result = async {
        let product: NewProduct = decode_json::<NewProduct>(&body)?.sanitize();
        product.validate()?;
        let actor = VendorActor { principal_id: ctx.principal_id.clone(), any_vendor: role == Role::Admin };
        match state.products.create(vendor_id, &actor, product).await.map_err(AppError::from_business)? {
            Some(created) => to_value(&created),
            None => Err(AppError::not_found("vendor_not_found", format!("vendor {} not found or not yours", vendor_id))),
        }
    }
    .await;
    version.respond(StatusCode::CREATED, result)
}
