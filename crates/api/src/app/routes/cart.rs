//! `/api/v1/cart` routes.
//!
//! The gateway authenticates callers and forwards the user name in the
//! `username` header. When present it selects the user's cart and the path
//! token is ignored, except by `merge`, which needs both.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use webmarket_core::{CartKey, CartToken, ProductId, Username};
use webmarket_infra::{Caller, CartSnapshot, MergeOutcome};

use super::run_blocking;
use crate::app::errors;
use crate::app::services::AppServices;

pub const USERNAME_HEADER: &str = "username";

pub fn router() -> Router {
    Router::new()
        .route("/", get(get_new_cart))
        .route("/generate", get(generate_token))
        .route("/:uuid", get(get_cart))
        .route("/:uuid/add/:product_id", post(add_item))
        .route("/:uuid/decrement/:product_id", post(decrement_item))
        .route("/:uuid/remove/:product_id", post(remove_item))
        .route("/:uuid/clear", post(clear_cart))
        .route("/:uuid/merge", post(merge_carts))
}

#[derive(Debug, Deserialize)]
pub struct AddParams {
    pub qty: Option<u32>,
}

fn username_from(headers: &HeaderMap) -> Result<Option<Username>, axum::response::Response> {
    let Some(raw) = headers.get(USERNAME_HEADER) else {
        return Ok(None);
    };
    let raw = raw.to_str().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "username header is not valid text",
        )
    })?;
    Username::parse(raw)
        .map(Some)
        .map_err(errors::domain_error_to_response)
}

fn caller_from(headers: &HeaderMap, uuid: &str) -> Result<Caller, axum::response::Response> {
    if let Some(user) = username_from(headers)? {
        return Ok(Caller::Authenticated(user));
    }
    let token = CartToken::parse(uuid).map_err(errors::domain_error_to_response)?;
    Ok(Caller::Anonymous(Some(token)))
}

fn key_from(
    services: &AppServices,
    headers: &HeaderMap,
    uuid: &str,
) -> Result<CartKey, axum::response::Response> {
    let caller = caller_from(headers, uuid)?;
    Ok(services.cart.resolve_key(&caller).key)
}

/// A cart for a caller with no token yet: a user's cart, or a fresh anonymous one.
pub async fn get_new_cart(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
) -> axum::response::Response {
    let caller = match username_from(&headers) {
        Ok(user) => Caller::from_parts(user, None),
        Err(res) => return res,
    };
    match run_blocking(services, move |s| s.cart.get_cart(&caller)).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(res) => res,
    }
}

pub async fn generate_token(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    Json(serde_json::json!({ "value": services.cart.generate_cart_token() }))
}

pub async fn get_cart(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> axum::response::Response {
    let caller = match caller_from(&headers, &uuid) {
        Ok(c) => c,
        Err(res) => return res,
    };
    match run_blocking(services, move |s| s.cart.get_cart(&caller)).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(res) => res,
    }
}

pub async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Path((uuid, product_id)): Path<(String, u64)>,
    Query(params): Query<AddParams>,
) -> axum::response::Response {
    let key = match key_from(&services, &headers, &uuid) {
        Ok(k) => k,
        Err(res) => return res,
    };
    let product_id = ProductId::new(product_id);
    let qty = params.qty.unwrap_or(1);

    let response_key = key.clone();
    match run_blocking(services, move |s| s.cart.add_to_cart(&key, product_id, qty)).await {
        Ok(quantity) => Json(serde_json::json!({
            "cart_key": response_key,
            "product_id": product_id,
            "quantity": quantity,
        }))
        .into_response(),
        Err(res) => res,
    }
}

pub async fn decrement_item(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Path((uuid, product_id)): Path<(String, u64)>,
) -> axum::response::Response {
    let key = match key_from(&services, &headers, &uuid) {
        Ok(k) => k,
        Err(res) => return res,
    };
    let product_id = ProductId::new(product_id);

    let response_key = key.clone();
    match run_blocking(services, move |s| s.cart.decrement_item(&key, product_id)).await {
        Ok(left) => Json(serde_json::json!({
            "cart_key": response_key,
            "product_id": product_id,
            "quantity": left,
        }))
        .into_response(),
        Err(res) => res,
    }
}

pub async fn remove_item(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Path((uuid, product_id)): Path<(String, u64)>,
) -> axum::response::Response {
    let key = match key_from(&services, &headers, &uuid) {
        Ok(k) => k,
        Err(res) => return res,
    };
    let product_id = ProductId::new(product_id);

    let response_key = key.clone();
    match run_blocking(services, move |s| s.cart.remove_item_from_cart(&key, product_id)).await {
        Ok(removed) => Json(serde_json::json!({
            "cart_key": response_key,
            "product_id": product_id,
            "removed": removed,
        }))
        .into_response(),
        Err(res) => res,
    }
}

pub async fn clear_cart(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> axum::response::Response {
    let key = match key_from(&services, &headers, &uuid) {
        Ok(k) => k,
        Err(res) => return res,
    };

    let response_key = key.clone();
    match run_blocking(services, move |s| s.cart.clear_cart(&key)).await {
        Ok(existed) => Json(serde_json::json!({
            "cart_key": response_key,
            "cleared": existed,
        }))
        .into_response(),
        Err(res) => res,
    }
}

/// Fold the anonymous cart `{uuid}` into the signed-in user's cart.
pub async fn merge_carts(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> axum::response::Response {
    let user = match username_from(&headers) {
        Ok(Some(user)) => user,
        Ok(None) => {
            return errors::json_error(
                StatusCode::UNAUTHORIZED,
                "identity_required",
                "merge requires the username header",
            );
        }
        Err(res) => return res,
    };
    let token = match CartToken::parse(uuid) {
        Ok(t) => t,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let result = run_blocking(services, move |s| {
        let outcome = s.cart.merge(&token, &user)?;
        let lines_moved = match &outcome {
            MergeOutcome::Merged { lines_moved, .. } => *lines_moved,
            MergeOutcome::SameKey => 0,
        };
        let cart = match outcome {
            MergeOutcome::Merged { destination, .. } => CartSnapshot::new(&destination, None),
            MergeOutcome::SameKey => s.cart.get_cart(&Caller::Authenticated(user))?,
        };
        Ok((cart, lines_moved))
    })
    .await;

    match result {
        Ok((cart, lines_moved)) => Json(serde_json::json!({
            "cart": cart,
            "lines_moved": lines_moved,
        }))
        .into_response(),
        Err(res) => res,
    }
}
