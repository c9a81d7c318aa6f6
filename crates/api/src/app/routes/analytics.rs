use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use webmarket_core::ProductId;

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/products", get(list_product_activity))
        .route("/products/:id", get(get_product_activity))
}

pub async fn list_product_activity(
    Extension(services): Extension<Arc<AppServices>>,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "products": services.analytics.list(),
        "clears": services.analytics.clears(),
    }))
}

pub async fn get_product_activity(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<u64>,
) -> axum::response::Response {
    match services.analytics.get(ProductId::new(id)) {
        Some(activity) => Json(activity).into_response(),
        None => errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no cart activity for product {id}"),
        ),
    }
}
