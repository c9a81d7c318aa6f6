use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use webmarket_core::DomainError;
use webmarket_infra::CartError;

pub fn cart_error_to_response(err: CartError) -> axum::response::Response {
    match err {
        CartError::ProductNotFound(product_id) => json_error(
            StatusCode::NOT_FOUND,
            "product_not_found",
            format!("product {product_id} not found"),
        ),
        CartError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        CartError::Unavailable(msg) => json_error(StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg),
        CartError::Store(msg) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
