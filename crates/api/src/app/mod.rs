//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store, catalog client and event pipeline construction
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `errors.rs`: consistent error responses
//! - `middleware.rs`: request logging

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

pub mod errors;
pub mod middleware;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub fn build_app(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api/v1/cart", routes::cart::router())
        .nest("/api/v1/analytics", routes::analytics::router())
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::request_log))
                .layer(Extension(services)),
        )
}
