pub mod analytics;
pub mod cart;
pub mod system;

use std::sync::Arc;

use axum::http::StatusCode;

use webmarket_infra::CartResult;

use crate::app::errors;
use crate::app::services::AppServices;

/// Run a cart call on the blocking pool; the cart store waits on locks and
/// the catalog synchronously.
pub(crate) async fn run_blocking<T, F>(
    services: Arc<AppServices>,
    f: F,
) -> Result<T, axum::response::Response>
where
    F: FnOnce(&AppServices) -> CartResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(move || f(&services)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(errors::cart_error_to_response(err)),
        Err(join) => Err(errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            join.to_string(),
        )),
    }
}
