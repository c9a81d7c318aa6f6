//! Product catalog lookups.
//!
//! The catalog is a remote, read-only collaborator. The cart only needs to
//! know whether a product id resolves; price and availability ride along for
//! callers that want them.

pub mod deadline;
#[cfg(feature = "http")]
pub mod http;
pub mod in_memory;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use rust_decimal::Decimal;
use webmarket_core::ProductId;

pub use deadline::DeadlineLookup;
#[cfg(feature = "http")]
pub use http::HttpProductLookup;
pub use in_memory::InMemoryCatalog;

/// Product metadata returned by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub id: ProductId,
    pub title: String,
    pub price: Decimal,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

impl ProductInfo {
    pub fn new(id: ProductId, title: impl Into<String>, price: Decimal) -> Self {
        Self {
            id,
            title: title.into(),
            price,
            available: true,
        }
    }
}

/// Why a lookup produced no answer. "Not found" is not an error; it is `Ok(None)`.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("product lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("product lookup transport failure: {0}")]
    Transport(String),

    #[error("product lookup returned an unreadable body: {0}")]
    Decode(String),
}

/// Read-only product-by-id lookup.
pub trait ProductLookup: Send + Sync {
    fn find_by_id(&self, product_id: ProductId) -> Result<Option<ProductInfo>, LookupError>;
}

impl<P> ProductLookup for Arc<P>
where
    P: ProductLookup + ?Sized,
{
    fn find_by_id(&self, product_id: ProductId) -> Result<Option<ProductInfo>, LookupError> {
        (**self).find_by_id(product_id)
    }
}
