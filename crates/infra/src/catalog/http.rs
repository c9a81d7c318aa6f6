//! Catalog lookup against the core product service over HTTP (optional).
//!
//! `GET {base_url}/api/v1/products/{id}`: 200 with a product body, 404 when the
//! product does not exist. Anything else is a transport failure.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;

use webmarket_core::ProductId;

use super::{LookupError, ProductInfo, ProductLookup};

#[derive(Debug, Clone)]
pub struct HttpProductLookup {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpProductLookup {
    /// Build a client whose own request timeout matches `timeout`.
    ///
    /// Must not be called from inside an async runtime worker thread.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LookupError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn product_url(&self, product_id: ProductId) -> String {
        format!("{}/api/v1/products/{}", self.base_url, product_id)
    }
}

impl ProductLookup for HttpProductLookup {
    fn find_by_id(&self, product_id: ProductId) -> Result<Option<ProductInfo>, LookupError> {
        let response = self
            .client
            .get(self.product_url(product_id))
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    LookupError::Timeout(self.timeout)
                } else {
                    LookupError::Transport(e.to_string())
                }
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<ProductInfo>()
                .map(Some)
                .map_err(|e| LookupError::Decode(e.to_string())),
            status => Err(LookupError::Transport(format!(
                "product service answered {status}"
            ))),
        }
    }
}
