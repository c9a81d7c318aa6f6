use std::collections::HashMap;
use std::sync::RwLock;

use webmarket_core::ProductId;

use super::{LookupError, ProductInfo, ProductLookup};

/// In-memory catalog for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<ProductId, ProductInfo>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = ProductInfo>) -> Self {
        let catalog = Self::new();
        for product in products {
            catalog.insert(product);
        }
        catalog
    }

    pub fn insert(&self, product: ProductInfo) {
        if let Ok(mut map) = self.products.write() {
            map.insert(product.id, product);
        }
    }
}

impl ProductLookup for InMemoryCatalog {
    fn find_by_id(&self, product_id: ProductId) -> Result<Option<ProductInfo>, LookupError> {
        let map = self
            .products
            .read()
            .map_err(|_| LookupError::Transport("catalog lock poisoned".to_string()))?;
        Ok(map.get(&product_id).cloned())
    }
}
