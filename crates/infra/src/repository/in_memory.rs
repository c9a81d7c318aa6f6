use std::collections::HashMap;
use std::sync::RwLock;

use webmarket_cart::Cart;
use webmarket_core::CartKey;

use super::{CartRepository, RepositoryError};

/// In-memory cart backing for tests/dev and single-node deployments.
///
/// The map lock is held only for the duration of one `get`/`put`/`remove`.
#[derive(Debug, Default)]
pub struct InMemoryCartRepository {
    inner: RwLock<HashMap<CartKey, Cart>>,
}

impl InMemoryCartRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored carts.
    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CartRepository for InMemoryCartRepository {
    fn get(&self, key: &CartKey) -> Result<Option<Cart>, RepositoryError> {
        let map = self.inner.read().map_err(|_| RepositoryError::Poisoned)?;
        Ok(map.get(key).cloned())
    }

    fn put(&self, cart: Cart) -> Result<(), RepositoryError> {
        let mut map = self.inner.write().map_err(|_| RepositoryError::Poisoned)?;
        map.insert(cart.key().clone(), cart);
        Ok(())
    }

    fn remove(&self, key: &CartKey) -> Result<bool, RepositoryError> {
        let mut map = self.inner.write().map_err(|_| RepositoryError::Poisoned)?;
        Ok(map.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webmarket_core::ProductId;

    #[test]
    fn put_get_remove() {
        let repo = InMemoryCartRepository::new();
        let key = CartKey::from_raw("k");
        let mut cart = Cart::empty(key.clone());
        cart.add(ProductId::new(1), 2).unwrap();

        repo.put(cart.clone()).unwrap();
        assert_eq!(repo.get(&key).unwrap(), Some(cart));
        assert_eq!(repo.len(), 1);

        assert!(repo.remove(&key).unwrap());
        assert!(!repo.remove(&key).unwrap());
        assert_eq!(repo.get(&key).unwrap(), None);
        assert!(repo.is_empty());
    }
}
