//! Keyed cart persistence.
//!
//! A repository is a dumb key/value backing: it stores whole carts and knows
//! nothing about serialization of concurrent writers. The cart store layers
//! per-key critical sections on top, so any backing with atomic single-key
//! `get`/`put`/`remove` is conformant (in-memory map, relational row, cache).

pub mod in_memory;

use std::sync::Arc;

use thiserror::Error;

use webmarket_cart::Cart;
use webmarket_core::CartKey;

pub use in_memory::InMemoryCartRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("repository lock poisoned")]
    Poisoned,

    #[error("backend failure: {0}")]
    Backend(String),
}

/// Whole-cart storage by key.
pub trait CartRepository: Send + Sync {
    fn get(&self, key: &CartKey) -> Result<Option<Cart>, RepositoryError>;

    /// Insert or overwrite the cart stored under `cart.key()`.
    fn put(&self, cart: Cart) -> Result<(), RepositoryError>;

    /// Delete a cart, reporting whether it existed.
    fn remove(&self, key: &CartKey) -> Result<bool, RepositoryError>;
}

impl<R> CartRepository for Arc<R>
where
    R: CartRepository + ?Sized,
{
    fn get(&self, key: &CartKey) -> Result<Option<Cart>, RepositoryError> {
        (**self).get(key)
    }

    fn put(&self, cart: Cart) -> Result<(), RepositoryError> {
        (**self).put(cart)
    }

    fn remove(&self, key: &CartKey) -> Result<bool, RepositoryError> {
        (**self).remove(key)
    }
}
