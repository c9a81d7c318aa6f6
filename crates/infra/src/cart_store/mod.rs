//! The keyed cart store: creation, mutation, merge and deletion of carts.
//!
//! ## Consistency model
//!
//! Every read-then-write runs inside a per-key critical section
//! ([`KeyLockTable`]). Operations on different keys never wait on each other.
//! `merge` holds both keys for its whole duration, taken in lexical key
//! order, so concurrent merges in opposite directions serialize instead of
//! deadlocking. Lock waits are bounded; a timeout surfaces as
//! [`CartError::Unavailable`] and leaves no partial mutation behind.
//!
//! Product lookups are network-bound and happen *before* the critical section
//! is entered, so a slow catalog never holds a cart lock.

pub mod lock_table;
pub mod locking;

use std::sync::Arc;

use thiserror::Error;

use webmarket_cart::Cart;
use webmarket_core::{CartKey, DomainError, ProductId};

use crate::repository::RepositoryError;

pub use lock_table::{KeyGuard, KeyLockTable, LockError};
pub use locking::LockingCartStore;

pub type CartResult<T> = Result<T, CartError>;

/// Cart operation error.
#[derive(Debug, Error)]
pub enum CartError {
    /// The product could not be resolved (unknown id, lookup failure or timeout).
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// Transient contention; the whole operation may be retried.
    #[error("cart temporarily unavailable: {0}")]
    Unavailable(String),

    /// Caller input was rejected.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The backing store failed.
    #[error("cart store failure: {0}")]
    Store(String),
}

impl From<DomainError> for CartError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => Self::Validation(msg),
        }
    }
}

impl From<RepositoryError> for CartError {
    fn from(value: RepositoryError) -> Self {
        Self::Store(value.to_string())
    }
}

impl From<LockError> for CartError {
    fn from(value: LockError) -> Self {
        Self::Unavailable(value.to_string())
    }
}

/// What a merge did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Source and destination were the same key; nothing changed.
    SameKey,
    /// The source was folded into the destination and deleted.
    Merged {
        destination: Cart,
        /// Number of source lines moved (0 when the source did not exist).
        lines_moved: usize,
    },
}

/// Keyed collection of carts.
pub trait CartStore: Send + Sync {
    /// Existing cart for `key`, or a freshly stored empty one.
    fn get_or_create(&self, key: &CartKey) -> CartResult<Cart>;

    /// Existing cart for `key`, without creating one.
    fn find(&self, key: &CartKey) -> CartResult<Option<Cart>>;

    /// Add `qty` units of a catalog product, creating the cart if needed.
    ///
    /// Returns the new line quantity. Fails with `ProductNotFound` before
    /// touching the cart when the catalog cannot resolve the product.
    fn add_item(&self, key: &CartKey, product_id: ProductId, qty: u32) -> CartResult<u32>;

    /// Take one unit off a line. `None` when the cart or line was absent.
    fn decrement_item(&self, key: &CartKey, product_id: ProductId) -> CartResult<Option<u32>>;

    /// Drop a whole line. Returns the removed quantity, `None` when absent.
    fn remove_item(&self, key: &CartKey, product_id: ProductId) -> CartResult<Option<u32>>;

    /// Empty a cart but keep its record. `false` when no cart existed.
    fn clear(&self, key: &CartKey) -> CartResult<bool>;

    /// Remove a cart record entirely. `false` when no cart existed.
    fn delete(&self, key: &CartKey) -> CartResult<bool>;

    /// Fold `source` into `destination`, then delete `source`.
    fn merge(&self, source: &CartKey, destination: &CartKey) -> CartResult<MergeOutcome>;
}

impl<S> CartStore for Arc<S>
where
    S: CartStore + ?Sized,
{
    fn get_or_create(&self, key: &CartKey) -> CartResult<Cart> {
        (**self).get_or_create(key)
    }

    fn find(&self, key: &CartKey) -> CartResult<Option<Cart>> {
        (**self).find(key)
    }

    fn add_item(&self, key: &CartKey, product_id: ProductId, qty: u32) -> CartResult<u32> {
        (**self).add_item(key, product_id, qty)
    }

    fn decrement_item(&self, key: &CartKey, product_id: ProductId) -> CartResult<Option<u32>> {
        (**self).decrement_item(key, product_id)
    }

    fn remove_item(&self, key: &CartKey, product_id: ProductId) -> CartResult<Option<u32>> {
        (**self).remove_item(key, product_id)
    }

    fn clear(&self, key: &CartKey) -> CartResult<bool> {
        (**self).clear(key)
    }

    fn delete(&self, key: &CartKey) -> CartResult<bool> {
        (**self).delete(key)
    }

    fn merge(&self, source: &CartKey, destination: &CartKey) -> CartResult<MergeOutcome> {
        (**self).merge(source, destination)
    }
}
