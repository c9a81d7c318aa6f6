use tracing::{debug, info, warn};

use webmarket_cart::Cart;
use webmarket_core::{CartKey, ProductId};

use crate::catalog::{DeadlineLookup, ProductLookup};
use crate::config::CartConfig;
use crate::repository::CartRepository;

use super::{CartError, CartResult, CartStore, KeyLockTable, MergeOutcome};

/// Cart store that serializes writers per key in front of any repository.
///
/// - `R`: where carts live (see [`CartRepository`])
/// - `P`: catalog client; every call is wrapped in a [`DeadlineLookup`]
#[derive(Debug)]
pub struct LockingCartStore<R, P> {
    repository: R,
    lookup: DeadlineLookup<P>,
    locks: KeyLockTable,
}

impl<R, P> LockingCartStore<R, P>
where
    R: CartRepository,
    P: ProductLookup + 'static,
{
    pub fn new(repository: R, lookup: P, config: &CartConfig) -> Self {
        Self {
            repository,
            lookup: DeadlineLookup::new(lookup, config.lookup_timeout),
            locks: KeyLockTable::new(config.lock_timeout),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Per-key critical sections. A guard taken here blocks every store
    /// operation on its keys until dropped.
    pub fn locks(&self) -> &KeyLockTable {
        &self.locks
    }

    fn ensure_product(&self, product_id: ProductId) -> CartResult<()> {
        match self.lookup.find_by_id(product_id) {
            Ok(Some(_)) => Ok(()),
            Ok(None) => {
                debug!(%product_id, "product not in catalog");
                Err(CartError::ProductNotFound(product_id))
            }
            Err(err) => {
                warn!(%product_id, error = %err, "product lookup failed; treating as not found");
                Err(CartError::ProductNotFound(product_id))
            }
        }
    }

    /// Put back a destination cart after a failed merge step.
    fn restore(&self, destination: &CartKey, previous: Option<Cart>) {
        let restored = match previous {
            Some(cart) => self.repository.put(cart),
            None => self.repository.remove(destination).map(|_| ()),
        };
        if let Err(err) = restored {
            warn!(%destination, error = %err, "failed to roll back merge destination");
        }
    }
}

impl<R, P> CartStore for LockingCartStore<R, P>
where
    R: CartRepository,
    P: ProductLookup + 'static,
{
    fn get_or_create(&self, key: &CartKey) -> CartResult<Cart> {
        if let Some(cart) = self.repository.get(key)? {
            return Ok(cart);
        }

        // Re-check under the lock: a concurrent add may have created it.
        let _guard = self.locks.lock(key)?;
        if let Some(cart) = self.repository.get(key)? {
            return Ok(cart);
        }
        let cart = Cart::empty(key.clone());
        self.repository.put(cart.clone())?;
        debug!(cart_key = %key, "created empty cart");
        Ok(cart)
    }

    fn find(&self, key: &CartKey) -> CartResult<Option<Cart>> {
        Ok(self.repository.get(key)?)
    }

    fn add_item(&self, key: &CartKey, product_id: ProductId, qty: u32) -> CartResult<u32> {
        if qty == 0 {
            return Err(CartError::Validation("quantity to add must be at least 1".to_string()));
        }
        self.ensure_product(product_id)?;

        let _guard = self.locks.lock(key)?;
        let mut cart = self
            .repository
            .get(key)?
            .unwrap_or_else(|| Cart::empty(key.clone()));
        let quantity = cart.add(product_id, qty)?;
        self.repository.put(cart)?;
        Ok(quantity)
    }

    fn decrement_item(&self, key: &CartKey, product_id: ProductId) -> CartResult<Option<u32>> {
        let _guard = self.locks.lock(key)?;
        let Some(mut cart) = self.repository.get(key)? else {
            debug!(cart_key = %key, %product_id, "decrement on missing cart ignored");
            return Ok(None);
        };
        let Some(left) = cart.decrement(product_id) else {
            debug!(cart_key = %key, %product_id, "decrement on missing line ignored");
            return Ok(None);
        };
        self.repository.put(cart)?;
        Ok(Some(left))
    }

    fn remove_item(&self, key: &CartKey, product_id: ProductId) -> CartResult<Option<u32>> {
        let _guard = self.locks.lock(key)?;
        let Some(mut cart) = self.repository.get(key)? else {
            return Ok(None);
        };
        let Some(removed) = cart.remove(product_id) else {
            return Ok(None);
        };
        self.repository.put(cart)?;
        Ok(Some(removed))
    }

    fn clear(&self, key: &CartKey) -> CartResult<bool> {
        let _guard = self.locks.lock(key)?;
        let Some(mut cart) = self.repository.get(key)? else {
            debug!(cart_key = %key, "clear on missing cart ignored");
            return Ok(false);
        };
        if cart.clear() > 0 {
            self.repository.put(cart)?;
        }
        Ok(true)
    }

    fn delete(&self, key: &CartKey) -> CartResult<bool> {
        let _guard = self.locks.lock(key)?;
        Ok(self.repository.remove(key)?)
    }

    fn merge(&self, source: &CartKey, destination: &CartKey) -> CartResult<MergeOutcome> {
        if source == destination {
            debug!(cart_key = %source, "merge of a cart with itself ignored");
            return Ok(MergeOutcome::SameKey);
        }

        let _guard = self.locks.lock_all(&[source, destination])?;

        let source_cart = self.repository.get(source)?;
        let previous = self.repository.get(destination)?;

        let mut merged = previous
            .clone()
            .unwrap_or_else(|| Cart::empty(destination.clone()));
        let lines_moved = match &source_cart {
            Some(src) => {
                merged.absorb(src)?;
                src.items().len()
            }
            None => 0,
        };

        // Destination first: a failure here leaves both carts as they were.
        self.repository.put(merged.clone())?;

        if source_cart.is_some() {
            if let Err(err) = self.repository.remove(source) {
                self.restore(destination, previous);
                return Err(err.into());
            }
        }

        info!(%source, %destination, lines_moved, "merged carts");
        Ok(MergeOutcome::Merged {
            destination: merged,
            lines_moved,
        })
    }
}
