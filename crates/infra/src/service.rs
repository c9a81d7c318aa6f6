//! Cart use cases: key resolution, store delegation and event emission.

use serde::Serialize;
use tracing::{debug, info, warn};

use webmarket_cart::Cart;
use webmarket_core::{CartKey, CartToken, ProductId, Username};
use webmarket_events::{CartEvent, Event};

use crate::cart_store::{CartResult, CartStore, MergeOutcome};
use crate::publisher::EventPublisher;

/// Who is asking. Authentication happens upstream; this only carries its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Authenticated(Username),
    Anonymous(Option<CartToken>),
}

impl Caller {
    /// Identity wins over any anonymous token the caller also sent.
    pub fn from_parts(username: Option<Username>, token: Option<CartToken>) -> Self {
        match username {
            Some(user) => Self::Authenticated(user),
            None => Self::Anonymous(token),
        }
    }
}

/// Cart key chosen for a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    pub key: CartKey,
    /// Set when a token had to be generated; the caller must keep it.
    pub issued_token: Option<CartToken>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Read-only view of a cart as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartSnapshot {
    pub key: CartKey,
    pub items: Vec<CartLine>,
    pub total_quantity: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_token: Option<CartToken>,
}

impl CartSnapshot {
    pub fn new(cart: &Cart, issued_token: Option<CartToken>) -> Self {
        Self {
            key: cart.key().clone(),
            items: cart
                .items()
                .iter()
                .map(|(product_id, quantity)| CartLine {
                    product_id: *product_id,
                    quantity: *quantity,
                })
                .collect(),
            total_quantity: cart.total_quantity(),
            issued_token,
        }
    }

    pub fn quantity_of(&self, product_id: ProductId) -> Option<u32> {
        self.items
            .iter()
            .find(|line| line.product_id == product_id)
            .map(|line| line.quantity)
    }
}

/// Application service over a [`CartStore`].
///
/// Every successful mutation is reported to the [`EventPublisher`] after the
/// store call has returned, i.e. outside the cart's critical section.
/// Emission failures are logged and dropped; they never fail the mutation.
#[derive(Debug)]
pub struct CartService<S, E> {
    store: S,
    publisher: E,
}

impl<S, E> CartService<S, E>
where
    S: CartStore,
    E: EventPublisher,
{
    pub fn new(store: S, publisher: E) -> Self {
        Self { store, publisher }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn generate_cart_token(&self) -> CartToken {
        CartToken::generate()
    }

    pub fn resolve_key(&self, caller: &Caller) -> ResolvedKey {
        match caller {
            Caller::Authenticated(user) => ResolvedKey {
                key: CartKey::for_user(user),
                issued_token: None,
            },
            Caller::Anonymous(Some(token)) => ResolvedKey {
                key: CartKey::for_token(token),
                issued_token: None,
            },
            Caller::Anonymous(None) => {
                let token = self.generate_cart_token();
                info!(cart_key = %token.as_str(), "issued anonymous cart token");
                ResolvedKey {
                    key: CartKey::for_token(&token),
                    issued_token: Some(token),
                }
            }
        }
    }

    /// The caller's cart, created empty on first access.
    pub fn get_cart(&self, caller: &Caller) -> CartResult<CartSnapshot> {
        let resolved = self.resolve_key(caller);
        let cart = self.store.get_or_create(&resolved.key)?;
        Ok(CartSnapshot::new(&cart, resolved.issued_token))
    }

    /// Add `qty` units and return the new line quantity.
    pub fn add_to_cart(&self, key: &CartKey, product_id: ProductId, qty: u32) -> CartResult<u32> {
        let quantity = self.store.add_item(key, product_id, qty)?;
        self.emit(CartEvent::added(key.clone(), product_id, quantity));
        Ok(quantity)
    }

    pub fn decrement_item(&self, key: &CartKey, product_id: ProductId) -> CartResult<Option<u32>> {
        let left = self.store.decrement_item(key, product_id)?;
        if let Some(quantity) = left {
            self.emit(CartEvent::decremented(key.clone(), product_id, quantity));
        }
        Ok(left)
    }

    pub fn remove_item_from_cart(
        &self,
        key: &CartKey,
        product_id: ProductId,
    ) -> CartResult<Option<u32>> {
        let removed = self.store.remove_item(key, product_id)?;
        if removed.is_some() {
            self.emit(CartEvent::removed(key.clone(), product_id));
        }
        Ok(removed)
    }

    pub fn clear_cart(&self, key: &CartKey) -> CartResult<bool> {
        let existed = self.store.clear(key)?;
        if existed {
            self.emit(CartEvent::cleared(key.clone()));
        }
        Ok(existed)
    }

    /// Fold an anonymous cart into the user's cart. The user's cart survives.
    pub fn merge(&self, anonymous: &CartToken, user: &Username) -> CartResult<MergeOutcome> {
        self.store
            .merge(&CartKey::for_token(anonymous), &CartKey::for_user(user))
    }

    fn emit(&self, event: CartEvent) {
        let event_id = event.event_id;
        let event_type = event.event_type();
        match self.publisher.emit(event) {
            Ok(()) => debug!(%event_id, event_type, "cart event queued"),
            Err(err) => warn!(%event_id, event_type, error = %err, "cart event dropped"),
        }
    }
}
