//! Cart mutation events reported to analytics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use webmarket_core::{CartKey, ProductId};

use crate::event::Event;

/// What a cart mutation did.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Added,
    Decremented,
    Removed,
    Cleared,
}

/// Event: one cart mutation, as observed by the cart service.
///
/// `product_id` is `None` only for `Cleared`. `new_quantity` is the quantity
/// left in the cart after the mutation (0 once the line is gone).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEvent {
    pub event_id: Uuid,
    pub cart_key: CartKey,
    pub product_id: Option<ProductId>,
    pub new_quantity: u32,
    pub kind: MutationKind,
    pub occurred_at: DateTime<Utc>,
}

impl CartEvent {
    fn new(
        cart_key: CartKey,
        product_id: Option<ProductId>,
        new_quantity: u32,
        kind: MutationKind,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            cart_key,
            product_id,
            new_quantity,
            kind,
            occurred_at: Utc::now(),
        }
    }

    pub fn added(cart_key: CartKey, product_id: ProductId, new_quantity: u32) -> Self {
        Self::new(cart_key, Some(product_id), new_quantity, MutationKind::Added)
    }

    pub fn decremented(cart_key: CartKey, product_id: ProductId, new_quantity: u32) -> Self {
        Self::new(cart_key, Some(product_id), new_quantity, MutationKind::Decremented)
    }

    pub fn removed(cart_key: CartKey, product_id: ProductId) -> Self {
        Self::new(cart_key, Some(product_id), 0, MutationKind::Removed)
    }

    pub fn cleared(cart_key: CartKey) -> Self {
        Self::new(cart_key, None, 0, MutationKind::Cleared)
    }
}

impl Event for CartEvent {
    fn event_type(&self) -> &'static str {
        match self.kind {
            MutationKind::Added => "cart.item.added",
            MutationKind::Decremented => "cart.item.decremented",
            MutationKind::Removed => "cart.item.removed",
            MutationKind::Cleared => "cart.cleared",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}
