use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use webmarket_core::{CartKey, DomainError, DomainResult, ProductId};

/// A shopper's cart: product id → quantity.
///
/// Invariant: every quantity in `items` is ≥ 1. Lines that would reach zero
/// are removed instead, so "absent" and "zero" are the same state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CartRecord")]
pub struct Cart {
    key: CartKey,
    items: BTreeMap<ProductId, u32>,
}

/// Unvalidated wire/storage shape of a cart.
#[derive(Deserialize)]
struct CartRecord {
    key: CartKey,
    #[serde(default)]
    items: BTreeMap<ProductId, u32>,
}

impl TryFrom<CartRecord> for Cart {
    type Error = DomainError;

    fn try_from(record: CartRecord) -> Result<Self, Self::Error> {
        if let Some((product_id, _)) = record.items.iter().find(|(_, q)| **q == 0) {
            return Err(DomainError::validation(format!(
                "cart {} stores zero quantity for product {product_id}",
                record.key
            )));
        }
        Ok(Self {
            key: record.key,
            items: record.items,
        })
    }
}

impl Cart {
    /// A cart with no lines.
    pub fn empty(key: CartKey) -> Self {
        Self {
            key,
            items: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> &CartKey {
        &self.key
    }

    pub fn items(&self) -> &BTreeMap<ProductId, u32> {
        &self.items
    }

    pub fn quantity_of(&self, product_id: ProductId) -> Option<u32> {
        self.items.get(&product_id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of all line quantities.
    pub fn total_quantity(&self) -> u64 {
        self.items.values().map(|q| u64::from(*q)).sum()
    }

    /// Add `qty` units of a product, returning the new line quantity.
    pub fn add(&mut self, product_id: ProductId, qty: u32) -> DomainResult<u32> {
        if qty == 0 {
            return Err(DomainError::validation("quantity to add must be at least 1"));
        }
        let current = self.quantity_of(product_id).unwrap_or(0);
        let next = current.checked_add(qty).ok_or_else(|| {
            DomainError::validation(format!("quantity overflow for product {product_id}"))
        })?;
        self.items.insert(product_id, next);
        Ok(next)
    }

    /// Take one unit off a line.
    ///
    /// Returns the quantity left (`Some(0)` when the line was dropped), or
    /// `None` when the product was not in the cart.
    pub fn decrement(&mut self, product_id: ProductId) -> Option<u32> {
        let qty = self.items.get_mut(&product_id)?;
        if *qty <= 1 {
            self.items.remove(&product_id);
            return Some(0);
        }
        *qty -= 1;
        Some(*qty)
    }

    /// Drop a line regardless of quantity, returning what it held.
    pub fn remove(&mut self, product_id: ProductId) -> Option<u32> {
        self.items.remove(&product_id)
    }

    /// Drop every line, returning how many lines were removed.
    pub fn clear(&mut self) -> usize {
        let lines = self.items.len();
        self.items.clear();
        lines
    }

    /// Fold another cart's lines into this one, summing shared products.
    ///
    /// All-or-nothing: on overflow the cart is left untouched.
    pub fn absorb(&mut self, other: &Cart) -> DomainResult<()> {
        let mut merged = self.items.clone();
        for (product_id, qty) in &other.items {
            let slot = merged.entry(*product_id).or_insert(0);
            *slot = slot.checked_add(*qty).ok_or_else(|| {
                DomainError::validation(format!("quantity overflow for product {product_id}"))
            })?;
        }
        self.items = merged;
        Ok(())
    }
}
