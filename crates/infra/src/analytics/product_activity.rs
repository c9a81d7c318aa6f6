use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use webmarket_core::ProductId;
use webmarket_events::{CartEvent, Event, MutationKind};

/// How many recent event ids are remembered for redelivery detection.
const DEDUPE_WINDOW: usize = 10_000;

/// Queryable read model: cart activity per product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductActivity {
    pub product_id: ProductId,
    pub added: u64,
    pub decremented: u64,
    pub removed: u64,
    pub last_event_at: DateTime<Utc>,
}

impl ProductActivity {
    fn new(product_id: ProductId, at: DateTime<Utc>) -> Self {
        Self {
            product_id,
            added: 0,
            decremented: 0,
            removed: 0,
            last_event_at: at,
        }
    }
}

#[derive(Debug, Error)]
pub enum ActivityProjectionError {
    #[error("projection state lock poisoned")]
    Poisoned,

    #[error("{kind:?} event {event_id} carries no product id")]
    MissingProduct { event_id: Uuid, kind: MutationKind },
}

#[derive(Debug, Default)]
struct State {
    products: HashMap<ProductId, ProductActivity>,
    clears: u64,
    seen: HashSet<Uuid>,
    seen_order: VecDeque<Uuid>,
}

impl State {
    /// Record an event id; `false` if it was already seen.
    fn first_sighting(&mut self, event_id: Uuid) -> bool {
        if !self.seen.insert(event_id) {
            return false;
        }
        self.seen_order.push_back(event_id);
        if self.seen_order.len() > DEDUPE_WINDOW {
            if let Some(old) = self.seen_order.pop_front() {
                self.seen.remove(&old);
            }
        }
        true
    }
}

/// Analytics projection over cart events.
///
/// Idempotent for at-least-once delivery within the dedupe window:
/// redelivered `event_id`s are ignored.
#[derive(Debug, Default)]
pub struct ProductActivityProjection {
    state: RwLock<State>,
}

impl ProductActivityProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, product_id: ProductId) -> Option<ProductActivity> {
        self.state.read().ok()?.products.get(&product_id).cloned()
    }

    /// All products with activity, ordered by product id.
    pub fn list(&self) -> Vec<ProductActivity> {
        let Ok(state) = self.state.read() else {
            return vec![];
        };
        let mut all: Vec<_> = state.products.values().cloned().collect();
        all.sort_by_key(|a| a.product_id);
        all
    }

    /// Number of cart clears observed.
    pub fn clears(&self) -> u64 {
        self.state.read().map(|s| s.clears).unwrap_or(0)
    }

    pub fn apply(&self, event: &CartEvent) -> Result<(), ActivityProjectionError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| ActivityProjectionError::Poisoned)?;

        if event.kind == MutationKind::Cleared {
            if state.first_sighting(event.event_id) {
                state.clears += 1;
            }
            return Ok(());
        }

        let product_id = event
            .product_id
            .ok_or(ActivityProjectionError::MissingProduct {
                event_id: event.event_id,
                kind: event.kind,
            })?;

        if !state.first_sighting(event.event_id) {
            return Ok(());
        }

        let at = event.occurred_at();
        let entry = state
            .products
            .entry(product_id)
            .or_insert_with(|| ProductActivity::new(product_id, at));
        match event.kind {
            MutationKind::Added => entry.added += 1,
            MutationKind::Decremented => entry.decremented += 1,
            MutationKind::Removed => entry.removed += 1,
            MutationKind::Cleared => {}
        }
        entry.last_event_at = entry.last_event_at.max(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webmarket_core::CartKey;

    fn key() -> CartKey {
        CartKey::from_raw("k")
    }

    #[test]
    fn counts_by_kind() {
        let p = ProductActivityProjection::new();
        let pid = ProductId::new(5);
        p.apply(&CartEvent::added(key(), pid, 1)).unwrap();
        p.apply(&CartEvent::added(key(), pid, 2)).unwrap();
        p.apply(&CartEvent::decremented(key(), pid, 1)).unwrap();
        p.apply(&CartEvent::removed(key(), pid)).unwrap();
        p.apply(&CartEvent::cleared(key())).unwrap();

        let a = p.get(pid).unwrap();
        assert_eq!((a.added, a.decremented, a.removed), (2, 1, 1));
        assert_eq!(p.clears(), 1);
    }

    #[test]
    fn redelivery_is_ignored() {
        let p = ProductActivityProjection::new();
        let e = CartEvent::added(key(), ProductId::new(1), 1);
        p.apply(&e).unwrap();
        p.apply(&e).unwrap();
        assert_eq!(p.get(ProductId::new(1)).unwrap().added, 1);
    }

    #[test]
    fn product_event_without_product_is_rejected() {
        let p = ProductActivityProjection::new();
        let mut e = CartEvent::added(key(), ProductId::new(1), 1);
        e.product_id = None;
        assert!(matches!(
            p.apply(&e),
            Err(ActivityProjectionError::MissingProduct { .. })
        ));
        assert!(p.list().is_empty());
    }

    #[test]
    fn last_event_time_never_moves_back() {
        let p = ProductActivityProjection::new();
        let pid = ProductId::new(9);
        let earlier = CartEvent::added(key(), pid, 1);
        let later = CartEvent::added(key(), pid, 2);
        assert!(earlier.occurred_at() <= later.occurred_at());

        p.apply(&later).unwrap();
        p.apply(&earlier).unwrap();

        let a = p.get(pid).unwrap();
        assert_eq!(a.added, 2);
        assert_eq!(a.last_event_at, later.occurred_at());
    }

    #[test]
    fn list_is_sorted() {
        let p = ProductActivityProjection::new();
        for id in [3, 1, 2] {
            p.apply(&CartEvent::added(key(), ProductId::new(id), 1)).unwrap();
        }
        let ids: Vec<u64> = p.list().iter().map(|a| a.product_id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
