//! Cart domain module.
//!
//! This crate contains the cart entity and its item-map invariants, implemented
//! purely as deterministic domain logic (no IO, no locking, no storage).

pub mod cart;

pub use cart::Cart;
