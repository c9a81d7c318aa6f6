//! Infrastructure layer: cart storage, catalog clients, event delivery and the
//! cart service wiring them together.

pub mod analytics;
pub mod cart_store;
pub mod catalog;
pub mod config;
pub mod event_bus;
pub mod publisher;
pub mod repository;
pub mod service;


pub use cart_store::{CartError, CartResult, CartStore, LockingCartStore, MergeOutcome};
pub use config::CartConfig;
pub use service::{Caller, CartLine, CartService, CartSnapshot, ResolvedKey};
