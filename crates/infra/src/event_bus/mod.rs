//! Broker-backed `EventBus` implementations for cart events.
//!
//! The bus abstraction itself lives in `webmarket-events`; in-process
//! delivery uses its `InMemoryEventBus`.

#[cfg(feature = "redis")]
pub mod redis_pubsub;

#[cfg(feature = "redis")]
pub use redis_pubsub::{RedisBusError, RedisPubSubEventBus};
