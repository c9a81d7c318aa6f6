//! Cart mutation events and the pub/sub mechanics that distribute them.

pub mod bus;
pub mod cart;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use cart::{CartEvent, MutationKind};
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
