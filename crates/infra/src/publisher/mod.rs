//! Outbound cart events.
//!
//! Emission is fire-and-forget from the cart's point of view: the request
//! path only enqueues, a background worker forwards to the bus. A full queue
//! or a dead worker drops the event; the cart mutation has already happened
//! and is never undone for it.

pub mod queued;

use std::sync::Arc;

use thiserror::Error;

use webmarket_events::CartEvent;

pub use queued::{PublisherHandle, PublisherStats, QueuedEventPublisher};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("event queue full; event dropped")]
    QueueFull,

    #[error("event worker stopped; event dropped")]
    Closed,
}

/// Sink for cart mutation events.
pub trait EventPublisher: Send + Sync {
    fn emit(&self, event: CartEvent) -> Result<(), PublishError>;
}

impl<P> EventPublisher for Arc<P>
where
    P: EventPublisher + ?Sized,
{
    fn emit(&self, event: CartEvent) -> Result<(), PublishError> {
        (**self).emit(event)
    }
}
