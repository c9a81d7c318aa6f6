//! Read-side consumers of cart events.

pub mod product_activity;
pub mod worker;

pub use product_activity::{ActivityProjectionError, ProductActivity, ProductActivityProjection};
pub use worker::{ConsumerWorker, WorkerHandle};
