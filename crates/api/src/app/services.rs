//! Service wiring: store, catalog client, event pipeline and analytics.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use webmarket_events::{CartEvent, InMemoryEventBus};
use webmarket_infra::analytics::{ConsumerWorker, ProductActivityProjection, WorkerHandle};
use webmarket_infra::catalog::{HttpProductLookup, LookupError, ProductLookup};
use webmarket_infra::publisher::{PublisherHandle, PublisherStats, QueuedEventPublisher};
use webmarket_infra::repository::InMemoryCartRepository;
use webmarket_infra::{CartConfig, CartService, LockingCartStore};

use crate::config::ApiConfig;

pub type ApiCartStore = LockingCartStore<InMemoryCartRepository, Arc<dyn ProductLookup>>;
pub type ApiCartService = CartService<ApiCartStore, QueuedEventPublisher>;

#[derive(Debug, Error)]
pub enum ServicesError {
    #[error("failed to spawn background worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("failed to build product client: {0}")]
    Catalog(#[from] LookupError),

    #[cfg(feature = "redis")]
    #[error("failed to configure redis sink: {0}")]
    Redis(#[from] webmarket_infra::event_bus::RedisBusError),
}

/// Shared state handed to every handler.
pub struct AppServices {
    pub cart: ApiCartService,
    pub analytics: Arc<ProductActivityProjection>,
    publisher: QueuedEventPublisher,
    #[cfg(feature = "redis")]
    bus: Arc<InMemoryEventBus<CartEvent>>,
}

impl AppServices {
    pub fn publisher_stats(&self) -> PublisherStats {
        self.publisher.stats()
    }
}

/// Background threads owned by the process; stop them after the server.
#[derive(Debug)]
pub struct BackgroundWorkers {
    publisher: PublisherHandle,
    consumers: Vec<WorkerHandle>,
}

impl BackgroundWorkers {
    /// Flush queued events, then stop consumers.
    pub fn shutdown(self) {
        self.publisher.shutdown();
        for consumer in self.consumers {
            consumer.shutdown();
        }
        info!("background workers stopped");
    }
}

/// Wire services around the HTTP product service named in `config`.
///
/// Must run outside an async context: the blocking HTTP client owns its own
/// runtime.
pub fn build_services(
    config: &ApiConfig,
) -> Result<(Arc<AppServices>, BackgroundWorkers), ServicesError> {
    let lookup = HttpProductLookup::new(&config.product_service_url, config.cart.lookup_timeout)?;
    info!(product_service = %config.product_service_url, "product lookups go over http");

    #[allow(unused_mut)]
    let (services, mut workers) = build_services_with(Arc::new(lookup), &config.cart)?;

    #[cfg(feature = "redis")]
    if let Some(url) = &config.redis_url {
        let redis = webmarket_infra::event_bus::RedisPubSubEventBus::new(url, &config.events_channel)?;
        info!(channel = redis.channel(), "forwarding cart events to redis");
        workers.consumers.push(forward_to(&services.bus, "cart-events-redis", redis)?);
    }

    Ok((services, workers))
}

/// Wire services around any product lookup. Used directly by tests.
pub fn build_services_with(
    lookup: Arc<dyn ProductLookup>,
    config: &CartConfig,
) -> Result<(Arc<AppServices>, BackgroundWorkers), ServicesError> {
    let bus = Arc::new(InMemoryEventBus::<CartEvent>::new());
    let analytics = Arc::new(ProductActivityProjection::new());

    // Subscribe before the publisher can deliver anything.
    let sink = Arc::clone(&analytics);
    let analytics_worker = ConsumerWorker::spawn("cart-analytics", bus.as_ref(), move |event: CartEvent| {
        sink.apply(&event)
    })?;

    let (publisher, publisher_handle) =
        QueuedEventPublisher::spawn(Arc::clone(&bus), config.event_queue_capacity)?;

    let store = LockingCartStore::new(InMemoryCartRepository::new(), lookup, config);
    let services = AppServices {
        cart: CartService::new(store, publisher.clone()),
        analytics,
        publisher,
        #[cfg(feature = "redis")]
        bus,
    };

    Ok((
        Arc::new(services),
        BackgroundWorkers {
            publisher: publisher_handle,
            consumers: vec![analytics_worker],
        },
    ))
}

#[cfg(feature = "redis")]
fn forward_to<B>(
    source: &InMemoryEventBus<CartEvent>,
    name: &'static str,
    target: B,
) -> Result<WorkerHandle, ServicesError>
where
    B: webmarket_events::EventBus<CartEvent> + Send + 'static,
    B::Error: std::fmt::Debug + Send + 'static,
{
    Ok(ConsumerWorker::spawn(name, source, move |event: CartEvent| {
        target.publish(event)
    })?)
}
