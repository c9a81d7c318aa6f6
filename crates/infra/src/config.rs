//! Cart runtime configuration.

use std::time::Duration;

/// Tunables for the cart store and event publisher.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Upper bound on waiting for a per-key critical section.
    pub lock_timeout: Duration,
    /// Upper bound on a single product lookup.
    pub lookup_timeout: Duration,
    /// Outbound event queue capacity; events beyond it are dropped.
    pub event_queue_capacity: usize,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(2),
            lookup_timeout: Duration::from_secs(3),
            event_queue_capacity: 1024,
        }
    }
}

impl CartConfig {
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn with_event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity.max(1);
        self
    }
}
