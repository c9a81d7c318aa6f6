use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender, TrySendError};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use webmarket_events::{CartEvent, Event, EventBus};

use super::{EventPublisher, PublishError};

/// Counters shared between the publisher and its worker.
#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of publisher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublisherStats {
    pub enqueued: u64,
    pub dropped: u64,
    pub delivered: u64,
    pub failed: u64,
}

/// Request-path side of the event pipeline: a bounded queue sender.
#[derive(Debug, Clone)]
pub struct QueuedEventPublisher {
    tx: SyncSender<CartEvent>,
    counters: Arc<Counters>,
}

/// Handle to control and join the forwarding worker.
#[derive(Debug)]
pub struct PublisherHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl Counters {
    fn snapshot(&self) -> PublisherStats {
        PublisherStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

impl PublisherHandle {
    pub fn stats(&self) -> PublisherStats {
        self.counters.snapshot()
    }

    /// Ask the worker to forward what is queued, then stop; waits for it.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

impl QueuedEventPublisher {
    pub fn stats(&self) -> PublisherStats {
        self.counters.snapshot()
    }

    /// Spawn the forwarding worker and return the publisher feeding it.
    ///
    /// Events are forwarded to `bus` in enqueue order. Bus failures are
    /// logged and counted, never retried.
    pub fn spawn<B>(bus: B, capacity: usize) -> std::io::Result<(Self, PublisherHandle)>
    where
        B: EventBus<CartEvent> + 'static,
    {
        let (tx, rx) = mpsc::sync_channel::<CartEvent>(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let counters = Arc::new(Counters::default());

        let worker_counters = Arc::clone(&counters);
        let join = thread::Builder::new()
            .name("cart-event-publisher".to_string())
            .spawn(move || forward_loop(rx, shutdown_rx, &bus, &worker_counters))?;

        Ok((
            Self {
                tx,
                counters: Arc::clone(&counters),
            },
            PublisherHandle {
                shutdown: shutdown_tx,
                join: Some(join),
                counters,
            },
        ))
    }
}

impl EventPublisher for QueuedEventPublisher {
    fn emit(&self, event: CartEvent) -> Result<(), PublishError> {
        match self.tx.try_send(event) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                Err(PublishError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                Err(PublishError::Closed)
            }
        }
    }
}

fn forward_loop<B>(
    rx: mpsc::Receiver<CartEvent>,
    shutdown_rx: mpsc::Receiver<()>,
    bus: &B,
    counters: &Counters,
) where
    B: EventBus<CartEvent>,
{
    let tick = Duration::from_millis(250);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            // Flush what is already queued, then stop.
            while let Ok(event) = rx.try_recv() {
                forward(bus, event, counters);
            }
            break;
        }

        match rx.recv_timeout(tick) {
            Ok(event) => forward(bus, event, counters),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!("cart event publisher stopped");
}

fn forward<B>(bus: &B, event: CartEvent, counters: &Counters)
where
    B: EventBus<CartEvent>,
{
    let event_id = event.event_id;
    let event_type = event.event_type();
    let version = event.version();
    match bus.publish(event) {
        Ok(()) => {
            counters.delivered.fetch_add(1, Ordering::Relaxed);
            debug!(%event_id, event_type, version, "cart event forwarded");
        }
        Err(err) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            warn!(%event_id, event_type, error = ?err, "failed to forward cart event; dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webmarket_core::{CartKey, ProductId};
    use webmarket_events::{InMemoryEventBus, Subscription};

    fn event(n: u32) -> CartEvent {
        CartEvent::added(CartKey::from_raw("k"), ProductId::new(1), n)
    }

    #[test]
    fn forwards_in_order() {
        let bus = Arc::new(InMemoryEventBus::<CartEvent>::new());
        let sub = bus.subscribe();
        let (publisher, handle) = QueuedEventPublisher::spawn(Arc::clone(&bus), 16).unwrap();

        for n in 1..=5 {
            publisher.emit(event(n)).unwrap();
        }

        let got: Vec<u32> = (0..5)
            .map(|_| sub.recv_timeout(Duration::from_secs(2)).unwrap().new_quantity)
            .collect();
        assert_eq!(got, vec![1, 2, 3, 4, 5]);

        handle.shutdown();
    }

    /// Bus whose publish blocks until released, to fill the queue.
    struct GatedBus {
        gate: std::sync::Mutex<mpsc::Receiver<()>>,
    }

    impl EventBus<CartEvent> for GatedBus {
        type Error = ();

        fn publish(&self, _message: CartEvent) -> Result<(), Self::Error> {
            if let Ok(gate) = self.gate.lock() {
                let _ = gate.recv_timeout(Duration::from_secs(2));
            }
            Ok(())
        }

        fn subscribe(&self) -> Subscription<CartEvent> {
            let (_tx, rx) = mpsc::channel();
            Subscription::new(rx)
        }
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (gate_tx, gate_rx) = mpsc::channel();
        let bus = GatedBus {
            gate: std::sync::Mutex::new(gate_rx),
        };
        let (publisher, handle) = QueuedEventPublisher::spawn(bus, 1).unwrap();

        // One in flight at the bus, one queued, the rest must be refused.
        let results: Vec<_> = (0..10).map(|n| publisher.emit(event(n))).collect();
        assert!(results.iter().any(|r| matches!(r, Err(PublishError::QueueFull))));
        assert!(handle.stats().dropped >= 1);

        for _ in 0..10 {
            let _ = gate_tx.send(());
        }
        handle.shutdown();
    }

    struct FailingBus;

    impl EventBus<CartEvent> for FailingBus {
        type Error = &'static str;

        fn publish(&self, _message: CartEvent) -> Result<(), Self::Error> {
            Err("broker down")
        }

        fn subscribe(&self) -> Subscription<CartEvent> {
            let (_tx, rx) = mpsc::channel();
            Subscription::new(rx)
        }
    }

    #[test]
    fn bus_failures_are_counted_not_raised() {
        let (publisher, handle) = QueuedEventPublisher::spawn(FailingBus, 8).unwrap();
        publisher.emit(event(1)).unwrap();
        publisher.emit(event(2)).unwrap();

        // Shutdown flushes the queue, so both attempts are accounted for.
        handle.shutdown();

        let stats = publisher.stats();
        assert_eq!(stats.enqueued, 2);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.delivered, 0);
    }

    #[test]
    fn emit_after_shutdown_is_closed() {
        let bus = Arc::new(InMemoryEventBus::<CartEvent>::new());
        let (publisher, handle) = QueuedEventPublisher::spawn(bus, 4).unwrap();
        handle.shutdown();

        assert!(matches!(publisher.emit(event(1)), Err(PublishError::Closed)));
        assert_eq!(publisher.stats().dropped, 1);
    }
}
