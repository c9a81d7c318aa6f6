//! Timeout guard around any product lookup.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::warn;

use webmarket_core::ProductId;

use super::{LookupError, ProductInfo, ProductLookup};

/// Runs each lookup on a short-lived worker thread and gives up after
/// `timeout`.
///
/// A timed-out lookup keeps running in the background until the inner client
/// returns; its answer is discarded. Callers never wait longer than `timeout`.
///
/// `P` must bound its own calls. Each stalled lookup pins one thread until
/// the inner call returns, so an inner client that can hang forever leaks a
/// thread per request. `HttpProductLookup` sets its request timeout to the
/// same deadline.
#[derive(Debug)]
pub struct DeadlineLookup<P> {
    inner: Arc<P>,
    timeout: Duration,
}

impl<P> DeadlineLookup<P> {
    pub fn new(inner: P, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            timeout,
        }
    }
}

impl<P> ProductLookup for DeadlineLookup<P>
where
    P: ProductLookup + 'static,
{
    fn find_by_id(&self, product_id: ProductId) -> Result<Option<ProductInfo>, LookupError> {
        let (tx, rx) = mpsc::sync_channel(1);
        let inner = Arc::clone(&self.inner);

        thread::Builder::new()
            .name("product-lookup".to_string())
            .spawn(move || {
                // Receiver may be gone after a timeout; nothing to do then.
                let _ = tx.send(inner.find_by_id(product_id));
            })
            .map_err(|e| LookupError::Transport(format!("failed to spawn lookup thread: {e}")))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!(%product_id, timeout = ?self.timeout, "product lookup timed out");
                Err(LookupError::Timeout(self.timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(LookupError::Transport(
                "lookup thread exited without an answer".to_string(),
            )),
        }
    }
}
