//! Redis pub/sub sink for cart events (optional).
//!
//! Pub/sub is not durable: subscribers that are offline miss messages.
//! Cart events are best-effort already, so that matches their contract.

use std::sync::mpsc;
use std::thread;

use redis::Commands;
use thiserror::Error;
use tracing::{debug, warn};

use webmarket_events::{CartEvent, Event, EventBus, Subscription};

#[derive(Debug, Error)]
pub enum RedisBusError {
    #[error("redis error: {0}")]
    Redis(String),

    #[error("serialize error: {0}")]
    Serialize(String),
}

/// Publishes each `CartEvent` as JSON on one channel.
#[derive(Debug, Clone)]
pub struct RedisPubSubEventBus {
    client: redis::Client,
    channel: String,
}

impl RedisPubSubEventBus {
    pub fn new(redis_url: impl AsRef<str>, channel: impl Into<String>) -> Result<Self, RedisBusError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| RedisBusError::Redis(e.to_string()))?;
        Ok(Self {
            client,
            channel: channel.into(),
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

fn encode(event: &CartEvent) -> Result<String, RedisBusError> {
    serde_json::to_string(event).map_err(|e| RedisBusError::Serialize(e.to_string()))
}

fn decode(payload: &str) -> Result<CartEvent, serde_json::Error> {
    serde_json::from_str(payload)
}

impl EventBus<CartEvent> for RedisPubSubEventBus {
    type Error = RedisBusError;

    fn publish(&self, message: CartEvent) -> Result<(), Self::Error> {
        let payload = encode(&message)?;

        let mut conn = self
            .client
            .get_connection()
            .map_err(|e| RedisBusError::Redis(e.to_string()))?;

        let receivers: i64 = conn
            .publish(&self.channel, payload)
            .map_err(|e| RedisBusError::Redis(e.to_string()))?;
        debug!(
            channel = %self.channel,
            receivers,
            event_id = %message.event_id,
            version = message.version(),
            "cart event published"
        );

        Ok(())
    }

    fn subscribe(&self) -> Subscription<CartEvent> {
        let (tx, rx) = mpsc::channel();

        let client = self.client.clone();
        let channel = self.channel.clone();

        // Forwarding thread ends when the receiver is dropped or the connection fails.
        thread::spawn(move || {
            let mut conn = match client.get_connection() {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, "redis subscribe: connection failed");
                    return;
                }
            };

            let mut pubsub = conn.as_pubsub();
            if let Err(e) = pubsub.subscribe(&channel) {
                warn!(error = %e, %channel, "redis subscribe failed");
                return;
            }

            loop {
                let msg = match pubsub.get_message() {
                    Ok(m) => m,
                    Err(_) => return,
                };

                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(_) => continue,
                };

                let event = match decode(&payload) {
                    Ok(e) => e,
                    Err(e) => {
                        debug!(error = %e, "skipping undecodable cart event");
                        continue;
                    }
                };

                if tx.send(event).is_err() {
                    return;
                }
            }
        });

        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webmarket_core::{CartKey, ProductId};

    #[test]
    fn payload_survives_the_channel() {
        let sent = CartEvent::decremented(CartKey::from_raw("user:alice"), ProductId::new(7), 2);

        let payload = encode(&sent).unwrap();
        let received = decode(&payload).unwrap();

        assert_eq!(received, sent);
        assert_eq!(received.event_type(), "cart.item.decremented");
    }

    #[test]
    fn cleared_payload_has_null_product() {
        let payload = encode(&CartEvent::cleared(CartKey::from_raw("anon1"))).unwrap();
        let raw: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(raw["kind"], "cleared");
        assert!(raw["product_id"].is_null());
    }

    #[test]
    fn garbage_payload_is_rejected() {
        assert!(decode("not json").is_err());
        assert!(decode(r#"{"kind":"added"}"#).is_err());
    }

    #[test]
    fn client_is_lazy_but_validates_the_url() {
        let bus = RedisPubSubEventBus::new("redis://127.0.0.1:6379/", "cart-events").unwrap();
        assert_eq!(bus.channel(), "cart-events");
        assert!(matches!(
            RedisPubSubEventBus::new("not a url", "cart-events"),
            Err(RedisBusError::Redis(_))
        ));
    }
}
