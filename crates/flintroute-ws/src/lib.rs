//! WebSocket hub.
//!
//! The registry is a `DashMap<Uuid, mpsc::Sender<WsEnvelope>>` pruned
//! with `retain` — the "nobody's listening anymore" test is "the last
//! `try_send` failed" rather than an `Arc` strong count.
//!
//! This crate owns registration, fan-out and eviction only. The actual
//! `axum` WebSocket upgrade, authentication-on-upgrade, and
//! ping/pong-timeout bookkeeping are socket-level concerns that live
//! in `flintroute-server`, which calls into this `Hub`.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use flintroute_events::EventBus;
use flintroute_schemas::WsEnvelope;

/// Bounded per-subscriber mailbox depth. A subscriber who can't drain
/// this many envelopes before the next one arrives is considered slow
/// and is dropped — never blocks the publisher.
pub const SUBSCRIBER_BUFFER: usize = 64;

pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_PONG_TIMEOUT: Duration = Duration::from_secs(60);

pub struct Hub {
    subscribers: DashMap<Uuid, mpsc::Sender<WsEnvelope>>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        Hub {
            subscribers: DashMap::new(),
        }
    }

    /// Registers a new subscriber and returns its id plus the receiving
    /// half of its mailbox; the caller (an axum WS handler) forwards
    /// whatever arrives on the receiver to the socket.
    pub fn attach(&self) -> (Uuid, mpsc::Receiver<WsEnvelope>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers.insert(id, tx);
        (id, rx)
    }

    pub fn detach(&self, id: Uuid) {
        self.subscribers.remove(&id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Spawns the task that drains the event bus and fans every event
    /// out to every attached subscriber. A subscriber whose mailbox is
    /// full or closed is evicted on the spot; it does not hold up
    /// delivery to anyone else.
    pub fn spawn_fanout(self: Arc<Self>, events: EventBus) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut rx = events.subscribe();
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let envelope = WsEnvelope::new(event);
                        self.subscribers
                            .retain(|_, tx| tx.try_send(envelope.clone()).is_ok());
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "ws hub fanout lagged behind the event bus");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flintroute_schemas::{ConfigVersion, DomainEvent};

    fn sample_event() -> DomainEvent {
        DomainEvent::ConfigChange(ConfigVersion {
            id: Uuid::new_v4(),
            description: None,
            config_blob: "router bgp 65000".to_string(),
            hash: "deadbeef".to_string(),
            creator_id: Uuid::new_v4(),
            created_at: chrono::Utc::now(),
        })
    }

    #[tokio::test]
    async fn attached_subscriber_receives_fanned_out_event() {
        let hub = Arc::new(Hub::new());
        let events = EventBus::new();
        let (_id, mut rx) = hub.attach();
        let _task = hub.clone().spawn_fanout(events.clone());

        events.publish(sample_event());

        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("did not receive before timeout")
            .expect("channel closed unexpectedly");
        assert!(matches!(received.event, DomainEvent::ConfigChange(_)));
    }

    #[tokio::test]
    async fn slow_subscriber_is_evicted_without_blocking_others() {
        let hub = Arc::new(Hub::new());
        let events = EventBus::new();

        let (_slow_id, _slow_rx) = hub.attach(); // never drained
        let (_fast_id, mut fast_rx) = hub.attach();

        let fanout = hub.clone().spawn_fanout(events.clone());

        for _ in 0..(SUBSCRIBER_BUFFER + 10) {
            events.publish(sample_event());
        }

        // Give the fanout task a chance to process the backlog.
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(hub.subscriber_count(), 1, "slow subscriber should have been evicted");
        assert!(fast_rx.try_recv().is_ok(), "fast subscriber should still have received events");

        drop(fanout);
    }

    #[tokio::test]
    async fn detach_removes_subscriber() {
        let hub = Hub::new();
        let (id, _rx) = hub.attach();
        assert_eq!(hub.subscriber_count(), 1);
        hub.detach(id);
        assert_eq!(hub.subscriber_count(), 0);
    }
}
