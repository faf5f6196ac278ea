//! In-process typed event bus fanning peer, session, alert and config
//! changes out to every interested listener.
//!
//! One `tokio::sync::broadcast` channel carries the tagged
//! `DomainEvent` enum. A single channel (rather than one per topic) is
//! deliberate: it is
//! the only way to guarantee a subscriber observes `peer.created` and
//! the `session.updated` that follows it in the order they were
//! published, across all four topics at once.

use tokio::sync::broadcast;

use flintroute_schemas::DomainEvent;

/// Bounded broadcast capacity. A lagging subscriber drops the oldest
/// buffered events rather than stalling publishers; `flintroute-ws`
/// treats a `RecvError::Lagged` as "resync from the next event".
const CHANNEL_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        EventBus { sender }
    }

    /// Publish an event to every current subscriber. A send with zero
    /// subscribers is not an error — most ticks happen with nobody
    /// connected to the WebSocket.
    pub fn publish(&self, event: DomainEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flintroute_schemas::{Alert, AlertProjection, AlertType, Severity};
    use uuid::Uuid;

    fn sample_alert_event() -> DomainEvent {
        DomainEvent::Alert(AlertProjection {
            alert: Alert {
                id: Uuid::new_v4(),
                alert_type: AlertType::PeerDown,
                severity: Severity::Warning,
                peer_id: None,
                message: "test".to_string(),
                acknowledged: false,
                acknowledged_by: None,
                created_at: chrono::Utc::now(),
                acknowledged_at: None,
            },
            peer: None,
        })
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(sample_alert_event());
        let received = rx.recv().await.unwrap();
        assert!(matches!(received, DomainEvent::Alert(_)));
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish(sample_alert_event());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn two_subscribers_each_get_their_own_copy() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        bus.publish(sample_alert_event());
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }
}
