//! Engine events
//!
//! Cross-component signals (diagnostics, audio cues, lobby redirects) are
//! published on a broadcast channel owned by the engine. Subscribers come
//! and go freely; publishing with nobody listening is not an error.

use slipstream_core::EntityId;
use tokio::sync::broadcast;

/// Default number of events buffered per subscriber
pub const EVENT_CAPACITY: usize = 64;

/// Something the engine wants observers to know about
#[derive(Debug, Clone, PartialEq)]
pub enum NetEvent {
    /// First snapshot recorded for an entity
    EntityDiscovered { id: EntityId },
    /// A record failed boundary validation and was skipped
    RecordRejected { id: EntityId, reason: String },
    /// A poll completed and was ingested
    PollSucceeded {
        rtt_ms: Option<f64>,
        interpolation_delay_ms: f64,
        next_poll_ms: u64,
        entities: usize,
    },
    /// A poll failed and will be retried
    PollFailed {
        failures: u32,
        retry_in_ms: u64,
        reason: String,
    },
    /// The poll loop exited
    Stopped,
}

/// Publisher side of the engine's event channel
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<NetEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to every current subscriber
    pub fn publish(&self, event: NetEvent) {
        // Err only means there are no subscribers
        let _ = self.sender.send(event);
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<NetEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        bus.publish(NetEvent::Stopped);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_subscribers_receive() {
        let bus = EventBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(NetEvent::EntityDiscovered {
            id: EntityId::new("p1"),
        });

        let expected = NetEvent::EntityDiscovered {
            id: EntityId::new("p1"),
        };
        assert_eq!(a.try_recv().unwrap(), expected);
        assert_eq!(b.try_recv().unwrap(), expected);
        assert!(a.try_recv().is_err());
    }
}
