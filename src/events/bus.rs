//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`] so the supervisor, the relay and the
//! watcher can publish from their own tasks without ever blocking.
//!
//! ## Architecture
//! ```text
//! Publishers:                        Subscriber (one):
//!   Supervisor ──┐
//!   Relay      ──┼──────► Bus ──────► listener ────► SubscriberSet ──► LogWriter, ...
//!   Watcher    ──┘  (broadcast chan)  (in Supervisor)
//! ```
//!
//! ## Rules
//! - `publish()` never blocks; events without receivers are dropped.
//! - Receivers that fall behind observe `RecvError::Lagged(n)` and skip `n` events.
//! - The listener stops once every `Bus` clone has been dropped, which is how the
//!   supervisor flushes logs before returning.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events.
///
/// Cheap to clone; every clone keeps the channel open.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn test_receiver_sees_events_published_after_subscribe() {
        let bus = Bus::new(4);
        bus.publish(Event::new(EventKind::AwaitingEvent));

        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::ReadyReceived));

        let ev = rx.recv().await.expect("event");
        assert_eq!(ev.kind, EventKind::ReadyReceived);
    }

    #[tokio::test]
    async fn test_receiver_closes_when_all_senders_drop() {
        let bus = Bus::new(4);
        let mut rx = bus.subscribe();
        let clone = bus.clone();
        drop(bus);
        clone.publish(Event::new(EventKind::ChildSpawned));
        drop(clone);

        assert_eq!(rx.recv().await.expect("event").kind, EventKind::ChildSpawned);
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }
}
