//! # Non-blocking event fan-out to multiple subscribers.
//!
//! ## Architecture
//! ```text
//! emit(event)
//!     │
//!     ├──► [queue 1] ──► worker 1 ──► subscriber1.on_event()
//!     │    (bounded)         └──────► panic → reported on stderr, worker keeps going
//!     └──► [queue N] ──► worker N ──► subscriberN.on_event()
//! ```
//!
//! ## Rules
//! - `emit()` returns immediately (uses `try_send`).
//! - Overflow drops the event for that subscriber only; the remaining subscribers
//!   receive a `SubscriberOverflow` event instead.
//! - Per-subscriber FIFO; no ordering across subscribers.
//! - [`SubscriberSet::shutdown`] closes every queue and waits for the workers to
//!   drain, so nothing queued is lost when the proxy exits.
//!
//! The set holds no [`Bus`](crate::events::Bus) clone: the listener
//! feeding it stops when the bus closes, and a clone here would keep it open.

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::Event;
use crate::subscribers::Subscribe;

/// Per-subscriber channel metadata.
struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Fan-out coordinator for event subscribers.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    workers: Vec<JoinHandle<()>>,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker task per subscriber.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));

            let handle = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = sub.on_event(ev.as_ref());
                    if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await
                    {
                        let any = &*panic_err;
                        let info = if let Some(msg) = any.downcast_ref::<&'static str>() {
                            (*msg).to_string()
                        } else if let Some(msg) = any.downcast_ref::<String>() {
                            msg.clone()
                        } else {
                            "unknown panic".to_string()
                        };
                        eprintln!("[subscriber-panicked] subscriber={name} info={info}");
                    }
                }
            });
            channels.push(SubscriberChannel { name, sender: tx });
            workers.push(handle);
        }
        Self { channels, workers }
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Emits an event to all subscribers (clones the event once).
    pub fn emit(&self, event: &Event) {
        self.emit_arc(Arc::new(event.clone()));
    }

    /// Emits a pre-allocated `Arc<Event>` to all subscribers.
    ///
    /// Overflow events are never re-reported, which keeps this from recursing.
    pub fn emit_arc(&self, event: Arc<Event>) {
        let mut overflowed = Vec::new();

        for channel in &self.channels {
            let reason = match channel.sender.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if !event.is_subscriber_overflow() {
                overflowed.push(Event::subscriber_overflow(channel.name, reason));
            }
        }

        for ev in overflowed {
            self.emit_arc(Arc::new(ev));
        }
    }

    /// Closes all queues and waits for the workers to finish what is queued.
    pub async fn shutdown(self) {
        drop(self.channels);

        for h in self.workers {
            let _ = h.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.0.lock().unwrap().push(event.kind);
        }
    }

    struct Panicky;

    #[async_trait]
    impl Subscribe for Panicky {
        async fn on_event(&self, _event: &Event) {
            panic!("boom");
        }

        fn name(&self) -> &'static str {
            "panicky"
        }
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_events() {
        let rec = Arc::new(Recorder::default());
        let set = SubscriberSet::new(vec![rec.clone() as Arc<dyn Subscribe>]);

        set.emit(&Event::new(EventKind::ChildSpawned));
        set.emit(&Event::new(EventKind::ReadyReceived));
        set.shutdown().await;

        assert_eq!(
            *rec.0.lock().unwrap(),
            vec![EventKind::ChildSpawned, EventKind::ReadyReceived]
        );
    }

    #[tokio::test]
    async fn test_panicking_subscriber_does_not_stop_others() {
        let rec = Arc::new(Recorder::default());
        let set = SubscriberSet::new(vec![
            Arc::new(Panicky) as Arc<dyn Subscribe>,
            rec.clone() as Arc<dyn Subscribe>,
        ]);
        assert_eq!(set.len(), 2);

        set.emit(&Event::new(EventKind::TimeoutHit));
        set.emit(&Event::new(EventKind::ChildExited));
        set.shutdown().await;

        assert_eq!(
            *rec.0.lock().unwrap(),
            vec![EventKind::TimeoutHit, EventKind::ChildExited]
        );
    }
}
