//! # Readiness watcher.
//!
//! Consumes the relay's queue and turns it into at most one readiness
//! notification for the supervisor.
//!
//! ```text
//! loop select (biased) {
//!   cancel.cancelled()       ─► endpoint.close(Cancelled), stop
//!   queue.recv() ─┬─ Ready          ─► publish ReadyReceived, notify supervisor, stop
//!                 ├─ Unrecognized   ─► publish MessageUnrecognized, continue
//!                 ├─ ReadError      ─► stop (the relay already escalated it)
//!                 └─ closed         ─► stop
//! }
//! ```
//!
//! Every path ends in exactly one terminal action; the readiness sender is
//! consumed by the only arm that uses it.

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::endpoint::{Endpoint, Shutdown};
use crate::events::{Bus, Event, EventKind};
use crate::message::Message;

/// How the watcher finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEnd {
    /// `READY=1` seen and reported.
    Ready,
    /// Cancelled by the supervisor; endpoint closed.
    Cancelled,
    /// Relay failed or finished without readiness.
    Abandoned,
}

impl WatchEnd {
    /// Short label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            WatchEnd::Ready => "ready",
            WatchEnd::Cancelled => "cancelled",
            WatchEnd::Abandoned => "abandoned",
        }
    }
}

/// Single consumer of relay messages.
pub struct Watcher {
    endpoint: Endpoint,
    queue: mpsc::Receiver<Message>,
    ready: oneshot::Sender<()>,
    bus: Bus,
}

impl Watcher {
    pub fn new(
        endpoint: Endpoint,
        queue: mpsc::Receiver<Message>,
        ready: oneshot::Sender<()>,
        bus: Bus,
    ) -> Self {
        Self {
            endpoint,
            queue,
            ready,
            bus,
        }
    }

    /// Runs until readiness, cancellation or the end of the message stream.
    pub async fn run(mut self, cancel: CancellationToken) -> WatchEnd {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    if let Err(e) = self.endpoint.close(Shutdown::Cancelled) {
                        self.bus.publish(
                            Event::new(EventKind::CleanupFailed)
                                .with_path(self.endpoint.path())
                                .with_reason(e.to_string()),
                        );
                    }
                    return WatchEnd::Cancelled;
                }
                msg = self.queue.recv() => match msg {
                    Some(Message::Ready) => {
                        self.bus.publish(Event::new(EventKind::ReadyReceived));
                        let _ = self.ready.send(());
                        return WatchEnd::Ready;
                    }
                    Some(Message::Unrecognized(payload)) => {
                        self.bus.publish(
                            Event::new(EventKind::MessageUnrecognized).with_payload(&payload),
                        );
                    }
                    Some(Message::ReadError(_)) | None => return WatchEnd::Abandoned,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Harness {
        _dir: tempfile::TempDir,
        endpoint: Endpoint,
        tx: mpsc::Sender<Message>,
        ready_rx: oneshot::Receiver<()>,
        cancel: CancellationToken,
        bus: Bus,
        watcher: Watcher,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = Endpoint::create(dir.path().join("n.sock")).unwrap();
        let (tx, rx) = mpsc::channel(8);
        let (ready_tx, ready_rx) = oneshot::channel();
        let bus = Bus::new(16);
        let watcher = Watcher::new(endpoint.clone(), rx, ready_tx, bus.clone());
        Harness {
            _dir: dir,
            endpoint,
            tx,
            ready_rx,
            cancel: CancellationToken::new(),
            bus,
            watcher,
        }
    }

    #[tokio::test]
    async fn test_unrecognized_then_ready() {
        let h = harness();
        let mut events = h.bus.subscribe();

        h.tx.send(Message::classify(b"STATUS=1")).await.unwrap();
        h.tx.send(Message::classify(b"WATCHDOG=1")).await.unwrap();
        h.tx.send(Message::Ready).await.unwrap();

        assert_eq!(h.watcher.run(h.cancel.clone()).await, WatchEnd::Ready);
        h.ready_rx.await.expect("readiness delivered");

        let kinds: Vec<_> = (0..3).map(|_| events.try_recv().unwrap().kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::MessageUnrecognized,
                EventKind::MessageUnrecognized,
                EventKind::ReadyReceived
            ]
        );
        assert!(!h.endpoint.is_closed());
    }

    #[tokio::test]
    async fn test_cancellation_closes_endpoint_without_readiness() {
        let h = harness();
        h.cancel.cancel();

        assert_eq!(h.watcher.run(h.cancel.clone()).await, WatchEnd::Cancelled);
        assert!(h.ready_rx.await.is_err());
        assert_eq!(h.endpoint.shutdown_reason(), Some(Shutdown::Cancelled));
        assert!(!h.endpoint.path().exists());
    }

    #[tokio::test]
    async fn test_read_error_stops_without_readiness() {
        let h = harness();
        h.tx.send(Message::ReadError("boom".into())).await.unwrap();
        h.tx.send(Message::Ready).await.unwrap();

        assert_eq!(h.watcher.run(h.cancel.clone()).await, WatchEnd::Abandoned);
        assert!(h.ready_rx.await.is_err());
    }

    #[tokio::test]
    async fn test_closed_queue_stops() {
        let h = harness();
        drop(h.tx);

        assert_eq!(h.watcher.run(h.cancel.clone()).await, WatchEnd::Abandoned);
        assert!(h.ready_rx.await.is_err());
    }
}
