//! # Message relay: drains the endpoint.
//!
//! The [`Relay`] runs as its own task for the lifetime of the endpoint. It reads
//! one datagram at a time, classifies it into a [`Message`] and forwards it to the
//! watcher's queue.
//!
//! ## Loop
//! ```text
//! loop {
//!   select (biased) {
//!     shutdown reason recorded      ─► exit silently
//!     recv(buf[..MAX_PAYLOAD]) ─┬─ Ok(n)  ─► send Message::classify(&buf[..n])
//!                               └─ Err(e) ─┬─ shutdown recorded ─► exit silently
//!                                          └─ otherwise ─► publish ReadFailed
//!                                                          send Message::ReadError
//!                                                          inject Signal::Interrupt
//!                                                          exit
//!   }
//! }
//! drop(queue sender)   // final act: "no more messages"
//! ```

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::endpoint::{Endpoint, Shutdown};
use crate::events::{Bus, Event, EventKind};
use crate::message::{MAX_PAYLOAD, Message};
use crate::signals::{Signal, SignalInjector};

/// Source of raw datagrams for the relay.
#[async_trait]
pub trait Datagrams: Send + Sync + 'static {
    /// Receives one datagram into `buf`.
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;
}

#[async_trait]
impl Datagrams for Endpoint {
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        Endpoint::recv(self, buf).await
    }
}

/// Background reader forwarding classified datagrams to one consumer.
pub struct Relay {
    source: Arc<dyn Datagrams>,
    shutdown: watch::Receiver<Option<Shutdown>>,
    queue: mpsc::Sender<Message>,
    injector: SignalInjector,
    bus: Bus,
}

impl Relay {
    /// Creates a relay over `source`; `shutdown` tells expected from unexpected failures.
    pub fn new(
        source: Arc<dyn Datagrams>,
        shutdown: watch::Receiver<Option<Shutdown>>,
        queue: mpsc::Sender<Message>,
        injector: SignalInjector,
        bus: Bus,
    ) -> Self {
        Self {
            source,
            shutdown,
            queue,
            injector,
            bus,
        }
    }

    /// Convenience constructor reading from an [`Endpoint`].
    pub fn for_endpoint(
        endpoint: &Endpoint,
        queue: mpsc::Sender<Message>,
        injector: SignalInjector,
        bus: Bus,
    ) -> Self {
        Self::new(
            Arc::new(endpoint.clone()),
            endpoint.watch_shutdown(),
            queue,
            injector,
            bus,
        )
    }

    /// Runs until the endpoint is closed, the consumer goes away, or a read fails.
    pub async fn run(mut self) {
        let mut buf = vec![0u8; MAX_PAYLOAD];

        loop {
            let res = tokio::select! {
                biased;
                _ = self.shutdown.wait_for(|r| r.is_some()) => break,
                res = self.source.recv(&mut buf) => res,
            };

            match res {
                Ok(n) => {
                    if self.queue.send(Message::classify(&buf[..n])).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    if self.shutdown.borrow().is_none() {
                        self.escalate(e).await;
                    }
                    break;
                }
            }
        }
        // `self.queue` is dropped here, closing the consumer's queue exactly once.
    }

    async fn escalate(&self, e: io::Error) {
        self.bus
            .publish(Event::new(EventKind::ReadFailed).with_reason(e.to_string()));
        let _ = self.queue.send(Message::ReadError(e.to_string())).await;
        self.injector.inject(Signal::Interrupt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::injection_channel;

    struct Broken;

    #[async_trait]
    impl Datagrams for Broken {
        async fn recv(&self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("socket went away"))
        }
    }

    #[tokio::test]
    async fn test_forwards_classified_messages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("n.sock");
        let ep = Endpoint::create(&path).unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        let (injector, _pending) = injection_channel();

        let relay = tokio::spawn(Relay::for_endpoint(&ep, tx, injector, Bus::new(8)).run());

        let client = std::os::unix::net::UnixDatagram::unbound().unwrap();
        client.send_to(b"STATUS=starting", &path).unwrap();
        client.send_to(b"READY=1", &path).unwrap();

        assert_eq!(
            rx.recv().await,
            Some(Message::Unrecognized(b"STATUS=starting".to_vec()))
        );
        assert_eq!(rx.recv().await, Some(Message::Ready));

        ep.close(Shutdown::Cancelled).unwrap();
        relay.await.unwrap();
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_oversized_datagram_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("n.sock");
        let ep = Endpoint::create(&path).unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        let (injector, _pending) = injection_channel();
        tokio::spawn(Relay::for_endpoint(&ep, tx, injector, Bus::new(8)).run());

        let client = std::os::unix::net::UnixDatagram::unbound().unwrap();
        client.send_to(&[b'x'; MAX_PAYLOAD + 100], &path).unwrap();

        match rx.recv().await {
            Some(Message::Unrecognized(p)) => assert_eq!(p.len(), MAX_PAYLOAD),
            other => panic!("unexpected {other:?}"),
        }
        ep.close(Shutdown::Cancelled).unwrap();
    }

    #[tokio::test]
    async fn test_unexpected_failure_escalates_as_interrupt() {
        let (tx, mut rx) = mpsc::channel(4);
        let (injector, mut pending) = injection_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(None);
        let bus = Bus::new(8);
        let mut events = bus.subscribe();

        Relay::new(Arc::new(Broken), shutdown_rx, tx, injector, bus)
            .run()
            .await;

        assert!(matches!(rx.recv().await, Some(Message::ReadError(_))));
        assert_eq!(rx.recv().await, None);
        assert_eq!(pending.recv().await, Some(Signal::Interrupt));
        assert_eq!(events.recv().await.unwrap().kind, EventKind::ReadFailed);
    }

    #[tokio::test]
    async fn test_failure_after_deliberate_close_is_silent() {
        let (tx, mut rx) = mpsc::channel(4);
        let (injector, mut pending) = injection_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(Some(Shutdown::Detached));

        Relay::new(Arc::new(Broken), shutdown_rx, tx, injector, Bus::new(8))
            .run()
            .await;

        assert_eq!(rx.recv().await, None);
        assert!(pending.try_recv().is_err());
    }
}
