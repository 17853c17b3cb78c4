//! # Runtime events emitted by the supervisor, relay and watcher.
//!
//! The [`EventKind`] enum classifies event types across four groups:
//! - **Setup events**: endpoint bound, child spawned
//! - **Traffic events**: datagrams seen by the relay/watcher
//! - **Control events**: signals forwarded, timeout, readiness
//! - **Terminal events**: child exited, child released, cleanup failures
//!
//! The [`Event`] struct carries the metadata (pid, signal, exit code, payload, reason).
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use sdnotify_proxy::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::MessageUnrecognized)
//!     .with_pid(4242)
//!     .with_payload(b"STATUS=warming up");
//!
//! assert_eq!(ev.kind, EventKind::MessageUnrecognized);
//! assert_eq!(ev.pid, Some(4242));
//! assert_eq!(ev.payload.as_deref(), Some("STATUS=warming up"));
//! ```

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::signals::Signal;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Setup events ===
    /// A stale filesystem entry was removed from the socket path.
    ///
    /// Sets:
    /// - `path`: socket path
    StaleSocketRemoved,

    /// Notification endpoint bound.
    ///
    /// Sets:
    /// - `path`: socket path
    EndpointBound,

    /// Target command started.
    ///
    /// Sets:
    /// - `pid`: child pid
    /// - `reason`: program name
    ChildSpawned,

    // === Traffic events ===
    /// Datagram that is not `READY=1`; logged and otherwise ignored.
    ///
    /// Sets:
    /// - `payload`: lossy UTF-8 rendering of the datagram
    MessageUnrecognized,

    /// Reading from the endpoint failed while it was still open.
    ///
    /// Sets:
    /// - `reason`: io error
    ReadFailed,

    /// `READY=1` observed.
    ReadyReceived,

    /// Watcher finished without reporting readiness.
    ///
    /// Sets:
    /// - `reason`: `cancelled` or `abandoned`
    WatcherStopped,

    // === Control events ===
    /// Supervisor entered its select loop and is waiting for the next event.
    AwaitingEvent,

    /// Signal forwarded to the child.
    ///
    /// Sets:
    /// - `pid`: child pid
    /// - `signal`: forwarded signal
    SignalForwarded,

    /// Forwarding a signal to the child failed.
    ///
    /// Sets:
    /// - `pid`, `signal`, `reason`
    SignalFailed,

    /// SIGCHLD observed but the child is still running (stopped, or another child).
    SpuriousChildSignal,

    /// No readiness within the startup budget.
    ///
    /// Sets:
    /// - `pid`: child pid
    /// - `timeout_ms`: configured budget
    TimeoutHit,

    // === Terminal events ===
    /// Child reaped.
    ///
    /// Sets:
    /// - `pid`: child pid
    /// - `code`: propagated exit code
    ChildExited,

    /// Child detached after readiness; no longer tracked.
    ///
    /// Sets:
    /// - `pid`: child pid
    ChildReleased,

    /// Pid record written.
    ///
    /// Sets:
    /// - `pid`, `path`
    PidWritten,

    /// Pid record could not be written (best effort).
    ///
    /// Sets:
    /// - `pid`, `path`, `reason`
    PidWriteFailed,

    /// Endpoint close/unlink failed (best effort).
    ///
    /// Sets:
    /// - `path`, `reason`
    CleanupFailed,

    // === Subscriber events ===
    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `reason`: `subscriber=<name> reason=<full|closed>`
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Child pid, if applicable.
    pub pid: Option<u32>,
    /// Signal involved, if applicable.
    pub signal: Option<Signal>,
    /// Exit code of the child.
    pub code: Option<i32>,
    /// Datagram payload (lossy UTF-8).
    pub payload: Option<Arc<str>>,
    /// Filesystem path (socket or pid record).
    pub path: Option<Arc<str>>,
    /// Human-readable reason (errors, program names).
    pub reason: Option<Arc<str>>,
    /// Startup timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            pid: None,
            signal: None,
            code: None,
            payload: None,
            path: None,
            reason: None,
            timeout_ms: None,
        }
    }

    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    #[inline]
    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signal = Some(signal);
        self
    }

    #[inline]
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    /// Attaches a datagram payload, rendered as lossy UTF-8.
    #[inline]
    pub fn with_payload(mut self, payload: &[u8]) -> Self {
        self.payload = Some(String::from_utf8_lossy(payload).into());
        self
    }

    #[inline]
    pub fn with_path(mut self, path: &Path) -> Self {
        self.path = Some(path.to_string_lossy().into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    /// Returns `true` for events that report something going wrong.
    ///
    /// These are printed by [`LogWriter`](crate::LogWriter) even when not verbose.
    pub fn is_diagnostic(&self) -> bool {
        matches!(
            self.kind,
            EventKind::MessageUnrecognized
                | EventKind::ReadFailed
                | EventKind::SignalFailed
                | EventKind::TimeoutHit
                | EventKind::PidWriteFailed
                | EventKind::CleanupFailed
                | EventKind::SubscriberOverflow
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let a = Event::new(EventKind::AwaitingEvent);
        let b = Event::new(EventKind::AwaitingEvent);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_payload_is_rendered_lossy() {
        let ev = Event::new(EventKind::MessageUnrecognized).with_payload(b"STATUS=\xffok");
        assert_eq!(ev.payload.as_deref(), Some("STATUS=\u{fffd}ok"));
    }

    #[test]
    fn test_timeout_saturates() {
        let ev = Event::new(EventKind::TimeoutHit).with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }

    #[test]
    fn test_diagnostic_classification() {
        assert!(Event::new(EventKind::MessageUnrecognized).is_diagnostic());
        assert!(Event::new(EventKind::CleanupFailed).is_diagnostic());
        assert!(!Event::new(EventKind::ChildSpawned).is_diagnostic());
        assert!(!Event::new(EventKind::ReadyReceived).is_diagnostic());
    }
}
