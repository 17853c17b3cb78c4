//! # LogWriter: stderr event printer
//!
//! Prints incoming [`Event`]s to stderr. Stdout is left alone because the proxy
//! prints the detached pid there as its last line.
//!
//! Diagnostics (see [`Event::is_diagnostic`]) are always printed; lifecycle
//! traces only when the writer is verbose.
//!
//! ## Example output
//! ```text
//! [endpoint-bound] path="/run/app.sock"
//! [child-spawned] pid=4242 program="/usr/bin/app"
//! [awaiting-event]
//! [unrecognized-message] payload="STATUS=loading"
//! [ready]
//! [pid-written] pid=4242 path="/run/app.sock.pid"
//! [child-released] pid=4242
//! ```

use std::io::Write;

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter {
    verbose: bool,
}

impl LogWriter {
    /// Construct a new [`LogWriter`]; `verbose` enables lifecycle traces.
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Renders one event as a single log line.
    pub fn render(e: &Event) -> String {
        let path = e.path.as_deref().unwrap_or("?");
        let reason = e.reason.as_deref().unwrap_or("?");
        let pid = e.pid.map_or_else(|| "?".to_string(), |p| p.to_string());
        let signal = e.signal.map_or("?", |s| s.name());

        match e.kind {
            EventKind::StaleSocketRemoved => format!("[stale-socket-removed] path={path:?}"),
            EventKind::EndpointBound => format!("[endpoint-bound] path={path:?}"),
            EventKind::ChildSpawned => format!("[child-spawned] pid={pid} program={reason:?}"),
            EventKind::MessageUnrecognized => format!(
                "[unrecognized-message] payload={:?}",
                e.payload.as_deref().unwrap_or("")
            ),
            EventKind::ReadFailed => format!("[read-failed] err={reason:?}"),
            EventKind::ReadyReceived => "[ready]".to_string(),
            EventKind::WatcherStopped => format!("[watcher-stopped] end={reason}"),
            EventKind::AwaitingEvent => "[awaiting-event]".to_string(),
            EventKind::SignalForwarded => format!("[signal-forwarded] pid={pid} signal={signal}"),
            EventKind::SignalFailed => {
                format!("[signal-failed] pid={pid} signal={signal} err={reason:?}")
            }
            EventKind::SpuriousChildSignal => format!("[spurious-sigchld] pid={pid}"),
            EventKind::TimeoutHit => format!(
                "[timeout] pid={pid} timeout_ms={}",
                e.timeout_ms.unwrap_or_default()
            ),
            EventKind::ChildExited => format!(
                "[child-exited] pid={pid} code={}",
                e.code.unwrap_or_default()
            ),
            EventKind::ChildReleased => format!("[child-released] pid={pid}"),
            EventKind::PidWritten => format!("[pid-written] pid={pid} path={path:?}"),
            EventKind::PidWriteFailed => {
                format!("[pid-write-failed] pid={pid} path={path:?} err={reason:?}")
            }
            EventKind::CleanupFailed => format!("[cleanup-failed] path={path:?} err={reason:?}"),
            EventKind::SubscriberOverflow => format!("[subscriber-overflow] {reason}"),
        }
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        if !self.verbose && !e.is_diagnostic() {
            return;
        }
        let line = Self::render(e);
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
