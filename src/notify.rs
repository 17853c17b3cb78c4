//! Client side of the notification protocol.
//!
//! Used by supervised programs (and the bundled test daemon) to report state
//! to whatever socket `NOTIFY_SOCKET` names.

use std::io;
use std::os::unix::net::UnixDatagram;
use std::path::PathBuf;

use crate::config::NOTIFY_SOCKET_ENV;
use crate::message::READY_PAYLOAD;

/// Notification target resolved from the environment.
#[derive(Debug, Clone)]
pub struct Notifier {
    path: PathBuf,
}

impl Notifier {
    /// Reads the target from `NOTIFY_SOCKET`; `None` when unset or empty.
    pub fn from_env() -> Option<Self> {
        Self::from_var(NOTIFY_SOCKET_ENV)
    }

    /// Reads the target from an arbitrary variable.
    pub fn from_var(var: &str) -> Option<Self> {
        let path = std::env::var_os(var)?;
        if path.is_empty() {
            return None;
        }
        Some(Self::new(path))
    }

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Sends one raw state datagram.
    pub fn notify(&self, state: &[u8]) -> io::Result<usize> {
        UnixDatagram::unbound()?.send_to(state, &self.path)
    }

    /// Sends `READY=1`.
    pub fn ready(&self) -> io::Result<()> {
        self.notify(READY_PAYLOAD).map(drop)
    }
}

/// Sends `READY=1` to `NOTIFY_SOCKET` if set. Returns `Ok(false)` when it is not.
pub fn notify_ready() -> io::Result<bool> {
    match Notifier::from_env() {
        Some(n) => n.ready().map(|()| true),
        None => Ok(false),
    }
}
