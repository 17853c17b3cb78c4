//! # Proxy configuration.
//!
//! Provides [`Config`], the centralized settings for one supervised run.
//!
//! ## Sentinel values
//! - `timeout = 0s` → no startup deadline (wait for readiness or child exit forever)

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default startup budget.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment variable the readiness protocol uses to find the socket.
pub const NOTIFY_SOCKET_ENV: &str = "NOTIFY_SOCKET";

/// Configuration for the proxy supervisor.
///
/// ## Field semantics
/// - `timeout`: Time the child has to send `READY=1` (`0s` = unlimited)
/// - `verbose`: Print lifecycle traces, not only diagnostics
/// - `notify_env`: Environment variable carrying the socket path to the child
/// - `pid_suffix`: Appended to the socket path to name the pid record
/// - `bus_capacity`: Event bus ring buffer size (min 1)
/// - `queue_capacity`: Relay → watcher message queue size (min 1)
#[derive(Clone, Debug)]
pub struct Config {
    /// Startup budget before the child is sent SIGTERM.
    pub timeout: Duration,

    /// Emit lifecycle traces in addition to diagnostics.
    pub verbose: bool,

    /// Name of the environment variable set for the child.
    pub notify_env: &'static str,

    /// Suffix that turns the socket path into the pid record path.
    pub pid_suffix: &'static str,

    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,

    /// Capacity of the relay → watcher message queue.
    pub queue_capacity: usize,
}

impl Config {
    /// Returns the startup deadline as an `Option`.
    ///
    /// - `None` → no deadline
    /// - `Some(d)` → child must be ready within `d`
    #[inline]
    pub fn startup_timeout(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Path of the pid record for `socket` (`<socket><pid_suffix>`).
    pub fn pid_path(&self, socket: &Path) -> PathBuf {
        let mut s: OsString = socket.as_os_str().to_owned();
        s.push(self.pid_suffix);
        PathBuf::from(s)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a message queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn queue_capacity_clamped(&self) -> usize {
        self.queue_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `timeout = 60s`
    /// - `verbose = false`
    /// - `notify_env = "NOTIFY_SOCKET"`
    /// - `pid_suffix = ".pid"`
    /// - `bus_capacity = 1024`
    /// - `queue_capacity = 16`
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            verbose: false,
            notify_env: NOTIFY_SOCKET_ENV,
            pid_suffix: ".pid",
            bus_capacity: 1024,
            queue_capacity: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_path_appends_suffix() {
        let cfg = Config::default();
        assert_eq!(
            cfg.pid_path(Path::new("/run/app/notify.sock")),
            PathBuf::from("/run/app/notify.sock.pid")
        );
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let cfg = Config {
            timeout: Duration::ZERO,
            ..Config::default()
        };
        assert_eq!(cfg.startup_timeout(), None);
        assert_eq!(Config::default().startup_timeout(), Some(DEFAULT_TIMEOUT));
    }

    #[test]
    fn test_capacities_are_clamped() {
        let cfg = Config {
            bus_capacity: 0,
            queue_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.queue_capacity_clamped(), 1);
    }
}
