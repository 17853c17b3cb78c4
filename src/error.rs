//! Error types used by the proxy.
//!
//! [`ProxyError`] covers every failure the supervisor can report:
//! - **setup** errors (stale socket, bind, signal registration, spawn) abort the run;
//! - **runtime** errors (startup timeout, reap failure) end it with a non-zero code;
//! - **best-effort** errors (pid record, signal forwarding) are only logged.
//!
//! Like the rest of the crate, each variant has a stable [`ProxyError::as_label`]
//! for logs.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Exit status used for every error path.
pub const EXIT_FAILURE: i32 = 1;

/// # Errors produced by the proxy.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Arguments or configuration cannot describe a run (e.g. empty command).
    #[error("invalid configuration: {details}")]
    InvalidConfig { details: String },

    /// A leftover entry at the socket path could not be removed.
    #[error("cannot remove stale socket {path:?}: {source}")]
    StaleSocket {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Binding the datagram socket failed.
    #[error("cannot bind notification socket {path:?}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Registering the SIGINT/SIGTERM/SIGCHLD listeners failed.
    #[error("cannot register signal handlers: {source}")]
    SignalSetup {
        #[source]
        source: std::io::Error,
    },

    /// The target command could not be started.
    #[error("cannot execute {program:?}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The child did not report readiness in time; it has been sent SIGTERM.
    #[error("process {pid} not ready after {timeout:?}")]
    StartupTimeout { timeout: Duration, pid: u32 },

    /// Retrieving the child's exit status failed.
    #[error("waitpid failed for process {pid}: {source}")]
    Reap {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    /// Delivering a signal to the child failed.
    #[error("cannot send {signal} to process {pid}: errno {errno}")]
    Signal {
        pid: u32,
        signal: &'static str,
        errno: i32,
    },

    /// The child handle no longer owns the process (released or reaped).
    #[error("process {pid} is no longer tracked")]
    NotTracked { pid: u32 },

    /// Writing the pid record failed.
    #[error("cannot write pid file {path:?}: {source}")]
    PidFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ProxyError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use sdnotify_proxy::ProxyError;
    /// use std::time::Duration;
    ///
    /// let err = ProxyError::StartupTimeout { timeout: Duration::from_secs(60), pid: 1 };
    /// assert_eq!(err.as_label(), "startup_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ProxyError::InvalidConfig { .. } => "invalid_config",
            ProxyError::StaleSocket { .. } => "stale_socket",
            ProxyError::Bind { .. } => "bind_failed",
            ProxyError::SignalSetup { .. } => "signal_setup_failed",
            ProxyError::Spawn { .. } => "spawn_failed",
            ProxyError::StartupTimeout { .. } => "startup_timeout",
            ProxyError::Reap { .. } => "reap_failed",
            ProxyError::Signal { .. } => "signal_failed",
            ProxyError::NotTracked { .. } => "not_tracked",
            ProxyError::PidFile { .. } => "pid_file_failed",
        }
    }

    /// Indicates whether the error happened before the child was running.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            ProxyError::InvalidConfig { .. }
                | ProxyError::StaleSocket { .. }
                | ProxyError::Bind { .. }
                | ProxyError::SignalSetup { .. }
                | ProxyError::Spawn { .. }
        )
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        EXIT_FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_names_pid() {
        let err = ProxyError::StartupTimeout {
            timeout: Duration::from_secs(60),
            pid: 4242,
        };
        assert_eq!(err.to_string(), "process 4242 not ready after 60s");
        assert_eq!(err.exit_code(), 1);
        assert!(!err.is_setup());
    }

    #[test]
    fn test_spawn_is_setup_error() {
        let err = ProxyError::Spawn {
            program: "/nope".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.is_setup());
        assert_eq!(err.as_label(), "spawn_failed");
    }
}
