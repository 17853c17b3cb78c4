//! # Notification endpoint.
//!
//! [`Endpoint`] owns the unix datagram socket the child sends its notifications
//! to. It is the only component that touches the socket.
//!
//! ## Lifecycle
//! ```text
//! create(path)
//!   ├─ stale entry at path? ─► remove (failure = StaleSocket)
//!   └─ bind UnixDatagram      (failure = Bind)
//!
//! close(reason)               (first call wins, later calls are no-ops)
//!   ├─ record Shutdown reason ─► relay wakes and exits silently
//!   └─ unlink path            (missing path is fine)
//! ```
//!
//! The shutdown reason replaces a process-wide "closing" flag: a read failure
//! observed after a reason is recorded is expected, one observed before is not.
//! The socket descriptor itself is released when the last clone is dropped.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::net::UnixDatagram;
use tokio::sync::watch;

use crate::error::ProxyError;

/// Why the endpoint was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// Readiness observed; the child has been detached.
    Detached,
    /// The run ended without readiness (child exit, timeout, setup failure).
    Cancelled,
}

struct Inner {
    path: PathBuf,
    socket: UnixDatagram,
    shutdown: watch::Sender<Option<Shutdown>>,
    stale_removed: bool,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if self.shutdown.borrow().is_none() {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Bound notification socket. Cheap to clone; clones share the socket.
#[derive(Clone)]
pub struct Endpoint {
    inner: Arc<Inner>,
}

impl Endpoint {
    /// Removes any stale entry at `path` and binds a datagram socket there.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, ProxyError> {
        let path = path.into();
        let stale_removed = remove_stale(&path)?;

        let socket = UnixDatagram::bind(&path).map_err(|source| ProxyError::Bind {
            path: path.clone(),
            source,
        })?;
        let (shutdown, _) = watch::channel(None);

        Ok(Self {
            inner: Arc::new(Inner {
                path,
                socket,
                shutdown,
                stale_removed,
            }),
        })
    }

    /// Filesystem path the socket is bound to.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Whether a leftover entry had to be removed before binding.
    pub fn stale_removed(&self) -> bool {
        self.inner.stale_removed
    }

    /// Receives one datagram into `buf`; excess bytes are discarded.
    pub async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.socket.recv(buf).await
    }

    /// Reason recorded by [`close`](Self::close), if any.
    pub fn shutdown_reason(&self) -> Option<Shutdown> {
        *self.inner.shutdown.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown_reason().is_some()
    }

    /// Subscribes to the shutdown reason.
    pub fn watch_shutdown(&self) -> watch::Receiver<Option<Shutdown>> {
        self.inner.shutdown.subscribe()
    }

    /// Records `reason` and unlinks the socket path.
    ///
    /// Only the first call has any effect. A path that is already gone is not an
    /// error; any other unlink failure is returned for the caller to report.
    pub fn close(&self, reason: Shutdown) -> io::Result<()> {
        let first = self.inner.shutdown.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
        if !first {
            return Ok(());
        }
        match std::fs::remove_file(&self.inner.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("path", &self.inner.path)
            .field("shutdown", &self.shutdown_reason())
            .finish()
    }
}

/// Removes whatever sits at `path`. Returns whether something was removed.
fn remove_stale(path: &Path) -> Result<bool, ProxyError> {
    if std::fs::symlink_metadata(path).is_err() {
        return Ok(false);
    }
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(ProxyError::StaleSocket {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_binds_and_receives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notify.sock");
        let ep = Endpoint::create(&path).expect("create");
        assert!(path.exists());
        assert!(!ep.stale_removed());

        let client = std::os::unix::net::UnixDatagram::unbound().unwrap();
        client.send_to(b"READY=1", &path).unwrap();

        let mut buf = [0u8; 64];
        let n = ep.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"READY=1");
    }

    #[tokio::test]
    async fn test_stale_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notify.sock");
        std::fs::write(&path, b"leftover").unwrap();

        let ep = Endpoint::create(&path).expect("create over stale file");
        assert!(ep.stale_removed());
    }

    #[tokio::test]
    async fn test_stale_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notify.sock");
        std::fs::create_dir(&path).unwrap();

        let err = Endpoint::create(&path).unwrap_err();
        assert_eq!(err.as_label(), "stale_socket");
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notify.sock");
        let ep = Endpoint::create(&path).unwrap();

        ep.close(Shutdown::Detached).unwrap();
        assert!(!path.exists());
        ep.close(Shutdown::Cancelled).unwrap();
        assert_eq!(ep.shutdown_reason(), Some(Shutdown::Detached));
    }

    #[tokio::test]
    async fn test_close_tolerates_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notify.sock");
        let ep = Endpoint::create(&path).unwrap();

        std::fs::remove_file(&path).unwrap();
        ep.close(Shutdown::Cancelled).unwrap();
        assert!(ep.is_closed());
    }

    #[tokio::test]
    async fn test_close_wakes_watchers() {
        let dir = tempfile::tempdir().unwrap();
        let ep = Endpoint::create(dir.path().join("notify.sock")).unwrap();
        let mut rx = ep.watch_shutdown();

        let closer = ep.clone();
        tokio::spawn(async move { closer.close(Shutdown::Cancelled) });

        let reason = *rx.wait_for(|r| r.is_some()).await.unwrap();
        assert_eq!(reason, Some(Shutdown::Cancelled));
    }

    #[tokio::test]
    async fn test_drop_without_close_unlinks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notify.sock");
        drop(Endpoint::create(&path).unwrap());
        assert!(!path.exists());
    }
}
