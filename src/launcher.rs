//! # Process launcher and child handle.
//!
//! [`Launcher`] describes the command to run (builder style); [`Launcher::spawn`]
//! starts it with the supervisor's own stdin/stdout/stderr and the extra
//! environment (the notification socket path).
//!
//! [`ChildHandle`] tracks the child through its states:
//! ```text
//! Running ──► Exited(code)   (reaped after SIGCHLD)
//!    └──────► Released       (detached after readiness; never waited on or signalled again)
//! ```

use std::ffi::OsString;
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, Command, ExitStatus, Stdio};

use crate::error::ProxyError;
use crate::signals::Signal;

/// Liveness of a launched child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildState {
    Running,
    Exited(i32),
    Released,
}

/// Command to launch: `argv[0]` is the executable, the rest its arguments.
#[derive(Debug, Clone)]
pub struct Launcher {
    argv: Vec<OsString>,
    env: Vec<(OsString, OsString)>,
}

impl Launcher {
    /// Creates a launcher for `argv`.
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            env: Vec::new(),
        }
    }

    /// Adds an environment variable on top of the inherited environment.
    pub fn env<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<OsString>,
        V: Into<OsString>,
    {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Program name, lossily rendered.
    pub fn program(&self) -> String {
        self.argv
            .first()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Starts the child with inherited stdio.
    pub fn spawn(&self) -> Result<ChildHandle, ProxyError> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| ProxyError::InvalidConfig {
                details: "no command given".to_string(),
            })?;

        let child = Command::new(program)
            .args(args)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ProxyError::Spawn {
                program: self.program(),
                source,
            })?;

        Ok(ChildHandle {
            pid: child.id(),
            child: Some(child),
            state: ChildState::Running,
        })
    }
}

/// Owned handle to a launched child.
#[derive(Debug)]
pub struct ChildHandle {
    pid: u32,
    child: Option<Child>,
    state: ChildState,
}

impl ChildHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn state(&self) -> ChildState {
        self.state
    }

    /// Sends `sig` to the child.
    ///
    /// Refused once the child is no longer tracked. A child that already died
    /// but has not been reaped yet (`ESRCH`) is not an error.
    pub fn signal(&self, sig: Signal) -> Result<(), ProxyError> {
        if self.state != ChildState::Running {
            return Err(ProxyError::NotTracked { pid: self.pid });
        }
        let rc = unsafe { libc::kill(self.pid as libc::pid_t, sig.as_raw()) };
        if rc == -1 {
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            if errno != libc::ESRCH {
                return Err(ProxyError::Signal {
                    pid: self.pid,
                    signal: sig.name(),
                    errno,
                });
            }
        }
        Ok(())
    }

    /// Reaps the child if it has terminated, without blocking.
    ///
    /// Returns `Ok(None)` while it is still running (SIGCHLD can also mean
    /// stopped/continued). Once reaped the state is `Exited(code)` and further
    /// calls return the same code.
    pub fn try_reap(&mut self) -> Result<Option<i32>, ProxyError> {
        match self.state {
            ChildState::Exited(code) => return Ok(Some(code)),
            ChildState::Released => return Err(ProxyError::NotTracked { pid: self.pid }),
            ChildState::Running => {}
        }
        let Some(child) = self.child.as_mut() else {
            return Err(ProxyError::NotTracked { pid: self.pid });
        };
        let status = child.try_wait().map_err(|source| ProxyError::Reap {
            pid: self.pid,
            source,
        })?;

        Ok(status.map(|status| {
            let code = exit_code(status);
            self.state = ChildState::Exited(code);
            self.child = None;
            code
        }))
    }

    /// Stops tracking the child. It keeps running and is never waited on by us.
    pub fn release(&mut self) -> u32 {
        // `std::process::Child` has no `Drop` impl: dropping it neither waits nor kills.
        self.child = None;
        self.state = ChildState::Released;
        self.pid
    }
}

/// Exit code to propagate for `status`; death by signal N maps to `128 + N`.
pub fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(sig)) => 128 + sig,
        (None, None) => crate::error::EXIT_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn reap(child: &mut ChildHandle) -> i32 {
        for _ in 0..200 {
            if let Some(code) = child.try_reap().unwrap() {
                return code;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("child {} did not exit", child.pid());
    }

    #[tokio::test]
    async fn test_exit_code_is_propagated() {
        let mut child = Launcher::new(["/bin/sh", "-c", "exit 7"]).spawn().unwrap();
        assert_eq!(reap(&mut child).await, 7);
        assert_eq!(child.state(), ChildState::Exited(7));
        assert_eq!(child.try_reap().unwrap(), Some(7));
    }

    #[tokio::test]
    async fn test_environment_is_injected() {
        let mut child = Launcher::new(["/bin/sh", "-c", r#"test "$NOTIFY_SOCKET" = /tmp/x.sock"#])
            .env("NOTIFY_SOCKET", "/tmp/x.sock")
            .spawn()
            .unwrap();
        assert_eq!(reap(&mut child).await, 0);
    }

    #[tokio::test]
    async fn test_signalled_child_maps_to_128_plus_signal() {
        let mut child = Launcher::new(["/bin/sleep", "30"]).spawn().unwrap();
        child.signal(Signal::Terminate).unwrap();
        assert_eq!(reap(&mut child).await, 128 + libc::SIGTERM);
        assert!(child.signal(Signal::Terminate).is_err());
    }

    #[test]
    fn test_missing_binary_is_spawn_error() {
        let err = Launcher::new(["/definitely/not/here"]).spawn().unwrap_err();
        assert_eq!(err.as_label(), "spawn_failed");
    }

    #[test]
    fn test_empty_argv_is_invalid() {
        let err = Launcher::new(Vec::<OsString>::new()).spawn().unwrap_err();
        assert_eq!(err.as_label(), "invalid_config");
    }

    #[test]
    fn test_released_child_is_not_signalled_or_reaped() {
        let mut child = Launcher::new(["/bin/sleep", "30"]).spawn().unwrap();
        let pid = child.release();
        assert_eq!(child.state(), ChildState::Released);
        assert!(child.signal(Signal::Terminate).is_err());
        assert!(child.try_reap().is_err());

        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGKILL);
            libc::waitpid(pid as libc::pid_t, std::ptr::null_mut(), 0);
        }
    }
}
