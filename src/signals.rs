//! # OS signal intake.
//!
//! [`SignalSource`] merges three OS signals with an in-process injection channel
//! into one stream the supervisor selects on:
//! - **SIGINT** → [`Signal::Interrupt`] (forwarded to the child)
//! - **SIGTERM** → [`Signal::Terminate`] (forwarded to the child)
//! - **SIGCHLD** → [`Signal::ChildStatus`] (triggers a reap attempt)
//!
//! The injection side ([`SignalInjector`]) is how the relay escalates a failed
//! socket read: it raises an interrupt exactly as if one had arrived from outside.
//!
//! All listeners are registered in [`SignalSource::register`], which the supervisor
//! calls before spawning the child so no early SIGCHLD can be missed.

use tokio::signal::unix::{Signal as UnixSignal, SignalKind, signal};
use tokio::sync::mpsc;

use crate::error::ProxyError;

/// Signals the supervisor reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Interrupt,
    Terminate,
    ChildStatus,
}

impl Signal {
    /// Raw signal number.
    pub fn as_raw(self) -> libc::c_int {
        match self {
            Signal::Interrupt => libc::SIGINT,
            Signal::Terminate => libc::SIGTERM,
            Signal::ChildStatus => libc::SIGCHLD,
        }
    }

    /// Conventional signal name (`SIGINT`, ...).
    pub fn name(self) -> &'static str {
        match self {
            Signal::Interrupt => "SIGINT",
            Signal::Terminate => "SIGTERM",
            Signal::ChildStatus => "SIGCHLD",
        }
    }

    /// Whether this signal is passed through to the child.
    pub fn is_forwarded(self) -> bool {
        matches!(self, Signal::Interrupt | Signal::Terminate)
    }
}

/// Cloneable handle that pushes signals into a [`SignalSource`].
#[derive(Clone, Debug)]
pub struct SignalInjector {
    tx: mpsc::UnboundedSender<Signal>,
}

impl SignalInjector {
    /// Queues `sig` as if it had been delivered by the OS.
    ///
    /// Returns `false` when the source is gone (the supervisor already finished).
    pub fn inject(&self, sig: Signal) -> bool {
        self.tx.send(sig).is_ok()
    }
}

/// Creates a linked injector / pending-injection pair.
pub(crate) fn injection_channel() -> (SignalInjector, mpsc::UnboundedReceiver<Signal>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SignalInjector { tx }, rx)
}

/// Merged stream of OS and injected signals.
pub struct SignalSource {
    sigint: UnixSignal,
    sigterm: UnixSignal,
    sigchld: UnixSignal,
    injected: mpsc::UnboundedReceiver<Signal>,
}

impl SignalSource {
    /// Registers SIGINT, SIGTERM and SIGCHLD listeners.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn register(injected: mpsc::UnboundedReceiver<Signal>) -> Result<Self, ProxyError> {
        let listen =
            |kind: SignalKind| signal(kind).map_err(|source| ProxyError::SignalSetup { source });
        Ok(Self {
            sigint: listen(SignalKind::interrupt())?,
            sigterm: listen(SignalKind::terminate())?,
            sigchld: listen(SignalKind::child())?,
            injected,
        })
    }

    /// Waits for the next signal.
    ///
    /// SIGCHLD is checked first so a child exit is never starved by a burst of
    /// forwarded interrupts. Returns `None` only if every source has closed.
    pub async fn recv(&mut self) -> Option<Signal> {
        tokio::select! {
            biased;
            Some(()) = self.sigchld.recv() => Some(Signal::ChildStatus),
            Some(()) = self.sigint.recv() => Some(Signal::Interrupt),
            Some(()) = self.sigterm.recv() => Some(Signal::Terminate),
            Some(sig) = self.injected.recv() => Some(sig),
            else => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_numbers() {
        assert_eq!(Signal::Interrupt.as_raw(), libc::SIGINT);
        assert_eq!(Signal::Terminate.as_raw(), libc::SIGTERM);
        assert_eq!(Signal::ChildStatus.as_raw(), libc::SIGCHLD);
    }

    #[test]
    fn test_only_termination_signals_are_forwarded() {
        assert!(Signal::Interrupt.is_forwarded());
        assert!(Signal::Terminate.is_forwarded());
        assert!(!Signal::ChildStatus.is_forwarded());
    }

    #[tokio::test]
    async fn test_injected_signal_is_delivered() {
        let (injector, rx) = injection_channel();
        let mut source = SignalSource::register(rx).expect("register");

        assert!(injector.inject(Signal::Terminate));
        // SIGCHLD from children of concurrently running tests may come first.
        let sig = loop {
            match source.recv().await {
                Some(Signal::ChildStatus) => continue,
                other => break other,
            }
        };
        assert_eq!(sig, Some(Signal::Terminate));
    }

    #[tokio::test]
    async fn test_inject_after_source_dropped_reports_false() {
        let (injector, rx) = injection_channel();
        drop(rx);
        assert!(!injector.inject(Signal::Interrupt));
    }
}
