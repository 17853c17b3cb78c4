//! # Supervisor: the proxy's control loop.
//!
//! The [`Supervisor`] creates the notification endpoint, launches the child,
//! wires the relay/watcher pair and then multiplexes four event sources in a
//! single `select!` until exactly one terminal transition fires.
//!
//! ## High-level architecture
//! ```text
//! run(socket, argv):
//!   Bus + listener ──► SubscriberSet (LogWriter, ...)
//!   SignalSource::register()          SIGINT, SIGTERM, SIGCHLD (+ injected), before spawn
//!   Endpoint::create(socket)          stale path removed, datagram socket bound
//!   Launcher::spawn(argv)             NOTIFY_SOCKET=<socket>, inherited stdio
//!   spawn Relay  ── mpsc<Message> ──► spawn Watcher ── oneshot<()> ──► drive()
//!
//! drive() loop, select (biased):
//!   ├─ readiness          ─► pid record, release child, close(Detached) ─► Ok(Detached)
//!   ├─ startup timeout    ─► SIGTERM child                              ─► Err(StartupTimeout)
//!   │                        (armed in both phases)
//!   └─ signal
//!        ├─ SIGINT/SIGTERM ─► forward to child, phase = Terminating, continue
//!        └─ SIGCHLD        ─► try_reap ─┬─ Some(code) ─► cancel watcher ─► Ok(Exited{code})
//!                                       ├─ None       ─► continue
//!                                       └─ Err        ─► Err(Reap)
//!
//! finish():
//!   cancel token, close(Cancelled) (no-op if already closed), join relay + watcher
//! drop(bus) ─► listener drains SubscriberSet ─► return
//! ```
//!
//! ## Rules
//! - One `select!`, no locks: once a terminal arm fires nothing else mutates state.
//! - Readiness is polled first, so a readiness already delivered beats a
//!   simultaneous child exit.
//! - In `Terminating` readiness is no longer accepted. The supervisor waits for
//!   the child's exit (further interrupts are forwarded again), bounded by the
//!   same startup deadline.
//! - The pid record is written only on the readiness path, before returning.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::endpoint::{Endpoint, Shutdown};
use crate::error::ProxyError;
use crate::events::{Bus, Event, EventKind};
use crate::launcher::{ChildHandle, Launcher};
use crate::pidfile;
use crate::relay::Relay;
use crate::signals::{Signal, SignalInjector, SignalSource, injection_channel};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::watcher::{WatchEnd, Watcher};

/// How a supervised run ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Readiness observed; the child keeps running on its own.
    Detached { pid: u32 },
    /// The child exited before becoming ready.
    Exited { pid: u32, code: i32 },
}

impl Outcome {
    pub fn pid(&self) -> u32 {
        match *self {
            Outcome::Detached { pid } | Outcome::Exited { pid, .. } => pid,
        }
    }

    /// Status the proxy itself should exit with.
    pub fn exit_code(&self) -> i32 {
        match *self {
            Outcome::Detached { .. } => 0,
            Outcome::Exited { code, .. } => code,
        }
    }
}

/// Supervisor state while the loop runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingReadiness,
    Terminating,
}

/// Launches a child behind a substitute `NOTIFY_SOCKET` and waits for `READY=1`.
pub struct Supervisor {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    injector: SignalInjector,
    injected: mpsc::UnboundedReceiver<Signal>,
}

impl Supervisor {
    /// Creates a supervisor with the given config and event subscribers.
    pub fn new(cfg: Config, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let (injector, injected) = injection_channel();
        Self {
            cfg,
            subscribers,
            injector,
            injected,
        }
    }

    /// Handle for raising signals in-process, exactly as if the OS delivered them.
    pub fn injector(&self) -> SignalInjector {
        self.injector.clone()
    }

    /// Runs one supervised launch of `argv` behind the socket at `socket`.
    ///
    /// Returns once a terminal transition fired and every background task and
    /// subscriber has finished.
    pub async fn run(
        self,
        socket: impl Into<PathBuf>,
        argv: Vec<OsString>,
    ) -> Result<Outcome, ProxyError> {
        let Supervisor {
            cfg,
            subscribers,
            injector,
            injected,
        } = self;

        let bus = Bus::new(cfg.bus_capacity_clamped());
        let listener = subscriber_listener(&bus, subscribers);

        let res = async {
            let mut session =
                Session::start(&cfg, bus.clone(), socket.into(), argv, injector, injected)?;
            let res = session.drive().await;
            session.finish().await;
            res
        }
        .await;

        drop(bus);
        let _ = listener.await;
        res
    }
}

/// Forwards bus events to the subscriber set until the bus closes, then drains it.
fn subscriber_listener(bus: &Bus, subscribers: Vec<Arc<dyn Subscribe>>) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    let set = SubscriberSet::new(subscribers);
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => set.emit(&ev),
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    set.emit(&Event::subscriber_overflow("listener", "lagged"));
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        set.shutdown().await;
    })
}

/// Everything owned by one run after setup succeeded.
struct Session<'a> {
    cfg: &'a Config,
    bus: Bus,
    endpoint: Endpoint,
    child: ChildHandle,
    signals: SignalSource,
    ready: oneshot::Receiver<()>,
    cancel: CancellationToken,
    tasks: JoinSet<()>,
    phase: Phase,
}

impl<'a> Session<'a> {
    fn start(
        cfg: &'a Config,
        bus: Bus,
        socket: PathBuf,
        argv: Vec<OsString>,
        injector: SignalInjector,
        injected: mpsc::UnboundedReceiver<Signal>,
    ) -> Result<Self, ProxyError> {
        let signals = SignalSource::register(injected)?;

        let endpoint = Endpoint::create(socket)?;
        if endpoint.stale_removed() {
            bus.publish(Event::new(EventKind::StaleSocketRemoved).with_path(endpoint.path()));
        }
        bus.publish(Event::new(EventKind::EndpointBound).with_path(endpoint.path()));

        let launcher = Launcher::new(argv).env(cfg.notify_env, endpoint.path());
        let child = match launcher.spawn() {
            Ok(child) => child,
            Err(e) => {
                close_endpoint(&bus, &endpoint, Shutdown::Cancelled);
                return Err(e);
            }
        };
        bus.publish(
            Event::new(EventKind::ChildSpawned)
                .with_pid(child.pid())
                .with_reason(launcher.program()),
        );

        let (queue_tx, queue_rx) = mpsc::channel(cfg.queue_capacity_clamped());
        let (ready_tx, ready_rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        let mut tasks = JoinSet::new();
        tasks.spawn(Relay::for_endpoint(&endpoint, queue_tx, injector, bus.clone()).run());
        let watcher = Watcher::new(endpoint.clone(), queue_rx, ready_tx, bus.clone());
        let token = cancel.clone();
        let watch_bus = bus.clone();
        tasks.spawn(async move {
            let end = watcher.run(token).await;
            if end != WatchEnd::Ready {
                watch_bus
                    .publish(Event::new(EventKind::WatcherStopped).with_reason(end.as_label()));
            }
        });

        Ok(Self {
            cfg,
            bus,
            endpoint,
            child,
            signals,
            ready: ready_rx,
            cancel,
            tasks,
            phase: Phase::AwaitingReadiness,
        })
    }

    async fn drive(&mut self) -> Result<Outcome, ProxyError> {
        let timeout = self.cfg.startup_timeout();
        let deadline = async move {
            match timeout {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);
        let mut ready_open = true;

        loop {
            self.bus.publish(Event::new(EventKind::AwaitingEvent));
            let awaiting = self.phase == Phase::AwaitingReadiness;

            tokio::select! {
                biased;
                res = &mut self.ready, if ready_open && awaiting => match res {
                    Ok(()) => return Ok(self.detach()),
                    // Watcher stopped without readiness; leave the rest to the other arms.
                    Err(_) => ready_open = false,
                },
                _ = &mut deadline => return Err(self.time_out()),
                sig = self.signals.recv() => match sig {
                    Some(Signal::ChildStatus) => {
                        if let Some(outcome) = self.reap()? {
                            return Ok(outcome);
                        }
                    }
                    Some(sig) if sig.is_forwarded() => self.forward(sig),
                    Some(_) => {}
                    None => {
                        return Err(ProxyError::SignalSetup {
                            source: std::io::Error::other("signal stream closed"),
                        });
                    }
                },
            }
        }
    }

    /// Readiness path: persist pid, detach, close the endpoint.
    fn detach(&mut self) -> Outcome {
        let pid = self.child.pid();
        let pid_path = self.cfg.pid_path(self.endpoint.path());

        match pidfile::write(&pid_path, pid) {
            Ok(()) => self.bus.publish(
                Event::new(EventKind::PidWritten)
                    .with_pid(pid)
                    .with_path(&pid_path),
            ),
            Err(e) => self.bus.publish(
                Event::new(EventKind::PidWriteFailed)
                    .with_pid(pid)
                    .with_path(&pid_path)
                    .with_reason(e.to_string()),
            ),
        }

        self.child.release();
        self.bus
            .publish(Event::new(EventKind::ChildReleased).with_pid(pid));
        close_endpoint(&self.bus, &self.endpoint, Shutdown::Detached);

        Outcome::Detached { pid }
    }

    /// Timeout path: ask the child to terminate and give up without waiting.
    fn time_out(&mut self) -> ProxyError {
        let pid = self.child.pid();
        let timeout = self.cfg.timeout;

        self.bus.publish(
            Event::new(EventKind::TimeoutHit)
                .with_pid(pid)
                .with_timeout(timeout),
        );
        self.signal_child(Signal::Terminate);
        self.cancel.cancel();

        ProxyError::StartupTimeout { timeout, pid }
    }

    /// SIGCHLD: reap if the child is gone.
    fn reap(&mut self) -> Result<Option<Outcome>, ProxyError> {
        let pid = self.child.pid();
        match self.child.try_reap()? {
            Some(code) => {
                self.bus.publish(
                    Event::new(EventKind::ChildExited)
                        .with_pid(pid)
                        .with_code(code),
                );
                self.cancel.cancel();
                Ok(Some(Outcome::Exited { pid, code }))
            }
            None => {
                self.bus
                    .publish(Event::new(EventKind::SpuriousChildSignal).with_pid(pid));
                Ok(None)
            }
        }
    }

    /// SIGINT/SIGTERM: pass the same signal through and wait for the child's exit.
    fn forward(&mut self, sig: Signal) {
        self.signal_child(sig);
        self.phase = Phase::Terminating;
    }

    fn signal_child(&self, sig: Signal) {
        let pid = self.child.pid();
        match self.child.signal(sig) {
            Ok(()) => self.bus.publish(
                Event::new(EventKind::SignalForwarded)
                    .with_pid(pid)
                    .with_signal(sig),
            ),
            Err(e) => self.bus.publish(
                Event::new(EventKind::SignalFailed)
                    .with_pid(pid)
                    .with_signal(sig)
                    .with_reason(e.to_string()),
            ),
        }
    }

    /// Stops the relay/watcher pair and waits for both.
    async fn finish(mut self) {
        self.cancel.cancel();
        if !self.endpoint.is_closed() {
            close_endpoint(&self.bus, &self.endpoint, Shutdown::Cancelled);
        }
        while self.tasks.join_next().await.is_some() {}
    }
}

/// Closes `endpoint`, reporting (never escalating) an unlink failure.
fn close_endpoint(bus: &Bus, endpoint: &Endpoint, reason: Shutdown) {
    if let Err(e) = endpoint.close(reason) {
        bus.publish(
            Event::new(EventKind::CleanupFailed)
                .with_path(endpoint.path())
                .with_reason(e.to_string()),
        );
    }
}
