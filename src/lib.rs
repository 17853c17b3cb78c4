//! # sdnotify-proxy
//!
//! **sdnotify-proxy** stands in for a service manager's readiness socket.
//!
//! It creates a unix datagram socket, launches a command with
//! `NOTIFY_SOCKET` pointing at it and waits for the command to report
//! `READY=1`. Once ready, the child's pid is recorded next to the socket and
//! the child is released to keep running on its own. If the child exits
//! first, its exit status is passed through; if it takes too long, it is sent
//! SIGTERM.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!               ┌──────────────────────────────┐
//!   child ─────►│ Endpoint (unix datagram sock)│
//!  READY=1      └──────────────┬───────────────┘
//!                              ▼
//!                    ┌───────────────────┐
//!                    │ Relay (task)      │ recv ─► Message::classify
//!                    └─────────┬─────────┘
//!                              │ mpsc<Message>
//!                              ▼
//!                    ┌───────────────────┐
//!                    │ Watcher (task)    │ Ready ─► oneshot
//!                    └─────────┬─────────┘
//!                              ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor (select loop)                                         │
//! │  - readiness         ─► pid record, release child, Detached       │
//! │  - startup timeout   ─► SIGTERM child, StartupTimeout             │
//! │  - SIGINT / SIGTERM  ─► forward to child                          │
//! │  - SIGCHLD           ─► reap, Exited{code}                        │
//! └──────┬────────────────────────────────────────────────────────────┘
//!        │ publishes Events
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                     Bus (broadcast channel)                       │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                           (per-sub queues)
//!                          ┌────────┴────────┐
//!                          ▼                 ▼
//!                      LogWriter          custom
//! ```
//!
//! ### Lifecycle
//! ```text
//! register signals ─► bind endpoint ─► spawn child ─► AwaitingReadiness
//!
//! AwaitingReadiness
//!   ├─ READY=1        ─► Detached   (pid printed, exit 0)
//!   ├─ child exits    ─► Exited     (exit with the child's code)
//!   ├─ timeout        ─► error      (child sent SIGTERM, exit 1)
//!   └─ SIGINT/SIGTERM ─► Terminating ─► child exits ─► Exited
//! ```
//!
//! ## Optional features
//! - `logging` (default): exports the stderr [`LogWriter`] subscriber.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use sdnotify_proxy::{Config, Outcome, Supervisor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config {
//!         timeout: Duration::from_secs(10),
//!         ..Config::default()
//!     };
//!
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn sdnotify_proxy::Subscribe>> =
//!         vec![Arc::new(sdnotify_proxy::LogWriter::new(cfg.verbose))];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn sdnotify_proxy::Subscribe>> = Vec::new();
//!
//!     let sup = Supervisor::new(cfg, subs);
//!     match sup.run("/run/app.sock", vec!["/usr/bin/app".into()]).await? {
//!         Outcome::Detached { pid } => println!("{pid}"),
//!         Outcome::Exited { code, .. } => std::process::exit(code),
//!     }
//!     Ok(())
//! }
//! ```
mod config;
mod endpoint;
mod error;
mod events;
mod launcher;
mod message;
mod notify;
mod relay;
mod signals;
mod subscribers;
mod supervisor;
mod watcher;

pub mod pidfile;

// ---- Public re-exports ----

pub use config::{Config, DEFAULT_TIMEOUT, NOTIFY_SOCKET_ENV};
pub use endpoint::{Endpoint, Shutdown};
pub use error::{EXIT_FAILURE, ProxyError};
pub use events::{Bus, Event, EventKind};
pub use launcher::{ChildHandle, ChildState, Launcher, exit_code};
pub use message::{MAX_PAYLOAD, Message, READY_PAYLOAD};
pub use notify::{Notifier, notify_ready};
pub use relay::{Datagrams, Relay};
pub use signals::{Signal, SignalInjector, SignalSource};
pub use subscribers::{Subscribe, SubscriberSet};
pub use supervisor::{Outcome, Phase, Supervisor};
pub use watcher::{WatchEnd, Watcher};

// Optional: the built-in stderr logger subscriber.
// Disable with: `--no-default-features`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
