//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`] that fans
//! events out to subscribers, plus the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Supervisor/Relay/Watcher ── publish(Event) ──► Bus ──► listener
//!                                                            │
//!                                                            └──► SubscriberSet::emit(&Event)
//!                                                                     │
//!                                                               ┌─────┴─────┐
//!                                                               ▼           ▼
//!                                                           LogWriter    Custom ...
//! ```

mod set;
mod subscriber;

#[cfg(feature = "logging")]
mod log;

pub use set::SubscriberSet;
pub use subscriber::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
