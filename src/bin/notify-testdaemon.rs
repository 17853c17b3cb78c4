//! Minimal readiness-protocol daemon.
//!
//! Sends `READY=1` to `NOTIFY_SOCKET`, then idles until SIGINT or SIGTERM.
//! Exits 1 if the variable is unset or the notification cannot be sent.

use std::process;

use sdnotify_proxy::notify_ready;
use tokio::signal::unix::{SignalKind, signal};

fn fail(msg: std::fmt::Arguments<'_>) -> ! {
    eprintln!("notify-testdaemon: {msg}");
    process::exit(1);
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Listeners go in before readiness so an immediate stop request is not lost.
    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(i), Ok(t)) => (i, t),
        (Err(e), _) | (_, Err(e)) => fail(format_args!("signal setup failed: {e}")),
    };

    match notify_ready() {
        Ok(true) => {}
        Ok(false) => fail(format_args!("NOTIFY_SOCKET is not set")),
        Err(e) => fail(format_args!("notify failed: {e}")),
    }

    eprintln!("notify-testdaemon: waiting for SIGINT or SIGTERM");
    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
    }
    eprintln!("notify-testdaemon: stopping");
}
