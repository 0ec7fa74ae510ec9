//! Polling file watchers for automatic configuration reloads.
//!
//! One lightweight worker per watched configuration, so stopping or
//! removing one configuration never affects another's polling cadence.
//! Change detection is an explicit poll-and-compare against the
//! modification-time snapshot recorded at the last successful load; a
//! failed reload is logged and retried on the next interval while the
//! previous effective document stays published.

use crate::core::ConfigRegistry;
use std::sync::Weak;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// Handle to one configuration's polling thread.
///
/// Stopping is request-then-join: the stop signal is sent, then the call
/// blocks until the thread has observed it and exited. Stopping an
/// already-stopped handle is a no-op.
pub(crate) struct WatcherHandle {
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl WatcherHandle {
    /// Signal the watcher and wait for its thread to exit.
    pub(crate) fn stop(&mut self) {
        // Send fails when the loop already exited; join still drains it.
        let _ = self.stop_tx.send(());
        if let Some(thread) = self.thread.take() {
            // A watcher can hold the last registry reference, in which case
            // this drop runs on the watcher thread itself; it exits on the
            // stop signal, but joining it from itself would hang forever.
            if thread.thread().id() != std::thread::current().id() {
                let _ = thread.join();
            }
        }
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn the polling thread for `name`.
///
/// The thread holds only a weak reference to the registry: dropping the
/// registry ends the loop on its next tick instead of keeping it alive.
pub(crate) fn spawn(
    registry: Weak<ConfigRegistry>,
    name: String,
    interval: Duration,
) -> std::io::Result<WatcherHandle> {
    let (stop_tx, stop_rx) = mpsc::channel();
    let thread_name = format!("layerconf-watch-{name}");
    let thread = std::thread::Builder::new()
        .name(thread_name)
        .spawn(move || watch_loop(registry, name, interval, stop_rx))?;
    Ok(WatcherHandle {
        stop_tx,
        thread: Some(thread),
    })
}

fn watch_loop(
    registry: Weak<ConfigRegistry>,
    name: String,
    interval: Duration,
    stop_rx: Receiver<()>,
) {
    tracing::info!(config = %name, interval_ms = interval.as_millis() as u64, "watcher started");
    loop {
        // The sleep doubles as the stop check, so shutdown never waits out
        // a full interval.
        match stop_rx.recv_timeout(interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        let Some(registry) = registry.upgrade() else {
            break;
        };
        if !registry.watcher_tick(&name) {
            break;
        }
    }
    tracing::info!(config = %name, "watcher stopped");
}
