// src/reload.rs

//! Live-reload notification.
//!
//! The notifier is a generation counter on a `tokio::sync::watch` channel.
//! Transports (websocket server, SSE endpoint, ...) subscribe and push a
//! reload to their clients whenever the generation changes. `notify()` is
//! best-effort and idempotent: concurrent calls collapse into "the
//! generation moved", which is all a reload transport needs.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ReloadNotifier {
    tx: Arc<watch::Sender<u64>>,
}

impl Default for ReloadNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadNotifier {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Signal connected listeners to reload. Safe under concurrent calls;
    /// listeners that are not currently reading simply see the latest
    /// generation next time they look.
    pub fn notify(&self) {
        self.tx.send_modify(|generation| *generation += 1);
        debug!(generation = *self.tx.borrow(), "reload notified");
    }

    /// Subscribe a transport to reload signals.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }

    /// Current generation (mainly for tests and diagnostics).
    pub fn generation(&self) -> u64 {
        *self.tx.borrow()
    }
}
