// src/watch/debounce.rs

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

/// Re-armable debounce window for one watch rule.
///
/// Each matching filesystem event adds the changed path to the pending set
/// and resets the single deadline to `interval` from now; the window always
/// restarts from the *last* event of a burst. When the deadline passes with
/// a non-empty pending set, [`fire`](Self::fire) yields the batch exactly
/// once and disarms.
///
/// The debouncer is pure state; the session loop owns the actual
/// `sleep_until` on [`deadline`](Self::deadline). A rule owns exactly one
/// deadline at a time: resetting, never stacking.
#[derive(Debug)]
pub struct Debouncer {
    interval: Duration,
    deadline: Option<Instant>,
    pending: BTreeSet<PathBuf>,
}

impl Debouncer {
    /// `interval` must be strictly positive; rule validation enforces that
    /// before a debouncer is ever built.
    pub fn new(interval: Duration) -> Self {
        debug_assert!(!interval.is_zero(), "debounce interval must be > 0");
        Self {
            interval,
            deadline: None,
            pending: BTreeSet::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Record a changed path and re-arm the deadline.
    pub fn record(&mut self, path: PathBuf) {
        trace!(?path, "debounce: recorded change");
        self.pending.insert(path);
        self.rearm();
    }

    /// Reset the deadline to `interval` from now without touching the
    /// pending set. Used when a follow-up run restarts the debounce window.
    pub fn rearm(&mut self) {
        self.deadline = Some(Instant::now() + self.interval);
    }

    /// The instant the window closes, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// If the window has closed and changes are pending, take the batch and
    /// disarm. Returns `None` while the window is still open, not armed, or
    /// armed with nothing pending (a follow-up re-arm).
    pub fn fire(&mut self, now: Instant) -> Option<Vec<PathBuf>> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        self.deadline = None;
        if self.pending.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.pending).into_iter().collect())
    }

    /// Number of paths currently pending.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
