// src/mode.rs

//! Execution-mode switch between fail-fast batch runs and survive-and-report
//! interactive sessions.
//!
//! The mode starts as [`ErrorMode::Batch`] and moves to
//! [`ErrorMode::Interactive`] at most once, when a watch session begins. It
//! never moves back. The controller is shared read-mostly across concurrent
//! pipeline runs, so the mode lives in an `AtomicBool` rather than behind a
//! lock.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info};

use crate::errors::{BuildError, Result};

/// Process-wide execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMode {
    /// One-shot execution: any task failure aborts the entire run.
    Batch,
    /// Long-running session: task failures are logged but do not halt it.
    Interactive,
}

/// Holds the current [`ErrorMode`] and dispatches failures accordingly.
#[derive(Debug, Default)]
pub struct ErrorModeController {
    interactive: AtomicBool,
    /// Errors recorded while interactive, kept for later inspection.
    recorded: Mutex<Vec<String>>,
}

impl ErrorModeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> ErrorMode {
        if self.interactive.load(Ordering::Acquire) {
            ErrorMode::Interactive
        } else {
            ErrorMode::Batch
        }
    }

    /// Switch to interactive mode. Monotonic: once interactive, always
    /// interactive; a second call is a no-op.
    pub fn enter_interactive(&self) {
        let was = self.interactive.swap(true, Ordering::AcqRel);
        if !was {
            info!("entering interactive mode");
        }
    }

    /// Dispatch a failure according to the current mode.
    ///
    /// - Batch: the error is returned to the caller, which aborts the run.
    /// - Interactive: the error is logged and recorded, and `Ok(())` is
    ///   returned so the caller continues instead of aborting.
    pub fn handle(&self, err: BuildError) -> Result<()> {
        match self.mode() {
            ErrorMode::Batch => Err(err),
            ErrorMode::Interactive => {
                error!(error = %err, "build error (session continues)");
                if let Ok(mut recorded) = self.recorded.lock() {
                    recorded.push(err.to_string());
                }
                Ok(())
            }
        }
    }

    /// Errors recorded so far in interactive mode.
    pub fn recorded(&self) -> Vec<String> {
        self.recorded
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}
