// src/engine/session.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::context::BuildContext;
use crate::errors::{BuildError, Result};
use crate::reload::ReloadNotifier;
use crate::task::{Executor, TaskName, TaskRegistry};
use crate::watch::Debouncer;

/// Events feeding the session loop.
///
/// - the file watcher sends `PathChanged`
/// - spawned task runs send `RunFinished`
/// - Ctrl-C handling sends `ShutdownRequested`
#[derive(Debug)]
pub enum SessionEvent {
    PathChanged { task: TaskName, path: PathBuf },
    RunFinished { task: TaskName, outcome: RunOutcome },
    /// An unrecoverable error inside a spawned run (graph corruption,
    /// panic). Ends the session with the error.
    Fatal(BuildError),
    ShutdownRequested,
}

/// Terminal result of one triggered run, as seen by the state machine.
/// Interactive-mode failures were already logged and recorded by the
/// error-mode controller before this event is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    Failed,
}

/// Per-rule state machine.
///
/// `Idle --event--> Pending --deadline--> Running --completion--> Idle`,
/// or directly back to `Pending` when events arrived mid-run (exactly one
/// queued follow-up; later bursts merge into it, they never stack).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleState {
    Idle,
    Pending,
    Running,
}

struct RuleRuntime {
    state: RuleState,
    debouncer: Debouncer,
}

/// The interactive session loop.
///
/// Owns one [`Debouncer`] and one state per watch rule, a handle to the
/// task registry for spawning runs, and the reload notifier. Runs until
/// shutdown is requested; a task failure never ends the session.
pub struct WatchSession {
    rules: BTreeMap<TaskName, RuleRuntime>,
    registry: Arc<TaskRegistry>,
    ctx: BuildContext,
    notifier: ReloadNotifier,
    events_rx: mpsc::Receiver<SessionEvent>,
    events_tx: mpsc::Sender<SessionEvent>,
}

impl WatchSession {
    /// Build a session over the given rules, each binding a task name to a
    /// debounce interval (validated strictly positive upstream).
    pub fn new(
        registry: Arc<TaskRegistry>,
        ctx: BuildContext,
        notifier: ReloadNotifier,
        rules: Vec<(TaskName, Duration)>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(64);

        let rules = rules
            .into_iter()
            .map(|(task, interval)| {
                (
                    task,
                    RuleRuntime {
                        state: RuleState::Idle,
                        debouncer: Debouncer::new(interval),
                    },
                )
            })
            .collect();

        Self {
            rules,
            registry,
            ctx,
            notifier,
            events_rx,
            events_tx,
        }
    }

    /// Sender for feeding events into the loop (watcher, Ctrl-C handler,
    /// tests).
    pub fn event_sender(&self) -> mpsc::Sender<SessionEvent> {
        self.events_tx.clone()
    }

    /// Run the session until shutdown. There is no terminal state for the
    /// rules themselves; only an external stop (or a fatal error) ends the
    /// loop.
    pub async fn run(mut self) -> Result<()> {
        info!(rules = self.rules.len(), "watch session started");

        loop {
            // One armed deadline per rule, never stacking; the loop sleeps
            // on the earliest one among rules still in Pending.
            let next = self.next_deadline();
            let sleep_target = next.unwrap_or_else(Instant::now);

            tokio::select! {
                maybe = self.events_rx.recv() => {
                    match maybe {
                        None => break,
                        Some(event) => {
                            if !self.handle_event(event)? {
                                break;
                            }
                        }
                    }
                }
                _ = tokio::time::sleep_until(sleep_target), if next.is_some() => {
                    self.fire_due();
                }
            }
        }

        info!("watch session exiting");
        Ok(())
    }

    /// Earliest pending debounce deadline, if any.
    fn next_deadline(&self) -> Option<Instant> {
        self.rules
            .values()
            .filter(|r| r.state == RuleState::Pending)
            .filter_map(|r| r.debouncer.deadline())
            .min()
    }

    /// Returns `Ok(false)` to stop the loop.
    fn handle_event(&mut self, event: SessionEvent) -> Result<bool> {
        match event {
            SessionEvent::PathChanged { task, path } => {
                self.handle_path_changed(task, path);
                Ok(true)
            }
            SessionEvent::RunFinished { task, outcome } => {
                self.handle_run_finished(task, outcome);
                Ok(true)
            }
            SessionEvent::Fatal(err) => Err(err),
            SessionEvent::ShutdownRequested => {
                info!("shutdown requested, stopping session");
                Ok(false)
            }
        }
    }

    fn handle_path_changed(&mut self, task: TaskName, path: PathBuf) {
        let Some(rule) = self.rules.get_mut(&task) else {
            warn!(task = %task, "change event for unknown rule; ignoring");
            return;
        };

        match rule.state {
            RuleState::Idle => {
                debug!(task = %task, ?path, "rule Idle -> Pending");
                rule.debouncer.record(path);
                rule.state = RuleState::Pending;
            }
            RuleState::Pending => {
                // Burst continues: the window restarts from this event.
                rule.debouncer.record(path);
            }
            RuleState::Running => {
                // Queue the follow-up. The pending set merges later bursts
                // into the same single queued run; the in-flight run is
                // never cancelled.
                debug!(task = %task, ?path, "change during run; follow-up queued");
                rule.debouncer.record(path);
            }
        }
    }

    fn handle_run_finished(&mut self, task: TaskName, outcome: RunOutcome) {
        if outcome == RunOutcome::Success {
            // Only successful runs tell clients to reload; observers never
            // see broken output.
            self.notifier.notify();
        }

        let Some(rule) = self.rules.get_mut(&task) else {
            warn!(task = %task, "run finished for unknown rule");
            return;
        };

        if rule.state != RuleState::Running {
            warn!(task = %task, state = ?rule.state, "run finished while rule not Running");
        }

        if rule.debouncer.pending_len() > 0 {
            // A follow-up was queued mid-run: restart the debounce window
            // from the completion instant and go back to Pending.
            debug!(task = %task, "follow-up queued; rule Running -> Pending");
            rule.debouncer.rearm();
            rule.state = RuleState::Pending;
        } else {
            debug!(task = %task, "rule Running -> Idle");
            rule.state = RuleState::Idle;
        }
    }

    /// Fire every rule whose debounce window has closed.
    fn fire_due(&mut self) {
        let now = Instant::now();
        let due: Vec<TaskName> = self
            .rules
            .iter_mut()
            .filter(|(_, r)| r.state == RuleState::Pending)
            .filter_map(|(task, r)| r.debouncer.fire(now).map(|paths| (task, paths)))
            .map(|(task, paths)| {
                info!(task = %task, changes = paths.len(), "debounce fired");
                task.clone()
            })
            .collect();

        for task in due {
            if let Some(rule) = self.rules.get_mut(&task) {
                rule.state = RuleState::Running;
            }
            self.spawn_run(task);
        }
    }

    /// Run the bound task in its own Tokio task and report back through the
    /// event channel.
    fn spawn_run(&self, task: TaskName) {
        let registry = Arc::clone(&self.registry);
        let ctx = self.ctx.clone();
        let events_tx = self.events_tx.clone();

        tokio::spawn(async move {
            let executor = Executor::new(registry);
            let event = match executor.run(&task, &ctx).await {
                Ok(summary) if summary.all_ok() => SessionEvent::RunFinished {
                    task,
                    outcome: RunOutcome::Success,
                },
                // Failures inside the run were already dispatched to the
                // error-mode controller (logged, session survives).
                Ok(_) => SessionEvent::RunFinished {
                    task,
                    outcome: RunOutcome::Failed,
                },
                Err(err) => SessionEvent::Fatal(err),
            };
            if events_tx.send(event).await.is_err() {
                debug!("session channel closed before run result was delivered");
            }
        });
    }
}
