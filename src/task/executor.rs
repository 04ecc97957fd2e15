// src/task/executor.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::context::BuildContext;
use crate::errors::{BuildError, Result};
use crate::mode::ErrorMode;
use crate::task::registry::{TaskName, TaskRegistry};

/// Per-run state of a task in the closure being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    /// Waiting on dependencies.
    Waiting,
    /// Dispatched and currently running.
    Running,
    /// Completed successfully.
    Done,
    /// The action itself failed.
    Failed,
    /// Never ran because an upstream dependency failed. Terminal, so
    /// sibling subgraphs keep making progress in interactive mode.
    Skipped,
}

/// What happened to each task in one `run` call.
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub succeeded: Vec<TaskName>,
    pub failed: Vec<TaskName>,
    pub skipped: Vec<TaskName>,
}

impl RunSummary {
    /// True when every task in the closure completed successfully.
    pub fn all_ok(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Runs a task and its transitive dependencies in dependency order.
///
/// Tasks with no ordering relationship between them execute concurrently,
/// each in its own Tokio task; a task starts only once all its declared
/// dependencies have completed successfully.
///
/// Failure handling follows the execution mode carried by the
/// [`BuildContext`]:
/// - Batch: the first failure stops all further scheduling, in-flight
///   siblings are drained, and the error propagates to the caller.
/// - Interactive: the failure is logged by the mode controller, the failed
///   task's dependents are marked skipped, and independent siblings keep
///   running. The caller gets a [`RunSummary`] instead of an error.
pub struct Executor {
    registry: Arc<TaskRegistry>,
}

impl Executor {
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        Self { registry }
    }

    pub async fn run(&self, target: &str, ctx: &BuildContext) -> Result<RunSummary> {
        // Cycle / missing-dependency detection happens here, before any
        // action executes.
        let closure = self.registry.closure_of(target)?;
        info!(target = %target, tasks = closure.len(), "starting task run");

        let mut states: BTreeMap<TaskName, RunState> = closure
            .iter()
            .map(|name| (name.clone(), RunState::Waiting))
            .collect();

        // Dependents restricted to this closure, for failure propagation.
        let mut dependents: BTreeMap<TaskName, Vec<TaskName>> = BTreeMap::new();
        for name in &closure {
            for dep in self.registry.dependencies_of(name) {
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .push(name.clone());
            }
        }

        let mut join_set: JoinSet<(TaskName, Result<()>)> = JoinSet::new();
        let mut first_error: Option<BuildError> = None;

        loop {
            if first_error.is_none() {
                self.spawn_ready(&mut states, ctx, &mut join_set);
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };

            let (name, result) = match joined {
                Ok(pair) => pair,
                Err(join_err) => {
                    // A panicking action poisons the run the same way a
                    // failing one does, but we cannot tell which task it
                    // was, so give up on the run entirely.
                    return Err(BuildError::Other(anyhow!(
                        "task panicked during run of '{target}': {join_err}"
                    )));
                }
            };

            match result {
                Ok(()) => {
                    debug!(task = %name, "task completed successfully");
                    states.insert(name, RunState::Done);
                }
                Err(err) => {
                    warn!(task = %name, error = %err, "task failed");
                    states.insert(name.clone(), RunState::Failed);
                    mark_dependents_skipped(&name, &dependents, &mut states);

                    match ctx.modes().handle(err) {
                        // Batch: remember the first failure, stop
                        // scheduling, keep draining in-flight siblings.
                        Err(err) => {
                            if first_error.is_none() {
                                first_error = Some(err);
                            }
                        }
                        // Interactive: handled (logged + recorded); the
                        // run continues with independent siblings.
                        Ok(()) => {}
                    }
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }

        let mut summary = RunSummary::default();
        for (name, state) in states {
            match state {
                RunState::Done => summary.succeeded.push(name),
                RunState::Failed => summary.failed.push(name),
                RunState::Skipped => summary.skipped.push(name),
                RunState::Waiting | RunState::Running => {
                    // Unreachable once the join set drains; a stuck task
                    // would mean the readiness logic lost track of it.
                    warn!(task = %name, ?state, "task left non-terminal after run");
                }
            }
        }

        if ctx.mode() == ErrorMode::Interactive && !summary.all_ok() {
            info!(
                failed = summary.failed.len(),
                skipped = summary.skipped.len(),
                "run finished with failures (interactive mode, session continues)"
            );
        }

        Ok(summary)
    }

    /// Spawn every waiting task whose dependencies are all done.
    fn spawn_ready(
        &self,
        states: &mut BTreeMap<TaskName, RunState>,
        ctx: &BuildContext,
        join_set: &mut JoinSet<(TaskName, Result<()>)>,
    ) {
        let ready: Vec<TaskName> = states
            .iter()
            .filter(|&(name, state)| {
                *state == RunState::Waiting
                    && self
                        .registry
                        .dependencies_of(name)
                        .iter()
                        .all(|dep| states.get(dep) == Some(&RunState::Done))
            })
            .map(|(name, _)| name.clone())
            .collect();

        for name in ready {
            let task = self
                .registry
                .get(&name)
                .expect("closure task missing from registry");
            debug!(task = %name, "dependencies satisfied, dispatching");
            states.insert(name.clone(), RunState::Running);

            let action = Arc::clone(&task.action);
            let ctx = ctx.clone();
            join_set.spawn(async move {
                let result = action(ctx).await;
                (name, result)
            });
        }
    }
}

/// Mark all transitively waiting dependents of a failed task as skipped.
fn mark_dependents_skipped(
    failed: &str,
    dependents: &BTreeMap<TaskName, Vec<TaskName>>,
    states: &mut BTreeMap<TaskName, RunState>,
) {
    let mut stack: Vec<TaskName> = dependents.get(failed).cloned().unwrap_or_default();

    while let Some(name) = stack.pop() {
        if states.get(&name) == Some(&RunState::Waiting) {
            debug!(task = %name, "skipping dependent of failed task");
            states.insert(name.clone(), RunState::Skipped);
            stack.extend(dependents.get(&name).cloned().unwrap_or_default());
        }
    }
}
