// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Three families matter to the orchestrator:
//! - [`GraphError`]: problems with the task graph itself. Always fatal and
//!   always detected before any task action runs.
//! - [`StageError`]: a transform stage failed while applying a pipeline.
//!   Fatal in batch mode, logged-and-survived in interactive mode.
//! - [`WatchError`]: the filesystem watcher could not be established.
//!   Always fatal; a watch session cannot run without it.

use thiserror::Error;

/// Structural problems with the task graph.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("task '{0}' is already registered")]
    Duplicate(String),

    #[error("task '{referrer}' depends on unregistered task '{dependency}'")]
    UnknownDependency {
        referrer: String,
        dependency: String,
    },

    #[error("cycle detected in task graph involving '{0}'")]
    Cycle(String),

    #[error("unknown task '{0}'")]
    UnknownTask(String),
}

/// A transform stage failed while a pipeline was being applied.
///
/// Carries the originating pipeline and stage names so interactive-mode logs
/// point at the right place. Source enumeration and destination writes are
/// reported under the synthetic stage names `"source"` and `"dest"`.
#[derive(Error, Debug)]
#[error("stage '{stage}' failed in pipeline '{pipeline}': {source}")]
pub struct StageError {
    pub pipeline: String,
    pub stage: String,
    #[source]
    pub source: anyhow::Error,
}

impl StageError {
    pub fn new(
        pipeline: impl Into<String>,
        stage: impl Into<String>,
        source: anyhow::Error,
    ) -> Self {
        Self {
            pipeline: pipeline.into(),
            stage: stage.into(),
            source,
        }
    }
}

/// The filesystem watcher could not be set up.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("failed to establish filesystem watcher: {0}")]
    Notify(#[from] notify::Error),

    #[error("invalid watch pattern for rule '{rule}': {source}")]
    BadPattern {
        rule: String,
        #[source]
        source: globset::Error,
    },
}

/// Top-level error for everything the orchestrator can fail with.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, BuildError>;
