// src/task/mod.rs

//! Task registration and dependency-ordered execution.
//!
//! - [`registry`] owns the named tasks and their dependency graph.
//! - [`executor`] runs a task's transitive closure, in dependency order,
//!   with independent tasks executing concurrently.

pub mod executor;
pub mod registry;

pub use executor::{Executor, RunSummary};
pub use registry::{Task, TaskAction, TaskFuture, TaskName, TaskRegistry};
