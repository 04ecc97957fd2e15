// src/task/registry.rs

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::context::BuildContext;
use crate::errors::{BuildError, GraphError};

/// Public type alias for task names throughout the crate.
pub type TaskName = String;

/// Boxed future produced by a task action.
pub type TaskFuture = Pin<Box<dyn Future<Output = Result<(), BuildError>> + Send>>;

/// A task's effectful operation. Takes the per-run [`BuildContext`] and
/// reports success or failure; the executor decides what failure means
/// depending on the execution mode.
pub type TaskAction = Arc<dyn Fn(BuildContext) -> TaskFuture + Send + Sync>;

/// A registered task: name, direct dependencies, action.
#[derive(Clone)]
pub struct Task {
    pub name: TaskName,
    pub deps: Vec<TaskName>,
    pub action: TaskAction,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("deps", &self.deps)
            .finish_non_exhaustive()
    }
}

/// Registry of named tasks forming a dependency DAG.
///
/// Tasks are owned here for the process lifetime. Structural problems
/// (duplicate names, dangling dependencies, cycles) surface as
/// [`GraphError`] from [`validate`](Self::validate) or
/// [`closure_of`](Self::closure_of), always before any action executes.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<TaskName, Task>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task. Fails if `name` is already registered; dependency
    /// names are resolved later by [`validate`](Self::validate), so tasks
    /// can be registered in any order.
    pub fn register(
        &mut self,
        name: impl Into<TaskName>,
        deps: Vec<TaskName>,
        action: TaskAction,
    ) -> Result<(), GraphError> {
        let name = name.into();
        if self.tasks.contains_key(&name) {
            return Err(GraphError::Duplicate(name));
        }
        debug!(task = %name, ?deps, "registered task");
        self.tasks.insert(
            name.clone(),
            Task {
                name,
                deps,
                action,
            },
        );
        Ok(())
    }

    /// Register a composite task: it declares dependencies and performs no
    /// work itself (e.g. `build-all` over all pipeline tasks).
    pub fn register_composite(
        &mut self,
        name: impl Into<TaskName>,
        deps: Vec<TaskName>,
    ) -> Result<(), GraphError> {
        self.register(name, deps, Arc::new(|_ctx| Box::pin(async { Ok(()) })))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.tasks
            .get(name)
            .map(|t| t.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Check the whole graph: every dependency resolves and there is no
    /// cycle.
    pub fn validate(&self) -> Result<(), GraphError> {
        for task in self.tasks.values() {
            for dep in &task.deps {
                if !self.tasks.contains_key(dep) {
                    return Err(GraphError::UnknownDependency {
                        referrer: task.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
        self.toposort_all().map(|_| ())
    }

    /// Transitive dependency closure of `target`, itself included, in
    /// topological order (dependencies before dependents).
    ///
    /// Fails with [`GraphError`] on an unknown target, a dangling
    /// dependency, or a cycle anywhere in the closure.
    pub fn closure_of(&self, target: &str) -> Result<Vec<TaskName>, GraphError> {
        if !self.tasks.contains_key(target) {
            return Err(GraphError::UnknownTask(target.to_string()));
        }

        // Collect the closure by walking dependency edges.
        let mut closure: Vec<TaskName> = Vec::new();
        let mut stack = vec![target.to_string()];
        while let Some(name) = stack.pop() {
            if closure.contains(&name) {
                continue;
            }
            let task = self.tasks.get(&name).ok_or_else(|| {
                // The referrer is whichever task pulled `name` into the walk.
                let referrer = self
                    .tasks
                    .values()
                    .find(|t| t.deps.contains(&name))
                    .map(|t| t.name.clone())
                    .unwrap_or_else(|| target.to_string());
                GraphError::UnknownDependency {
                    referrer,
                    dependency: name.clone(),
                }
            })?;
            closure.push(name);
            stack.extend(task.deps.iter().cloned());
        }

        // Order the closure topologically; toposort fails on a cycle.
        let order = self.toposort_all()?;
        Ok(order
            .into_iter()
            .filter(|name| closure.contains(name))
            .collect())
    }

    /// Topological order of the full graph.
    ///
    /// Edge direction is dep -> dependent, so the returned order lists
    /// dependencies first.
    fn toposort_all(&self) -> Result<Vec<TaskName>, GraphError> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for name in self.tasks.keys() {
            graph.add_node(name.as_str());
        }
        for task in self.tasks.values() {
            for dep in &task.deps {
                if self.tasks.contains_key(dep) {
                    graph.add_edge(dep.as_str(), task.name.as_str(), ());
                }
            }
        }

        match toposort(&graph, None) {
            Ok(order) => Ok(order.into_iter().map(|n| n.to_string()).collect()),
            Err(cycle) => Err(GraphError::Cycle(cycle.node_id().to_string())),
        }
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.tasks.keys().collect::<Vec<_>>())
            .finish()
    }
}
