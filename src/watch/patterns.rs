// src/watch/patterns.rs

use std::fmt;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::errors::WatchError;
use crate::task::TaskName;

/// Compiled watch/exclude globs for one watch rule, bound to the task that
/// should run when a matching path changes.
///
/// Patterns are evaluated against paths relative to the project root, with
/// forward slashes (e.g. `"src/scss/app.scss"`).
#[derive(Clone)]
pub struct WatchProfile {
    task: TaskName,
    watch_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for WatchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchProfile")
            .field("task", &self.task)
            .finish_non_exhaustive()
    }
}

impl WatchProfile {
    /// Task bound to this rule.
    pub fn task(&self) -> &str {
        &self.task
    }

    /// True if the rule is interested in the given root-relative path.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.watch_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Compile one profile per rule from raw pattern lists.
///
/// `rules` pairs a task name with its `(watch, exclude)` pattern lists; an
/// invalid glob surfaces as a fatal [`WatchError`].
pub fn build_watch_profiles(
    rules: &[(TaskName, Vec<String>, Vec<String>)],
) -> Result<Vec<WatchProfile>, WatchError> {
    let mut profiles = Vec::with_capacity(rules.len());

    for (task, watch, exclude) in rules {
        let watch_set = build_globset(task, watch)?;
        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(task, exclude)?)
        };

        profiles.push(WatchProfile {
            task: task.clone(),
            watch_set,
            exclude_set,
        });
    }

    Ok(profiles)
}

fn build_globset(rule: &str, patterns: &[String]) -> Result<GlobSet, WatchError> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).map_err(|source| WatchError::BadPattern {
            rule: rule.to_string(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| WatchError::BadPattern {
        rule: rule.to_string(),
        source,
    })
}
