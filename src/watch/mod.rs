// src/watch/mod.rs

//! Filesystem watching and change debouncing.
//!
//! - [`patterns`] compiles per-rule watch/exclude globs.
//! - [`watcher`] bridges `notify` events into the async session loop.
//! - [`debounce`] coalesces bursts of events per rule into single triggers.
//!
//! This module does not know about the task graph; it only turns filesystem
//! changes into rule-level triggers for the session.

pub mod debounce;
pub mod patterns;
pub mod watcher;

pub use debounce::Debouncer;
pub use patterns::{WatchProfile, build_watch_profiles};
pub use watcher::{WatcherHandle, spawn_watcher};
