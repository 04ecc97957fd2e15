// src/engine/mod.rs

//! Interactive session orchestration.
//!
//! The session loop composes the task executor, the per-rule debouncers and
//! the reload notifier: filesystem events arrive as [`SessionEvent`]s, get
//! debounced per rule, trigger dependency-ordered task runs, and successful
//! runs notify connected clients to reload.

pub mod session;

pub use session::{RunOutcome, SessionEvent, WatchSession};
