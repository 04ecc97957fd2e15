// src/context.rs

//! Per-run build context.
//!
//! Everything a task action or pipeline stage needs to know about the
//! current run travels through this value instead of ambient globals: the
//! shared error-mode controller, the minify toggle, and the value the
//! replace stage substitutes for its marker token.

use std::sync::Arc;

use crate::mode::{ErrorMode, ErrorModeController};

/// Sentinel substituted by the replace stage when the configured external
/// source (an environment variable) is unset.
pub const REPLACE_SENTINEL: &str = "0";

#[derive(Debug, Clone)]
pub struct BuildContext {
    modes: Arc<ErrorModeController>,
    /// Whether the minify stage's gate is open for this process.
    pub minify: bool,
    /// Literal marker token the replace stage looks for.
    pub replace_token: String,
    /// Value substituted for the marker token, resolved once at startup.
    pub replace_value: String,
}

impl BuildContext {
    pub fn new(modes: Arc<ErrorModeController>) -> Self {
        Self {
            modes,
            minify: false,
            replace_token: String::new(),
            replace_value: REPLACE_SENTINEL.to_string(),
        }
    }

    pub fn with_minify(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }

    /// Configure the replace stage: marker token plus the environment
    /// variable that supplies the replacement, falling back to the sentinel
    /// `"0"` when unset. An empty value counts as unset.
    pub fn with_replace_from_env(mut self, token: impl Into<String>, env_key: &str) -> Self {
        self.replace_token = token.into();
        self.replace_value = std::env::var(env_key)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| REPLACE_SENTINEL.to_string());
        self
    }

    /// Configure the replace stage with an explicit value (tests, embedders).
    pub fn with_replace(
        mut self,
        token: impl Into<String>,
        value: Option<impl Into<String>>,
    ) -> Self {
        self.replace_token = token.into();
        self.replace_value = value
            .map(Into::into)
            .unwrap_or_else(|| REPLACE_SENTINEL.to_string());
        self
    }

    pub fn mode(&self) -> ErrorMode {
        self.modes.mode()
    }

    pub fn modes(&self) -> &Arc<ErrorModeController> {
        &self.modes
    }
}
