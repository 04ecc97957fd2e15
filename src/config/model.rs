// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// Top-level configuration as read from `Assetpipe.toml`:
///
/// ```toml
/// [config]
/// debounce_ms = 300
/// env_key = "CI_COMMIT_SHA"
/// replace_token = "DEPLOY_KEY"
///
/// [pipeline.scss]
/// src = "src/scss/*.scss"
/// dest = "endpoint/assets/css"
/// stages = ["replace", "minify"]
/// watch = ["src/**/*.scss"]
/// ```
///
/// The `[config]` section is optional and has defaults; at least one
/// `[pipeline.<name>]` is required.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// All pipelines from `[pipeline.<name>]`, keyed by pipeline name.
    /// Each becomes a registered task of the same name.
    #[serde(default)]
    pub pipeline: BTreeMap<String, PipelineConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Default debounce interval in milliseconds for watch rules.
    /// Must be strictly positive.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Environment variable feeding the replace stage's value.
    #[serde(default = "default_env_key")]
    pub env_key: String,

    /// Literal marker token the replace stage substitutes.
    #[serde(default = "default_replace_token")]
    pub replace_token: String,
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_env_key() -> String {
    "CI_COMMIT_SHA".to_string()
}

fn default_replace_token() -> String {
    "DEPLOY_KEY".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            env_key: default_env_key(),
            replace_token: default_replace_token(),
        }
    }
}

/// `[pipeline.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Source glob, relative to the config file's directory.
    pub src: String,

    /// Destination directory for transformed artifacts.
    pub dest: String,

    /// Ordered stage names. Built-ins: `replace`, `minify`,
    /// `concat=<file>`. Order is fixed; it is never reordered at run time.
    #[serde(default = "default_stages")]
    pub stages: Vec<String>,

    /// Watch globs for this pipeline's rule. Defaults to `[src]`.
    #[serde(default)]
    pub watch: Option<Vec<String>>,

    /// Exclude globs for this pipeline's rule.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Pipeline tasks that must complete before this one runs.
    #[serde(default)]
    pub after: Vec<String>,

    /// Per-rule debounce override in milliseconds. Must be strictly
    /// positive when present.
    #[serde(default)]
    pub debounce_ms: Option<u64>,
}

fn default_stages() -> Vec<String> {
    vec!["replace".to_string()]
}

impl PipelineConfig {
    /// Effective watch patterns: explicit list, or the source glob.
    pub fn effective_watch(&self) -> Vec<String> {
        match &self.watch {
            Some(list) if !list.is_empty() => list.clone(),
            _ => vec![self.src.clone()],
        }
    }

    /// Effective debounce interval given the `[config]` default.
    pub fn effective_debounce_ms(&self, default_ms: u64) -> u64 {
        self.debounce_ms.unwrap_or(default_ms)
    }
}
