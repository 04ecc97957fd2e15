// src/lib.rs

pub mod cli;
pub mod config;
pub mod context;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod mode;
pub mod pipeline;
pub mod reload;
pub mod task;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tracing::{debug, info};

use crate::cli::{CliArgs, Command};
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::context::BuildContext;
use crate::engine::{SessionEvent, WatchSession};
use crate::errors::{BuildError, Result};
use crate::mode::ErrorModeController;
use crate::pipeline::{Pipeline, Stage, stages};
use crate::reload::ReloadNotifier;
use crate::task::{Executor, TaskAction, TaskName, TaskRegistry};
use crate::watch::build_watch_profiles;

/// Name of the composite task depending on every pipeline task.
pub const BUILD_ALL: &str = "build-all";

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the task registry built from the configured pipelines
/// - batch execution for `build-all`
/// - the watch session (debouncers + watcher + reload notifier) for `watch`
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let root = config_root_dir(&config_path);
    let modes = Arc::new(ErrorModeController::new());
    let ctx = BuildContext::new(Arc::clone(&modes))
        .with_minify(args.min)
        .with_replace_from_env(&cfg.config.replace_token, &cfg.config.env_key);

    let registry = Arc::new(build_registry(&cfg, &root)?);
    let executor = Executor::new(Arc::clone(&registry));

    match args.command {
        Command::BuildAll => {
            // Batch mode: any failure propagates and exits non-zero.
            executor.run(BUILD_ALL, &ctx).await?;
            info!("batch build finished successfully");
            Ok(())
        }
        Command::Watch => {
            // Initial build runs in batch mode; a broken tree at startup is
            // a hard failure, like build-all.
            executor.run(BUILD_ALL, &ctx).await?;
            info!("initial build finished, entering watch mode");

            modes.enter_interactive();

            let notifier = ReloadNotifier::new();
            let session = WatchSession::new(
                Arc::clone(&registry),
                ctx,
                notifier.clone(),
                watch_rules(&cfg),
            );
            let session_tx = session.event_sender();

            // A watcher that cannot be established is fatal.
            let profiles = build_watch_profiles(&rule_patterns(&cfg))?;
            let _watcher_handle = watch::spawn_watcher(&root, profiles, session_tx.clone())?;

            // Ctrl-C → graceful shutdown.
            {
                let tx = session_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        eprintln!("failed to listen for Ctrl+C: {e}");
                        return;
                    }
                    let _ = tx.send(SessionEvent::ShutdownRequested).await;
                });
            }

            session.run().await
        }
    }
}

/// Build the task registry from the configured pipelines.
///
/// Each `[pipeline.<name>]` becomes a task of the same name whose action
/// applies the pipeline; `build-all` is registered as a composite over all
/// of them. The resulting graph is validated before this returns, so no
/// action can run against a broken graph.
pub fn build_registry(cfg: &ConfigFile, root: &Path) -> Result<TaskRegistry> {
    let mut registry = TaskRegistry::new();

    for (name, pc) in cfg.pipeline.iter() {
        let mut stage_chain: Vec<Box<dyn Stage>> = Vec::with_capacity(pc.stages.len());
        for stage_name in pc.stages.iter() {
            // Validation already resolved these names once.
            let stage = stages::from_name(stage_name)
                .ok_or_else(|| anyhow!("unknown stage '{stage_name}' in pipeline '{name}'"))?;
            stage_chain.push(stage);
        }

        let pipeline = Arc::new(
            Pipeline::compose(name, root, &pc.src, stage_chain, root.join(&pc.dest))
                .map_err(BuildError::Other)?,
        );

        let action: TaskAction = Arc::new(move |ctx: BuildContext| {
            let pipeline = Arc::clone(&pipeline);
            Box::pin(async move {
                // Pipelines do blocking file I/O; keep it off the runtime
                // threads.
                tokio::task::spawn_blocking(move || pipeline.apply(&ctx))
                    .await
                    .map_err(|e| BuildError::Other(anyhow!("pipeline task panicked: {e}")))?
                    .map_err(BuildError::from)
            })
        });

        registry.register(name.clone(), pc.after.clone(), action)?;
    }

    registry.register_composite(BUILD_ALL, cfg.pipeline.keys().cloned().collect())?;
    registry.validate()?;
    Ok(registry)
}

/// One watch rule per pipeline: task name + effective debounce interval.
fn watch_rules(cfg: &ConfigFile) -> Vec<(TaskName, Duration)> {
    cfg.pipeline
        .iter()
        .map(|(name, pc)| {
            (
                name.clone(),
                Duration::from_millis(pc.effective_debounce_ms(cfg.config.debounce_ms)),
            )
        })
        .collect()
}

/// Raw pattern lists per rule for the watcher.
fn rule_patterns(cfg: &ConfigFile) -> Vec<(TaskName, Vec<String>, Vec<String>)> {
    cfg.pipeline
        .iter()
        .map(|(name, pc)| (name.clone(), pc.effective_watch(), pc.exclude.clone()))
        .collect()
}

/// Figure out a sensible project root: directory containing the config
/// file, or `.`.
fn config_root_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Simple dry-run output: print pipelines, stages, deps and watch rules.
fn print_dry_run(cfg: &ConfigFile) {
    println!("assetpipe dry-run");
    println!("  config.debounce_ms = {}", cfg.config.debounce_ms);
    println!("  config.env_key = {}", cfg.config.env_key);
    println!("  config.replace_token = {}", cfg.config.replace_token);
    println!();

    println!("pipelines ({}):", cfg.pipeline.len());
    for (name, pc) in cfg.pipeline.iter() {
        println!("  - {name}");
        println!("      src: {}", pc.src);
        println!("      dest: {}", pc.dest);
        println!("      stages: {:?}", pc.stages);
        if !pc.after.is_empty() {
            println!("      after: {:?}", pc.after);
        }
        println!("      watch: {:?}", pc.effective_watch());
        if !pc.exclude.is_empty() {
            println!("      exclude: {:?}", pc.exclude);
        }
        if let Some(ms) = pc.debounce_ms {
            println!("      debounce_ms: {ms}");
        }
    }

    debug!("dry-run complete (no execution)");
}
