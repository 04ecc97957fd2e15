// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::SessionEvent;
use crate::errors::WatchError;
use crate::watch::patterns::WatchProfile;

/// Handle keeping the underlying `RecommendedWatcher` alive. Dropping it
/// stops file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `root` recursively and send [`SessionEvent::PathChanged`] into the
/// session loop for every rule whose patterns match a changed path.
///
/// A watcher that cannot be established is a fatal startup condition; the
/// [`WatchError`] propagates and terminates the process.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    profiles: Vec<WatchProfile>,
    session_tx: mpsc::Sender<SessionEvent>,
) -> Result<WatcherHandle, WatchError> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or_else(|_| root.clone()); // best-effort

    let profiles = Arc::new(profiles);

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    // Closure called synchronously by notify whenever an event arrives.
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    // tracing is not usable from notify's thread here;
                    // fall back to stderr.
                    eprintln!("assetpipe: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("assetpipe: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;

    info!(root = ?root, "file watcher started");

    // Async task matching notify events against rule profiles and feeding
    // the session.
    let async_root = root.clone();
    let async_profiles = Arc::clone(&profiles);
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            debug!(?event, "received notify event");

            for path in &event.paths {
                let Some(rel_str) = relative_str(&async_root, path) else {
                    warn!(?path, root = ?async_root, "could not relativize changed path");
                    continue;
                };

                for profile in async_profiles.iter() {
                    if !profile.matches(&rel_str) {
                        continue;
                    }
                    debug!(task = %profile.task(), path = %rel_str, "watch match");
                    let sent = session_tx
                        .send(SessionEvent::PathChanged {
                            task: profile.task().to_string(),
                            path: PathBuf::from(&rel_str),
                        })
                        .await;
                    if sent.is_err() {
                        // Session loop is gone; no point keeping this
                        // forwarding task alive.
                        debug!("session channel closed; watcher loop ending");
                        return;
                    }
                }
            }
        }

        debug!("file watcher loop ended");
    });

    Ok(WatcherHandle { _inner: watcher })
}

/// Path relative to `root`, with forward slashes.
fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}
