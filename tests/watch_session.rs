use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use assetpipe::context::BuildContext;
use assetpipe::engine::{SessionEvent, WatchSession};
use assetpipe::errors::BuildError;
use assetpipe::mode::ErrorModeController;
use assetpipe::reload::ReloadNotifier;
use assetpipe::task::{TaskAction, TaskRegistry};
use tokio::sync::{Semaphore, mpsc};

const INTERVAL: Duration = Duration::from_millis(300);

fn counting_action(runs: &Arc<AtomicUsize>) -> TaskAction {
    let runs = Arc::clone(runs);
    Arc::new(move |_ctx| {
        let runs = Arc::clone(&runs);
        Box::pin(async move {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    })
}

fn flaky_action(runs: &Arc<AtomicUsize>, fail: &Arc<AtomicBool>) -> TaskAction {
    let runs = Arc::clone(runs);
    let fail = Arc::clone(fail);
    Arc::new(move |_ctx| {
        let runs = Arc::clone(&runs);
        let fail = Arc::clone(&fail);
        Box::pin(async move {
            runs.fetch_add(1, Ordering::SeqCst);
            if fail.load(Ordering::SeqCst) {
                Err(BuildError::Other(anyhow!("rebuild broke")))
            } else {
                Ok(())
            }
        })
    })
}

/// Action that reports when it starts and blocks until a permit arrives.
fn gated_action(
    runs: &Arc<AtomicUsize>,
    started_tx: mpsc::UnboundedSender<()>,
    release: &Arc<Semaphore>,
) -> TaskAction {
    let runs = Arc::clone(runs);
    let release = Arc::clone(release);
    Arc::new(move |_ctx| {
        let runs = Arc::clone(&runs);
        let release = Arc::clone(&release);
        let started_tx = started_tx.clone();
        Box::pin(async move {
            runs.fetch_add(1, Ordering::SeqCst);
            let _ = started_tx.send(());
            release
                .acquire()
                .await
                .expect("release semaphore closed")
                .forget();
            Ok(())
        })
    })
}

struct Harness {
    tx: mpsc::Sender<SessionEvent>,
    notifier: ReloadNotifier,
    handle: tokio::task::JoinHandle<assetpipe::errors::Result<()>>,
}

fn start_session(registry: TaskRegistry) -> Harness {
    let modes = Arc::new(ErrorModeController::new());
    modes.enter_interactive();
    let ctx = BuildContext::new(modes);

    let notifier = ReloadNotifier::new();
    let session = WatchSession::new(
        Arc::new(registry),
        ctx,
        notifier.clone(),
        vec![("css".to_string(), INTERVAL)],
    );
    let tx = session.event_sender();
    let handle = tokio::spawn(session.run());

    Harness {
        tx,
        notifier,
        handle,
    }
}

async fn changed(tx: &mpsc::Sender<SessionEvent>, path: &str) {
    tx.send(SessionEvent::PathChanged {
        task: "css".to_string(),
        path: PathBuf::from(path),
    })
    .await
    .expect("session alive");
}

async fn settle() {
    tokio::time::sleep(Duration::from_secs(2)).await;
}

async fn shutdown(harness: Harness) {
    harness
        .tx
        .send(SessionEvent::ShutdownRequested)
        .await
        .expect("session alive");
    harness.handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn burst_of_events_triggers_exactly_one_run() {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut registry = TaskRegistry::new();
    registry.register("css", vec![], counting_action(&runs)).unwrap();

    let harness = start_session(registry);
    changed(&harness.tx, "src/a.scss").await;
    changed(&harness.tx, "src/b.scss").await;
    changed(&harness.tx, "src/c.scss").await;

    settle().await;
    assert_eq!(runs.load(Ordering::SeqCst), 1, "burst coalesced into one run");
    assert_eq!(harness.notifier.generation(), 1);

    shutdown(harness).await;
}

#[tokio::test(start_paused = true)]
async fn failed_run_keeps_session_alive_and_does_not_notify() {
    let runs = Arc::new(AtomicUsize::new(0));
    let fail = Arc::new(AtomicBool::new(true));
    let mut registry = TaskRegistry::new();
    registry
        .register("css", vec![], flaky_action(&runs, &fail))
        .unwrap();

    let harness = start_session(registry);
    changed(&harness.tx, "src/a.scss").await;
    settle().await;

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(harness.notifier.generation(), 0, "no reload after a failed run");
    assert!(!harness.handle.is_finished(), "session survives the failure");

    // A subsequent qualifying change still triggers a new run.
    fail.store(false, Ordering::SeqCst);
    changed(&harness.tx, "src/a.scss").await;
    settle().await;

    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(harness.notifier.generation(), 1, "reload after the recovery run");

    shutdown(harness).await;
}

#[tokio::test(start_paused = true)]
async fn notify_fires_after_every_success_and_no_failure() {
    let runs = Arc::new(AtomicUsize::new(0));
    let fail = Arc::new(AtomicBool::new(false));
    let mut registry = TaskRegistry::new();
    registry
        .register("css", vec![], flaky_action(&runs, &fail))
        .unwrap();

    let harness = start_session(registry);

    changed(&harness.tx, "src/a.scss").await;
    settle().await;
    assert_eq!(harness.notifier.generation(), 1);

    fail.store(true, Ordering::SeqCst);
    changed(&harness.tx, "src/a.scss").await;
    settle().await;
    assert_eq!(harness.notifier.generation(), 1, "failed run must not notify");

    fail.store(false, Ordering::SeqCst);
    changed(&harness.tx, "src/a.scss").await;
    settle().await;
    assert_eq!(harness.notifier.generation(), 2);
    assert_eq!(runs.load(Ordering::SeqCst), 3);

    shutdown(harness).await;
}

#[tokio::test(start_paused = true)]
async fn events_during_a_run_queue_exactly_one_follow_up() {
    let runs = Arc::new(AtomicUsize::new(0));
    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    let release = Arc::new(Semaphore::new(0));
    let mut registry = TaskRegistry::new();
    registry
        .register("css", vec![], gated_action(&runs, started_tx, &release))
        .unwrap();

    let harness = start_session(registry);

    changed(&harness.tx, "src/a.scss").await;
    started_rx.recv().await.expect("first run starts");

    // Two more bursts while the run is in flight: they replace each other
    // into a single queued follow-up, and the in-flight run is not aborted.
    changed(&harness.tx, "src/b.scss").await;
    changed(&harness.tx, "src/c.scss").await;

    release.add_permits(1); // let the first run complete
    started_rx.recv().await.expect("exactly one follow-up run starts");
    release.add_permits(1);

    settle().await;
    assert_eq!(runs.load(Ordering::SeqCst), 2, "one follow-up, not one per event");
    assert!(started_rx.try_recv().is_err(), "no third run was scheduled");
    assert_eq!(harness.notifier.generation(), 2);

    shutdown(harness).await;
}

#[tokio::test(start_paused = true)]
async fn change_for_unknown_rule_is_ignored() {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut registry = TaskRegistry::new();
    registry.register("css", vec![], counting_action(&runs)).unwrap();

    let harness = start_session(registry);
    harness
        .tx
        .send(SessionEvent::PathChanged {
            task: "js".to_string(),
            path: PathBuf::from("src/app.js"),
        })
        .await
        .unwrap();

    settle().await;
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    shutdown(harness).await;
}
