//! Config hot reload.
//!
//! Two cooperating tasks:
//!
//! - the **watcher** observes filesystem notifications (via `notify`) on the config
//!   file's directory, keeps those that touch the config file, debounces them and sends
//!   a [`ReloadRequest`] over a channel;
//! - the **reload worker** receives requests, reads the store, swaps the shared
//!   snapshot and runs a full reconciliation pass.
//!
//! A notification error ends the watcher for good; the bot then keeps running on the
//! config it has. Both tasks stop when the cancellation token fires.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::{ConfigStore, SharedConfig, StoreError};
use crate::reconcile::{ReconcileReport, Reconciler};

/// Minimum interval between two accepted config changes.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(2);

/// Debouncer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    /// A change was accepted less than one window ago; further changes are ignored.
    Debouncing,
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last_accepted: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: None,
        }
    }

    pub fn state(&self, now: Instant) -> WatchState {
        match self.last_accepted {
            Some(last) if now.saturating_duration_since(last) < self.window => {
                WatchState::Debouncing
            }
            _ => WatchState::Idle,
        }
    }

    /// Accept a change at `now` unless one was accepted within the window.
    pub fn accept(&mut self, now: Instant) -> bool {
        if self.state(now) == WatchState::Debouncing {
            return false;
        }
        self.last_accepted = Some(now);
        true
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEBOUNCE_WINDOW)
    }
}

/// Ask the reload worker to re-read the config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadRequest {
    pub path: PathBuf,
}

/// Is this a write-like event touching a file named `file_name`?
pub fn is_config_change(event: &Event, file_name: &OsString) -> bool {
    let write_like = matches!(
        event.kind,
        EventKind::Create(_)
            | EventKind::Modify(
                ModifyKind::Data(_) | ModifyKind::Name(_) | ModifyKind::Any | ModifyKind::Other
            )
    );
    write_like
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

/// Filters and debounces raw notifications for one config file.
#[derive(Debug)]
pub struct ChangeFilter {
    path: PathBuf,
    file_name: OsString,
    debouncer: Debouncer,
}

impl ChangeFilter {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            file_name: path.file_name().map(OsString::from).unwrap_or_default(),
            debouncer: Debouncer::default(),
        }
    }

    /// Turn a notification into a reload request, if it is relevant and not debounced.
    pub fn on_event(&mut self, event: &Event, now: Instant) -> Option<ReloadRequest> {
        if !is_config_change(event, &self.file_name) {
            trace!(target: "role_bot::watcher", kind = ?event.kind, paths = ?event.paths, "Ignoring fs event");
            return None;
        }
        if !self.debouncer.accept(now) {
            debug!(target: "role_bot::watcher", kind = ?event.kind, "Config change debounced");
            return None;
        }
        Some(ReloadRequest {
            path: self.path.clone(),
        })
    }
}

/// Absolute form of `config_path` and the directory to watch for it.
///
/// The directory is watched rather than the file so that editors replacing the file
/// through a rename are still seen.
pub fn watch_target(config_path: &Path) -> (PathBuf, PathBuf) {
    let path = std::path::absolute(config_path).unwrap_or_else(|_| config_path.to_path_buf());
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    (path, dir)
}

/// Spawn the filesystem watcher for `config_path`.
///
/// The task ends on cancellation, when the request channel closes, or on the first
/// watch error.
pub fn spawn_watcher(
    config_path: PathBuf,
    requests: mpsc::Sender<ReloadRequest>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let (path, dir) = watch_target(&config_path);

        let (fs_tx, fs_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher: RecommendedWatcher =
            match notify::recommended_watcher(move |res: notify::Result<Event>| {
                let _ = fs_tx.send(res);
            }) {
                Ok(w) => w,
                Err(e) => {
                    error!(target: "role_bot::watcher", error = %e, "Failed to create config watcher");
                    return;
                }
            };
        if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
            error!(target: "role_bot::watcher", dir = %dir.display(), error = %e, "Failed to watch config directory");
            return;
        }
        info!(target: "role_bot::watcher", dir = %dir.display(), "Watching for config changes");

        forward_changes(&path, fs_rx, &requests, &cancel).await;
        drop(watcher);
        info!(target: "role_bot::watcher", "Config watcher stopped");
    })
}

/// Turn raw notifications into reload requests until cancellation, until either
/// channel closes, or until the first notification error.
async fn forward_changes(
    path: &Path,
    mut notifications: mpsc::UnboundedReceiver<notify::Result<Event>>,
    requests: &mpsc::Sender<ReloadRequest>,
    cancel: &CancellationToken,
) {
    let mut filter = ChangeFilter::new(path);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = notifications.recv() => match msg {
                None => break,
                Some(Ok(event)) => {
                    let Some(request) = filter.on_event(&event, Instant::now()) else {
                        continue;
                    };
                    info!(target: "role_bot::watcher", path = %path.display(), "Detected config change; reloading");
                    if requests.send(request).await.is_err() {
                        warn!(target: "role_bot::watcher", "Reload worker gone; stopping watcher");
                        break;
                    }
                }
                Some(Err(e)) => {
                    error!(target: "role_bot::watcher", error = %e, "Config watcher error; hot reload disabled");
                    break;
                }
            },
        }
    }
}

/// Applies reload requests: read the store, swap the snapshot, reconcile.
#[derive(Clone)]
pub struct ReloadWorker {
    store: Arc<dyn ConfigStore>,
    config: SharedConfig,
    reconciler: Reconciler,
}

impl ReloadWorker {
    pub fn new(store: Arc<dyn ConfigStore>, config: SharedConfig, reconciler: Reconciler) -> Self {
        Self {
            store,
            config,
            reconciler,
        }
    }

    /// Reload once. `Ok(None)` when the store has no config (file removed): the
    /// previous snapshot stays active.
    pub async fn reload(&self) -> Result<Option<Vec<ReconcileReport>>, StoreError> {
        let Some(fresh) = self.store.read().await? else {
            warn!(
                target: "role_bot::watcher",
                store = %self.store.describe(),
                "Config disappeared; keeping the current one"
            );
            return Ok(None);
        };
        info!(
            target: "role_bot::watcher",
            channels = fresh.channels.len(),
            "Config reloaded"
        );
        self.config.replace(fresh).await;
        Ok(Some(self.reconciler.ensure_all().await))
    }

    /// Process requests until the channel closes or `cancel` fires.
    pub async fn run(self, mut requests: mpsc::Receiver<ReloadRequest>, cancel: CancellationToken) {
        loop {
            let request = tokio::select! {
                _ = cancel.cancelled() => break,
                request = requests.recv() => match request {
                    Some(r) => r,
                    None => break,
                },
            };
            debug!(target: "role_bot::watcher", path = %request.path.display(), "Handling reload request");
            if let Err(e) = self.reload().await {
                error!(
                    target: "role_bot::watcher",
                    error = %e,
                    "Failed to reload config; keeping the current one"
                );
            }
        }
        debug!(target: "role_bot::watcher", "Reload worker stopped");
    }
}

/// Handles of the hot reload tasks.
pub struct HotReload {
    pub watcher: JoinHandle<()>,
    pub worker: JoinHandle<()>,
}

/// Start the watcher and the reload worker for `config_path`.
pub fn spawn_hot_reload(
    config_path: PathBuf,
    worker: ReloadWorker,
    cancel: CancellationToken,
) -> HotReload {
    let (tx, rx) = mpsc::channel(8);
    let watcher = spawn_watcher(config_path, tx, cancel.clone());
    let worker = tokio::spawn(worker.run(rx, cancel));
    HotReload { watcher, worker }
}
