// src/watch/watcher.rs

use std::path::Path;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::engine::EngineEvent;
use crate::errors::WatchSetupError;

/// Wrapper around the `notify` watcher.
///
/// Watches are armed non-recursively: one on each watched file (modify,
/// attribute-change, delete-self, move-self) and one on each parent
/// directory (create / move-into, so a rotated-away file's replacement is
/// seen the moment it appears). Keeping the watcher inside this handle also
/// keeps it alive; dropping it stops file watching.
pub struct FsWatcher {
    inner: RecommendedWatcher,
}

impl std::fmt::Debug for FsWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsWatcher").finish()
    }
}

impl FsWatcher {
    /// Create the watcher; raw events are pushed into `raw_tx` from notify's
    /// callback thread.
    pub fn new(raw_tx: mpsc::UnboundedSender<Event>) -> Result<Self, WatchSetupError> {
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if let Err(err) = raw_tx.send(event) {
                        // We can't log via tracing here easily, so fallback to stderr.
                        eprintln!("logspool: failed to forward notify event: {err}");
                    }
                }
                Err(err) => {
                    eprintln!("logspool: file watch error: {err}");
                }
            },
            Config::default(),
        )
        .map_err(WatchSetupError::classify)?;

        Ok(Self { inner: watcher })
    }

    /// Arm a watch on a single file.
    pub fn watch_file(&mut self, path: &Path) -> Result<(), WatchSetupError> {
        self.inner
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(WatchSetupError::classify)?;
        debug!(file = %path.display(), "file watch armed");
        Ok(())
    }

    /// Arm a watch on a parent directory.
    ///
    /// Arming the same directory for several files is fine; the backend
    /// returns the same underlying watch.
    pub fn watch_dir(&mut self, dir: &Path) -> Result<(), WatchSetupError> {
        self.inner
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(WatchSetupError::classify)?;
        debug!(dir = %dir.display(), "directory watch armed");
        Ok(())
    }

    /// Replace the watch on a path after rotation/recreation.
    ///
    /// The stale watch (which may still follow the moved-away inode) is torn
    /// down and a fresh one armed in the same step. During steady state a
    /// failure here is degraded to a warning: the directory watch still
    /// covers the path, so a later create event gives us another chance.
    pub fn rearm_file(&mut self, path: &Path) {
        if let Err(err) = self.inner.unwatch(path) {
            debug!(file = %path.display(), error = %err, "unwatch of stale file watch failed");
        }
        if let Err(err) = self.watch_file(path) {
            warn!(file = %path.display(), error = %err, "cannot re-watch file, relying on directory watch");
        }
    }
}

/// Forward raw notify events into the engine's event channel.
///
/// Bridges the watcher's callback thread into the async world, exactly one
/// hop: callback → unbounded channel → this task → engine channel.
pub fn spawn_forwarder(
    mut raw_rx: mpsc::UnboundedReceiver<Event>,
    engine_tx: mpsc::Sender<EngineEvent>,
) {
    tokio::spawn(async move {
        while let Some(event) = raw_rx.recv().await {
            if engine_tx.send(EngineEvent::Fs(event)).await.is_err() {
                // Engine is gone; no point keeping the forwarder alive.
                return;
            }
        }
        debug!("watch event forwarder ended");
    });
}
