//! Filesystem watcher feeding the dispatcher

use std::path::{Path, PathBuf};

use anyhow::Result;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use trellis_indexer::ExtractorRegistry;

use crate::dispatcher::{Dispatch, Dispatcher};

/// Events emitted by the file watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Created(path) | WatchEvent::Modified(path) | WatchEvent::Removed(path) => path,
        }
    }
}

/// Recursive watcher over one project root
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    event_rx: mpsc::UnboundedReceiver<WatchEvent>,
    root: PathBuf,
}

impl FileWatcher {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let root = root.canonicalize().unwrap_or(root);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let watch_root = root.clone();
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                debug!("File system event: {:?}", event);
                forward(event, &watch_root, &event_tx);
            }
            Err(e) => error!("File system watch error: {}", e),
        })?;

        Ok(Self { watcher, event_rx, root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start delivering events for everything under the root.
    pub fn watch(&mut self) -> Result<()> {
        info!("Watching {}", self.root.display());
        self.watcher.watch(&self.root, RecursiveMode::Recursive)?;
        Ok(())
    }

    pub fn event_receiver(&mut self) -> &mut mpsc::UnboundedReceiver<WatchEvent> {
        &mut self.event_rx
    }

    /// Dispatch every event until the watcher is dropped or `shutdown` resolves.
    pub async fn run(mut self, dispatcher: &Dispatcher, shutdown: impl Future<Output = ()>) -> Result<()> {
        self.watch()?;
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                event = self.event_rx.recv() => {
                    let Some(event) = event else { break };
                    if let Dispatch::Queued(ticket) = dispatcher.dispatch(event.path()) {
                        debug!("Queued {}", ticket.path());
                    }
                }
                _ = &mut shutdown => {
                    info!("Watcher shutting down");
                    break;
                }
            }
        }
        dispatcher.wait_idle().await;
        Ok(())
    }
}

fn forward(event: notify::Event, root: &Path, tx: &mpsc::UnboundedSender<WatchEvent>) {
    let make: fn(PathBuf) -> WatchEvent = match event.kind {
        notify::EventKind::Create(_) => WatchEvent::Created,
        // Renames arrive as modifications of both the old and the new path.
        notify::EventKind::Modify(_) => WatchEvent::Modified,
        notify::EventKind::Remove(_) => WatchEvent::Removed,
        _ => return,
    };
    for path in event.paths {
        if should_ignore_path(root, &path) {
            continue;
        }
        if let Err(e) = tx.send(make(path)) {
            warn!("Failed to queue watch event: {}", e);
        }
    }
}

/// True for paths inside directories the walker would prune (`.git`, `node_modules`, dot-dirs).
pub fn should_ignore_path(root: &Path, path: &Path) -> bool {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components().any(|component| match component {
        std::path::Component::Normal(name) => ExtractorRegistry::is_pruned_dir(&name.to_string_lossy()),
        _ => false,
    })
}
