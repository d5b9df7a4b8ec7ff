//! Background dispatch of single-file syncs
//!
//! `dispatch` classifies a path and, when it is indexable, spawns a tokio task
//! that probes the store and syncs the file. The caller gets a [`SyncTicket`]
//! it may await or drop. Same-path ordering is handled by [`GraphSync`]; the
//! dispatcher only tracks how many tasks are in flight so callers can wait for
//! the set to drain.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, oneshot};
use tracing::{debug, info, warn};
use trellis_core::{Namespace, StoreError, relativize};
use trellis_indexer::{
    Classification, ExtractorRegistry, GraphSync, IgnoreReason, Matched, SyncError, SyncOutcome,
};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Result of handing one path to the dispatcher.
#[derive(Debug)]
pub enum Dispatch {
    /// Not indexable; nothing was scheduled.
    Ignored(IgnoreReason),
    Queued(SyncTicket),
}

impl Dispatch {
    pub fn ticket(self) -> Option<SyncTicket> {
        match self {
            Dispatch::Queued(ticket) => Some(ticket),
            Dispatch::Ignored(_) => None,
        }
    }
}

/// Completion handle for one background sync.
#[derive(Debug)]
pub struct SyncTicket {
    path: String,
    rx: oneshot::Receiver<Result<SyncOutcome, SyncError>>,
}

impl SyncTicket {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub async fn outcome(self) -> Result<SyncOutcome, SyncError> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(SyncError::Cancelled { path: self.path }),
        }
    }
}

struct Inner {
    ns: Namespace,
    root: PathBuf,
    registry: Arc<ExtractorRegistry>,
    sync: Arc<GraphSync>,
    probe_timeout: Duration,
    in_flight: AtomicUsize,
    idle: Notify,
    failures: AtomicUsize,
    store_down: AtomicBool,
}

/// Decrements the in-flight count when a task ends, however it ends.
struct InFlight(Arc<Inner>);

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("namespace", &self.inner.ns)
            .field("root", &self.inner.root)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl Dispatcher {
    pub fn new(
        ns: Namespace,
        root: impl Into<PathBuf>,
        registry: Arc<ExtractorRegistry>,
        sync: Arc<GraphSync>,
    ) -> Self {
        let root = root.into();
        let root = root.canonicalize().unwrap_or(root);
        Self {
            inner: Arc::new(Inner {
                ns,
                root,
                registry,
                sync,
                probe_timeout: DEFAULT_PROBE_TIMEOUT,
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
                failures: AtomicUsize::new(0),
                store_down: AtomicBool::new(false),
            }),
        }
    }

    /// Must be called before the dispatcher is cloned.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.probe_timeout = timeout;
        }
        self
    }

    pub fn namespace(&self) -> &Namespace {
        &self.inner.ns
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Schedule a sync of `path` (absolute or root-relative). Returns immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, path: impl AsRef<Path>) -> Dispatch {
        let path = path.as_ref();
        let Some(rel) = relativize(&self.inner.root, path) else {
            debug!("Ignoring {}: outside {}", path.display(), self.inner.root.display());
            return Dispatch::Ignored(IgnoreReason::InvalidPath);
        };
        let (rel, matched) = match self.inner.registry.classify(&rel) {
            Classification::Indexed { path, matched } => (path, matched),
            Classification::Ignored(reason) => {
                debug!("Ignoring {}: {}", rel, reason);
                return Dispatch::Ignored(reason);
            }
        };

        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlight(Arc::clone(&self.inner));
        let inner = Arc::clone(&self.inner);
        let (tx, rx) = oneshot::channel();
        let task_path = rel.clone();

        tokio::spawn(async move {
            let _guard = guard;
            let outcome = inner.run(&task_path, &matched).await;
            if let Err(e) = &outcome {
                inner.failures.fetch_add(1, Ordering::SeqCst);
                if !matches!(e, SyncError::StoreUnavailable(_)) {
                    warn!("Sync of {} failed: {}", task_path, e);
                }
            }
            // Nobody may be waiting for the ticket.
            let _ = tx.send(outcome);
        });

        Dispatch::Queued(SyncTicket { path: rel, rx })
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Syncs that ended in an error since the dispatcher was created.
    pub fn failures(&self) -> usize {
        self.inner.failures.load(Ordering::SeqCst)
    }

    /// Resolve once no sync is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Inner {
    async fn run(&self, path: &str, matched: &Matched) -> Result<SyncOutcome, SyncError> {
        let probe = tokio::time::timeout(self.probe_timeout, self.sync.store().probe())
            .await
            .unwrap_or_else(|_| {
                Err(StoreError::Unavailable(format!(
                    "probe timed out after {:?}",
                    self.probe_timeout
                )))
            });
        if let Err(e) = probe {
            if !self.store_down.swap(true, Ordering::SeqCst) {
                warn!("Graph store unavailable, skipping syncs until it returns: {}", e);
            } else {
                debug!("Store still unavailable; skipped {}", path);
            }
            return Err(SyncError::StoreUnavailable(e));
        }
        if self.store_down.swap(false, Ordering::SeqCst) {
            info!("Graph store reachable again");
        }

        let outcome = self.sync.sync_file(&self.ns, &self.root, path, matched).await?;
        debug!("{} [{}]: {:?}", path, matched.language(), outcome);
        Ok(outcome)
    }
}
