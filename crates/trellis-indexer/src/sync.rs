//! Delete-then-recreate synchronization of one file's entities
//!
//! Every sync removes the File/Document entity for a path together with all
//! the children it owns, then (if the file still exists) creates a fresh entity
//! and one child per declaration. There is no diffing.
//!
//! Syncs of the same (namespace, path) are serialized by a FIFO async mutex,
//! and `sync_file` reads the file only after acquiring it. The last sync to run
//! therefore always reflects the latest content on disk.
//!
//! A failure partway through creation leaves the file with a subset of its
//! children until the next sync or reconciliation of that path.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};
use trellis_core::{ExtractionResult, GraphStore, Namespace, SourceKind, StoreError};

use crate::extractor::{ExtractError, decode};
use crate::registry::Matched;

pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SyncError {
    /// The file exists but could not be read. The graph was not touched.
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file could not be decoded or parsed. The graph was not touched.
    #[error("failed to extract {path}: {source}")]
    Extract {
        path: String,
        #[source]
        source: ExtractError,
    },

    #[error(transparent)]
    StoreUnavailable(StoreError),

    /// Removing the old entities failed; nothing was created.
    #[error("failed to remove entities for {path}: {source}")]
    DeleteFailed {
        path: String,
        #[source]
        source: StoreError,
    },

    /// Creation stopped partway. Not retried.
    #[error("partial write for {path}: {created} of {expected} entities created: {source}")]
    PartialWrite {
        path: String,
        created: usize,
        expected: usize,
        #[source]
        source: StoreError,
    },

    #[error("sync of {path} timed out after {after:?}")]
    Timeout { path: String, after: Duration },

    /// The background task ended without reporting.
    #[error("sync of {path} was cancelled")]
    Cancelled { path: String },
}

impl SyncError {
    /// True when the graph is known to be unchanged by the failed sync.
    pub fn left_graph_untouched(&self) -> bool {
        matches!(
            self,
            SyncError::Read { .. }
                | SyncError::Extract { .. }
                | SyncError::StoreUnavailable(_)
                | SyncError::DeleteFailed { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Entity recreated with `children` children.
    Written {
        removed: usize,
        children: usize,
        links_failed: usize,
    },
    /// The file is gone; its entities were removed.
    Deleted { removed: usize },
}

type LockKey = (String, String);

/// Holds the per-path lock; drops the table entry once nobody else wants it.
struct PathGuard<'a> {
    locks: &'a DashMap<LockKey, Arc<Mutex<()>>>,
    key: LockKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

pub struct GraphSync {
    store: Arc<dyn GraphStore>,
    locks: DashMap<LockKey, Arc<Mutex<()>>>,
    timeout: Duration,
}

impl std::fmt::Debug for GraphSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphSync")
            .field("locked_paths", &self.locks.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GraphSync {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
            timeout: DEFAULT_SYNC_TIMEOUT,
        }
    }

    /// Bound each sync's store work; waiting for the path lock is not counted.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// Paths with a sync running or queued.
    pub fn active_paths(&self) -> usize {
        self.locks.len()
    }

    /// Bring the graph in line with an already-extracted result, or remove the
    /// path's entities when `result` is `None`.
    pub async fn apply(
        &self,
        ns: &Namespace,
        kind: SourceKind,
        path: &str,
        result: Option<&ExtractionResult>,
    ) -> Result<SyncOutcome, SyncError> {
        let _guard = self.acquire(ns, path).await;
        self.bounded(path, self.write(ns, kind, path, result)).await
    }

    /// Read `root/path`, extract it and sync the result. A missing file is
    /// synced as deleted.
    pub async fn sync_file(
        &self,
        ns: &Namespace,
        root: &Path,
        path: &str,
        matched: &Matched,
    ) -> Result<SyncOutcome, SyncError> {
        let _guard = self.acquire(ns, path).await;
        self.bounded(path, async {
            let result = match tokio::fs::read(root.join(path)).await {
                Ok(bytes) => {
                    let extract = |bytes: &[u8]| {
                        let text = decode(path, bytes)?;
                        matched.extractor.extract(path, text)
                    };
                    let result = extract(&bytes).map_err(|source| SyncError::Extract {
                        path: path.to_string(),
                        source,
                    })?;
                    Some(result)
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(source) => {
                    return Err(SyncError::Read {
                        path: path.to_string(),
                        source,
                    });
                }
            };
            self.write(ns, matched.kind, path, result.as_ref()).await
        })
        .await
    }

    async fn acquire(&self, ns: &Namespace, path: &str) -> PathGuard<'_> {
        let key = (ns.as_str().to_string(), path.to_string());
        let lock = Arc::clone(&*self.locks.entry(key.clone()).or_default());
        let guard = lock.lock_owned().await;
        PathGuard {
            locks: &self.locks,
            key,
            guard: Some(guard),
        }
    }

    async fn bounded(
        &self,
        path: &str,
        work: impl Future<Output = Result<SyncOutcome, SyncError>>,
    ) -> Result<SyncOutcome, SyncError> {
        tokio::time::timeout(self.timeout, work)
            .await
            .unwrap_or_else(|_| {
                Err(SyncError::Timeout {
                    path: path.to_string(),
                    after: self.timeout,
                })
            })
    }

    async fn write(
        &self,
        ns: &Namespace,
        kind: SourceKind,
        path: &str,
        result: Option<&ExtractionResult>,
    ) -> Result<SyncOutcome, SyncError> {
        let removed = self
            .store
            .remove_source(ns, kind, path)
            .await
            .map_err(|source| {
                if source.is_unavailable() {
                    SyncError::StoreUnavailable(source)
                } else {
                    SyncError::DeleteFailed {
                        path: path.to_string(),
                        source,
                    }
                }
            })?;

        let Some(result) = result else {
            debug!("Removed {} entities for deleted {}", removed, path);
            return Ok(SyncOutcome::Deleted { removed });
        };

        let expected = 1 + result.children.len();
        let partial = |created: usize| {
            move |source: StoreError| SyncError::PartialWrite {
                path: path.to_string(),
                created,
                expected,
                source,
            }
        };

        self.store
            .create_source(ns, path, result)
            .await
            .map_err(partial(0))?;
        for (index, child) in result.children.iter().enumerate() {
            self.store
                .create_child(ns, kind, path, child)
                .await
                .map_err(partial(index + 1))?;
        }

        let links = result.links(path);
        let mut links_failed = 0;
        for link in &links {
            if let Err(e) = self.store.link_source(ns, kind, path, link).await {
                debug!("Relation {:?} from {} not written: {}", link, path, e);
                links_failed += 1;
            }
        }
        if links_failed > 0 {
            warn!(
                "{} of {} relations from {} could not be written",
                links_failed,
                links.len(),
                path
            );
        }

        debug!(
            "Synced {} ({} removed, {} children)",
            path,
            removed,
            result.children.len()
        );
        Ok(SyncOutcome::Written {
            removed,
            children: result.children.len(),
            links_failed,
        })
    }
}
