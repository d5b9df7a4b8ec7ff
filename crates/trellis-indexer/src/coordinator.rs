//! Orchestrates full reconciliation of a project against the graph
//!
//! Forward pass: walk the tree and sync every indexable file.
//! Reverse pass: remove entities whose backing file no longer exists.
//! Sweep: drop shared entities nothing links to any more.
//! Per-file failures are counted, never fatal.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream;
use ignore::WalkBuilder;
use thiserror::Error;
use tracing::{debug, info, warn};
use trellis_core::{GraphStore, Namespace, SourceKind, StoreError, relativize};

use crate::registry::{Classification, ExtractorRegistry, Matched};
use crate::sync::{GraphSync, SyncOutcome};

pub const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    StoreUnavailable(StoreError),

    #[error("failed to list indexed paths: {0}")]
    Listing(#[source] StoreError),

    #[error("file walk failed: {0}")]
    Walk(String),
}

fn store_error(e: StoreError) -> ReconcileError {
    if e.is_unavailable() {
        ReconcileError::StoreUnavailable(e)
    } else {
        ReconcileError::Listing(e)
    }
}

/// Counts from one reconciliation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Files written by the forward pass.
    pub synced: usize,
    /// Files that vanished between the walk and their sync.
    pub deleted: usize,
    pub failed: usize,
    /// Entities removed by the reverse pass because their file is gone.
    pub pruned: usize,
    /// Orphaned shared entities removed.
    pub swept: usize,
    /// `(path, error)` for every failed file.
    pub failures: Vec<(String, String)>,
}

impl ReconcileReport {
    fn record_failure(&mut self, path: String, error: impl fmt::Display) {
        self.failed += 1;
        self.failures.push((path, error.to_string()));
    }

    fn merge(&mut self, other: ReconcileReport) {
        self.synced += other.synced;
        self.deleted += other.deleted;
        self.failed += other.failed;
        self.pruned += other.pruned;
        self.swept += other.swept;
        self.failures.extend(other.failures);
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} synced, {} pruned, {} swept, {} failed",
            self.synced,
            self.pruned + self.deleted,
            self.swept,
            self.failed
        )
    }
}

pub struct Coordinator {
    root: PathBuf,
    registry: Arc<ExtractorRegistry>,
    sync: Arc<GraphSync>,
    concurrency: usize,
}

impl Coordinator {
    pub fn new(root: impl Into<PathBuf>, registry: Arc<ExtractorRegistry>, sync: Arc<GraphSync>) -> Self {
        Self {
            root: root.into(),
            registry,
            sync,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn store(&self) -> &Arc<dyn GraphStore> {
        self.sync.store()
    }

    /// Forward pass, reverse pass, then sweep.
    pub async fn reconcile(&self, ns: &Namespace) -> Result<ReconcileReport, ReconcileError> {
        self.store()
            .probe()
            .await
            .map_err(ReconcileError::StoreUnavailable)?;
        info!("Reconciling {} under namespace {}", self.root.display(), ns);

        let mut report = self.forward(ns).await?;
        report.merge(self.prune_missing(ns).await?);

        match self.store().sweep_unowned(ns).await {
            Ok(swept) => report.swept = swept,
            Err(e) => warn!("Sweeping unreferenced entities failed: {}", e),
        }

        for (path, error) in &report.failures {
            warn!("Failed to sync {}: {}", path, error);
        }
        info!("Reconciliation finished: {}", report);
        Ok(report)
    }

    /// Reverse pass only.
    pub async fn prune(&self, ns: &Namespace) -> Result<ReconcileReport, ReconcileError> {
        self.store()
            .probe()
            .await
            .map_err(ReconcileError::StoreUnavailable)?;
        let report = self.prune_missing(ns).await?;
        info!("Prune finished: {} removed, {} failed", report.pruned, report.failed);
        Ok(report)
    }

    /// Reconcile only when the namespace holds no entities at all.
    pub async fn ensure_populated(
        &self,
        ns: &Namespace,
    ) -> Result<Option<ReconcileReport>, ReconcileError> {
        self.store()
            .probe()
            .await
            .map_err(ReconcileError::StoreUnavailable)?;
        let counts = self.store().entity_counts(ns).await.map_err(store_error)?;
        if counts.values().sum::<usize>() > 0 {
            debug!("Namespace {} already populated", ns);
            return Ok(None);
        }
        info!("Namespace {} is empty; populating", ns);
        self.reconcile(ns).await.map(Some)
    }

    /// Every indexable file under the root, as project-relative paths.
    pub async fn discover(&self) -> Result<Vec<(String, Matched)>, ReconcileError> {
        let root = self.root.clone();
        let registry = Arc::clone(&self.registry);
        tokio::task::spawn_blocking(move || walk(&root, &registry))
            .await
            .map_err(|e| ReconcileError::Walk(e.to_string()))
    }

    async fn forward(&self, ns: &Namespace) -> Result<ReconcileReport, ReconcileError> {
        let sources = self.discover().await?;
        info!("Found {} indexable files", sources.len());

        let sync = &self.sync;
        let root = self.root.as_path();
        let results: Vec<_> = stream::iter(sources)
            .map(|(path, matched)| async move {
                let outcome = sync.sync_file(ns, root, &path, &matched).await;
                (path, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = ReconcileReport::default();
        for (path, outcome) in results {
            match outcome {
                Ok(SyncOutcome::Written { .. }) => report.synced += 1,
                Ok(SyncOutcome::Deleted { .. }) => report.deleted += 1,
                Err(e) => report.record_failure(path, e),
            }
        }
        Ok(report)
    }

    async fn prune_missing(&self, ns: &Namespace) -> Result<ReconcileReport, ReconcileError> {
        let mut report = ReconcileReport::default();
        for kind in SourceKind::ALL {
            let paths = self.store().list_sources(ns, kind).await.map_err(store_error)?;
            for path in paths {
                let exists = tokio::fs::try_exists(self.root.join(&path))
                    .await
                    .unwrap_or(true);
                if exists {
                    continue;
                }
                match self.sync.apply(ns, kind, &path, None).await {
                    Ok(_) => {
                        debug!("Pruned {} {}", kind, path);
                        report.pruned += 1;
                    }
                    Err(e) => report.record_failure(path, e),
                }
            }
        }
        Ok(report)
    }
}

fn walk(root: &Path, registry: &ExtractorRegistry) -> Vec<(String, Matched)> {
    let walker = WalkBuilder::new(root)
        .hidden(true)
        // Only the registry decides what is indexed, so a walk and a dispatch agree.
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .filter_entry(|entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            entry.depth() == 0
                || !is_dir
                || !ExtractorRegistry::is_pruned_dir(&entry.file_name().to_string_lossy())
        })
        .build();

    let mut sources = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Cannot read entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let Some(rel) = relativize(root, entry.path()) else {
            continue;
        };
        if let Classification::Indexed { path, matched } = registry.classify(&rel) {
            sources.push((path, matched));
        }
    }
    sources.sort_by(|a, b| a.0.cmp(&b.0));
    sources
}
