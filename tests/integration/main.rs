//! Integration tests for Trellis
//!
//! Full reconcile, incremental dispatch and prune against the in-memory store,
//! exercising core, indexer and watcher together.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};
use trellis_core::{
    EdgeKind, GraphStore, MemoryGraphStore, Namespace, NodeKind, SourceKind, TrellisConfig,
};
use trellis_indexer::{Coordinator, ExtractorRegistry, GraphSync, SyncOutcome};
use trellis_watcher::Dispatcher;

const MAIN_GO: &str = r#"package main

import "inventory/internal/stock"

func main() {
	stock.Run()
}
"#;

const STOCK_GO: &str = r#"package stock

type Ledger struct {
	Items map[string]int
}

func Run() {}

func (l *Ledger) Reserve(sku string) bool {
	return l.Items[sku] > 0
}
"#;

const ADR_MD: &str = r#"# ADR 003: Ledger Storage

**Status:** Accepted

The Ledger keeps stock counts. See [stock notes](../stock.md).
"#;

const STOCK_MD: &str = "# Stock\n\nHow stock moves.\n";

struct Workspace {
    dir: TempDir,
    store: Arc<MemoryGraphStore>,
    coordinator: Coordinator,
    dispatcher: Dispatcher,
    ns: Namespace,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("inventory-service");
        std::fs::create_dir(&root).unwrap();

        let config = TrellisConfig {
            components: vec!["Ledger".into()],
            ..TrellisConfig::default()
        };
        let store = Arc::new(MemoryGraphStore::new());
        let registry = Arc::new(ExtractorRegistry::with_defaults(&config).unwrap());
        let sync = Arc::new(GraphSync::new(store.clone()).with_timeout(config.sync_timeout()));
        let ns = Namespace::resolve(&root);
        let coordinator = Coordinator::new(&root, Arc::clone(&registry), Arc::clone(&sync));
        let dispatcher = Dispatcher::new(ns.clone(), &root, registry, sync)
            .with_probe_timeout(Duration::from_millis(200));

        let workspace = Self { dir, store, coordinator, dispatcher, ns };
        workspace.write("main.go", MAIN_GO);
        workspace.write("internal/stock/stock.go", STOCK_GO);
        workspace.write("docs/decisions/003-ledger.md", ADR_MD);
        workspace.write("docs/stock.md", STOCK_MD);
        workspace.write("node_modules/pkg/index.js", "module.exports = {}\n");
        workspace
    }

    fn root(&self) -> std::path::PathBuf {
        self.dir.path().join("inventory-service")
    }

    fn write(&self, path: &str, content: &str) {
        let full = self.root().join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }

    fn remove(&self, path: &str) {
        std::fs::remove_file(self.root().join(path)).unwrap();
    }
}

fn names(children: Vec<(NodeKind, String)>, kind: NodeKind) -> Vec<String> {
    children
        .into_iter()
        .filter(|(k, _)| *k == kind)
        .map(|(_, name)| name)
        .collect()
}

#[tokio::test]
async fn test_namespace_derived_from_root_name() {
    let workspace = Workspace::new();
    assert_eq!(workspace.ns.as_str(), "InventoryService");
    assert_eq!(Namespace::resolve(Path::new("/srv/my-awesome-app")).as_str(), "MyAwesomeApp");
}

#[tokio::test]
async fn test_full_reconcile_builds_graph() {
    let workspace = Workspace::new();
    let ns = &workspace.ns;
    let store = &workspace.store;

    let report = assert_ok!(workspace.coordinator.reconcile(ns).await);
    assert_eq!(report.synced, 4, "{:?}", report.failures);
    assert_eq!(report.failed, 0);

    let stock = store.children_of(ns, SourceKind::File, "internal/stock/stock.go").await;
    assert_eq!(names(stock.clone(), NodeKind::Function), vec!["Run"]);
    assert_eq!(names(stock.clone(), NodeKind::Method), vec!["Reserve"]);
    assert_eq!(names(stock, NodeKind::Struct), vec!["Ledger"]);

    let adr = store
        .properties(ns, NodeKind::Document, "docs/decisions/003-ledger.md")
        .await
        .unwrap();
    assert_eq!(adr["type"], "decision");
    assert_eq!(adr["title"], "ADR 003: Ledger Storage");
    let decision = store
        .properties(ns, NodeKind::Decision, "ADR 003: Ledger Storage")
        .await
        .unwrap();
    assert_eq!(decision["status"], "accepted");
    assert_eq!(decision["id"], "003");
    assert_eq!(
        store
            .linked(ns, SourceKind::Document, "docs/decisions/003-ledger.md", EdgeKind::Describes)
            .await,
        vec!["Ledger"]
    );

    let counts = store.entity_counts(ns).await.unwrap();
    assert_eq!(counts.get("File"), Some(&2));
    assert_eq!(counts.get("Document"), Some(&2));
}

#[tokio::test]
async fn test_relations_resolve_once_targets_exist() {
    let workspace = Workspace::new();
    let ns = &workspace.ns;
    workspace.coordinator.reconcile(ns).await.unwrap();

    // Files are synced concurrently, so a target may not have existed yet;
    // syncing the referrers again links them.
    for path in ["main.go", "docs/decisions/003-ledger.md"] {
        workspace.dispatcher.dispatch(path);
    }
    workspace.dispatcher.wait_idle().await;

    let store = &workspace.store;
    assert_eq!(
        store.linked(ns, SourceKind::File, "main.go", EdgeKind::Imports).await,
        vec!["internal/stock"]
    );
    assert_eq!(
        store
            .linked(ns, SourceKind::Document, "docs/decisions/003-ledger.md", EdgeKind::References)
            .await,
        vec!["docs/stock.md"]
    );
}

#[tokio::test]
async fn test_incremental_edits_follow_reconcile() {
    let workspace = Workspace::new();
    let ns = &workspace.ns;
    workspace.coordinator.reconcile(ns).await.unwrap();

    workspace.write(
        "internal/stock/stock.go",
        "package stock\n\nfunc Run() {}\n\nfunc Restock() {}\n",
    );
    let outcome = workspace
        .dispatcher
        .dispatch(workspace.root().join("internal/stock/stock.go"))
        .ticket()
        .unwrap()
        .outcome()
        .await
        .unwrap();
    assert!(matches!(outcome, SyncOutcome::Written { children: 2, .. }));

    let children = workspace
        .store
        .children_of(ns, SourceKind::File, "internal/stock/stock.go")
        .await;
    assert_eq!(names(children.clone(), NodeKind::Function), vec!["Restock", "Run"]);
    assert!(names(children.clone(), NodeKind::Struct).is_empty());
    assert!(names(children, NodeKind::Method).is_empty());

    // A second reconcile over unchanged files leaves the graph as it is.
    let snapshot = workspace.store.entity_counts(ns).await.unwrap();
    workspace.coordinator.reconcile(ns).await.unwrap();
    assert_eq!(workspace.store.entity_counts(ns).await.unwrap(), snapshot);
}

#[tokio::test]
async fn test_deletions_reach_the_graph() {
    let workspace = Workspace::new();
    let ns = &workspace.ns;
    workspace.coordinator.reconcile(ns).await.unwrap();

    workspace.remove("main.go");
    let outcome = workspace.dispatcher.dispatch("main.go").ticket().unwrap().outcome().await;
    assert!(matches!(outcome, Ok(SyncOutcome::Deleted { .. })));

    workspace.remove("docs/stock.md");
    let report = workspace.coordinator.prune(ns).await.unwrap();
    assert_eq!(report.pruned, 1);

    let store = &workspace.store;
    assert_eq!(
        store.list_sources(ns, SourceKind::File).await.unwrap(),
        vec!["internal/stock/stock.go"]
    );
    assert_eq!(
        store.list_sources(ns, SourceKind::Document).await.unwrap(),
        vec!["docs/decisions/003-ledger.md"]
    );
}

#[tokio::test]
async fn test_ensure_populates_once() {
    let workspace = Workspace::new();
    let ns = &workspace.ns;

    let first = workspace.coordinator.ensure_populated(ns).await.unwrap();
    assert!(first.is_some());
    let second = workspace.coordinator.ensure_populated(ns).await.unwrap();
    assert!(second.is_none());
}

#[tokio::test]
async fn test_store_outage_leaves_graph_intact() {
    let workspace = Workspace::new();
    let ns = &workspace.ns;
    workspace.coordinator.reconcile(ns).await.unwrap();
    let before = workspace.store.node_count().await;

    workspace.store.set_unavailable(true);
    workspace.remove("main.go");
    assert_err!(workspace.coordinator.reconcile(ns).await);
    workspace.dispatcher.dispatch("main.go");
    workspace.dispatcher.wait_idle().await;
    assert_eq!(workspace.dispatcher.failures(), 1);

    workspace.store.set_unavailable(false);
    assert_eq!(workspace.store.node_count().await, before);
}
