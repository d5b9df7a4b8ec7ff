//! In-memory graph store over petgraph::StableDiGraph
//!
//! Backs `--dry-run` reindexing and the test suites. Semantics match the Cypher
//! store: entities are scoped by namespace, children are owned by exactly one
//! File/Document, shared entities are merged by key.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::model::{ChildEntity, EdgeKind, ExtractionResult, NodeKind, SourceKind, SourceLink};
use crate::namespace::Namespace;
use crate::store::{GraphStore, Properties, child_properties, source_properties};

/// Stable node identifier within a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl NodeId {
    fn index(self) -> NodeIndex {
        NodeIndex::new(self.0 as usize)
    }
}

/// A node as held by the in-memory store.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub namespace: String,
    pub kind: NodeKind,
    /// Path for File/Document and Package, name for everything else.
    pub key: String,
    /// Owning entity for children.
    pub owner: Option<(SourceKind, String)>,
    pub properties: Properties,
}

/// Directed multigraph with stable indices.
pub struct Graph {
    inner: StableDiGraph<GraphNode, EdgeKind>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            inner: StableDiGraph::new(),
        }
    }

    pub fn add_node(&mut self, node: GraphNode) -> NodeId {
        NodeId(self.inner.add_node(node).index() as u64)
    }

    pub fn add_edge(&mut self, source: NodeId, target: NodeId, kind: EdgeKind) {
        self.inner.add_edge(source.index(), target.index(), kind);
    }

    /// Add an edge unless the same one already exists.
    pub fn merge_edge(&mut self, source: NodeId, target: NodeId, kind: EdgeKind) {
        if !self.has_edge_between(source, target, kind) {
            self.add_edge(source, target, kind);
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.inner.node_weight(id.index())
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Iterate over all nodes with their ids.
    pub fn all_nodes(&self) -> impl Iterator<Item = (NodeId, &GraphNode)> {
        self.inner
            .node_indices()
            .filter_map(move |idx| self.inner.node_weight(idx).map(|n| (NodeId(idx.index() as u64), n)))
    }

    /// Outgoing edges from a node as `(kind, target)`.
    pub fn edges_from(&self, source: NodeId) -> impl Iterator<Item = (EdgeKind, NodeId)> + '_ {
        self.inner
            .edges_directed(source.index(), Direction::Outgoing)
            .map(|edge| (*edge.weight(), NodeId(edge.target().index() as u64)))
    }

    pub fn incoming_count(&self, target: NodeId) -> usize {
        self.inner.edges_directed(target.index(), Direction::Incoming).count()
    }

    pub fn has_edge_between(&self, source: NodeId, target: NodeId, kind: EdgeKind) -> bool {
        self.edges_from(source).any(|(k, t)| k == kind && t == target)
    }

    /// First node matching the predicate.
    pub fn find(&self, predicate: impl Fn(&GraphNode) -> bool) -> Option<NodeId> {
        self.all_nodes().find(|(_, n)| predicate(n)).map(|(id, _)| id)
    }

    pub fn nodes_where(&self, predicate: impl Fn(&GraphNode) -> bool) -> Vec<NodeId> {
        self.all_nodes().filter(|(_, n)| predicate(n)).map(|(id, _)| id).collect()
    }

    /// Remove a node and all its edges.
    pub fn remove_node(&mut self, id: NodeId) -> Option<GraphNode> {
        self.inner.remove_node(id.index())
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

/// Switches for exercising failure paths.
#[derive(Debug, Default)]
struct Faults {
    unavailable: AtomicBool,
    fail_removals: AtomicBool,
    fail_links: AtomicBool,
    /// Remaining child creations before failing; `None` means unlimited.
    child_budget: Mutex<Option<usize>>,
}

/// [`GraphStore`] held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    graph: RwLock<Graph>,
    faults: Faults,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make `remove_source` fail with [`StoreError::Query`].
    pub fn fail_removals(&self, fail: bool) {
        self.faults.fail_removals.store(fail, Ordering::SeqCst);
    }

    pub fn fail_links(&self, fail: bool) {
        self.faults.fail_links.store(fail, Ordering::SeqCst);
    }

    /// Allow `budget` more child creations, then fail each one. `None` lifts the limit.
    pub fn fail_children_after(&self, budget: Option<usize>) {
        if let Ok(mut slot) = self.faults.child_budget.lock() {
            *slot = budget;
        }
    }

    /// Total node count across all namespaces.
    pub async fn node_count(&self) -> usize {
        self.graph.read().await.node_count()
    }

    /// `(kind, name)` of every child owned by `path`, sorted.
    pub async fn children_of(
        &self,
        ns: &Namespace,
        kind: SourceKind,
        path: &str,
    ) -> Vec<(NodeKind, String)> {
        let graph = self.graph.read().await;
        let mut children: Vec<_> = graph
            .all_nodes()
            .filter(|(_, n)| n.namespace == ns.as_str() && owned_by(n, kind, path))
            .map(|(_, n)| (n.kind, n.key.clone()))
            .collect();
        children.sort();
        children
    }

    /// Properties of the first node of `kind` with `key`.
    pub async fn properties(&self, ns: &Namespace, kind: NodeKind, key: &str) -> Option<Properties> {
        let graph = self.graph.read().await;
        graph
            .find(|n| n.namespace == ns.as_str() && n.kind == kind && n.key == key)
            .and_then(|id| graph.node(id))
            .map(|n| n.properties.clone())
    }

    /// Keys of the nodes reached from the source at `path` over `edge`.
    pub async fn linked(
        &self,
        ns: &Namespace,
        kind: SourceKind,
        path: &str,
        edge: EdgeKind,
    ) -> Vec<String> {
        let graph = self.graph.read().await;
        let Some(source) = find_source(&graph, ns, kind, path) else {
            return Vec::new();
        };
        let mut keys: Vec<String> = graph
            .edges_from(source)
            .filter(|(k, _)| *k == edge)
            .filter_map(|(_, target)| graph.node(target).map(|n| n.key.clone()))
            .collect();
        keys.sort();
        keys
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.faults.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store marked unavailable".into()));
        }
        Ok(())
    }

    fn take_child_budget(&self) -> Result<(), StoreError> {
        let mut slot = self
            .faults
            .child_budget
            .lock()
            .map_err(|_| StoreError::Query("fault state poisoned".into()))?;
        match slot.as_mut() {
            Some(0) => Err(StoreError::Query("injected child creation failure".into())),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

fn owned_by(node: &GraphNode, kind: SourceKind, path: &str) -> bool {
    matches!(&node.owner, Some((k, p)) if *k == kind && p == path)
}

fn find_source(graph: &Graph, ns: &Namespace, kind: SourceKind, path: &str) -> Option<NodeId> {
    let node_kind = NodeKind::from(kind);
    graph.find(|n| n.namespace == ns.as_str() && n.kind == node_kind && n.key == path)
}

/// Find or create a shared node keyed by `key`.
fn merge_shared(graph: &mut Graph, ns: &Namespace, kind: NodeKind, key: &str, name: &str) -> NodeId {
    if let Some(id) = graph.find(|n| n.namespace == ns.as_str() && n.kind == kind && n.key == key) {
        return id;
    }
    let mut properties = Properties::new();
    properties.insert("name".into(), Value::from(name));
    if kind == NodeKind::Package {
        properties.insert("path".into(), Value::from(key));
    }
    graph.add_node(GraphNode {
        namespace: ns.as_str().to_string(),
        kind,
        key: key.to_string(),
        owner: None,
        properties,
    })
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn probe(&self) -> Result<(), StoreError> {
        self.check_available()
    }

    async fn remove_source(
        &self,
        ns: &Namespace,
        kind: SourceKind,
        path: &str,
    ) -> Result<usize, StoreError> {
        self.check_available()?;
        if self.faults.fail_removals.load(Ordering::SeqCst) {
            return Err(StoreError::Query("injected removal failure".into()));
        }

        let node_kind = NodeKind::from(kind);
        let mut graph = self.graph.write().await;
        let doomed = graph.nodes_where(|n| {
            n.namespace == ns.as_str()
                && ((n.kind == node_kind && n.key == path) || owned_by(n, kind, path))
        });
        for id in &doomed {
            graph.remove_node(*id);
        }
        Ok(doomed.len())
    }

    async fn create_source(
        &self,
        ns: &Namespace,
        path: &str,
        result: &ExtractionResult,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        let kind = result.source_kind();
        let properties = source_properties(path, result);
        let mut graph = self.graph.write().await;

        // At most one entity per path, even if a caller skipped the removal.
        if let Some(id) = find_source(&graph, ns, kind, path) {
            graph.remove_node(id);
        }
        graph.add_node(GraphNode {
            namespace: ns.as_str().to_string(),
            kind: kind.into(),
            key: path.to_string(),
            owner: None,
            properties,
        });
        Ok(())
    }

    async fn create_child(
        &self,
        ns: &Namespace,
        kind: SourceKind,
        owner: &str,
        child: &ChildEntity,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        self.take_child_budget()?;

        let mut graph = self.graph.write().await;
        let owner_id = find_source(&graph, ns, kind, owner)
            .ok_or_else(|| StoreError::Query(format!("no {} entity for {}", kind, owner)))?;
        let child_id = graph.add_node(GraphNode {
            namespace: ns.as_str().to_string(),
            kind: child.kind,
            key: child.name.clone(),
            owner: Some((kind, owner.to_string())),
            properties: child_properties(kind, owner, child),
        });
        graph.add_edge(owner_id, child_id, EdgeKind::Contains);
        Ok(())
    }

    async fn link_source(
        &self,
        ns: &Namespace,
        kind: SourceKind,
        path: &str,
        link: &SourceLink,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        if self.faults.fail_links.load(Ordering::SeqCst) {
            return Err(StoreError::Query("injected link failure".into()));
        }

        let mut graph = self.graph.write().await;
        let Some(source) = find_source(&graph, ns, kind, path) else {
            return Ok(());
        };
        let edge = link.edge_kind();

        match link {
            SourceLink::BelongsTo { package, dir } => {
                let target = merge_shared(&mut graph, ns, NodeKind::Package, dir, package);
                graph.merge_edge(source, target, edge);
            }
            SourceLink::Imports { import } => {
                let targets = graph.nodes_where(|n| {
                    n.namespace == ns.as_str()
                        && n.kind == NodeKind::Package
                        && n.key != "."
                        && import.ends_with(n.key.as_str())
                });
                for target in targets {
                    graph.merge_edge(source, target, edge);
                }
            }
            SourceLink::References { target } => {
                if let Some(target) = find_source(&graph, ns, SourceKind::Document, target) {
                    graph.merge_edge(source, target, edge);
                }
            }
            SourceLink::Describes { component } => {
                let target = merge_shared(&mut graph, ns, NodeKind::Component, component, component);
                graph.merge_edge(source, target, edge);
            }
            SourceLink::Mentions { concept } => {
                let target = merge_shared(&mut graph, ns, NodeKind::Concept, concept, concept);
                graph.merge_edge(source, target, edge);
            }
        }
        Ok(())
    }

    async fn list_sources(
        &self,
        ns: &Namespace,
        kind: SourceKind,
    ) -> Result<Vec<String>, StoreError> {
        self.check_available()?;
        let node_kind = NodeKind::from(kind);
        let graph = self.graph.read().await;
        let mut paths: Vec<String> = graph
            .all_nodes()
            .filter(|(_, n)| n.namespace == ns.as_str() && n.kind == node_kind)
            .map(|(_, n)| n.key.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        paths.sort();
        Ok(paths)
    }

    async fn entity_counts(&self, ns: &Namespace) -> Result<BTreeMap<String, usize>, StoreError> {
        self.check_available()?;
        let graph = self.graph.read().await;
        let mut counts = BTreeMap::new();
        for (_, node) in graph.all_nodes().filter(|(_, n)| n.namespace == ns.as_str()) {
            *counts.entry(node.kind.label().to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn sweep_unowned(&self, ns: &Namespace) -> Result<usize, StoreError> {
        self.check_available()?;
        let mut graph = self.graph.write().await;
        let orphans: Vec<NodeId> = graph
            .all_nodes()
            .filter(|(id, n)| {
                n.namespace == ns.as_str() && n.kind.is_shared() && graph.incoming_count(*id) == 0
            })
            .map(|(id, _)| id)
            .collect();
        for id in &orphans {
            graph.remove_node(*id);
        }
        Ok(orphans.len())
    }
}
