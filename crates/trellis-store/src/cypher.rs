//! Cypher statement builders
//!
//! Labels cannot be query parameters, so the namespace and kind labels are
//! spliced into the text. They are always backtick-quoted. Everything else
//! travels as a parameter.

use serde::Serialize;
use serde_json::{Map, Value};
use trellis_core::{EdgeKind, Namespace, NodeKind, Properties, SourceKind, SourceLink};

/// Kinds merged by key and shared between files.
pub const SHARED_KINDS: [NodeKind; 3] = [NodeKind::Package, NodeKind::Component, NodeKind::Concept];

/// One statement of a transactional commit request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub statement: String,
    pub parameters: Map<String, Value>,
}

impl Statement {
    fn new(statement: String) -> Self {
        Self {
            statement,
            parameters: Map::new(),
        }
    }

    fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }
}

/// `` `label` ``, with embedded backticks doubled.
pub fn quote(label: &str) -> String {
    format!("`{}`", label.replace('`', "``"))
}

fn labels(ns: &Namespace, kind: NodeKind) -> String {
    format!("{}:{}", quote(ns.as_str()), quote(kind.label()))
}

pub fn probe() -> Statement {
    Statement::new("RETURN 1 AS ok".to_string())
}

/// Delete the source node at `$path` and every node it owns.
pub fn remove_source(ns: &Namespace, kind: SourceKind, path: &str) -> Statement {
    Statement::new(format!(
        "MATCH (n:{ns}) WHERE (n:{label} AND n.path = $path) OR (n.owner = $path AND n.owner_label = $owner_label) \
         DETACH DELETE n RETURN count(n) AS removed",
        ns = quote(ns.as_str()),
        label = quote(kind.label()),
    ))
    .param("path", path)
    .param("owner_label", kind.label())
}

pub fn create_source(ns: &Namespace, kind: SourceKind, path: &str, props: Properties) -> Statement {
    Statement::new(format!(
        "MERGE (s:{} {{path: $path}}) SET s = $props",
        labels(ns, kind.into())
    ))
    .param("path", path)
    .param("props", props)
}

/// Returns `created = 0` when the owner does not exist.
pub fn create_child(
    ns: &Namespace,
    kind: SourceKind,
    owner: &str,
    child: NodeKind,
    props: Properties,
) -> Statement {
    Statement::new(format!(
        "MATCH (s:{owner}) WHERE s.path = $owner CREATE (c:{child} $props) CREATE (s)-[:{edge}]->(c) \
         RETURN count(c) AS created",
        owner = labels(ns, kind.into()),
        child = labels(ns, child),
        edge = EdgeKind::Contains.as_str(),
    ))
    .param("owner", owner)
    .param("props", props)
}

pub fn link(ns: &Namespace, kind: SourceKind, path: &str, link: &SourceLink) -> Statement {
    let source = format!("MATCH (s:{} {{path: $path}})", labels(ns, kind.into()));
    let edge = link.edge_kind().as_str();

    let statement = match link {
        SourceLink::BelongsTo { package, dir } => Statement::new(format!(
            "{source} MERGE (p:{target} {{path: $dir}}) ON CREATE SET p.name = $name MERGE (s)-[:{edge}]->(p)",
            target = labels(ns, NodeKind::Package),
        ))
        .param("dir", dir.as_str())
        .param("name", package.as_str()),
        SourceLink::Imports { import } => Statement::new(format!(
            "{source} MATCH (p:{target}) WHERE p.path <> '.' AND $import ENDS WITH p.path MERGE (s)-[:{edge}]->(p)",
            target = labels(ns, NodeKind::Package),
        ))
        .param("import", import.as_str()),
        SourceLink::References { target } => Statement::new(format!(
            "{source} MATCH (t:{label} {{path: $target}}) MERGE (s)-[:{edge}]->(t)",
            label = labels(ns, NodeKind::Document),
        ))
        .param("target", target.as_str()),
        SourceLink::Describes { component } => Statement::new(format!(
            "{source} MERGE (c:{label} {{name: $name}}) MERGE (s)-[:{edge}]->(c)",
            label = labels(ns, NodeKind::Component),
        ))
        .param("name", component.as_str()),
        SourceLink::Mentions { concept } => Statement::new(format!(
            "{source} MERGE (c:{label} {{name: $name}}) MERGE (s)-[:{edge}]->(c)",
            label = labels(ns, NodeKind::Concept),
        ))
        .param("name", concept.as_str()),
    };
    statement.param("path", path)
}

pub fn list_sources(ns: &Namespace, kind: SourceKind) -> Statement {
    Statement::new(format!(
        "MATCH (s:{}) RETURN DISTINCT s.path AS path ORDER BY path",
        labels(ns, kind.into())
    ))
}

pub fn entity_counts(ns: &Namespace) -> Statement {
    Statement::new(format!(
        "MATCH (n:{}) UNWIND labels(n) AS label WITH label WHERE label <> $namespace \
         RETURN label, count(*) AS count ORDER BY label",
        quote(ns.as_str())
    ))
    .param("namespace", ns.as_str())
}

pub fn sweep_unowned(ns: &Namespace) -> Statement {
    let shared = SHARED_KINDS
        .iter()
        .map(|kind| format!("n:{}", quote(kind.label())))
        .collect::<Vec<_>>()
        .join(" OR ");
    Statement::new(format!(
        "MATCH (n:{}) WHERE ({}) AND NOT EXISTS {{ (n)<--() }} DETACH DELETE n RETURN count(n) AS removed",
        quote(ns.as_str()),
        shared
    ))
}
