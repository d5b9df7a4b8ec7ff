//! The graph store seam
//!
//! The sync protocol only ever talks to a [`GraphStore`]. Every method is scoped
//! to one namespace; no method may read or modify entities of another.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::model::{ChildEntity, ExtractionResult, FileMetadata, SourceKind, SourceLink};
use crate::namespace::Namespace;

/// Property map written for a single node.
pub type Properties = Map<String, Value>;

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Cheap reachability check.
    async fn probe(&self) -> Result<(), StoreError>;

    /// Remove the entity for `path` and every child it owns.
    /// Returns the number of nodes removed; zero when nothing matched.
    async fn remove_source(
        &self,
        ns: &Namespace,
        kind: SourceKind,
        path: &str,
    ) -> Result<usize, StoreError>;

    /// Create the File/Document entity for `path`.
    async fn create_source(
        &self,
        ns: &Namespace,
        path: &str,
        result: &ExtractionResult,
    ) -> Result<(), StoreError>;

    /// Create one child owned by the entity at `owner`.
    async fn create_child(
        &self,
        ns: &Namespace,
        kind: SourceKind,
        owner: &str,
        child: &ChildEntity,
    ) -> Result<(), StoreError>;

    /// Write one best-effort relation from the entity at `path`.
    async fn link_source(
        &self,
        ns: &Namespace,
        kind: SourceKind,
        path: &str,
        link: &SourceLink,
    ) -> Result<(), StoreError>;

    /// Paths of every entity of `kind`, sorted.
    async fn list_sources(&self, ns: &Namespace, kind: SourceKind)
        -> Result<Vec<String>, StoreError>;

    /// Entity count per label. Empty when the namespace holds nothing.
    async fn entity_counts(&self, ns: &Namespace) -> Result<BTreeMap<String, usize>, StoreError>;

    /// Remove shared entities (packages, components, concepts) nothing points to.
    async fn sweep_unowned(&self, ns: &Namespace) -> Result<usize, StoreError>;
}

/// Attributes stored on a File/Document node.
pub fn source_properties(path: &str, result: &ExtractionResult) -> Properties {
    let mut props = Map::new();
    props.insert("path".into(), Value::from(path));
    props.insert("language".into(), Value::from(result.language.as_str()));
    props.insert("indexed_at".into(), Value::from(chrono::Utc::now().to_rfc3339()));

    match &result.metadata {
        FileMetadata::Code(code) => {
            if let Some(package) = &code.package {
                props.insert("package".into(), Value::from(package.as_str()));
            }
            props.insert("imports".into(), Value::from(code.imports.clone()));
        }
        FileMetadata::Document(doc) => {
            props.insert("title".into(), Value::from(doc.title.as_str()));
            props.insert("type".into(), Value::from(doc.doc_type.as_str()));
            props.insert("headings".into(), Value::from(doc.headings.clone()));
            props.insert("content".into(), Value::from(doc.excerpt.as_str()));
            if !doc.frontmatter.is_empty() {
                // Graph properties cannot be nested maps.
                let frontmatter = serde_json::to_string(&doc.frontmatter).unwrap_or_default();
                props.insert("frontmatter".into(), Value::from(frontmatter));
            }
        }
    }
    props
}

/// Attributes stored on a child node.
pub fn child_properties(kind: SourceKind, owner: &str, child: &ChildEntity) -> Properties {
    let mut props = Map::new();
    props.insert("name".into(), Value::from(child.name.as_str()));
    props.insert("owner".into(), Value::from(owner));
    props.insert("owner_label".into(), Value::from(kind.label()));
    // Go populators wrote the owning path as `file`; keep it for existing queries.
    props.insert("file".into(), Value::from(owner));

    if let Some(signature) = &child.signature {
        props.insert("signature".into(), Value::from(signature.as_str()));
    }
    if let Some(receiver) = &child.receiver {
        props.insert("receiver".into(), Value::from(receiver.as_str()));
    }
    if let Some(exported) = child.exported {
        props.insert("exported".into(), Value::from(exported));
    }
    if let Some(line) = child.line_start {
        props.insert("line_start".into(), Value::from(line));
    }
    if let Some(line) = child.line_end {
        props.insert("line_end".into(), Value::from(line));
    }
    if !child.members.is_empty() {
        props.insert("members".into(), Value::from(child.members.clone()));
    }
    for (key, value) in &child.attributes {
        props.entry(key.clone()).or_insert_with(|| Value::from(value.as_str()));
    }
    props
}
