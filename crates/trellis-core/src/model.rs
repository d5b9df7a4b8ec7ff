//! Core data structures shared by extractors, the sync protocol and graph stores

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Languages with a registered extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Go,
    Rust,
    Python,
    TypeScript,
    JavaScript,
    Java,
    C,
    Cpp,
    CSharp,
    Ruby,
    Markdown,
}

impl Language {
    /// Name stored in the `language` attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Python => "python",
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Ruby => "ruby",
            Language::Markdown => "markdown",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two kinds of entity that are backed by a file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceKind {
    File,
    Document,
}

impl SourceKind {
    pub const ALL: [SourceKind; 2] = [SourceKind::File, SourceKind::Document];

    pub fn label(&self) -> &'static str {
        NodeKind::from(*self).label()
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Discriminates what kind of entity a graph node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    // ── File-backed ─────────────────────────────────────────
    File,
    Document,

    // ── Owned children ──────────────────────────────────────
    Function,
    Method,
    Struct,
    Interface,
    Trait,
    Class,
    Enum,
    TypeAlias,
    Module,
    Decision,

    // ── Shared, merged by key ───────────────────────────────
    Package,
    Component,
    Concept,
}

impl NodeKind {
    pub const ALL: [NodeKind; 15] = [
        NodeKind::File,
        NodeKind::Document,
        NodeKind::Function,
        NodeKind::Method,
        NodeKind::Struct,
        NodeKind::Interface,
        NodeKind::Trait,
        NodeKind::Class,
        NodeKind::Enum,
        NodeKind::TypeAlias,
        NodeKind::Module,
        NodeKind::Decision,
        NodeKind::Package,
        NodeKind::Component,
        NodeKind::Concept,
    ];

    /// True if `token` would collide with an entity label.
    pub fn is_label(token: &str) -> bool {
        NodeKind::ALL.iter().any(|kind| kind.label().eq_ignore_ascii_case(token))
    }

    /// Graph label for this kind.
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::File => "File",
            NodeKind::Document => "Document",
            NodeKind::Function => "Function",
            NodeKind::Method => "Method",
            NodeKind::Struct => "Struct",
            NodeKind::Interface => "Interface",
            NodeKind::Trait => "Trait",
            NodeKind::Class => "Class",
            NodeKind::Enum => "Enum",
            NodeKind::TypeAlias => "Type",
            NodeKind::Module => "Module",
            NodeKind::Decision => "Decision",
            NodeKind::Package => "Package",
            NodeKind::Component => "Component",
            NodeKind::Concept => "Concept",
        }
    }

    /// Shared kinds are merged by key and never owned by a single file.
    pub fn is_shared(&self) -> bool {
        matches!(self, NodeKind::Package | NodeKind::Component | NodeKind::Concept)
    }
}

impl From<SourceKind> for NodeKind {
    fn from(kind: SourceKind) -> Self {
        match kind {
            SourceKind::File => NodeKind::File,
            SourceKind::Document => NodeKind::Document,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Relationship types written to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Contains,
    BelongsTo,
    Imports,
    References,
    Describes,
    Mentions,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Contains => "CONTAINS",
            EdgeKind::BelongsTo => "BELONGS_TO",
            EdgeKind::Imports => "IMPORTS",
            EdgeKind::References => "REFERENCES",
            EdgeKind::Describes => "DESCRIBES",
            EdgeKind::Mentions => "MENTIONS",
        }
    }
}

/// One named declaration found inside a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildEntity {
    pub kind: NodeKind,
    pub name: String,
    pub signature: Option<String>,
    pub receiver: Option<String>,
    pub exported: Option<bool>,
    /// 1-based, inclusive.
    pub line_start: Option<u32>,
    pub line_end: Option<u32>,
    /// Struct fields or interface methods.
    pub members: Vec<String>,
    pub attributes: BTreeMap<String, String>,
}

impl ChildEntity {
    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            signature: None,
            receiver: None,
            exported: None,
            line_start: None,
            line_end: None,
            members: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_lines(mut self, start: u32, end: u32) -> Self {
        self.line_start = Some(start);
        self.line_end = Some(end);
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_exported(mut self, exported: bool) -> Self {
        self.exported = Some(exported);
        self
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }
}

/// Document classification, derived from the document's path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Overview,
    Architecture,
    Decision,
    Implementation,
    Operations,
    Plan,
    #[default]
    Other,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Overview => "overview",
            DocType::Architecture => "architecture",
            DocType::Decision => "decision",
            DocType::Implementation => "implementation",
            DocType::Operations => "operations",
            DocType::Plan => "plan",
            DocType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CodeMetadata {
    pub package: Option<String>,
    pub imports: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: String,
    pub headings: Vec<String>,
    pub doc_type: DocType,
    pub excerpt: String,
    pub frontmatter: BTreeMap<String, String>,
    /// Project-relative paths of linked documents.
    pub references: Vec<String>,
    pub components: Vec<String>,
    pub concepts: Vec<String>,
}

/// Per-file attributes, depending on whether the file is code or prose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileMetadata {
    Code(CodeMetadata),
    Document(DocumentMetadata),
}

/// Concepts linked per document; the metadata may carry more.
pub const MAX_LINKED_CONCEPTS: usize = 10;

/// Language-agnostic output of scanning one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub language: Language,
    pub metadata: FileMetadata,
    pub children: Vec<ChildEntity>,
}

impl ExtractionResult {
    pub fn source_kind(&self) -> SourceKind {
        match self.metadata {
            FileMetadata::Code(_) => SourceKind::File,
            FileMetadata::Document(_) => SourceKind::Document,
        }
    }

    /// Best-effort relations to shared entities implied by this file's metadata.
    pub fn links(&self, path: &str) -> Vec<SourceLink> {
        let mut links = Vec::new();
        match &self.metadata {
            FileMetadata::Code(code) => {
                if let Some(package) = &code.package {
                    links.push(SourceLink::BelongsTo {
                        package: package.clone(),
                        dir: parent_dir(path).to_string(),
                    });
                }
                links.extend(
                    code.imports
                        .iter()
                        .map(|import| SourceLink::Imports { import: import.clone() }),
                );
            }
            FileMetadata::Document(doc) => {
                links.extend(
                    doc.references
                        .iter()
                        .filter(|target| target.as_str() != path)
                        .map(|target| SourceLink::References { target: target.clone() }),
                );
                links.extend(
                    doc.components
                        .iter()
                        .map(|name| SourceLink::Describes { component: name.clone() }),
                );
                links.extend(
                    doc.concepts
                        .iter()
                        .take(MAX_LINKED_CONCEPTS)
                        .map(|name| SourceLink::Mentions { concept: name.clone() }),
                );
            }
        }
        links
    }
}

/// A relation from a file-backed entity to a shared or sibling entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceLink {
    /// File belongs to the package declared in its directory.
    BelongsTo { package: String, dir: String },
    /// File imports a package whose directory path ends the import string.
    Imports { import: String },
    /// Document links to another document.
    References { target: String },
    Describes { component: String },
    Mentions { concept: String },
}

impl SourceLink {
    pub fn edge_kind(&self) -> EdgeKind {
        match self {
            SourceLink::BelongsTo { .. } => EdgeKind::BelongsTo,
            SourceLink::Imports { .. } => EdgeKind::Imports,
            SourceLink::References { .. } => EdgeKind::References,
            SourceLink::Describes { .. } => EdgeKind::Describes,
            SourceLink::Mentions { .. } => EdgeKind::Mentions,
        }
    }
}

/// Directory portion of a project-relative path, `.` for the root.
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) if idx > 0 => &path[..idx],
        _ => ".",
    }
}
