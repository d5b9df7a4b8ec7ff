//! Trellis Core: entity model, namespaces and the graph store seam

pub mod config;
pub mod error;
pub mod graph;
pub mod model;
pub mod namespace;
pub mod paths;
pub mod store;


pub use config::{CONFIG_FILE, TrellisConfig};
pub use error::{ConfigError, StoreError};
pub use graph::{Graph, GraphNode, MemoryGraphStore, NodeId};
pub use model::{
    ChildEntity, CodeMetadata, DocType, DocumentMetadata, EdgeKind, ExtractionResult,
    FileMetadata, Language, NodeKind, SourceKind, SourceLink, MAX_LINKED_CONCEPTS,
};
pub use namespace::{Namespace, derive_token};
pub use paths::{STATE_DIR, clear_state, ensure_state_dir, log_path, normalize_rel_path, relativize, state_dir};
pub use store::{GraphStore, Properties};
