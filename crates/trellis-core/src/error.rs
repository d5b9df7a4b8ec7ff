//! Error types shared across the workspace

use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by a graph store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached at all.
    #[error("graph store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected or failed a statement.
    #[error("graph query failed: {0}")]
    Query(String),

    /// The store answered with something we could not interpret.
    #[error("unexpected graph store response: {0}")]
    Protocol(String),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid namespace {0:?}: use ASCII letters, digits or '_'")]
    InvalidNamespace(String),

    #[error("namespace {0:?} is also an entity label")]
    ReservedNamespace(String),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}
