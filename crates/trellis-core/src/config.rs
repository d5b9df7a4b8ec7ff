//! Project configuration: `.trellis.toml` plus environment overrides

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Config file looked up in the project root.
pub const CONFIG_FILE: &str = ".trellis.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrellisConfig {
    /// Base URL of the graph database's HTTP endpoint.
    pub graph_uri: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Explicit namespace token. Derived from the root directory name when unset.
    pub namespace: Option<String>,
    /// Directories (project-relative) whose markdown files are indexed as documents.
    pub doc_roots: Vec<String>,
    /// Component names to look for in documents.
    pub components: Vec<String>,
    pub sync_timeout_secs: u64,
    pub probe_timeout_ms: u64,
    /// Files synced in parallel during reconciliation.
    pub concurrency: usize,
}

impl Default for TrellisConfig {
    fn default() -> Self {
        Self {
            graph_uri: "http://localhost:7474".to_string(),
            database: "neo4j".to_string(),
            username: None,
            password: None,
            namespace: None,
            doc_roots: vec!["docs".to_string()],
            components: Vec::new(),
            sync_timeout_secs: 10,
            probe_timeout_ms: 2000,
            concurrency: 8,
        }
    }
}

impl TrellisConfig {
    /// Load `<root>/.trellis.toml` if present, then apply environment overrides.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(root)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Read the config file only. Missing file means defaults.
    pub fn from_file(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config: Self =
            toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.clone(), source })?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Override fields from environment variables, read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(uri) = var("TRELLIS_GRAPH_URI").or_else(|| var("NEO4J_URI")) {
            self.graph_uri = uri;
        }
        if let Some(database) = var("TRELLIS_DATABASE") {
            self.database = database;
        }
        if let Some(user) = var("NEO4J_USER") {
            self.username = Some(user);
        }
        if let Some(password) = var("NEO4J_PASSWORD") {
            self.password = Some(password);
        }
        if let Some(namespace) = var("TRELLIS_NAMESPACE") {
            self.namespace = Some(namespace);
        }
        if let Some(secs) = var("TRELLIS_SYNC_TIMEOUT") {
            self.sync_timeout_secs = secs.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "TRELLIS_SYNC_TIMEOUT",
                value: secs.clone(),
            })?;
        }
        Ok(())
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms.max(1))
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}
