//! Project namespace tokens
//!
//! Several projects can share one graph store. Every entity written for a
//! project carries that project's namespace token as an extra label, and every
//! query is scoped by it. The token is derived once from the project root
//! directory name and passed explicitly to every operation.

use std::fmt;
use std::path::Path;

use crate::error::ConfigError;
use crate::model::NodeKind;

const RESERVED_SUFFIX: &str = "Project";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace(String);

impl Namespace {
    /// Derive the namespace from the final segment of `root`.
    ///
    /// `root` is canonicalized first so that `.` resolves to the real directory name.
    /// A token equal to an entity label (a directory named `file`) gets a
    /// `Project` suffix, since queries match on the namespace label alone.
    pub fn resolve(root: &Path) -> Self {
        let canonical = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let name = canonical
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut token = derive_token(&name);
        if NodeKind::is_label(&token) {
            token.push_str(RESERVED_SUFFIX);
        }
        Namespace(token)
    }

    /// Use an explicit token instead of the derived one.
    pub fn from_override(token: &str) -> Result<Self, ConfigError> {
        let token = token.trim();
        if token.is_empty() || !token.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ConfigError::InvalidNamespace(token.to_string()));
        }
        if NodeKind::is_label(token) {
            return Err(ConfigError::ReservedNamespace(token.to_string()));
        }
        Ok(Namespace(token.to_string()))
    }

    /// Pick the override when one is configured, otherwise derive from `root`.
    pub fn for_project(root: &Path, token: Option<&str>) -> Result<Self, ConfigError> {
        match token {
            Some(token) => Self::from_override(token),
            None => Ok(Self::resolve(root)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `my-awesome-app` → `MyAwesomeApp`.
///
/// Splits on every non-alphanumeric character and upper-cases the first
/// character of each segment. The rest of each segment is kept as is.
pub fn derive_token(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
