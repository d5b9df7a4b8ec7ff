//! Extractor registry: which files get indexed, and by what
//!
//! Classification is a table lookup on the file extension followed by the
//! registration's own filters. Adding a language means registering one more
//! [`Registration`]; nothing else changes.

use std::collections::HashMap;
use std::sync::Arc;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use trellis_core::{Language, SourceKind, TrellisConfig, normalize_rel_path};

use crate::extractor::{ExtractError, LanguageExtractor};
use crate::languages::{self, GoExtractor, MarkdownExtractor};

/// Directories never indexed for any language.
pub const ALWAYS_EXCLUDED: &[&str] = &[".git", "node_modules"];

pub const GO_EXCLUDED: &[&str] = &["vendor", "bin"];
pub const RUST_EXCLUDED: &[&str] = &["target"];
pub const PYTHON_EXCLUDED: &[&str] = &["venv", ".venv", "__pycache__", "build", "dist"];
pub const JS_EXCLUDED: &[&str] = &["dist", "build", ".next", "coverage"];
pub const JAVA_EXCLUDED: &[&str] = &["target", "build", "bin", "out"];
pub const CSHARP_EXCLUDED: &[&str] = &["bin", "obj"];
pub const C_EXCLUDED: &[&str] = &["build"];
pub const RUBY_EXCLUDED: &[&str] = &["vendor"];

/// One extractor and the files it is responsible for.
pub struct Registration {
    pub kind: SourceKind,
    pub extensions: &'static [&'static str],
    pub excluded_dirs: &'static [&'static str],
    pub extractor: Arc<dyn LanguageExtractor>,
    /// When set, only matching paths are accepted.
    pub scope: Option<GlobSet>,
    /// Matching paths are ignored.
    pub skip: Option<GlobSet>,
}

impl Registration {
    pub fn code(
        extractor: impl LanguageExtractor + 'static,
        extensions: &'static [&'static str],
        excluded_dirs: &'static [&'static str],
    ) -> Self {
        Self {
            kind: SourceKind::File,
            extensions,
            excluded_dirs,
            extractor: Arc::new(extractor),
            scope: None,
            skip: None,
        }
    }

    pub fn with_skip(mut self, skip: GlobSet) -> Self {
        self.skip = Some(skip);
        self
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("kind", &self.kind)
            .field("language", &self.extractor.language())
            .field("extensions", &self.extensions)
            .finish()
    }
}

/// What to do with a path that passed classification.
#[derive(Clone)]
pub struct Matched {
    pub kind: SourceKind,
    pub extractor: Arc<dyn LanguageExtractor>,
}

impl Matched {
    pub fn language(&self) -> Language {
        self.extractor.language()
    }
}

impl std::fmt::Debug for Matched {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matched")
            .field("kind", &self.kind)
            .field("language", &self.language())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Empty, or escapes the project root.
    InvalidPath,
    NoExtension,
    Unsupported(String),
    HiddenPath,
    ExcludedDir(String),
    /// Outside the registration's scope, e.g. markdown outside the doc roots.
    OutsideScope,
    /// Matched a skip pattern, e.g. Go test files.
    Skipped,
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IgnoreReason::InvalidPath => write!(f, "not a project-relative path"),
            IgnoreReason::NoExtension => write!(f, "no file extension"),
            IgnoreReason::Unsupported(ext) => write!(f, "no extractor for .{}", ext),
            IgnoreReason::HiddenPath => write!(f, "hidden path"),
            IgnoreReason::ExcludedDir(dir) => write!(f, "inside excluded directory {}", dir),
            IgnoreReason::OutsideScope => write!(f, "outside indexed directories"),
            IgnoreReason::Skipped => write!(f, "matches a skip pattern"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Classification {
    Indexed { path: String, matched: Matched },
    Ignored(IgnoreReason),
}

#[derive(Debug, Default)]
pub struct ExtractorRegistry {
    registrations: Vec<Registration>,
    by_extension: HashMap<String, usize>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in extractor, with documents scoped to `config.doc_roots`.
    pub fn with_defaults(config: &TrellisConfig) -> Result<Self, ExtractError> {
        let mut registry = Self::new();

        registry.register(
            Registration::code(GoExtractor::new(), &["go"], GO_EXCLUDED)
                .with_skip(glob_set(&["**/*_test.go".to_string()], false)?),
        );
        registry.register(Registration::code(languages::rust::extractor()?, &["rs"], RUST_EXCLUDED));
        registry.register(Registration::code(
            languages::python::extractor()?,
            &["py", "pyi"],
            PYTHON_EXCLUDED,
        ));
        registry.register(Registration::code(
            languages::typescript::extractor()?,
            &["ts", "tsx", "mts", "cts"],
            JS_EXCLUDED,
        ));
        registry.register(Registration::code(
            languages::javascript::extractor()?,
            &["js", "jsx", "mjs", "cjs"],
            JS_EXCLUDED,
        ));
        registry.register(Registration::code(languages::java::extractor()?, &["java"], JAVA_EXCLUDED));
        registry.register(Registration::code(languages::c::c_extractor()?, &["c", "h"], C_EXCLUDED));
        registry.register(Registration::code(
            languages::c::cpp_extractor()?,
            &["cpp", "cc", "cxx", "hpp", "hh", "hxx"],
            C_EXCLUDED,
        ));
        registry.register(Registration::code(languages::csharp::extractor()?, &["cs"], CSHARP_EXCLUDED));
        registry.register(Registration::code(languages::ruby::extractor()?, &["rb"], RUBY_EXCLUDED));
        registry.register(documents(config)?);

        Ok(registry)
    }

    /// Add a registration. Later registrations win for a shared extension.
    pub fn register(&mut self, registration: Registration) {
        let index = self.registrations.len();
        for ext in registration.extensions {
            self.by_extension.insert(ext.to_ascii_lowercase(), index);
        }
        self.registrations.push(registration);
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Decide whether `path` (project-relative) is indexed, and by which extractor.
    pub fn classify(&self, path: &str) -> Classification {
        let Some(path) = normalize_rel_path(path) else {
            return Classification::Ignored(IgnoreReason::InvalidPath);
        };
        let segments: Vec<&str> = path.split('/').collect();
        let file_name = segments.last().copied().unwrap_or_default();

        let ext = match file_name.rfind('.') {
            Some(idx) if idx > 0 && idx + 1 < file_name.len() => &file_name[idx + 1..],
            _ => return Classification::Ignored(IgnoreReason::NoExtension),
        };
        let Some(&index) = self.by_extension.get(&ext.to_ascii_lowercase()) else {
            return Classification::Ignored(IgnoreReason::Unsupported(ext.to_string()));
        };
        let registration = &self.registrations[index];

        let dirs = &segments[..segments.len() - 1];
        if let Some(dir) = dirs
            .iter()
            .find(|d| ALWAYS_EXCLUDED.contains(*d) || registration.excluded_dirs.contains(*d))
        {
            return Classification::Ignored(IgnoreReason::ExcludedDir(dir.to_string()));
        }
        if segments.iter().any(|s| s.starts_with('.')) {
            return Classification::Ignored(IgnoreReason::HiddenPath);
        }
        if let Some(scope) = &registration.scope {
            if !scope.is_match(&path) {
                return Classification::Ignored(IgnoreReason::OutsideScope);
            }
        }
        if let Some(skip) = &registration.skip {
            if skip.is_match(&path) {
                return Classification::Ignored(IgnoreReason::Skipped);
            }
        }

        Classification::Indexed {
            matched: Matched {
                kind: registration.kind,
                extractor: Arc::clone(&registration.extractor),
            },
            path,
        }
    }

    /// Directories the walker may skip without looking inside.
    pub fn is_pruned_dir(name: &str) -> bool {
        name.starts_with('.') || ALWAYS_EXCLUDED.contains(&name)
    }
}

/// Markdown under the configured doc roots, minus each root's own README.
fn documents(config: &TrellisConfig) -> Result<Registration, ExtractError> {
    let roots: Vec<String> = config
        .doc_roots
        .iter()
        .filter_map(|root| match root.trim() {
            "." | "" => Some(String::new()),
            other => normalize_rel_path(other),
        })
        .collect();

    // No roots configured, or the project root itself: documents anywhere.
    let scope = if roots.is_empty() || roots.iter().any(String::is_empty) {
        None
    } else {
        Some(glob_set(
            &roots.iter().map(|r| format!("{}/**", r)).collect::<Vec<_>>(),
            false,
        )?)
    };
    let readmes: Vec<String> = roots
        .iter()
        .map(|r| if r.is_empty() { "README.md".to_string() } else { format!("{}/README.md", r) })
        .collect();

    Ok(Registration {
        kind: SourceKind::Document,
        extensions: &["md", "markdown"],
        excluded_dirs: &[],
        extractor: Arc::new(MarkdownExtractor::new(&config.components)?),
        scope,
        skip: if readmes.is_empty() { None } else { Some(glob_set(&readmes, true)?) },
    })
}

fn glob_set(patterns: &[String], case_insensitive: bool) -> Result<GlobSet, ExtractError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            GlobBuilder::new(pattern)
                .case_insensitive(case_insensitive)
                .literal_separator(true)
                .build()?,
        );
    }
    Ok(builder.build()?)
}
