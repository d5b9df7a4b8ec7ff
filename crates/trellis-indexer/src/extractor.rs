//! Language extractor trait definition

use thiserror::Error;
use trellis_core::{ExtractionResult, Language};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("{path} is not valid UTF-8")]
    Decode { path: String },

    #[error("failed to parse {path}: {reason}")]
    Parser { path: String, reason: String },

    #[error("invalid extraction pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid path pattern: {0}")]
    Glob(#[from] globset::Error),
}

/// Turns the contents of one file into graph entities.
///
/// Implementations are pure: the same `(path, content)` always yields the same
/// result. Finding no declarations is a valid, empty result.
pub trait LanguageExtractor: Send + Sync {
    fn language(&self) -> Language;

    /// `path` is project-relative and only used for path-derived attributes.
    fn extract(&self, path: &str, content: &str) -> Result<ExtractionResult, ExtractError>;
}

/// Decode raw file bytes.
pub fn decode<'a>(path: &str, bytes: &'a [u8]) -> Result<&'a str, ExtractError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ExtractError::Decode {
        path: path.to_string(),
    })?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}
