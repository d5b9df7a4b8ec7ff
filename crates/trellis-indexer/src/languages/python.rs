//! Python declaration patterns
//!
//! Indentation decides between functions and methods: a `def` at column zero
//! is a module-level function, an indented one is taken to be a method.

use trellis_core::{Language, NodeKind};

use super::patterns::{PatternExtractor, PatternTable};
use crate::extractor::ExtractError;

pub const PATTERNS: PatternTable = PatternTable {
    declarations: &[
        (NodeKind::Class, r"(?m)^[ \t]*class[ \t]+(?P<name>[A-Za-z_]\w*)[^\n]*"),
        (
            NodeKind::Function,
            r"(?m)^(?:async[ \t]+)?def[ \t]+(?P<name>[A-Za-z_]\w*)[^\n]*",
        ),
        (
            NodeKind::Method,
            r"(?m)^[ \t]+(?:async[ \t]+)?def[ \t]+(?P<name>[A-Za-z_]\w*)[^\n]*",
        ),
    ],
    package: None,
    imports: &[
        r"(?m)^[ \t]*import[ \t]+([\w.]+)",
        r"(?m)^[ \t]*from[ \t]+([\w.]+)[ \t]+import\b",
    ],
    reserved: &[],
};

pub fn extractor() -> Result<PatternExtractor, ExtractError> {
    PatternExtractor::new(Language::Python, &PATTERNS)
}
