//! Ruby declaration patterns

use trellis_core::{Language, NodeKind};

use super::patterns::{PatternExtractor, PatternTable};
use crate::extractor::ExtractError;

pub const PATTERNS: PatternTable = PatternTable {
    declarations: &[
        (NodeKind::Class, r"(?m)^[ \t]*class[ \t]+(?P<name>[A-Z][\w:]*)[^\n]*"),
        (NodeKind::Module, r"(?m)^[ \t]*module[ \t]+(?P<name>[A-Z][\w:]*)[^\n]*"),
        (
            NodeKind::Function,
            r"(?m)^def[ \t]+(?P<name>[A-Za-z_]\w*[?!=]?)[^\n]*",
        ),
        (
            NodeKind::Method,
            r"(?m)^[ \t]+def[ \t]+(?P<name>(?:self\.)?[A-Za-z_]\w*[?!=]?)[^\n]*",
        ),
    ],
    package: None,
    imports: &[r#"(?m)^[ \t]*require(?:_relative)?[ \t(]+['"]([^'"]+)['"]"#],
    reserved: &[],
};

pub fn extractor() -> Result<PatternExtractor, ExtractError> {
    PatternExtractor::new(Language::Ruby, &PATTERNS)
}
