//! Rust declaration patterns

use trellis_core::{Language, NodeKind};

use super::patterns::{PatternExtractor, PatternTable};
use crate::extractor::ExtractError;

pub const PATTERNS: PatternTable = PatternTable {
    declarations: &[
        (
            NodeKind::Function,
            r#"(?m)^[ \t]*(?P<vis>pub(?:\([^)]*\))?[ \t]+)?(?:(?:const|async|unsafe|extern(?:[ \t]+"[^"]*")?)[ \t]+)*fn[ \t]+(?P<name>[A-Za-z_]\w*)[^\n]*"#,
        ),
        (
            NodeKind::Struct,
            r"(?m)^[ \t]*(?P<vis>pub(?:\([^)]*\))?[ \t]+)?struct[ \t]+(?P<name>[A-Za-z_]\w*)[^\n]*",
        ),
        (
            NodeKind::Enum,
            r"(?m)^[ \t]*(?P<vis>pub(?:\([^)]*\))?[ \t]+)?enum[ \t]+(?P<name>[A-Za-z_]\w*)[^\n]*",
        ),
        (
            NodeKind::Trait,
            r"(?m)^[ \t]*(?P<vis>pub(?:\([^)]*\))?[ \t]+)?(?:unsafe[ \t]+)?trait[ \t]+(?P<name>[A-Za-z_]\w*)[^\n]*",
        ),
        (
            NodeKind::TypeAlias,
            r"(?m)^[ \t]*(?P<vis>pub(?:\([^)]*\))?[ \t]+)?type[ \t]+(?P<name>[A-Za-z_]\w*)[^;\n]*=[^\n]*",
        ),
        (
            NodeKind::Module,
            r"(?m)^[ \t]*(?P<vis>pub(?:\([^)]*\))?[ \t]+)?mod[ \t]+(?P<name>[A-Za-z_]\w*)[^\n]*",
        ),
    ],
    package: None,
    imports: &[r"(?m)^[ \t]*(?:pub(?:\([^)]*\))?[ \t]+)?use[ \t]+([^;]+);"],
    reserved: &[],
};

pub fn extractor() -> Result<PatternExtractor, ExtractError> {
    PatternExtractor::new(Language::Rust, &PATTERNS)
}
