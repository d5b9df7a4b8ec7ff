//! C# declaration patterns

use trellis_core::{Language, NodeKind};

use super::patterns::{PatternExtractor, PatternTable};
use crate::extractor::ExtractError;

pub const PATTERNS: PatternTable = PatternTable {
    declarations: &[
        (
            NodeKind::Class,
            r"(?m)^[ \t]*(?P<vis>public[ \t]+)?(?:(?:internal|protected|private|static|sealed|abstract|partial)[ \t]+)*(?:class|record)[ \t]+(?P<name>[A-Za-z_]\w*)[^\n]*",
        ),
        (
            NodeKind::Interface,
            r"(?m)^[ \t]*(?P<vis>public[ \t]+)?(?:(?:internal|protected|private|partial)[ \t]+)*interface[ \t]+(?P<name>[A-Za-z_]\w*)[^\n]*",
        ),
        (
            NodeKind::Struct,
            r"(?m)^[ \t]*(?P<vis>public[ \t]+)?(?:(?:internal|protected|private|readonly|ref|partial)[ \t]+)*struct[ \t]+(?P<name>[A-Za-z_]\w*)[^\n]*",
        ),
        (
            NodeKind::Enum,
            r"(?m)^[ \t]*(?P<vis>public[ \t]+)?(?:(?:internal|protected|private)[ \t]+)*enum[ \t]+(?P<name>[A-Za-z_]\w*)[^\n]*",
        ),
        (
            NodeKind::Method,
            r"(?m)^[ \t]+(?P<vis>public[ \t]+)?(?:(?:internal|protected|private|static|virtual|override|abstract|sealed|async|extern|unsafe|new|partial)[ \t]+)*(?:[\w\[\]<>?.]|,[ \t]*)+[ \t]+(?P<name>[A-Za-z_]\w*)[ \t]*(?:<[^>\n]*>)?\([^)]*\)[ \t]*(?:where[^{\n]*)?\s*(?:\{|=>)",
        ),
    ],
    package: Some(r"(?m)^[ \t]*namespace[ \t]+([\w.]+)"),
    imports: &[r"(?m)^[ \t]*(?:global[ \t]+)?using[ \t]+(?:static[ \t]+)?([\w.]+)[ \t]*;"],
    reserved: &["if", "for", "foreach", "while", "switch", "catch", "return", "new", "else", "using", "lock", "fixed"],
};

pub fn extractor() -> Result<PatternExtractor, ExtractError> {
    PatternExtractor::new(Language::CSharp, &PATTERNS)
}
