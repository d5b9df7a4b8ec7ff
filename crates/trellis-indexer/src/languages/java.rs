//! Java declaration patterns

use trellis_core::{Language, NodeKind};

use super::patterns::{PatternExtractor, PatternTable};
use crate::extractor::ExtractError;

pub const PATTERNS: PatternTable = PatternTable {
    declarations: &[
        (
            NodeKind::Class,
            r"(?m)^[ \t]*(?P<vis>public[ \t]+)?(?:(?:protected|private|abstract|static|final|sealed|non-sealed|strictfp)[ \t]+)*(?:class|record)[ \t]+(?P<name>[A-Za-z_$][\w$]*)[^\n]*",
        ),
        (
            NodeKind::Interface,
            r"(?m)^[ \t]*(?P<vis>public[ \t]+)?(?:(?:protected|private|abstract|static|sealed|non-sealed)[ \t]+)*@?interface[ \t]+(?P<name>[A-Za-z_$][\w$]*)[^\n]*",
        ),
        (
            NodeKind::Enum,
            r"(?m)^[ \t]*(?P<vis>public[ \t]+)?(?:(?:protected|private|static)[ \t]+)*enum[ \t]+(?P<name>[A-Za-z_$][\w$]*)[^\n]*",
        ),
        (
            NodeKind::Method,
            r"(?m)^[ \t]+(?P<vis>public[ \t]+)?(?:(?:protected|private|static|final|abstract|synchronized|native|default)[ \t]+)*(?:<[^>\n]+>[ \t]+)?(?:[\w\[\]<>?.]|,[ \t]*)+[ \t]+(?P<name>[A-Za-z_$][\w$]*)[ \t]*\([^)]*\)[ \t]*(?:throws[ \t]+[\w., \t]+)?\{",
        ),
    ],
    package: Some(r"(?m)^[ \t]*package[ \t]+([\w.]+)[ \t]*;"),
    imports: &[r"(?m)^[ \t]*import[ \t]+(?:static[ \t]+)?([\w.*]+)[ \t]*;"],
    reserved: &["if", "for", "while", "switch", "catch", "return", "new", "else", "synchronized", "try"],
};

pub fn extractor() -> Result<PatternExtractor, ExtractError> {
    PatternExtractor::new(Language::Java, &PATTERNS)
}
