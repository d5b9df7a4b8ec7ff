//! JavaScript declaration patterns

use trellis_core::{Language, NodeKind};

use super::patterns::{PatternExtractor, PatternTable};
use crate::extractor::ExtractError;

/// ES module, re-export and CommonJS imports.
pub(crate) const ES_IMPORTS: &[&str] = &[
    r#"(?m)^[ \t]*import[ \t][^'";]*?from[ \t]*['"]([^'"]+)['"]"#,
    r#"(?m)^[ \t]*import[ \t]*['"]([^'"]+)['"]"#,
    r#"(?m)^[ \t]*export[ \t][^'";]*?from[ \t]*['"]([^'"]+)['"]"#,
    r#"\brequire\([ \t]*['"]([^'"]+)['"][ \t]*\)"#,
];

/// Control flow that the loose method pattern would otherwise pick up.
pub(crate) const ES_RESERVED: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "function", "constructor", "else", "do",
    "with",
];

pub const PATTERNS: PatternTable = PatternTable {
    declarations: &[
        (
            NodeKind::Function,
            r"(?m)^[ \t]*(?P<vis>export[ \t]+)?(?:default[ \t]+)?(?:async[ \t]+)?function\*?[ \t]*(?P<name>[A-Za-z_$][\w$]*)[^\n]*",
        ),
        (
            NodeKind::Function,
            r"(?m)^[ \t]*(?P<vis>export[ \t]+)?(?:const|let|var)[ \t]+(?P<name>[A-Za-z_$][\w$]*)[ \t]*=[ \t]*(?:async[ \t]+)?(?:\([^)\n]*\)|[A-Za-z_$][\w$]*)[ \t]*=>",
        ),
        (
            NodeKind::Class,
            r"(?m)^[ \t]*(?P<vis>export[ \t]+)?(?:default[ \t]+)?class[ \t]+(?P<name>[A-Za-z_$][\w$]*)[^\n]*",
        ),
        (
            NodeKind::Method,
            r"(?m)^[ \t]+(?:(?:static|async|get|set)[ \t]+)*(?P<name>[A-Za-z_$][\w$]*)[ \t]*\([^)\n]*\)[ \t]*\{",
        ),
    ],
    package: None,
    imports: ES_IMPORTS,
    reserved: ES_RESERVED,
};

pub fn extractor() -> Result<PatternExtractor, ExtractError> {
    PatternExtractor::new(Language::JavaScript, &PATTERNS)
}
