//! TypeScript declaration patterns

use trellis_core::{Language, NodeKind};

use super::javascript::{ES_IMPORTS, ES_RESERVED};
use super::patterns::{PatternExtractor, PatternTable};
use crate::extractor::ExtractError;

pub const PATTERNS: PatternTable = PatternTable {
    declarations: &[
        (
            NodeKind::Function,
            r"(?m)^[ \t]*(?P<vis>export[ \t]+)?(?:default[ \t]+)?(?:declare[ \t]+)?(?:async[ \t]+)?function\*?[ \t]*(?P<name>[A-Za-z_$][\w$]*)[^\n]*",
        ),
        (
            NodeKind::Function,
            r"(?m)^[ \t]*(?P<vis>export[ \t]+)?(?:const|let|var)[ \t]+(?P<name>[A-Za-z_$][\w$]*)[ \t]*(?::[^=\n]+)?=[ \t]*(?:async[ \t]+)?(?:\([^)\n]*\)|[A-Za-z_$][\w$]*)[ \t]*(?::[^=\n]+)?=>",
        ),
        (
            NodeKind::Class,
            r"(?m)^[ \t]*(?P<vis>export[ \t]+)?(?:default[ \t]+)?(?:declare[ \t]+)?(?:abstract[ \t]+)?class[ \t]+(?P<name>[A-Za-z_$][\w$]*)[^\n]*",
        ),
        (
            NodeKind::Interface,
            r"(?m)^[ \t]*(?P<vis>export[ \t]+)?(?:declare[ \t]+)?interface[ \t]+(?P<name>[A-Za-z_$][\w$]*)[^\n]*",
        ),
        (
            NodeKind::TypeAlias,
            r"(?m)^[ \t]*(?P<vis>export[ \t]+)?(?:declare[ \t]+)?type[ \t]+(?P<name>[A-Za-z_$][\w$]*)[ \t]*(?:<[^>\n]*>)?[ \t]*=[^\n]*",
        ),
        (
            NodeKind::Enum,
            r"(?m)^[ \t]*(?P<vis>export[ \t]+)?(?:declare[ \t]+)?(?:const[ \t]+)?enum[ \t]+(?P<name>[A-Za-z_$][\w$]*)[^\n]*",
        ),
        (
            NodeKind::Module,
            r"(?m)^[ \t]*(?P<vis>export[ \t]+)?(?:declare[ \t]+)?namespace[ \t]+(?P<name>[A-Za-z_$][\w$.]*)[^\n]*",
        ),
        (
            NodeKind::Method,
            r"(?m)^[ \t]+(?:(?:public|private|protected|static|async|readonly|override|abstract|get|set)[ \t]+)*(?P<name>[A-Za-z_$][\w$]*)[ \t]*(?:<[^>\n]*>)?\([^)\n]*\)[ \t]*(?::[^{;\n]+)?\{",
        ),
    ],
    package: None,
    imports: ES_IMPORTS,
    reserved: ES_RESERVED,
};

pub fn extractor() -> Result<PatternExtractor, ExtractError> {
    PatternExtractor::new(Language::TypeScript, &PATTERNS)
}
