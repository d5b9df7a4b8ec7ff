//! C and C++ declaration patterns
//!
//! Only definitions are matched: functions need a body, structs and enums need
//! a brace, so prototypes and forward declarations in headers are skipped.

use trellis_core::{Language, NodeKind};

use super::patterns::{PatternExtractor, PatternTable};
use crate::extractor::ExtractError;

const INCLUDES: &[&str] = &[r#"(?m)^[ \t]*#[ \t]*include[ \t]*[<"]([^>"]+)[>"]"#];

const RESERVED: &[&str] = &["if", "for", "while", "switch", "return", "sizeof", "else", "do"];

pub const C_PATTERNS: PatternTable = PatternTable {
    declarations: &[
        (
            NodeKind::Function,
            r"(?m)^(?:(?:static|inline|extern|const|unsigned|signed|struct|enum|volatile)[ \t]+)*[A-Za-z_]\w*[ \t\*]+(?P<name>[A-Za-z_]\w*)[ \t]*\([^;{)]*\)\s*\{",
        ),
        (
            NodeKind::Struct,
            r"(?m)^[ \t]*(?:typedef[ \t]+)?struct[ \t]+(?P<name>[A-Za-z_]\w*)\s*\{",
        ),
        (
            NodeKind::Enum,
            r"(?m)^[ \t]*(?:typedef[ \t]+)?enum[ \t]+(?P<name>[A-Za-z_]\w*)\s*\{",
        ),
        (
            NodeKind::TypeAlias,
            r"(?m)^[ \t]*typedef[ \t]+[^;{}]*?[ \t\*](?P<name>[A-Za-z_]\w*)[ \t]*;",
        ),
    ],
    package: None,
    imports: INCLUDES,
    reserved: RESERVED,
};

pub const CPP_PATTERNS: PatternTable = PatternTable {
    declarations: &[
        (
            NodeKind::Function,
            r"(?m)^(?:template[ \t]*<[^>\n]*>[ \t]*)?(?:(?:static|inline|extern|constexpr|virtual|const|unsigned|signed)[ \t]+)*[A-Za-z_][\w:<>,]*[ \t\*&]+(?P<name>[A-Za-z_]\w*)[ \t]*\([^;{)]*\)[^;{\n]*\{",
        ),
        (
            NodeKind::Method,
            r"(?m)^(?:[A-Za-z_][\w:<>,\*&]*[ \t]+)*?(?P<name>[A-Za-z_]\w*::~?[A-Za-z_]\w*)[ \t]*\([^;{)]*\)[^;{\n]*\{",
        ),
        (
            NodeKind::Class,
            r"(?m)^[ \t]*(?:template[ \t]*<[^>\n]*>[ \t]*)?class[ \t]+(?P<name>[A-Za-z_]\w*)[^;\n]*$",
        ),
        (
            NodeKind::Struct,
            r"(?m)^[ \t]*(?:typedef[ \t]+)?struct[ \t]+(?P<name>[A-Za-z_]\w*)[^;\n]*\{",
        ),
        (
            NodeKind::Enum,
            r"(?m)^[ \t]*enum[ \t]+(?:class[ \t]+)?(?P<name>[A-Za-z_]\w*)[^;\n]*\{",
        ),
        (
            NodeKind::TypeAlias,
            r"(?m)^[ \t]*using[ \t]+(?P<name>[A-Za-z_]\w*)[ \t]*=[^\n]*",
        ),
        (
            NodeKind::Module,
            r"(?m)^[ \t]*namespace[ \t]+(?P<name>[A-Za-z_][\w:]*)[^;\n]*$",
        ),
    ],
    package: None,
    imports: INCLUDES,
    reserved: RESERVED,
};

pub fn c_extractor() -> Result<PatternExtractor, ExtractError> {
    PatternExtractor::new(Language::C, &C_PATTERNS)
}

pub fn cpp_extractor() -> Result<PatternExtractor, ExtractError> {
    PatternExtractor::new(Language::Cpp, &CPP_PATTERNS)
}
