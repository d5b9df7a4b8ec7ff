//! Regex-driven extraction shared by every non-structural language
//!
//! Each language supplies a [`PatternTable`]: multi-line regexes for
//! declarations (with a `name` capture and an optional `vis` capture for the
//! export marker), plus package and import patterns whose first capture group
//! is the value. Matches inside comments or strings are not filtered out;
//! names in the table's `reserved` list (control-flow keywords a loose method
//! pattern can pick up) are.

use regex::Regex;
use trellis_core::{ChildEntity, CodeMetadata, ExtractionResult, FileMetadata, Language, NodeKind};

use crate::extractor::{ExtractError, LanguageExtractor};

/// Static description of one language's declaration syntax.
#[derive(Debug, Clone, Copy)]
pub struct PatternTable {
    pub declarations: &'static [(NodeKind, &'static str)],
    pub package: Option<&'static str>,
    pub imports: &'static [&'static str],
    pub reserved: &'static [&'static str],
}

struct DeclarationRule {
    kind: NodeKind,
    regex: Regex,
    has_visibility: bool,
}

pub struct PatternExtractor {
    language: Language,
    rules: Vec<DeclarationRule>,
    package: Option<Regex>,
    imports: Vec<Regex>,
    reserved: &'static [&'static str],
}

impl std::fmt::Debug for PatternExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternExtractor")
            .field("language", &self.language)
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl PatternExtractor {
    pub fn new(language: Language, table: &PatternTable) -> Result<Self, ExtractError> {
        let rules = table
            .declarations
            .iter()
            .map(|(kind, pattern)| -> Result<DeclarationRule, ExtractError> {
                let regex = Regex::new(pattern)?;
                let has_visibility = regex.capture_names().any(|n| n == Some("vis"));
                Ok(DeclarationRule { kind: *kind, regex, has_visibility })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let package = table.package.map(Regex::new).transpose()?;
        let imports = table
            .imports
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            language,
            rules,
            package,
            imports,
            reserved: table.reserved,
        })
    }
}

impl LanguageExtractor for PatternExtractor {
    fn language(&self) -> Language {
        self.language
    }

    fn extract(&self, _path: &str, content: &str) -> Result<ExtractionResult, ExtractError> {
        let lines = LineIndex::new(content);
        let mut found: Vec<(usize, ChildEntity)> = Vec::new();

        for rule in &self.rules {
            for caps in rule.regex.captures_iter(content) {
                let Some(name) = caps.name("name") else {
                    continue;
                };
                if self.reserved.contains(&name.as_str()) {
                    continue;
                }
                let Some(whole) = caps.get(0) else {
                    continue;
                };
                let line = lines.line_of(name.start());
                let mut child = ChildEntity::new(rule.kind, name.as_str())
                    .with_signature(header(whole.as_str()));
                child.line_start = Some(line);
                if rule.has_visibility {
                    child.exported = Some(caps.name("vis").is_some());
                }
                found.push((name.start(), child));
            }
        }
        found.sort_by_key(|(offset, _)| *offset);

        let package = self
            .package
            .as_ref()
            .and_then(|re| re.captures(content))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string());

        let mut imports: Vec<String> = Vec::new();
        for re in &self.imports {
            for caps in re.captures_iter(content) {
                if let Some(m) = caps.get(1) {
                    let import = m.as_str().trim();
                    if !import.is_empty() && !imports.iter().any(|i| i == import) {
                        imports.push(import.to_string());
                    }
                }
            }
        }

        Ok(ExtractionResult {
            language: self.language,
            metadata: FileMetadata::Code(CodeMetadata { package, imports }),
            children: found.into_iter().map(|(_, child)| child).collect(),
        })
    }
}

/// The matched declaration text on one line, without a trailing opener.
fn header(matched: &str) -> String {
    let line = matched.split_whitespace().collect::<Vec<_>>().join(" ");
    let line = line.strip_suffix("=>").unwrap_or(&line);
    line.trim_end().trim_end_matches(['{', ':']).trim_end().to_string()
}

/// Byte offset → 1-based line number.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    fn line_of(&self, offset: usize) -> u32 {
        match self.starts.binary_search(&offset) {
            Ok(line) => line as u32 + 1,
            Err(next) => next as u32,
        }
    }
}
