//! Markdown document extractor
//!
//! Produces one Document entity per file: title, H1–H3 headings, a type
//! classified from the path, a bounded excerpt, frontmatter, links to other
//! documents, configured component names and emphasized concept terms.
//! Architecture decision records (`NNN-slug.md` under a decisions directory)
//! also yield a `Decision` child.

use std::collections::BTreeMap;

use regex::Regex;
use trellis_core::{
    ChildEntity, DocType, DocumentMetadata, ExtractionResult, FileMetadata, Language, NodeKind,
    normalize_rel_path, model::parent_dir,
};

use crate::extractor::{ExtractError, LanguageExtractor};

/// Characters kept in the stored excerpt and in each decision section.
pub const EXCERPT_CHARS: usize = 2000;

/// Concepts kept per document.
pub const MAX_CONCEPTS: usize = 20;

/// Path keywords, checked in order; the first hit decides the type.
const DOC_TYPES: &[(&[&str], DocType)] = &[
    (&["overview", "00-"], DocType::Overview),
    (&["architecture", "01-"], DocType::Architecture),
    (&["decision", "02-"], DocType::Decision),
    (&["implementation", "04-"], DocType::Implementation),
    (&["operations", "05-"], DocType::Operations),
    (&["plan", "06-"], DocType::Plan),
];

struct ComponentMatcher {
    name: String,
    regex: Regex,
}

pub struct MarkdownExtractor {
    components: Vec<ComponentMatcher>,
    title: Regex,
    heading: Regex,
    link: Regex,
    code_span: Regex,
    bold: Regex,
    adr_stem: Regex,
    status: Regex,
}

impl std::fmt::Debug for MarkdownExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkdownExtractor")
            .field("components", &self.components.len())
            .finish()
    }
}

impl MarkdownExtractor {
    /// `components` are the names to look for; spaces in them are ignored.
    pub fn new(components: &[String]) -> Result<Self, ExtractError> {
        let components = components
            .iter()
            .map(|name| name.split_whitespace().collect::<String>())
            .filter(|name| !name.is_empty())
            .map(|name| -> Result<ComponentMatcher, ExtractError> {
                let regex = Regex::new(&component_pattern(&name))?;
                Ok(ComponentMatcher { name, regex })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            components,
            title: Regex::new(r"(?m)^#[ \t]+([^\n]+)$")?,
            heading: Regex::new(r"(?m)^#{1,3}[ \t]+([^\n]+)$")?,
            link: Regex::new(r#"\[[^\]]*\]\(<?([^)\s>]+)>?(?:[ \t]+"[^"]*")?\)"#)?,
            code_span: Regex::new(r"`([^`\n]+)`")?,
            bold: Regex::new(r"\*\*([^*\n]+)\*\*")?,
            adr_stem: Regex::new(r"^(\d+)-")?,
            status: Regex::new(r"(?i)\bstatus\**[ \t]*:[ \t]*\**[ \t]*([A-Za-z]+)")?,
        })
    }

    fn references(&self, path: &str, prose: &str) -> Vec<String> {
        let mut references: Vec<String> = Vec::new();
        for caps in self.link.captures_iter(prose) {
            let Some(target) = caps.get(1).map(|m| m.as_str()) else {
                continue;
            };
            if target.contains("://") || target.starts_with("mailto:") || target.starts_with('#') {
                continue;
            }
            let target = target.split(['#', '?']).next().unwrap_or_default();
            if !target.to_ascii_lowercase().ends_with(".md") {
                continue;
            }
            let joined = match target.strip_prefix('/') {
                Some(absolute) => absolute.to_string(),
                None => match parent_dir(path) {
                    "." => target.to_string(),
                    dir => format!("{}/{}", dir, target),
                },
            };
            if let Some(resolved) = normalize_rel_path(&joined) {
                if !references.contains(&resolved) {
                    references.push(resolved);
                }
            }
        }
        references
    }

    fn components(&self, prose: &str) -> Vec<String> {
        self.components
            .iter()
            .filter(|c| c.regex.is_match(prose))
            .map(|c| c.name.clone())
            .collect()
    }

    fn concepts(&self, prose: &str) -> Vec<String> {
        let mut concepts: Vec<String> = Vec::new();
        let mut spans: Vec<_> = self
            .code_span
            .captures_iter(prose)
            .chain(self.bold.captures_iter(prose))
            .filter_map(|caps| caps.get(1))
            .collect();
        spans.sort_by_key(|m| m.start());
        for term in spans.iter().map(|m| m.as_str().trim()) {
            let len = term.chars().count();
            if len <= 2 || len >= 50 || term.starts_with('/') {
                continue;
            }
            if !concepts.iter().any(|c| c == term) {
                concepts.push(term.to_string());
                if concepts.len() == MAX_CONCEPTS {
                    break;
                }
            }
        }
        concepts
    }

    fn decision(&self, path: &str, title: &str, body: &str) -> Option<ChildEntity> {
        let stem = file_stem(path);
        let id = self.adr_stem.captures(stem)?.get(1)?.as_str().to_string();
        let lowered = path.to_ascii_lowercase();
        let in_decision_dir = lowered
            .split('/')
            .rev()
            .skip(1)
            .any(|dir| dir.starts_with("decision") || dir == "adr" || dir == "adrs");
        if !in_decision_dir && !lowered.contains("02-") {
            return None;
        }

        let sections = decision_sections(body);
        let status = self
            .status
            .captures(body)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .or_else(|| {
                sections
                    .get("status")
                    .and_then(|s| s.split_whitespace().next())
                    .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            })
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "accepted".to_string())
            .to_lowercase();

        let mut child = ChildEntity::new(NodeKind::Decision, title)
            .with_attribute("id", id)
            .with_attribute("status", status);
        for key in ["context", "decision", "consequences"] {
            if let Some(text) = sections.get(key).filter(|t| !t.is_empty()) {
                child = child.with_attribute(key, truncate(text, EXCERPT_CHARS));
            }
        }
        Some(child)
    }
}

impl LanguageExtractor for MarkdownExtractor {
    fn language(&self) -> Language {
        Language::Markdown
    }

    fn extract(&self, path: &str, content: &str) -> Result<ExtractionResult, ExtractError> {
        let (frontmatter, body) = split_frontmatter(content);
        let prose = strip_code_blocks(body);

        let title = self
            .title
            .captures(&prose)
            .and_then(|caps| caps.get(1))
            .map(|m| clean_heading(m.as_str()))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| title_from_stem(file_stem(path)));

        let headings = self
            .heading
            .captures_iter(&prose)
            .filter_map(|caps| caps.get(1))
            .map(|m| clean_heading(m.as_str()))
            .filter(|h| !h.is_empty())
            .collect();

        let children = self.decision(path, &title, body).into_iter().collect();

        let metadata = DocumentMetadata {
            headings,
            doc_type: classify(path),
            excerpt: truncate(body.trim(), EXCERPT_CHARS),
            frontmatter,
            references: self.references(path, &prose),
            components: self.components(&prose),
            concepts: self.concepts(&prose),
            title,
        };

        Ok(ExtractionResult {
            language: Language::Markdown,
            metadata: FileMetadata::Document(metadata),
            children,
        })
    }
}

/// Document type from path keywords alone.
pub fn classify(path: &str) -> DocType {
    let lowered = path.to_ascii_lowercase();
    DOC_TYPES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(_, doc_type)| *doc_type)
        .unwrap_or_default()
}

/// `getting-started_guide` → `Getting Started Guide`
pub fn title_from_stem(stem: &str) -> String {
    stem.split(['-', '_', ' '])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Split a leading `---` block of `key: value` lines from the body.
fn split_frontmatter(content: &str) -> (BTreeMap<String, String>, &str) {
    let mut frontmatter = BTreeMap::new();
    let Some(rest) = content.strip_prefix("---") else {
        return (frontmatter, content);
    };
    let Some(rest) = rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n")) else {
        return (frontmatter, content);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        offset += line.len();
        let trimmed = line.trim();
        if trimmed == "---" {
            return (frontmatter, &rest[offset..]);
        }
        if trimmed.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = trimmed.split_once(':') {
            let key = key.trim();
            if !key.is_empty() {
                let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
                frontmatter.insert(key.to_string(), value.to_string());
            }
        }
    }
    // Unterminated block: treat the whole file as body.
    (BTreeMap::new(), content)
}

/// Blank out fenced code blocks so their contents are not read as headings or terms.
fn strip_code_blocks(body: &str) -> String {
    let mut prose = String::with_capacity(body.len());
    let mut fence: Option<&str> = None;
    for line in body.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let marker = if trimmed.starts_with("```") {
            Some("```")
        } else if trimmed.starts_with("~~~") {
            Some("~~~")
        } else {
            None
        };
        match (fence, marker) {
            (None, Some(m)) => fence = Some(m),
            (Some(open), Some(m)) if open == m => fence = None,
            (None, None) => prose.push_str(line),
            _ => {}
        }
        if fence.is_some() || marker.is_some() {
            prose.push('\n');
        }
    }
    prose
}

/// Lower-cased section name → text, for `##`/`###` sections.
fn decision_sections(body: &str) -> BTreeMap<String, String> {
    const KEYS: [&str; 4] = ["context", "decision", "consequences", "status"];
    let mut sections: BTreeMap<String, String> = BTreeMap::new();
    let mut current: Option<&str> = None;

    for line in body.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('#') {
            let level = trimmed.chars().take_while(|c| *c == '#').count();
            let heading = clean_heading(trimmed.trim_start_matches('#')).to_lowercase();
            current = if (2..=3).contains(&level) {
                KEYS.into_iter().find(|key| heading.starts_with(key))
            } else {
                None
            };
            continue;
        }
        if let Some(key) = current {
            let text = sections.entry(key.to_string()).or_default();
            text.push_str(line);
            text.push('\n');
        }
    }
    for text in sections.values_mut() {
        *text = text.trim().to_string();
    }
    sections
}

/// Regex for a component name, tolerant of case and of spaces between camel-case humps.
fn component_pattern(name: &str) -> String {
    let mut humps: Vec<String> = Vec::new();
    let mut previous: Option<char> = None;
    for c in name.chars() {
        let boundary = c.is_uppercase()
            && previous.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit());
        if boundary || humps.is_empty() {
            humps.push(String::new());
        }
        if let Some(hump) = humps.last_mut() {
            hump.push(c);
        }
        previous = Some(c);
    }
    let body = humps
        .iter()
        .map(|h| regex::escape(h))
        .collect::<Vec<_>>()
        .join(r"[ \t_-]?");
    format!(r"(?i)\b{}\b", body)
}

fn clean_heading(text: &str) -> String {
    text.trim().trim_end_matches('#').trim().to_string()
}

fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
