//! Go language extractor using tree-sitter
//!
//! The only structural extractor: it walks the syntax tree, so braces inside
//! strings and comments never confuse declaration boundaries.

use tree_sitter::{Node, Parser};
use trellis_core::{ChildEntity, CodeMetadata, ExtractionResult, FileMetadata, Language, NodeKind};

use crate::extractor::{ExtractError, LanguageExtractor};

#[derive(Debug, Default)]
pub struct GoExtractor;

impl GoExtractor {
    pub fn new() -> Self {
        Self
    }

    fn parser(path: &str) -> Result<Parser, ExtractError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .map_err(|e| ExtractError::Parser {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        Ok(parser)
    }
}

impl LanguageExtractor for GoExtractor {
    fn language(&self) -> Language {
        Language::Go
    }

    fn extract(&self, path: &str, content: &str) -> Result<ExtractionResult, ExtractError> {
        // tree_sitter::Parser is not Sync; a fresh one per file is cheap enough.
        let mut parser = Self::parser(path)?;
        let tree = parser.parse(content, None).ok_or_else(|| ExtractError::Parser {
            path: path.to_string(),
            reason: "parser returned no tree".to_string(),
        })?;

        let source = content.as_bytes();
        let root = tree.root_node();
        let mut code = CodeMetadata::default();
        let mut children = Vec::new();

        let mut cursor = root.walk();
        for node in root.named_children(&mut cursor) {
            match node.kind() {
                "package_clause" => code.package = package_name(node, source),
                "import_declaration" => collect_imports(node, source, &mut code.imports),
                "function_declaration" => children.extend(function(node, source)),
                "method_declaration" => children.extend(method(node, source)),
                "type_declaration" => collect_types(node, source, &mut children),
                _ => {}
            }
        }

        Ok(ExtractionResult {
            language: Language::Go,
            metadata: FileMetadata::Code(code),
            children,
        })
    }
}

fn text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or_default()
}

/// Collapse runs of whitespace (including newlines) to single spaces.
fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

fn lines(node: Node) -> (u32, u32) {
    (
        node.start_position().row as u32 + 1,
        node.end_position().row as u32 + 1,
    )
}

/// Declaration text from its start up to the body.
fn signature(node: Node, source: &[u8]) -> String {
    let end = node
        .child_by_field_name("body")
        .map(|body| body.start_byte())
        .unwrap_or_else(|| node.end_byte());
    let header = std::str::from_utf8(&source[node.start_byte()..end]).unwrap_or_default();
    squash(header)
}

fn package_name(node: Node, source: &[u8]) -> Option<String> {
    let mut cursor = node.walk();
    let name = node
        .named_children(&mut cursor)
        .find(|child| child.kind() == "package_identifier")
        .map(|child| text(child, source).to_string());
    name
}

fn collect_imports(node: Node, source: &[u8], imports: &mut Vec<String>) {
    if node.kind() == "import_spec" {
        if let Some(path) = node.child_by_field_name("path") {
            let import = text(path, source).trim_matches(|c| c == '"' || c == '`');
            if !import.is_empty() && !imports.iter().any(|i| i == import) {
                imports.push(import.to_string());
            }
        }
        return;
    }
    // import_declaration and import_spec_list
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_imports(child, source, imports);
    }
}

fn function(node: Node, source: &[u8]) -> Option<ChildEntity> {
    let name = text(node.child_by_field_name("name")?, source);
    let (start, end) = lines(node);
    Some(
        ChildEntity::new(NodeKind::Function, name)
            .with_signature(signature(node, source))
            .with_exported(is_exported(name))
            .with_lines(start, end),
    )
}

fn method(node: Node, source: &[u8]) -> Option<ChildEntity> {
    let name = text(node.child_by_field_name("name")?, source);
    let (start, end) = lines(node);
    let mut child = ChildEntity::new(NodeKind::Method, name)
        .with_signature(signature(node, source))
        .with_exported(is_exported(name))
        .with_lines(start, end);
    child.receiver = node
        .child_by_field_name("receiver")
        .and_then(|receiver| receiver_type(receiver, source));
    Some(child)
}

/// `(s *Server)` → `*Server`
fn receiver_type(params: Node, source: &[u8]) -> Option<String> {
    let mut cursor = params.walk();
    let receiver = params
        .named_children(&mut cursor)
        .find(|child| child.kind() == "parameter_declaration")
        .and_then(|decl| decl.child_by_field_name("type"))
        .map(|ty| squash(text(ty, source)));
    receiver
}

fn collect_types(node: Node, source: &[u8], children: &mut Vec<ChildEntity>) {
    let mut cursor = node.walk();
    for spec in node.named_children(&mut cursor) {
        if !matches!(spec.kind(), "type_spec" | "type_alias") {
            continue;
        }
        let Some(name_node) = spec.child_by_field_name("name") else {
            continue;
        };
        let name = text(name_node, source);
        let ty = spec.child_by_field_name("type");

        let (kind, members) = match ty.map(|t| t.kind()) {
            Some("struct_type") => (NodeKind::Struct, ty.map(|t| struct_fields(t, source))),
            Some("interface_type") => (NodeKind::Interface, ty.map(|t| interface_methods(t, source))),
            _ => (NodeKind::TypeAlias, None),
        };

        // A single ungrouped spec spans the whole `type X ...` declaration.
        let span = if node.named_child_count() == 1 { node } else { spec };
        let (start, end) = lines(span);
        let mut child = ChildEntity::new(kind, name)
            .with_exported(is_exported(name))
            .with_lines(start, end);
        if kind == NodeKind::TypeAlias {
            child.signature = Some(squash(text(spec, source)));
        }
        child.members = members.unwrap_or_default();
        children.push(child);
    }
}

/// `name type` per field; embedded fields contribute their type only.
fn struct_fields(struct_type: Node, source: &[u8]) -> Vec<String> {
    let mut fields = Vec::new();
    let mut cursor = struct_type.walk();
    let Some(list) = struct_type
        .named_children(&mut cursor)
        .find(|child| child.kind() == "field_declaration_list")
    else {
        return fields;
    };

    let mut list_cursor = list.walk();
    for decl in list.named_children(&mut list_cursor) {
        if decl.kind() != "field_declaration" {
            continue;
        }
        let Some(ty) = decl.child_by_field_name("type") else {
            continue;
        };
        let ty = squash(text(ty, source));
        let mut name_cursor = decl.walk();
        let names: Vec<&str> = decl
            .children_by_field_name("name", &mut name_cursor)
            .map(|n| text(n, source))
            .collect();
        if names.is_empty() {
            fields.push(ty);
        } else {
            fields.extend(names.into_iter().map(|name| format!("{} {}", name, ty)));
        }
    }
    fields
}

fn interface_methods(interface_type: Node, source: &[u8]) -> Vec<String> {
    let mut cursor = interface_type.walk();
    interface_type
        .named_children(&mut cursor)
        .filter(|child| matches!(child.kind(), "method_elem" | "method_spec"))
        .map(|child| squash(text(child, source)))
        .collect()
}
