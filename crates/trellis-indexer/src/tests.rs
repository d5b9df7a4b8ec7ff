//! Unit tests for trellis-indexer

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use trellis_core::{
    ChildEntity, DocType, EdgeKind, ExtractionResult, FileMetadata, GraphStore, Language,
    MemoryGraphStore, Namespace, NodeKind, SourceKind, SourceLink, StoreError, TrellisConfig,
};

use crate::languages::markdown::{classify, title_from_stem};
use crate::languages::{self, GoExtractor, MarkdownExtractor};
use crate::*;

const SERVER_GO: &str = r#"package server

import (
	"context"
	"fmt"
)

// Server handles requests.
type Server struct {
	Addr string
	log  *Logger
	Handler
}

type Runner interface {
	Run(ctx context.Context) error
}

type ID = string

func New(addr string) *Server {
	return &Server{Addr: addr}
}

func (s *Server) Start() error {
	fmt.Println("{ not a brace }")
	return nil
}

func helper() {}
"#;

fn code(result: &ExtractionResult) -> &trellis_core::CodeMetadata {
    match &result.metadata {
        FileMetadata::Code(code) => code,
        other => panic!("expected code metadata, got {:?}", other),
    }
}

fn doc(result: &ExtractionResult) -> &trellis_core::DocumentMetadata {
    match &result.metadata {
        FileMetadata::Document(doc) => doc,
        other => panic!("expected document metadata, got {:?}", other),
    }
}

fn names(result: &ExtractionResult) -> Vec<(NodeKind, &str)> {
    result.children.iter().map(|c| (c.kind, c.name.as_str())).collect()
}

fn child<'a>(result: &'a ExtractionResult, name: &str) -> &'a ChildEntity {
    result
        .children
        .iter()
        .find(|c| c.name == name)
        .unwrap_or_else(|| panic!("no child named {}", name))
}

// ── Go ──────────────────────────────────────────────────────────────────

#[test]
fn test_go_declarations() {
    let result = GoExtractor::new().extract("internal/server/server.go", SERVER_GO).unwrap();

    assert_eq!(result.language, Language::Go);
    assert_eq!(code(&result).package.as_deref(), Some("server"));
    assert_eq!(code(&result).imports, vec!["context", "fmt"]);
    assert_eq!(
        names(&result),
        vec![
            (NodeKind::Struct, "Server"),
            (NodeKind::Interface, "Runner"),
            (NodeKind::TypeAlias, "ID"),
            (NodeKind::Function, "New"),
            (NodeKind::Method, "Start"),
            (NodeKind::Function, "helper"),
        ]
    );
}

#[test]
fn test_go_outline_line_ranges() {
    let result = GoExtractor::new().extract("server.go", SERVER_GO).unwrap();
    let outline: Vec<String> = result
        .children
        .iter()
        .map(|c| {
            format!(
                "{} {} {}-{}",
                c.kind.label(),
                c.name,
                c.line_start.unwrap_or_default(),
                c.line_end.unwrap_or_default()
            )
        })
        .collect();

    insta::assert_snapshot!(outline.join("\n"), @r"
    Struct Server 9-13
    Interface Runner 15-17
    Type ID 19-19
    Function New 21-23
    Method Start 25-28
    Function helper 30-30
    ");
}

#[test]
fn test_go_method_receiver() {
    let result = GoExtractor::new().extract("server.go", SERVER_GO).unwrap();
    let start = child(&result, "Start");

    assert_eq!(start.receiver.as_deref(), Some("*Server"));
    assert_eq!(start.exported, Some(true));
    assert_eq!(start.signature.as_deref(), Some("func (s *Server) Start() error"));
    assert_eq!(start.line_start, Some(25));
    assert_eq!(start.line_end, Some(28));

    assert_eq!(child(&result, "helper").exported, Some(false));
    assert_eq!(
        child(&result, "New").signature.as_deref(),
        Some("func New(addr string) *Server")
    );
}

#[test]
fn test_go_type_members() {
    let result = GoExtractor::new().extract("server.go", SERVER_GO).unwrap();

    let server = child(&result, "Server");
    assert_eq!(server.members, vec!["Addr string", "log *Logger", "Handler"]);
    assert_eq!(server.line_start, Some(9));
    assert_eq!(server.line_end, Some(13));

    let runner = child(&result, "Runner");
    assert_eq!(runner.members, vec!["Run(ctx context.Context) error"]);

    let id = child(&result, "ID");
    assert_eq!(id.signature.as_deref(), Some("ID = string"));
}

#[test]
fn test_go_grouped_types_and_single_import() {
    let source = "package model\n\nimport \"time\"\n\ntype (\n\tA struct{}\n\tb int\n)\n";
    let result = GoExtractor::new().extract("model/types.go", source).unwrap();

    assert_eq!(code(&result).imports, vec!["time"]);
    assert_eq!(names(&result), vec![(NodeKind::Struct, "A"), (NodeKind::TypeAlias, "b")]);
    assert_eq!(child(&result, "A").line_start, Some(6));
    assert_eq!(child(&result, "b").exported, Some(false));
}

#[test]
fn test_go_empty_file() {
    let result = GoExtractor::new().extract("empty.go", "").unwrap();
    assert!(result.children.is_empty());
    assert_eq!(code(&result).package, None);
}

// ── Pattern languages ───────────────────────────────────────────────────

#[test]
fn test_pattern_extractor_without_matches() {
    let result = languages::python::extractor()
        .unwrap()
        .extract("notes.py", "# nothing here\nx = 1\n")
        .unwrap();
    assert!(result.children.is_empty());
    assert!(code(&result).imports.is_empty());
}

#[test]
fn test_rust_patterns() {
    let source = r#"use std::sync::Arc;
use crate::model::{Node, Edge};

pub struct Graph {
    nodes: Vec<Node>,
}

enum State { Idle, Busy }

pub trait Store: Send {
    fn get(&self) -> Option<Node>;
}

pub(crate) type Map = HashMap<String, Node>;

impl Graph {
    pub async fn load(path: &Path) -> Result<Self> {
        todo!()
    }
}

mod tests;
"#;
    let result = languages::rust::extractor().unwrap().extract("src/graph.rs", source).unwrap();

    assert_eq!(
        names(&result),
        vec![
            (NodeKind::Struct, "Graph"),
            (NodeKind::Enum, "State"),
            (NodeKind::Trait, "Store"),
            (NodeKind::Function, "get"),
            (NodeKind::TypeAlias, "Map"),
            (NodeKind::Function, "load"),
            (NodeKind::Module, "tests"),
        ]
    );
    assert_eq!(code(&result).imports, vec!["std::sync::Arc", "crate::model::{Node, Edge}"]);
    assert_eq!(child(&result, "Graph").exported, Some(true));
    assert_eq!(child(&result, "State").exported, Some(false));
    assert_eq!(child(&result, "load").line_start, Some(17));
    assert_eq!(
        child(&result, "load").signature.as_deref(),
        Some("pub async fn load(path: &Path) -> Result<Self>")
    );
}

#[test]
fn test_python_functions_and_methods() {
    let source = "import os\nfrom app.models import User\n\nclass Service:\n    def run(self):\n        pass\n\nasync def main() -> None:\n    pass\n";
    let result = languages::python::extractor().unwrap().extract("app/service.py", source).unwrap();

    assert_eq!(
        names(&result),
        vec![
            (NodeKind::Class, "Service"),
            (NodeKind::Method, "run"),
            (NodeKind::Function, "main"),
        ]
    );
    assert_eq!(code(&result).imports, vec!["os", "app.models"]);
    assert_eq!(child(&result, "main").signature.as_deref(), Some("async def main() -> None"));
    assert_eq!(child(&result, "run").exported, None);
}

#[test]
fn test_typescript_patterns() {
    let source = r#"import { Router } from "./router";
import "./polyfill";

export interface Handler {
  handle(req: Request): Response;
}

export type Pair<K, V> = [K, V];

export const route = async (path: string) => {
  return path;
};

export class App {
  start(port: number): void {
    if (port) {
      listen(port);
    }
  }
}

function internal() {}
"#;
    let result = languages::typescript::extractor().unwrap().extract("web/app.ts", source).unwrap();

    assert_eq!(
        names(&result),
        vec![
            (NodeKind::Interface, "Handler"),
            (NodeKind::TypeAlias, "Pair"),
            (NodeKind::Function, "route"),
            (NodeKind::Class, "App"),
            (NodeKind::Method, "start"),
            (NodeKind::Function, "internal"),
        ]
    );
    assert_eq!(code(&result).imports, vec!["./router", "./polyfill"]);
    assert_eq!(child(&result, "route").exported, Some(true));
    assert_eq!(child(&result, "internal").exported, Some(false));
    assert_eq!(
        child(&result, "route").signature.as_deref(),
        Some("export const route = async (path: string)")
    );
}

#[test]
fn test_javascript_commonjs_imports() {
    let source = "const fs = require('fs');\n\nclass Cache {\n  get(key) {\n    while (true) {}\n  }\n}\n\nmodule.exports = Cache;\n";
    let result = languages::javascript::extractor().unwrap().extract("lib/cache.js", source).unwrap();

    assert_eq!(names(&result), vec![(NodeKind::Class, "Cache"), (NodeKind::Method, "get")]);
    assert_eq!(code(&result).imports, vec!["fs"]);
}

#[test]
fn test_java_package_and_members() {
    let source = r#"package com.example.orders;

import java.util.List;
import static java.util.Objects.requireNonNull;

public class OrderService {
    public List<Order> findAll() {
        if (ready) {
            return List.of();
        }
    }

    private void audit(String id) throws IOException {
    }
}

interface Repository {
}
"#;
    let result = languages::java::extractor()
        .unwrap()
        .extract("src/main/java/OrderService.java", source)
        .unwrap();

    assert_eq!(code(&result).package.as_deref(), Some("com.example.orders"));
    assert_eq!(
        code(&result).imports,
        vec!["java.util.List", "java.util.Objects.requireNonNull"]
    );
    assert_eq!(
        names(&result),
        vec![
            (NodeKind::Class, "OrderService"),
            (NodeKind::Method, "findAll"),
            (NodeKind::Method, "audit"),
            (NodeKind::Interface, "Repository"),
        ]
    );
    assert_eq!(child(&result, "findAll").exported, Some(true));
    assert_eq!(child(&result, "audit").exported, Some(false));
}

#[test]
fn test_c_family_and_others_extract_something() {
    let cases: Vec<(Box<dyn LanguageExtractor>, &str, &str, &str)> = vec![
        (
            Box::new(languages::c::c_extractor().unwrap()) as Box<dyn LanguageExtractor>,
            "src/main.c",
            "#include <stdio.h>\n#include \"util.h\"\n\nstruct point {\n  int x;\n};\n\nint main(void)\n{\n  return 0;\n}\n",
            "main",
        ),
        (
            Box::new(languages::c::cpp_extractor().unwrap()) as Box<dyn LanguageExtractor>,
            "src/engine.cpp",
            "#include <vector>\n\nnamespace core {\nclass Engine {\n};\n}\n",
            "Engine",
        ),
        (
            Box::new(languages::csharp::extractor().unwrap()) as Box<dyn LanguageExtractor>,
            "Api/Controller.cs",
            "using System.Text;\n\nnamespace Shop.Api\n{\n    public class Controller\n    {\n    }\n}\n",
            "Controller",
        ),
        (
            Box::new(languages::ruby::extractor().unwrap()) as Box<dyn LanguageExtractor>,
            "lib/billing.rb",
            "require 'json'\n\nmodule Billing\n  class Invoice\n    def total\n    end\n  end\nend\n",
            "Invoice",
        ),
    ];

    for (extractor, path, source, expected) in cases {
        let result = extractor.extract(path, source).unwrap();
        assert!(
            result.children.iter().any(|c| c.name == expected),
            "{}: expected {} in {:?}",
            path,
            expected,
            names(&result)
        );
        assert!(!code(&result).imports.is_empty(), "{}: no imports found", path);
    }
}

// ── Markdown ────────────────────────────────────────────────────────────

fn markdown() -> MarkdownExtractor {
    MarkdownExtractor::new(&["OrderRouter".to_string(), "Ledger".to_string()]).unwrap()
}

#[test]
fn test_markdown_title_and_type() {
    let result = markdown()
        .extract("docs/notes/intro.md", "# Architecture Overview\n\nSome text.\n\n## Layers\n### Store\n#### Too deep\n")
        .unwrap();
    let meta = doc(&result);

    assert_eq!(result.language, Language::Markdown);
    assert_eq!(result.source_kind(), SourceKind::Document);
    assert_eq!(meta.title, "Architecture Overview");
    // Type comes from the path, never from the title.
    assert_eq!(meta.doc_type, DocType::Other);
    assert_eq!(meta.headings, vec!["Architecture Overview", "Layers", "Store"]);
    assert!(result.children.is_empty());
}

#[test]
fn test_markdown_title_falls_back_to_file_name() {
    let result = markdown().extract("docs/getting-started.md", "No heading here.\n").unwrap();
    assert_eq!(doc(&result).title, "Getting Started");
    assert_eq!(title_from_stem("api_v2-notes"), "Api V2 Notes");
}

#[test]
fn test_doc_type_classification() {
    assert_eq!(classify("docs/00-overview.md"), DocType::Overview);
    assert_eq!(classify("docs/architecture/store.md"), DocType::Architecture);
    assert_eq!(classify("docs/decisions/003-x.md"), DocType::Decision);
    assert_eq!(classify("docs/04-build/notes.md"), DocType::Implementation);
    assert_eq!(classify("docs/operations/runbook.md"), DocType::Operations);
    assert_eq!(classify("docs/plans/q3.md"), DocType::Plan);
    assert_eq!(classify("docs/guide.md"), DocType::Other);
}

#[test]
fn test_doc_type_first_keyword_wins() {
    // `001-` contains `01-`, which is checked before `decision`.
    assert_eq!(classify("docs/decisions/001-x.md"), DocType::Architecture);
    assert_eq!(classify("docs/decisions/000-x.md"), DocType::Overview);
    assert_eq!(classify("docs/decisions/012-x.md"), DocType::Decision);
}

#[test]
fn test_markdown_decision_record() {
    let source = "# Use a graph database\n\n## Status\nProposed\n\n## Context\nWe need traversal.\n\n## Decision\nUse **Neo4j** over `HTTP`.\n\n## Consequences\nOps must run a database.\n";
    let result = markdown().extract("docs/decisions/003-graph-db.md", source).unwrap();
    let meta = doc(&result);

    assert_eq!(meta.doc_type, DocType::Decision);
    assert_eq!(meta.concepts, vec!["Neo4j", "HTTP"]);
    assert_eq!(result.children.len(), 1);

    let decision = &result.children[0];
    assert_eq!(decision.kind, NodeKind::Decision);
    assert_eq!(decision.name, "Use a graph database");
    let attr = |key: &str| decision.attributes.get(key).map(String::as_str);
    assert_eq!(attr("id"), Some("003"));
    assert_eq!(attr("status"), Some("proposed"));
    assert_eq!(attr("context"), Some("We need traversal."));
    assert_eq!(attr("decision"), Some("Use **Neo4j** over `HTTP`."));
    assert_eq!(attr("consequences"), Some("Ops must run a database."));
}

#[test]
fn test_markdown_inline_status_and_non_adr_paths() {
    let source = "# Cache layer\n\n**Status:** Superseded\n";
    let result = markdown().extract("docs/adr/0012-cache.md", source).unwrap();
    assert_eq!(result.children[0].attributes.get("status").map(String::as_str), Some("superseded"));

    // Numbered, but not under a decisions directory.
    let result = markdown().extract("docs/guides/001-setup.md", "# Setup\n").unwrap();
    assert!(result.children.is_empty());
}

#[test]
fn test_markdown_references_components_concepts() {
    let source = "---\nowner: platform\n---\n# Setup\n\nSee [arch](../architecture.md#layers), \
                  [web](https://example.com/a.md), [self](setup.md), [root](/README.md) \
                  and [img](diagram.png).\n\nThe order router talks to the Ledger.\n\n\
                  ```text\n**ignored** `inside` [x](hidden.md)\n```\n\n`ok` is too short, **retry policy** is not.\n";
    let result = markdown().extract("docs/guide/setup.md", source).unwrap();
    let meta = doc(&result);

    assert_eq!(meta.frontmatter.get("owner").map(String::as_str), Some("platform"));
    assert_eq!(meta.references, vec!["docs/architecture.md", "docs/guide/setup.md", "README.md"]);
    assert_eq!(meta.components, vec!["OrderRouter", "Ledger"]);
    assert_eq!(meta.concepts, vec!["retry policy"]);

    let links = result.links("docs/guide/setup.md");
    assert!(!links.contains(&SourceLink::References { target: "docs/guide/setup.md".into() }));
    assert!(links.contains(&SourceLink::References { target: "README.md".into() }));
    assert!(links.contains(&SourceLink::Describes { component: "Ledger".into() }));
}

#[test]
fn test_markdown_concepts_keep_document_order() {
    let result = markdown()
        .extract("docs/notes.md", "# Notes\n\n**Alpha term** then `beta_fn`, then **gamma**.\n")
        .unwrap();
    assert_eq!(doc(&result).concepts, vec!["Alpha term", "beta_fn", "gamma"]);

    // The cap keeps the earliest terms whichever syntax they use.
    let mut body = String::from("# Many\n\n");
    for i in 0..15 {
        body.push_str(&format!("**bold{:02}** `code{:02}`\n", i, i));
    }
    let concepts = doc(&markdown().extract("docs/many.md", &body).unwrap()).concepts.clone();
    assert_eq!(concepts.len(), languages::markdown::MAX_CONCEPTS);
    assert_eq!(concepts[..4], ["bold00", "code00", "bold01", "code01"]);
    assert_eq!(concepts.last().map(String::as_str), Some("code09"));
}

#[test]
fn test_markdown_excerpt_is_bounded() {
    let body = format!("# Big\n\n{}", "word ".repeat(1000));
    let result = markdown().extract("docs/big.md", &body).unwrap();
    assert_eq!(doc(&result).excerpt.chars().count(), languages::markdown::EXCERPT_CHARS);
}

// ── Registry ────────────────────────────────────────────────────────────

fn registry() -> ExtractorRegistry {
    ExtractorRegistry::with_defaults(&TrellisConfig::default()).unwrap()
}

fn indexed(registry: &ExtractorRegistry, path: &str) -> Option<(String, Language, SourceKind)> {
    match registry.classify(path) {
        Classification::Indexed { path, matched } => Some((path, matched.language(), matched.kind)),
        Classification::Ignored(_) => None,
    }
}

fn ignored(registry: &ExtractorRegistry, path: &str) -> Option<IgnoreReason> {
    match registry.classify(path) {
        Classification::Ignored(reason) => Some(reason),
        Classification::Indexed { .. } => None,
    }
}

#[test]
fn test_registry_languages() {
    let registry = registry();
    let cases = [
        ("cmd/app/main.go", Language::Go),
        ("src/lib.rs", Language::Rust),
        ("app/models.py", Language::Python),
        ("web/App.tsx", Language::TypeScript),
        ("web/index.mjs", Language::JavaScript),
        ("src/Main.java", Language::Java),
        ("src/util.h", Language::C),
        ("src/engine.hpp", Language::Cpp),
        ("Api/Controller.cs", Language::CSharp),
        ("lib/billing.rb", Language::Ruby),
        ("docs/guide.md", Language::Markdown),
    ];
    for (path, language) in cases {
        let (_, found, kind) = indexed(&registry, path).unwrap_or_else(|| panic!("{} ignored", path));
        assert_eq!(found, language, "{}", path);
        let expected_kind = if language == Language::Markdown {
            SourceKind::Document
        } else {
            SourceKind::File
        };
        assert_eq!(kind, expected_kind, "{}", path);
    }
}

#[test]
fn test_registry_exclusions() {
    let registry = registry();

    assert_eq!(ignored(&registry, "cmd/main_test.go"), Some(IgnoreReason::Skipped));
    assert_eq!(ignored(&registry, "vendor/x/y.go"), Some(IgnoreReason::ExcludedDir("vendor".into())));
    assert_eq!(
        ignored(&registry, "web/node_modules/a/index.js"),
        Some(IgnoreReason::ExcludedDir("node_modules".into()))
    );
    assert_eq!(ignored(&registry, "target/debug/build.rs"), Some(IgnoreReason::ExcludedDir("target".into())));
    // Exclusions are per ecosystem: `target` means nothing to Go.
    assert!(indexed(&registry, "target/tool.go").is_some());
    assert_eq!(ignored(&registry, ".github/scripts/a.js"), Some(IgnoreReason::HiddenPath));
    assert_eq!(ignored(&registry, "Makefile"), Some(IgnoreReason::NoExtension));
    assert_eq!(ignored(&registry, "notes.txt"), Some(IgnoreReason::Unsupported("txt".into())));
    assert_eq!(ignored(&registry, "../escape.go"), Some(IgnoreReason::InvalidPath));
    assert_eq!(
        indexed(&registry, "./cmd/../main.go").map(|(path, ..)| path),
        Some("main.go".to_string())
    );
}

#[test]
fn test_registry_document_scope() {
    let registry = registry();

    assert_eq!(ignored(&registry, "README.md"), Some(IgnoreReason::OutsideScope));
    assert_eq!(ignored(&registry, "docs/README.md"), Some(IgnoreReason::Skipped));
    assert_eq!(ignored(&registry, "docs/readme.md"), Some(IgnoreReason::Skipped));
    assert!(indexed(&registry, "docs/adr/README.md").is_some());
    assert!(indexed(&registry, "docs/adr/001-x.md").is_some());

    let everywhere = TrellisConfig { doc_roots: Vec::new(), ..TrellisConfig::default() };
    let registry = ExtractorRegistry::with_defaults(&everywhere).unwrap();
    assert!(indexed(&registry, "CHANGELOG.md").is_some());
}

// ── Sync ────────────────────────────────────────────────────────────────

struct Fixture {
    dir: TempDir,
    store: Arc<MemoryGraphStore>,
    sync: GraphSync,
    registry: ExtractorRegistry,
    ns: Namespace,
}

impl Fixture {
    fn new() -> Self {
        let store = Arc::new(MemoryGraphStore::new());
        Self {
            dir: TempDir::new().unwrap(),
            sync: GraphSync::new(store.clone()),
            store,
            registry: registry(),
            ns: Namespace::from_override("Shop").unwrap(),
        }
    }

    fn write(&self, path: &str, content: impl AsRef<[u8]>) {
        let full = self.dir.path().join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }

    fn matched(&self, path: &str) -> Matched {
        match self.registry.classify(path) {
            Classification::Indexed { matched, .. } => matched,
            Classification::Ignored(reason) => panic!("{} ignored: {}", path, reason),
        }
    }

    async fn sync(&self, path: &str) -> Result<SyncOutcome, SyncError> {
        let matched = self.matched(path);
        self.sync.sync_file(&self.ns, self.dir.path(), path, &matched).await
    }

    async fn children(&self, path: &str) -> Vec<(NodeKind, String)> {
        self.store.children_of(&self.ns, SourceKind::File, path).await
    }
}

fn funcs(names: &[&str]) -> String {
    let mut source = String::from("package shop\n\n");
    for name in names {
        source.push_str(&format!("func {}() {{}}\n\n", name));
    }
    source
}

fn functions(names: &[&str]) -> Vec<(NodeKind, String)> {
    names.iter().map(|n| (NodeKind::Function, n.to_string())).collect()
}

#[tokio::test]
async fn test_sync_is_idempotent() {
    let fx = Fixture::new();
    fx.write("shop/cart.go", funcs(&["Add", "Remove"]));

    fx.sync("shop/cart.go").await.unwrap();
    let first = fx.store.node_count().await;
    let outcome = fx.sync("shop/cart.go").await.unwrap();

    assert_eq!(fx.store.node_count().await, first);
    assert_eq!(fx.children("shop/cart.go").await, functions(&["Add", "Remove"]));
    assert_eq!(
        outcome,
        SyncOutcome::Written { removed: 3, children: 2, links_failed: 0 }
    );
}

#[tokio::test]
async fn test_sync_replaces_children() {
    let fx = Fixture::new();
    fx.write("shop/cart.go", funcs(&["A", "B"]));
    fx.sync("shop/cart.go").await.unwrap();

    fx.write("shop/cart.go", funcs(&["A", "C"]));
    fx.sync("shop/cart.go").await.unwrap();

    assert_eq!(fx.children("shop/cart.go").await, functions(&["A", "C"]));
    let props = fx.store.properties(&fx.ns, NodeKind::Function, "C").await.unwrap();
    assert_eq!(props["owner"], "shop/cart.go");
    assert_eq!(props["owner_label"], "File");
}

#[tokio::test]
async fn test_sync_deleted_file() {
    let fx = Fixture::new();
    fx.write("shop/cart.go", funcs(&["A", "B"]));
    fx.sync("shop/cart.go").await.unwrap();

    std::fs::remove_file(fx.dir.path().join("shop/cart.go")).unwrap();
    let outcome = fx.sync("shop/cart.go").await.unwrap();

    assert_eq!(outcome, SyncOutcome::Deleted { removed: 3 });
    assert!(fx.children("shop/cart.go").await.is_empty());
    assert!(fx.store.list_sources(&fx.ns, SourceKind::File).await.unwrap().is_empty());

    // Deleting something never indexed is a no-op.
    let outcome = fx.sync("shop/never.go").await.unwrap();
    assert_eq!(outcome, SyncOutcome::Deleted { removed: 0 });
}

#[tokio::test]
async fn test_undecodable_file_leaves_graph_untouched() {
    let fx = Fixture::new();
    fx.write("shop/cart.go", funcs(&["A"]));
    fx.sync("shop/cart.go").await.unwrap();

    fx.write("shop/cart.go", [0xff, 0xfe, 0x00, 0x80]);
    let err = fx.sync("shop/cart.go").await.unwrap_err();

    assert!(matches!(err, SyncError::Extract { .. }), "{:?}", err);
    assert!(err.left_graph_untouched());
    assert_eq!(fx.children("shop/cart.go").await, functions(&["A"]));
}

#[tokio::test]
async fn test_failed_removal_creates_nothing() {
    let fx = Fixture::new();
    fx.write("shop/cart.go", funcs(&["A"]));
    fx.sync("shop/cart.go").await.unwrap();

    fx.write("shop/cart.go", funcs(&["B"]));
    fx.store.fail_removals(true);
    let err = fx.sync("shop/cart.go").await.unwrap_err();

    assert!(matches!(err, SyncError::DeleteFailed { .. }), "{:?}", err);
    assert!(err.left_graph_untouched());
    assert_eq!(fx.children("shop/cart.go").await, functions(&["A"]));
}

#[tokio::test]
async fn test_unavailable_store() {
    let fx = Fixture::new();
    fx.write("shop/cart.go", funcs(&["A"]));
    fx.store.set_unavailable(true);

    let err = fx.sync("shop/cart.go").await.unwrap_err();
    assert!(matches!(err, SyncError::StoreUnavailable(_)), "{:?}", err);
}

#[tokio::test]
async fn test_partial_write_is_reported() {
    let fx = Fixture::new();
    fx.write("shop/cart.go", funcs(&["A", "B", "C"]));
    fx.store.fail_children_after(Some(1));

    let err = fx.sync("shop/cart.go").await.unwrap_err();
    match err {
        SyncError::PartialWrite { created, expected, .. } => {
            assert_eq!(created, 2);
            assert_eq!(expected, 4);
        }
        other => panic!("expected partial write, got {:?}", other),
    }
    assert_eq!(fx.children("shop/cart.go").await, functions(&["A"]));

    // The next sync repairs it.
    fx.store.fail_children_after(None);
    fx.sync("shop/cart.go").await.unwrap();
    assert_eq!(fx.children("shop/cart.go").await, functions(&["A", "B", "C"]));
}

#[tokio::test]
async fn test_link_failures_are_not_fatal() {
    let fx = Fixture::new();
    fx.write("shop/cart.go", funcs(&["A"]));
    fx.store.fail_links(true);

    let outcome = fx.sync("shop/cart.go").await.unwrap();
    assert_eq!(outcome, SyncOutcome::Written { removed: 0, children: 1, links_failed: 1 });
    assert_eq!(fx.children("shop/cart.go").await, functions(&["A"]));
}

/// Delegates to a memory store, stalling every source creation.
struct StallingStore {
    inner: MemoryGraphStore,
    delay: Duration,
}

#[async_trait]
impl GraphStore for StallingStore {
    async fn probe(&self) -> Result<(), StoreError> {
        self.inner.probe().await
    }

    async fn remove_source(&self, ns: &Namespace, kind: SourceKind, path: &str) -> Result<usize, StoreError> {
        self.inner.remove_source(ns, kind, path).await
    }

    async fn create_source(&self, ns: &Namespace, path: &str, result: &ExtractionResult) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.create_source(ns, path, result).await
    }

    async fn create_child(
        &self,
        ns: &Namespace,
        kind: SourceKind,
        owner: &str,
        child: &ChildEntity,
    ) -> Result<(), StoreError> {
        self.inner.create_child(ns, kind, owner, child).await
    }

    async fn link_source(
        &self,
        ns: &Namespace,
        kind: SourceKind,
        path: &str,
        link: &SourceLink,
    ) -> Result<(), StoreError> {
        self.inner.link_source(ns, kind, path, link).await
    }

    async fn list_sources(&self, ns: &Namespace, kind: SourceKind) -> Result<Vec<String>, StoreError> {
        self.inner.list_sources(ns, kind).await
    }

    async fn entity_counts(&self, ns: &Namespace) -> Result<BTreeMap<String, usize>, StoreError> {
        self.inner.entity_counts(ns).await
    }

    async fn sweep_unowned(&self, ns: &Namespace) -> Result<usize, StoreError> {
        self.inner.sweep_unowned(ns).await
    }
}

#[tokio::test]
async fn test_sync_timeout() {
    let store = Arc::new(StallingStore {
        inner: MemoryGraphStore::new(),
        delay: Duration::from_secs(5),
    });
    let sync = GraphSync::new(store).with_timeout(Duration::from_millis(50));
    let ns = Namespace::from_override("Shop").unwrap();
    let result = GoExtractor::new().extract("a.go", &funcs(&["A"])).unwrap();

    let err = sync.apply(&ns, SourceKind::File, "a.go", Some(&result)).await.unwrap_err();
    assert!(matches!(err, SyncError::Timeout { .. }), "{:?}", err);
    assert_eq!(sync.active_paths(), 0);
}

#[tokio::test]
async fn test_concurrent_syncs_of_one_path_converge() {
    let fx = Fixture::new();
    fx.write("shop/cart.go", funcs(&["A", "B"]));
    let matched = fx.matched("shop/cart.go");

    let runs = (0..8).map(|_| fx.sync.sync_file(&fx.ns, fx.dir.path(), "shop/cart.go", &matched));
    let outcomes = futures_util::future::join_all(runs).await;

    assert!(outcomes.iter().all(Result::is_ok));
    assert_eq!(fx.children("shop/cart.go").await, functions(&["A", "B"]));
    assert_eq!(
        fx.store.list_sources(&fx.ns, SourceKind::File).await.unwrap(),
        vec!["shop/cart.go"]
    );
    assert_eq!(fx.sync.active_paths(), 0);
}

#[tokio::test]
async fn test_queued_applies_run_in_order() {
    let fx = Fixture::new();
    let extractor = GoExtractor::new();
    let versions: Vec<ExtractionResult> = [["A"], ["B"], ["C"]]
        .iter()
        .map(|names| extractor.extract("shop/cart.go", &funcs(names)).unwrap())
        .collect();

    let runs = versions
        .iter()
        .map(|result| fx.sync.apply(&fx.ns, SourceKind::File, "shop/cart.go", Some(result)));
    futures_util::future::join_all(runs).await;

    assert_eq!(fx.children("shop/cart.go").await, functions(&["C"]));
}

#[tokio::test]
async fn test_document_sync_links() {
    let fx = Fixture::new();
    fx.write("docs/architecture.md", "# Architecture\n\nThe **Ledger** is central.\n");
    fx.write("docs/guide.md", "# Guide\n\nRead [this](architecture.md) and [that](missing.md).\n");

    fx.sync("docs/architecture.md").await.unwrap();
    fx.sync("docs/guide.md").await.unwrap();

    let refs = fx
        .store
        .linked(&fx.ns, SourceKind::Document, "docs/guide.md", EdgeKind::References)
        .await;
    assert_eq!(refs, vec!["docs/architecture.md"]);
    let mentions = fx
        .store
        .linked(&fx.ns, SourceKind::Document, "docs/architecture.md", EdgeKind::Mentions)
        .await;
    assert_eq!(mentions, vec!["Ledger"]);

    let props = fx.store.properties(&fx.ns, NodeKind::Document, "docs/guide.md").await.unwrap();
    assert_eq!(props["title"], "Guide");
}

// ── Coordinator ─────────────────────────────────────────────────────────

fn coordinator(fx: &Fixture) -> Coordinator {
    let sync = Arc::new(GraphSync::new(fx.store.clone()));
    Coordinator::new(fx.dir.path(), Arc::new(registry()), sync).with_concurrency(2)
}

fn seed_project(fx: &Fixture) {
    fx.write("cmd/app/main.go", "package main\n\nimport \"shop/internal/server\"\n\nfunc main() {}\n");
    fx.write("internal/server/server.go", SERVER_GO);
    fx.write("internal/server/server_test.go", "package server\n\nfunc TestX() {}\n");
    fx.write("web/app.ts", "export function boot() {}\n");
    fx.write("docs/architecture.md", "# Architecture\n");
    fx.write("docs/README.md", "# Docs\n");
    fx.write("vendor/lib/lib.go", "package lib\n");
    fx.write("node_modules/pkg/index.js", "function x() {}\n");
    fx.write(".cache/tmp.go", "package tmp\n");
    fx.write("notes.txt", "plain text\n");
}

async fn sources(fx: &Fixture, kind: SourceKind) -> Vec<String> {
    fx.store.list_sources(&fx.ns, kind).await.unwrap()
}

#[tokio::test]
async fn test_reconcile_indexes_project() {
    let fx = Fixture::new();
    seed_project(&fx);

    let report = coordinator(&fx).reconcile(&fx.ns).await.unwrap();

    assert_eq!(report.synced, 4);
    assert_eq!(report.failed, 0);
    assert_eq!(
        sources(&fx, SourceKind::File).await,
        vec!["cmd/app/main.go", "internal/server/server.go", "web/app.ts"]
    );
    assert_eq!(sources(&fx, SourceKind::Document).await, vec!["docs/architecture.md"]);
    assert_eq!(fx.children("internal/server/server.go").await.len(), 6);
}

#[tokio::test]
async fn test_reconcile_prunes_deleted_files() {
    let fx = Fixture::new();
    seed_project(&fx);
    let coordinator = coordinator(&fx);
    coordinator.reconcile(&fx.ns).await.unwrap();

    std::fs::remove_file(fx.dir.path().join("internal/server/server.go")).unwrap();
    let report = coordinator.reconcile(&fx.ns).await.unwrap();

    assert_eq!(report.pruned, 1);
    assert_eq!(sources(&fx, SourceKind::File).await, vec!["cmd/app/main.go", "web/app.ts"]);
    assert!(fx.children("internal/server/server.go").await.is_empty());
}

#[tokio::test]
async fn test_reconcile_sweeps_orphaned_packages() {
    let fx = Fixture::new();
    fx.write("billing/invoice.go", "package billing

func Total() {}
");
    fx.write("docs/guide.md", "# Guide

Uses **retry policy**.
");
    let coordinator = coordinator(&fx);
    coordinator.reconcile(&fx.ns).await.unwrap();
    assert!(fx.store.properties(&fx.ns, NodeKind::Package, "billing").await.is_some());

    std::fs::remove_file(fx.dir.path().join("billing/invoice.go")).unwrap();
    std::fs::remove_file(fx.dir.path().join("docs/guide.md")).unwrap();
    let report = coordinator.reconcile(&fx.ns).await.unwrap();

    assert_eq!(report.pruned, 2);
    assert_eq!(report.swept, 2);
    assert!(fx.store.properties(&fx.ns, NodeKind::Package, "billing").await.is_none());
    assert!(fx.store.properties(&fx.ns, NodeKind::Concept, "retry policy").await.is_none());
    assert!(fx.store.entity_counts(&fx.ns).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_prune_only_removes_missing_paths() {
    let fx = Fixture::new();
    fx.write("keep.go", funcs(&["Keep"]));
    let coordinator = coordinator(&fx);
    coordinator.reconcile(&fx.ns).await.unwrap();

    let ghost = GoExtractor::new().extract("ghost.go", &funcs(&["Ghost"])).unwrap();
    fx.sync.apply(&fx.ns, SourceKind::File, "ghost.go", Some(&ghost)).await.unwrap();

    let report = coordinator.prune(&fx.ns).await.unwrap();
    assert_eq!(report.pruned, 1);
    assert_eq!(sources(&fx, SourceKind::File).await, vec!["keep.go"]);
    assert_eq!(fx.children("keep.go").await, functions(&["Keep"]));
}

#[tokio::test]
async fn test_namespaces_are_isolated() {
    let fx = Fixture::new();
    fx.write("keep.go", funcs(&["Keep"]));
    let other = Namespace::from_override("Other").unwrap();
    let stranger = GoExtractor::new().extract("elsewhere.go", &funcs(&["X"])).unwrap();
    fx.sync.apply(&other, SourceKind::File, "elsewhere.go", Some(&stranger)).await.unwrap();

    let report = coordinator(&fx).reconcile(&fx.ns).await.unwrap();

    assert_eq!(report.pruned, 0);
    assert_eq!(
        fx.store.list_sources(&other, SourceKind::File).await.unwrap(),
        vec!["elsewhere.go"]
    );
}

#[tokio::test]
async fn test_ensure_populated_runs_once() {
    let fx = Fixture::new();
    seed_project(&fx);
    let coordinator = coordinator(&fx);

    let first = coordinator.ensure_populated(&fx.ns).await.unwrap();
    assert_eq!(first.map(|r| r.synced), Some(4));
    assert!(coordinator.ensure_populated(&fx.ns).await.unwrap().is_none());
}

#[tokio::test]
async fn test_reconcile_reports_file_failures() {
    let fx = Fixture::new();
    fx.write("good.go", funcs(&["Good"]));
    fx.write("bad.go", [0xc3, 0x28]);

    let report = coordinator(&fx).reconcile(&fx.ns).await.unwrap();

    assert_eq!(report.synced, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures[0].0, "bad.go");
}

#[tokio::test]
async fn test_reconcile_indexes_what_dispatch_indexes() {
    let fx = Fixture::new();
    fx.write(".gitignore", "generated/\n");
    fx.write("generated/api.go", funcs(&["Gen"]));
    fx.write("api.go", funcs(&["Real"]));

    let discovered: Vec<String> = coordinator(&fx)
        .discover()
        .await
        .unwrap()
        .into_iter()
        .map(|(path, _)| path)
        .collect();
    assert_eq!(discovered, vec!["api.go", "generated/api.go"]);
    assert!(matches!(
        fx.registry.classify("generated/api.go"),
        Classification::Indexed { .. }
    ));

    let report = coordinator(&fx).reconcile(&fx.ns).await.unwrap();
    assert_eq!(report.synced, 2);
    assert_eq!(sources(&fx, SourceKind::File).await, vec!["api.go", "generated/api.go"]);
}

#[tokio::test]
async fn test_reconcile_requires_store() {
    let fx = Fixture::new();
    fx.store.set_unavailable(true);

    let err = coordinator(&fx).reconcile(&fx.ns).await.unwrap_err();
    assert!(matches!(err, ReconcileError::StoreUnavailable(_)));
    let err = coordinator(&fx).ensure_populated(&fx.ns).await.unwrap_err();
    assert!(matches!(err, ReconcileError::StoreUnavailable(_)));
}

#[test]
fn test_report_display() {
    let report = ReconcileReport { synced: 3, pruned: 1, swept: 2, ..Default::default() };
    assert_eq!(report.to_string(), "3 synced, 1 pruned, 2 swept, 0 failed");
}

#[test]
fn test_decode_strips_bom() {
    assert_eq!(decode("a.go", b"\xef\xbb\xbfpackage a").unwrap(), "package a");
    assert!(matches!(decode("a.go", b"\xff"), Err(ExtractError::Decode { .. })));
}

#[test]
fn test_registry_walk_pruning() {
    assert!(ExtractorRegistry::is_pruned_dir(".git"));
    assert!(ExtractorRegistry::is_pruned_dir("node_modules"));
    assert!(!ExtractorRegistry::is_pruned_dir("vendor"));
    assert!(!registry().is_empty());
}
