//! Language extractors
//!
//! Go is parsed structurally with tree-sitter; every other code language goes
//! through the shared regex engine in [`patterns`]; markdown documents have
//! their own extractor.

pub mod c;
pub mod csharp;
pub mod go;
pub mod java;
pub mod javascript;
pub mod markdown;
pub mod patterns;
pub mod python;
pub mod ruby;
pub mod rust;
pub mod typescript;

pub use go::GoExtractor;
pub use markdown::MarkdownExtractor;
pub use patterns::{PatternExtractor, PatternTable};
