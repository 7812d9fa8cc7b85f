//! Semantic analysis: from raw extraction to typed models.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────┐     ┌────────────────┐
//! │ Source Files    │────▶│ Parsers      │────▶│ Analyzers      │
//! └─────────────────┘     │ (patterns)   │     │ SemanticModel  │
//!                         └──────────────┘     └────────────────┘
//!                                                      │
//!                                                      ▼
//!                         ┌──────────────┐     ┌────────────────┐
//!                         │ Project      │◀────│ Aggregator     │
//!                         │ Semantic     │     │ (first-wins,   │
//!                         │ Model        │     │  sorted order) │
//!                         └──────────────┘     └────────────────┘
//! ```
//!
//! # Adding a New Language
//!
//! 1. Add a parser in `src/parser/languages/` implementing `LanguageParser`
//! 2. Add an analyzer in `src/analysis/languages/` implementing `SemanticAnalyzer`
//! 3. Register both in their `languages/mod.rs` tables
//!
//! See `languages/go.rs` for a reference implementation.

mod aggregate;
mod common;
mod languages;
mod project;

use std::path::Path;

pub use aggregate::{Aggregation, CollisionKind, ProjectAggregator, SymbolCollision};
pub use languages::{
    analyzer_for, get_analyzer, CppAnalyzer, GoAnalyzer, JavaAnalyzer, JavaScriptAnalyzer,
    PythonAnalyzer,
};
pub use project::{
    analyze_project, AnalysisOutcome, CancelToken, FileAnalysis, NoProgress, Progress,
    ProgressSink, ProjectAnalysis, ProjectAnalyzer, SkipReason, SkippedFile,
};

use crate::language::Language;
use crate::model::SemanticModel;
use crate::parser::{parser_for, LanguageParser};

/// Language-specific semantic analyzer.
///
/// Implementations hold no mutable state and are shared across threads.
pub trait SemanticAnalyzer: Send + Sync {
    /// The language this analyzer handles.
    fn language(&self) -> Language;

    /// The parser whose extraction this analyzer builds on.
    fn parser(&self) -> &'static dyn LanguageParser {
        parser_for(self.language())
    }

    /// Build the semantic model of one file.
    ///
    /// Never fails: constructs that cannot be read are skipped. Import
    /// resolution is left empty here; it needs the filesystem and is done by
    /// the project orchestrator.
    fn analyze_file(&self, path: &str, content: &str) -> SemanticModel;
}

/// Get the analyzer for a file path, by extension.
pub fn analyzer_for_path<P: AsRef<Path>>(path: P) -> Option<&'static dyn SemanticAnalyzer> {
    Language::from_path(path).map(analyzer_for)
}
