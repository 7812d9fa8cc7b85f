//! repomodel - cross-language repository indexer.
//!
//! Builds a semantic model of a source tree written in Go, JavaScript /
//! TypeScript, Python, Java and C++: imports and where they resolve inside
//! the project, type and function declarations, call sites, and the
//! file-level dependency graph.
//!
//! # Architecture
//!
//! Extraction is pattern-based, with no grammar per language:
//!
//! - `parser`: per-language extraction of imports, functions and calls, plus
//!   import resolution against the filesystem
//! - `analysis`: per-language semantic analyzers, project aggregation and the
//!   concurrent orchestrator
//! - `model`: the serializable semantic model
//! - `config`: YAML configuration and file collection
//! - `report`: output formatting (text, JSON)
//!
//! # Example
//!
//! ```no_run
//! let files = vec!["cmd/main.go".to_string(), "pkg/server.go".to_string()];
//! let analysis = repomodel::analyze_project("/path/to/repo", &files)?;
//! for (name, function) in &analysis.model.all_functions {
//!     println!("{} {}:{}", name, function.file_path, function.start_line);
//! }
//! # Ok::<(), repomodel::IndexError>(())
//! ```

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod language;
pub mod model;
pub mod parser;
pub mod report;

pub use analysis::{
    analyze_project, analyzer_for_path, get_analyzer, AnalysisOutcome, CancelToken,
    ProgressSink, ProjectAnalysis, ProjectAnalyzer, SemanticAnalyzer,
};
pub use config::{collect_files, IndexConfig};
pub use error::{IndexError, Result};
pub use language::Language;
pub use model::{
    AccessLevel, FunctionCallInfo, FunctionInfo, ImportInfo, ParameterInfo,
    ProjectSemanticModel, SemanticModel, TypeInfo, TypeKind, VariableInfo,
};
pub use parser::{get_parser, parser_for_path, LanguageParser};
