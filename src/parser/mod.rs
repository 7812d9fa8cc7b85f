//! Language-agnostic parsing interface for pattern-based extraction.
//!
//! This module provides:
//! - `LanguageParser` trait: the extraction contract every language implements
//! - A static extension → parser table (`get_parser`)
//! - Shared scanning, probing and manifest helpers
//!
//! Parsers hold no mutable state and are shared across threads.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub mod languages;
pub mod manifest;
pub mod probe;
pub mod scan;
pub mod stdlib;

pub use languages::{
    get_parser, parser_for, CppParser, GoParser, JavaParser, JavaScriptParser, PythonParser,
};
pub use scan::{CallSite, LineIndex, MAX_BLOCK_DEPTH};

use crate::language::Language;

/// A function declaration as captured by a parser.
///
/// Transient: consumed by the semantic analyzer and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFunction {
    pub name: String,
    /// Body text, including delimiting braces for brace languages.
    pub body: String,
    /// Byte offset where the declaration starts (its first line).
    pub offset: usize,
    /// Byte offset where the body starts.
    pub body_offset: usize,
}

impl RawFunction {
    /// Declaration text between the start of the declaration and its body.
    pub fn signature<'a>(&self, text: &'a str) -> &'a str {
        text.get(self.offset..self.body_offset).unwrap_or("")
    }

    /// Byte offset where the body ends (exclusive).
    pub fn end_offset(&self) -> usize {
        self.body_offset + self.body.len()
    }
}

/// An import statement with the details the surface syntax exposes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStatement {
    /// The imported module, path or package as written.
    pub raw: String,
    pub alias: Option<String>,
    /// Individually imported names (`from m import a, b`, `import {a, b}`).
    pub members: Vec<String>,
    pub wildcard: bool,
    /// Line (1-indexed) of the statement.
    pub line: usize,
}

impl ImportStatement {
    pub fn new<S: Into<String>>(raw: S, line: usize) -> Self {
        Self {
            raw: raw.into(),
            line,
            ..Default::default()
        }
    }
}

/// Extraction contract shared by every language.
///
/// No method may fail on malformed input: recognition misses yield empty
/// results and unresolvable imports yield `None`.
pub trait LanguageParser: Send + Sync {
    /// The language this parser handles.
    fn language(&self) -> Language;

    /// Import statements in source order, with alias and member details.
    fn extract_import_statements(&self, text: &str) -> Vec<ImportStatement>;

    /// Raw import strings in source order. Duplicates are preserved.
    fn extract_imports(&self, text: &str) -> Vec<String> {
        self.extract_import_statements(text)
            .into_iter()
            .map(|s| s.raw)
            .collect()
    }

    /// Function and method declarations with their bodies, in source order.
    fn extract_functions(&self, text: &str) -> Vec<RawFunction>;

    /// Whether a called name is excluded from call extraction.
    ///
    /// `qualified` is true for calls with a receiver. Control-flow keywords
    /// are always excluded; builtins only for plain calls.
    fn is_excluded_call(&self, name: &str, qualified: bool) -> bool;

    /// Resolve an import string to a file path.
    ///
    /// `current_file` may be relative to `project_root`. Returns `None` for
    /// standard-library, external or missing targets.
    fn resolve_import_path(
        &self,
        import: &str,
        current_file: &Path,
        project_root: &Path,
    ) -> Option<PathBuf>;

    /// Call sites in a function body, in source order.
    ///
    /// Text inside comments and string literals is never a call.
    fn extract_call_sites(&self, body: &str) -> Vec<CallSite> {
        let masked = scan::mask_literals(body);
        scan::scan_call_sites(&masked, |name, qualified| self.is_excluded_call(name, qualified))
    }

    /// Called names in a function body.
    ///
    /// Every call site contributes its bare name. Qualified calls also
    /// contribute `receiver.method`, reported once per distinct form.
    fn extract_function_calls(&self, body: &str) -> Vec<String> {
        let mut calls = Vec::new();
        let mut seen_qualified = HashSet::new();
        for site in self.extract_call_sites(body) {
            let qualified = site.qualified();
            calls.push(site.name);
            if let Some(q) = qualified {
                if seen_qualified.insert(q.clone()) {
                    calls.push(q);
                }
            }
        }
        calls
    }

    /// Line (1-indexed) of the first declaration of `name`, or 0 if absent.
    ///
    /// Overloads after the first are not reported.
    fn get_function_line_number(&self, text: &str, name: &str) -> usize {
        self.extract_functions(text)
            .into_iter()
            .filter(|f| f.name == name)
            .map(|f| scan::line_at(text, f.offset))
            .min()
            .unwrap_or(0)
    }
}

/// Get the parser for a file path, by extension.
pub fn parser_for_path<P: AsRef<Path>>(path: P) -> Option<&'static dyn LanguageParser> {
    Language::from_path(path).map(parser_for)
}

/// Sort captured functions by position and drop duplicates at the same
/// offset (several patterns may match one declaration).
pub(crate) fn finalize_functions(mut functions: Vec<RawFunction>) -> Vec<RawFunction> {
    functions.sort_by_key(|f| f.offset);
    functions.dedup_by(|b, a| a.offset == b.offset || (a.name == b.name && a.body_offset == b.body_offset));
    functions
}
