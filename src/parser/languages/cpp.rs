//! C/C++ parser.
//!
//! Imports are `#include` directives. Function definitions may carry a
//! scope prefix (`Widget::draw`); the captured name is the final segment and
//! the scope remains visible in the declaration text.

use std::path::{Path, PathBuf};

use phf::phf_set;
use regex::Regex;

use crate::language::Language;
use crate::parser::probe::{self, find_upward, probe_extensions};
use crate::parser::scan::{block_end, find_body_open, matching_paren, LineIndex};
use crate::parser::stdlib::is_stdlib;
use crate::parser::{finalize_functions, ImportStatement, LanguageParser, RawFunction};

static CONTROL_KEYWORDS: phf::Set<&'static str> = phf_set! {
    "if", "else", "for", "while", "do", "switch", "case", "catch", "try", "return",
    "sizeof", "alignof", "decltype", "new", "delete", "throw", "static_cast",
    "dynamic_cast", "reinterpret_cast", "const_cast", "typeid", "static_assert",
    "noexcept", "defined",
};

static NON_FUNCTION_PREFIX: phf::Set<&'static str> = phf_set! {
    "return", "else", "new", "delete", "throw", "class", "struct", "union", "enum",
    "namespace", "case", "goto", "using", "typedef",
};

/// Header extensions probed for extensionless includes.
const HEADER_EXTENSIONS: &[&str] = &["h", "hpp", "hh", "hxx"];

/// Conventional include directories searched from each ancestor.
const INCLUDE_DIRS: &[&str] = &["include", "src"];

lazy_static::lazy_static! {
    static ref INCLUDE_RE: Regex = Regex::new(r#"(?m)^[ \t]*#[ \t]*include[ \t]*[<"]([^>"\n]+)[>"]"#).unwrap();
    static ref FUNCTION_RE: Regex = Regex::new(
        r"(?m)^[ \t]*(?:template\s*<[^;{}]*>\s*)?([^\n;{}()=#.]*?)((?:[A-Za-z_]\w*(?:<[^;{}()\n]*>)?::)*)(~?[A-Za-z_]\w*)\s*\("
    )
    .unwrap();
    // const, noexcept, override, ref qualifiers, trailing return types and
    // constructor initializer lists may sit between `)` and `{`.
    static ref TRAILER_RE: Regex = Regex::new(
        r"^\s*(?:(?:const|noexcept(?:\([^)]*\))?|override|final|volatile|mutable|&&?|->\s*[\w:<>,*&\s]+?)\s*)*(?::[^;]*)?$"
    )
    .unwrap();
}

/// C and C++ parser.
pub struct CppParser;

impl CppParser {
    pub fn new() -> Self {
        Self
    }

    fn is_declaration_prefix(prefix: &str) -> bool {
        let prefix = prefix.trim();
        if prefix.contains("->") {
            return false;
        }
        let last_word = prefix.split_whitespace().last().unwrap_or("");
        !NON_FUNCTION_PREFIX.contains(last_word)
    }

    /// Opening brace of the body of a function whose parameters close at
    /// `close`. Brace initializers in a constructor's member-initializer
    /// list (`total_{0}`) are stepped over.
    fn body_open(text: &str, close: usize) -> Option<usize> {
        let mut open = find_body_open(text, close + 1)?;
        if !text[close + 1..open].trim_start().starts_with(':') {
            return Some(open);
        }
        loop {
            let before = text[..open].trim_end();
            let initializer = before
                .chars()
                .last()
                .map(|c| c.is_alphanumeric() || c == '_' || c == '>')
                .unwrap_or(false);
            if !initializer {
                return Some(open);
            }
            open = find_body_open(text, block_end(text, open))?;
        }
    }

    /// Probe `base/include`, adding header extensions when it has none.
    fn probe_header(base: &Path, include: &str) -> Option<PathBuf> {
        let candidate = base.join(include);
        if Path::new(include).extension().is_some() {
            probe::is_file(&candidate).then(|| probe::normalize(&candidate))
        } else {
            probe_extensions(&candidate, HEADER_EXTENSIONS)
        }
    }
}

impl Default for CppParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageParser for CppParser {
    fn language(&self) -> Language {
        Language::Cpp
    }

    fn extract_import_statements(&self, text: &str) -> Vec<ImportStatement> {
        let lines = LineIndex::new(text);
        INCLUDE_RE
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let header = caps.get(1)?.as_str().trim();
                Some(ImportStatement::new(header, lines.line_of(whole.start())))
            })
            .collect()
    }

    fn extract_functions(&self, text: &str) -> Vec<RawFunction> {
        let mut functions = Vec::new();

        for caps in FUNCTION_RE.captures_iter(text) {
            let (Some(whole), Some(prefix), Some(name)) = (caps.get(0), caps.get(1), caps.get(3)) else {
                continue;
            };
            let name_str = name.as_str();
            if CONTROL_KEYWORDS.contains(name_str) || !Self::is_declaration_prefix(prefix.as_str()) {
                continue;
            }
            let Some(close) = matching_paren(text, whole.end() - 1) else {
                continue;
            };
            let Some(open) = Self::body_open(text, close) else {
                continue;
            };
            if !TRAILER_RE.is_match(&text[close + 1..open]) {
                continue;
            }
            let end = block_end(text, open);
            functions.push(RawFunction {
                name: name_str.to_string(),
                body: text[open..end].to_string(),
                offset: prefix.start(),
                body_offset: open,
            });
        }

        finalize_functions(functions)
    }

    fn is_excluded_call(&self, name: &str, _qualified: bool) -> bool {
        CONTROL_KEYWORDS.contains(name)
    }

    fn resolve_import_path(
        &self,
        import: &str,
        current_file: &Path,
        project_root: &Path,
    ) -> Option<PathBuf> {
        if import.is_empty() || is_stdlib(Language::Cpp, import) {
            return None;
        }
        let dir = probe::parent_dir(current_file, project_root);

        if let Some(found) = Self::probe_header(&dir, import) {
            return Some(found);
        }
        if let Some(found) = Self::probe_header(project_root, import) {
            return Some(found);
        }
        let include_base = find_upward(&dir, |d| {
            INCLUDE_DIRS
                .iter()
                .any(|inc| Self::probe_header(&d.join(inc), import).is_some())
        });
        if let Some(base) = include_base {
            return INCLUDE_DIRS
                .iter()
                .find_map(|inc| Self::probe_header(&base.join(inc), import));
        }

        let file_name = Path::new(import).file_name()?.to_str()?.to_string();
        let has_extension = Path::new(&file_name).extension().is_some();
        probe::walk_find(project_root, |p| {
            let Some(name) = p.file_name().and_then(|n| n.to_str()) else {
                return false;
            };
            let matches = if has_extension {
                name == file_name
            } else {
                p.file_stem().map(|s| s == file_name.as_str()).unwrap_or(false)
                    && p.extension()
                        .and_then(|e| e.to_str())
                        .map(|e| HEADER_EXTENSIONS.contains(&e))
                        .unwrap_or(false)
            };
            matches && probe::is_file(p)
        })
    }
}
