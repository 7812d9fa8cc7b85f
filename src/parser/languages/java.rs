//! Java parser.
//!
//! Imports are `import a.b.C;`, `import a.b.*;` and `import static a.b.C.m;`.
//! Methods and constructors are recognized by a declaration header followed
//! by an optional `throws` clause and a brace body.

use std::path::{Path, PathBuf};

use phf::phf_set;
use regex::Regex;

use crate::language::Language;
use crate::parser::probe::{self, first_file_with_extension};
use crate::parser::scan::{block_end, find_body_open, matching_paren, LineIndex};
use crate::parser::stdlib::is_stdlib;
use crate::parser::{finalize_functions, ImportStatement, LanguageParser, RawFunction};

static CONTROL_KEYWORDS: phf::Set<&'static str> = phf_set! {
    "if", "else", "for", "while", "do", "switch", "case", "catch", "try", "finally",
    "return", "throw", "new", "synchronized", "assert", "super", "this", "instanceof",
};

/// Words that, as the last word before a name, mean the header is not a
/// method declaration.
static NON_METHOD_PREFIX: phf::Set<&'static str> = phf_set! {
    "new", "return", "else", "throw", "class", "interface", "enum", "record", "case",
};

/// Conventional source roots probed under a base directory.
const SOURCE_ROOTS: &[&str] = &["", "src/main/java", "src/test/java", "src"];

lazy_static::lazy_static! {
    static ref IMPORT_RE: Regex = Regex::new(r"(?m)^[ \t]*import\s+(static\s+)?([\w$.]+?)(\.\*)?\s*;").unwrap();
    static ref METHOD_RE: Regex = Regex::new(
        r"(?m)^[ \t]*(?:@[\w.]+(?:\([^)\n]*\))?\s+)*([^\n;{}()=@]*?)\b([A-Za-z_$][\w$]*)\s*\("
    )
    .unwrap();
    static ref THROWS_RE: Regex = Regex::new(r"^\s*(?:throws\s+[\w$.,\s<>]+)?\s*$").unwrap();
}

/// Java parser.
pub struct JavaParser;

impl JavaParser {
    pub fn new() -> Self {
        Self
    }

    /// Whether the text before a name reads like modifiers and a return type.
    fn is_declaration_prefix(prefix: &str) -> bool {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return true;
        }
        let last_char_ok = prefix
            .chars()
            .last()
            .map(|c| c.is_alphanumeric() || matches!(c, '>' | ']' | '_' | '$'))
            .unwrap_or(false);
        if !last_char_ok {
            return false;
        }
        let last_word = prefix.split_whitespace().last().unwrap_or("");
        !NON_METHOD_PREFIX.contains(last_word)
    }

    /// Try `a/b/C/D.java`, then `a/b/C.java`, ... under `base`.
    fn probe_class(base: &Path, parts: &[&str]) -> Option<PathBuf> {
        (1..=parts.len()).rev().find_map(|n| {
            let mut candidate = base.to_path_buf();
            for part in &parts[..n - 1] {
                candidate.push(part);
            }
            candidate.push(format!("{}.java", parts[n - 1]));
            probe::is_file(&candidate).then(|| probe::normalize(&candidate))
        })
    }

    fn probe_package(base: &Path, parts: &[&str]) -> Option<PathBuf> {
        let dir = parts.iter().fold(base.to_path_buf(), |d, p| d.join(p));
        first_file_with_extension(&dir, &["java"], |_| false)
    }

    /// Candidate base directories: conventional source roots under the
    /// project root, then under each ancestor of the importing file.
    fn base_dirs(dir: &Path, project_root: &Path) -> Vec<PathBuf> {
        let mut bases: Vec<PathBuf> = SOURCE_ROOTS.iter().map(|r| project_root.join(r)).collect();
        let mut current = Some(dir);
        while let Some(d) = current {
            bases.push(d.to_path_buf());
            if d == project_root || d.parent() == Some(d) {
                break;
            }
            current = d.parent().filter(|p| !p.as_os_str().is_empty());
        }
        bases
    }
}

impl Default for JavaParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageParser for JavaParser {
    fn language(&self) -> Language {
        Language::Java
    }

    fn extract_import_statements(&self, text: &str) -> Vec<ImportStatement> {
        let lines = LineIndex::new(text);
        IMPORT_RE
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let path = caps.get(2)?.as_str();
                let wildcard = caps.get(3).is_some();
                let raw = if wildcard { format!("{}.*", path) } else { path.to_string() };
                let mut stmt = ImportStatement::new(raw, lines.line_of(whole.start()));
                stmt.wildcard = wildcard;
                if caps.get(1).is_some() && !wildcard {
                    if let Some((_, member)) = path.rsplit_once('.') {
                        stmt.members.push(member.to_string());
                    }
                }
                Some(stmt)
            })
            .collect()
    }

    fn extract_functions(&self, text: &str) -> Vec<RawFunction> {
        let mut functions = Vec::new();

        for caps in METHOD_RE.captures_iter(text) {
            let (Some(whole), Some(prefix), Some(name)) = (caps.get(0), caps.get(1), caps.get(2)) else {
                continue;
            };
            if CONTROL_KEYWORDS.contains(name.as_str()) || !Self::is_declaration_prefix(prefix.as_str()) {
                continue;
            }
            let Some(close) = matching_paren(text, whole.end() - 1) else {
                continue;
            };
            let Some(open) = find_body_open(text, close + 1) else {
                continue;
            };
            if !THROWS_RE.is_match(&text[close + 1..open]) {
                continue;
            }
            let end = block_end(text, open);
            // Annotations on preceding lines are not part of the declaration.
            let offset = prefix.start();
            functions.push(RawFunction {
                name: name.as_str().to_string(),
                body: text[open..end].to_string(),
                offset,
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
        if import.is_empty() || is_stdlib(Language::Java, import) {
            return None;
        }
        let dir = probe::parent_dir(current_file, project_root);
        let bases = Self::base_dirs(&dir, project_root);

        if let Some(package) = import.strip_suffix(".*") {
            let parts: Vec<&str> = package.split('.').filter(|p| !p.is_empty()).collect();
            if let Some(found) = bases.iter().find_map(|b| Self::probe_package(b, &parts)) {
                return Some(found);
            }
            // `import a.b.Outer.*` imports nested classes of a type
            return bases.iter().find_map(|b| Self::probe_class(b, &parts));
        }

        let parts: Vec<&str> = import.split('.').filter(|p| !p.is_empty()).collect();
        if let Some(found) = bases.iter().find_map(|b| Self::probe_class(b, &parts)) {
            return Some(found);
        }

        let class = parts
            .iter()
            .find(|p| p.starts_with(|c: char| c.is_uppercase()))
            .or(parts.last())?;
        let file_name = format!("{}.java", class);
        probe::walk_find(project_root, |p| {
            p.file_name().map(|n| n == file_name.as_str()).unwrap_or(false) && probe::is_file(p)
        })
    }
}
