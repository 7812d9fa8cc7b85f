//! Python parser.
//!
//! Function bodies are delimited by indentation rather than braces. Imports
//! cover `import a.b as c`, `from m import x, y`, relative `from .m import x`
//! and parenthesized member lists spanning several lines.

use std::path::{Path, PathBuf};

use phf::phf_set;
use regex::Regex;

use crate::language::Language;
use crate::parser::probe::{self, find_upward};
use crate::parser::scan::{indent_width, indented_block, matching_paren, CallSite};
use crate::parser::stdlib::is_stdlib;
use crate::parser::{finalize_functions, scan, ImportStatement, LanguageParser, RawFunction};

static CONTROL_KEYWORDS: phf::Set<&'static str> = phf_set! {
    "if", "elif", "else", "while", "for", "return", "not", "and", "or", "in", "is",
    "lambda", "with", "assert", "del", "yield", "await", "except", "raise", "def",
    "class", "import", "from", "pass", "global", "nonlocal",
};

static BUILTIN_CALLS: phf::Set<&'static str> = phf_set! {
    "print", "len", "range", "isinstance", "issubclass", "str", "int", "float", "bool",
    "list", "dict", "set", "tuple", "super", "type", "enumerate", "zip", "map", "filter",
    "sorted", "reversed", "min", "max", "sum", "abs", "any", "all", "open", "repr",
    "hasattr", "getattr", "setattr", "iter", "next", "id", "hash", "format", "round",
};

lazy_static::lazy_static! {
    static ref DEF_RE: Regex = Regex::new(r"(?m)^([ \t]*)(?:async[ \t]+)?def[ \t]+(\w+)[ \t]*(?:\[[^\]]*\])?\(").unwrap();
    static ref MODULE_NAME_RE: Regex = Regex::new(r"^\.*[\w.]*$").unwrap();
}

/// Python parser.
pub struct PythonParser;

impl PythonParser {
    pub fn new() -> Self {
        Self
    }

    /// `module` or `module as alias`.
    fn split_alias(entry: &str) -> (&str, Option<&str>) {
        let mut words = entry.split_whitespace();
        let name = words.next().unwrap_or("");
        match (words.next(), words.next()) {
            (Some("as"), Some(alias)) => (name, Some(alias)),
            _ => (name, None),
        }
    }

    fn parse_import(rest: &str, line: usize, out: &mut Vec<ImportStatement>) {
        for entry in rest.split(',') {
            let (name, alias) = Self::split_alias(entry.trim());
            if name.is_empty() || !MODULE_NAME_RE.is_match(name) {
                continue;
            }
            let mut stmt = ImportStatement::new(name, line);
            stmt.alias = alias.map(str::to_string);
            out.push(stmt);
        }
    }

    fn add_members(stmt: &mut ImportStatement, names: &str) {
        for entry in names.split(',') {
            let entry = entry.trim().trim_matches(|c| c == '(' || c == ')' || c == '\\').trim();
            if entry.is_empty() {
                continue;
            }
            if entry == "*" {
                stmt.wildcard = true;
                continue;
            }
            let (name, _) = Self::split_alias(entry);
            stmt.members.push(name.to_string());
        }
    }

    /// Blank out triple-quoted strings so docstring text never looks like a
    /// call. Offsets are preserved.
    pub(crate) fn mask_docstrings(body: &str) -> String {
        let mut out = String::with_capacity(body.len());
        let mut rest = body;
        loop {
            let next = ["\"\"\"", "'''"]
                .iter()
                .filter_map(|q| rest.find(q).map(|i| (i, *q)))
                .min_by_key(|(i, _)| *i);
            let Some((start, quote)) = next else {
                out.push_str(rest);
                return out;
            };
            out.push_str(&rest[..start]);
            let after = &rest[start + 3..];
            let len = after.find(quote).map(|i| i + 6).unwrap_or(rest.len() - start);
            for c in rest[start..start + len].chars() {
                if c == '\n' {
                    out.push('\n');
                } else {
                    out.extend(std::iter::repeat(' ').take(c.len_utf8()));
                }
            }
            rest = &rest[start + len..];
        }
    }

    /// Blank out `#` comments and every string literal, docstrings included.
    /// Offsets are preserved.
    pub(crate) fn mask_literals(body: &str) -> String {
        let source = body.as_bytes();
        let mut out = source.to_vec();
        let mut i = 0;

        while i < source.len() {
            match source[i] {
                b'#' => {
                    let end = source[i..]
                        .iter()
                        .position(|&b| b == b'\n')
                        .map(|p| i + p)
                        .unwrap_or(source.len());
                    scan::blank(&mut out, i, end);
                    i = end;
                }
                quote @ (b'"' | b'\'') => {
                    let triple = [quote; 3];
                    let end = if source[i..].starts_with(&triple) {
                        source[i + 3..]
                            .windows(3)
                            .position(|w| w == triple)
                            .map(|p| i + 3 + p + 3)
                            .unwrap_or(source.len())
                    } else {
                        scan::skip_quoted(source, i)
                    };
                    scan::blank(&mut out, i, end);
                    i = end;
                }
                _ => i += 1,
            }
        }

        String::from_utf8_lossy(&out).into_owned()
    }

    /// `rel.py` or `rel/__init__.py` under `base`.
    fn module_file(base: &Path, rel: &str) -> Option<PathBuf> {
        let target = if rel.is_empty() { base.to_path_buf() } else { base.join(rel) };
        let mut file = target.clone().into_os_string();
        file.push(".py");
        let file = PathBuf::from(file);
        if !rel.is_empty() && probe::is_file(&file) {
            return Some(probe::normalize(&file));
        }
        let init = target.join("__init__.py");
        probe::is_file(&init).then(|| probe::normalize(&init))
    }

    fn resolve_relative(import: &str, dir: &Path) -> Option<PathBuf> {
        let dots = import.chars().take_while(|c| *c == '.').count();
        let mut base = dir.to_path_buf();
        for _ in 1..dots {
            base = base.parent()?.to_path_buf();
        }
        let rel = import[dots..].replace('.', "/");
        Self::module_file(&base, &rel)
    }

    fn resolve_absolute(import: &str, dir: &Path, project_root: &Path) -> Option<PathBuf> {
        let rel = import.replace('.', "/");

        for root in [project_root.to_path_buf(), project_root.join("src")] {
            if let Some(found) = Self::module_file(&root, &rel) {
                return Some(found);
            }
        }
        if let Some(base) = find_upward(dir, |d| Self::module_file(d, &rel).is_some()) {
            return Self::module_file(&base, &rel);
        }

        let last = import.rsplit('.').next().filter(|s| !s.is_empty())?;
        probe::walk_find(project_root, |p| {
            let stem = p.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            let is_module = ext == "py" && stem == last && probe::is_file(p);
            let is_package = p.file_name().map(|n| n == last).unwrap_or(false)
                && probe::is_file(&p.join("__init__.py"));
            is_module || is_package
        })
        .and_then(|found| {
            if probe::is_dir(&found) {
                Self::module_file(&found, "")
            } else {
                Some(found)
            }
        })
    }
}

impl Default for PythonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageParser for PythonParser {
    fn language(&self) -> Language {
        Language::Python
    }

    fn extract_import_statements(&self, text: &str) -> Vec<ImportStatement> {
        let mut imports: Vec<ImportStatement> = Vec::new();
        let mut in_docstring = false;
        let mut open_members: Option<usize> = None;

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let code = line.split('#').next().unwrap_or("").trim();

            if let Some(stmt_idx) = open_members {
                if let Some(stmt) = imports.get_mut(stmt_idx) {
                    Self::add_members(stmt, code);
                }
                if code.contains(')') {
                    open_members = None;
                }
                continue;
            }

            let quotes = code.matches("\"\"\"").count() + code.matches("'''").count();
            if in_docstring {
                if quotes % 2 == 1 {
                    in_docstring = false;
                }
                continue;
            }
            if quotes % 2 == 1 {
                in_docstring = true;
                continue;
            }

            if let Some(rest) = code.strip_prefix("import ") {
                Self::parse_import(rest, line_no, &mut imports);
            } else if let Some(rest) = code.strip_prefix("from ") {
                let Some((module, names)) = rest.split_once(" import ") else {
                    continue;
                };
                let module = module.trim();
                if module.is_empty() || !MODULE_NAME_RE.is_match(module) {
                    continue;
                }
                let mut stmt = ImportStatement::new(module, line_no);
                Self::add_members(&mut stmt, names);
                let continues = names.contains('(') && !names.contains(')');
                imports.push(stmt);
                if continues {
                    open_members = Some(imports.len() - 1);
                }
            }
        }

        imports
    }

    fn extract_functions(&self, text: &str) -> Vec<RawFunction> {
        let mut functions = Vec::new();

        for caps in DEF_RE.captures_iter(text) {
            let (Some(whole), Some(indent), Some(name)) = (caps.get(0), caps.get(1), caps.get(2)) else {
                continue;
            };
            let Some(close) = matching_paren(text, whole.end() - 1) else {
                continue;
            };
            // The header ends at the first top-level colon after the parameters.
            let Some(colon) = text[close..].find(':').map(|i| close + i) else {
                continue;
            };
            let (body_start, body_end) = indented_block(text, colon, indent_width(indent.as_str()));
            functions.push(RawFunction {
                name: name.as_str().to_string(),
                body: text[body_start..body_end].to_string(),
                offset: indent.end(),
                body_offset: body_start,
            });
        }

        finalize_functions(functions)
    }

    fn is_excluded_call(&self, name: &str, qualified: bool) -> bool {
        CONTROL_KEYWORDS.contains(name) || (!qualified && BUILTIN_CALLS.contains(name))
    }

    fn extract_call_sites(&self, body: &str) -> Vec<CallSite> {
        let masked = Self::mask_literals(body);
        scan::scan_call_sites(&masked, |name, qualified| self.is_excluded_call(name, qualified))
    }

    fn resolve_import_path(
        &self,
        import: &str,
        current_file: &Path,
        project_root: &Path,
    ) -> Option<PathBuf> {
        if import.is_empty() {
            return None;
        }
        let dir = probe::parent_dir(current_file, project_root);

        if import.starts_with('.') {
            return Self::resolve_relative(import, &dir);
        }
        if is_stdlib(Language::Python, import) {
            return None;
        }
        Self::resolve_absolute(import, &dir, project_root)
    }
}
