//! Go parser.
//!
//! Imports come from single-line `import` statements and `import ( ... )`
//! blocks. Packages resolve through the nearest `go.mod`, then the module's
//! `vendor/` directory, then a walk for a directory of the same name.

use std::path::{Path, PathBuf};

use phf::phf_set;
use regex::Regex;

use crate::language::Language;
use crate::parser::manifest::GoModule;
use crate::parser::probe::{self, first_file_with_extension};
use crate::parser::scan::{block_end, find_body_open, matching_paren};
use crate::parser::stdlib::{is_go_builtin_call, is_stdlib};
use crate::parser::{finalize_functions, ImportStatement, LanguageParser, RawFunction};

static CONTROL_KEYWORDS: phf::Set<&'static str> = phf_set! {
    "if", "else", "for", "switch", "select", "case", "return", "go", "defer", "func",
    "range", "type", "var", "const", "map", "chan", "struct", "interface", "goto",
};

lazy_static::lazy_static! {
    // Optional alias (identifier, `_` or `.`) followed by a quoted path.
    static ref IMPORT_SPEC_RE: Regex = Regex::new(r#"^(?:([\w.]+)\s+)?"([^"]+)""#).unwrap();
    // func Name(, func (r *Recv) Name(, func Name[T any](
    static ref FUNC_RE: Regex = Regex::new(
        r"(?m)^[ \t]*func\s*(?:\(\s*(?:\w+\s+)?\*?\s*([\w.]+)(?:\[[^\]]*\])?\s*\)\s*)?(\w+)\s*(?:\[[^\]]*\])?\s*\("
    )
    .unwrap();
}

/// Go language parser.
pub struct GoParser;

impl GoParser {
    pub fn new() -> Self {
        Self
    }

    fn parse_spec(spec: &str, line: usize) -> Option<ImportStatement> {
        let caps = IMPORT_SPEC_RE.captures(spec.trim())?;
        let path = caps.get(2)?.as_str();
        let mut stmt = ImportStatement::new(path, line);
        match caps.get(1).map(|m| m.as_str()) {
            Some(".") => stmt.wildcard = true,
            Some(alias) => stmt.alias = Some(alias.to_string()),
            None => {}
        }
        Some(stmt)
    }

    /// First non-test `.go` file of a package directory.
    fn package_file(dir: &Path) -> Option<PathBuf> {
        first_file_with_extension(dir, &["go"], |name| name.ends_with("_test.go"))
    }

    /// Offset of the body brace after a signature, skipping `struct{...}`
    /// and `interface{...}` in result types.
    fn body_open(text: &str, from: usize) -> Option<usize> {
        let mut from = from;
        loop {
            let open = find_body_open(text, from)?;
            let before = text[..open].trim_end();
            if before.ends_with("interface") || before.ends_with("struct") {
                from = block_end(text, open);
                continue;
            }
            return Some(open);
        }
    }
}

impl Default for GoParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageParser for GoParser {
    fn language(&self) -> Language {
        Language::Go
    }

    fn extract_import_statements(&self, text: &str) -> Vec<ImportStatement> {
        let mut imports = Vec::new();
        let mut in_block = false;

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let trimmed = line.split("//").next().unwrap_or("").trim();
            if trimmed.is_empty() {
                continue;
            }

            if in_block {
                let (spec, closes) = match trimmed.find(')') {
                    Some(pos) => (&trimmed[..pos], true),
                    None => (trimmed, false),
                };
                imports.extend(Self::parse_spec(spec, line_no));
                if closes {
                    in_block = false;
                }
                continue;
            }

            let Some(rest) = trimmed.strip_prefix("import") else {
                continue;
            };
            if !rest.starts_with(|c: char| c.is_whitespace() || c == '(' || c == '"') {
                continue;
            }
            let rest = rest.trim_start();
            if let Some(inner) = rest.strip_prefix('(') {
                // import ( "a"; "b" ) may sit on a single line
                let (inner, closes) = match inner.find(')') {
                    Some(pos) => (&inner[..pos], true),
                    None => (inner, false),
                };
                for spec in inner.split(';') {
                    imports.extend(Self::parse_spec(spec, line_no));
                }
                in_block = !closes;
            } else {
                imports.extend(Self::parse_spec(rest, line_no));
            }
        }

        imports
    }

    fn extract_functions(&self, text: &str) -> Vec<RawFunction> {
        let mut functions = Vec::new();

        for caps in FUNC_RE.captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            if CONTROL_KEYWORDS.contains(name.as_str()) {
                continue;
            }
            let Some(params_end) = matching_paren(text, whole.end() - 1) else {
                continue;
            };
            let Some(open) = Self::body_open(text, params_end + 1) else {
                continue;
            };
            let end = block_end(text, open);

            let offset = whole.start() + (whole.as_str().len() - whole.as_str().trim_start().len());
            functions.push(RawFunction {
                name: name.as_str().to_string(),
                body: text[open..end].to_string(),
                offset,
                body_offset: open,
            });
        }

        finalize_functions(functions)
    }

    fn is_excluded_call(&self, name: &str, qualified: bool) -> bool {
        CONTROL_KEYWORDS.contains(name) || (!qualified && is_go_builtin_call(name))
    }

    fn resolve_import_path(
        &self,
        import: &str,
        current_file: &Path,
        project_root: &Path,
    ) -> Option<PathBuf> {
        if import.is_empty() || is_stdlib(Language::Go, import) {
            return None;
        }

        let dir = probe::parent_dir(current_file, project_root);
        if let Some(module) = GoModule::find(&dir) {
            if let Some(found) = module
                .package_dir(import)
                .and_then(|pkg| Self::package_file(&probe::normalize(&pkg)))
            {
                return Some(found);
            }
            let vendored = module.root.join("vendor").join(import);
            if let Some(found) = Self::package_file(&vendored) {
                return Some(found);
            }
        }

        let last = import.rsplit('/').next().filter(|s| !s.is_empty())?;
        let pkg_dir = probe::walk_find(project_root, |p| {
            p.file_name().map(|n| n == last).unwrap_or(false)
                && probe::is_dir(p)
                && Self::package_file(p).is_some()
        })?;
        Self::package_file(&pkg_dir)
    }
}
