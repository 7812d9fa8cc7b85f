//! JavaScript / TypeScript parser.
//!
//! Covers ES module imports, re-exports, `require()` and dynamic `import()`.
//! Functions are function declarations, arrow/function expressions bound to
//! a variable, and class or object methods.

use std::path::{Path, PathBuf};

use phf::phf_set;
use regex::Regex;

use crate::language::Language;
use crate::parser::manifest::PackageJson;
use crate::parser::probe::{self, probe_extensions, probe_index};
use crate::parser::scan::{block_end, find_body_open, line_start, matching_paren, LineIndex};
use crate::parser::stdlib::is_stdlib;
use crate::parser::{finalize_functions, ImportStatement, LanguageParser, RawFunction};

/// Source extensions probed for extensionless imports, in priority order.
pub const SOURCE_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs", "cjs"];

/// Directory entry files probed when an import names a directory.
pub const INDEX_FILES: &[&str] = &["index.js", "index.jsx", "index.ts", "index.tsx"];

static CONTROL_KEYWORDS: phf::Set<&'static str> = phf_set! {
    "if", "else", "for", "while", "do", "switch", "case", "catch", "try", "finally",
    "return", "function", "typeof", "instanceof", "new", "delete", "void", "await",
    "yield", "super", "import", "with", "throw", "in", "of", "class", "constructor",
};

lazy_static::lazy_static! {
    static ref IMPORT_FROM_RE: Regex = Regex::new(
        r#"(?m)^[ \t]*import\s+(?:type\s+)?([\w$*{}\s,]+?)\s+from\s+['"]([^'"]+)['"]"#
    )
    .unwrap();
    static ref SIDE_EFFECT_RE: Regex = Regex::new(r#"(?m)^[ \t]*import\s+['"]([^'"]+)['"]"#).unwrap();
    static ref EXPORT_FROM_RE: Regex = Regex::new(
        r#"(?m)^[ \t]*export\s+(?:type\s+)?(\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s+from\s+['"]([^'"]+)['"]"#
    )
    .unwrap();
    static ref REQUIRE_RE: Regex = Regex::new(
        r#"(?:(?:const|let|var)\s+([\w$]+|\{[^}]*\})\s*=\s*)?\brequire\s*\(\s*['"]([^'"]+)['"]\s*\)"#
    )
    .unwrap();
    static ref DYNAMIC_IMPORT_RE: Regex = Regex::new(r#"\bimport\s*\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap();

    static ref FUNCTION_DECL_RE: Regex = Regex::new(
        r"(?m)^[ \t]*(?:export\s+)?(?:default\s+)?(?:declare\s+)?(?:async\s+)?function\s*\*?\s*([\w$]+)\s*(?:<[^>]*>)?\s*\("
    )
    .unwrap();
    static ref BOUND_FUNCTION_RE: Regex = Regex::new(
        r"(?m)^[ \t]*(?:export\s+)?(?:const|let|var)\s+([\w$]+)\s*(?::[^=\n]+)?=\s*(?:async\s+)?(?:(function)\b\s*\*?\s*[\w$]*\s*\(|(?:<[^>]*>\s*)?(\()|([\w$]+)\s*=>)"
    )
    .unwrap();
    static ref METHOD_RE: Regex = Regex::new(
        r"(?m)^[ \t]*(?:(?:public|private|protected|static|async|readonly|abstract|override|get|set|declare)\s+)*\*?\s*(#?[\w$]+)\s*\??\s*(?:<[^>]*>)?\s*\("
    )
    .unwrap();
    static ref RETURN_ANNOTATION_RE: Regex = Regex::new(r"^\s*(?::\s*[^{};=()]+(?:\([^)]*\))?[^{};=]*)?\s*$").unwrap();
}

/// JavaScript and TypeScript parser.
pub struct JavaScriptParser;

impl JavaScriptParser {
    pub fn new() -> Self {
        Self
    }

    fn is_comment_line(text: &str, offset: usize) -> bool {
        let start = line_start(text, offset);
        let line = text[start..].trim_start();
        line.starts_with("//") || line.starts_with("/*") || line.starts_with('*')
    }

    /// Interpret an import clause such as `React, { useState as s }` or
    /// `* as ns`.
    fn apply_clause(stmt: &mut ImportStatement, clause: &str) {
        let clause = clause.trim();
        let (head, braces) = match clause.find('{') {
            Some(pos) => (&clause[..pos], Some(&clause[pos..])),
            None => (clause, None),
        };

        for part in head.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if let Some(ns) = part.strip_prefix('*') {
                stmt.wildcard = true;
                let ns = ns.trim().trim_start_matches("as").trim();
                if !ns.is_empty() {
                    stmt.alias = Some(ns.to_string());
                }
            } else {
                stmt.alias = Some(part.to_string());
            }
        }

        if let Some(braces) = braces {
            let inner = braces.trim_start_matches('{').split('}').next().unwrap_or("");
            stmt.members.extend(
                inner
                    .split(',')
                    .map(|m| m.trim().trim_start_matches("type ").trim())
                    .filter(|m| !m.is_empty())
                    .map(|m| m.split_whitespace().next().unwrap_or(m).to_string()),
            );
        }
    }

    /// Resolve `base` as a file (probing extensions) or a directory (probing
    /// index files).
    fn resolve_file_or_dir(base: &Path) -> Option<PathBuf> {
        probe_extensions(base, SOURCE_EXTENSIONS).or_else(|| probe_index(base, INDEX_FILES))
    }

    /// Split `@scope/pkg/sub/path` into (`@scope/pkg`, `sub/path`).
    fn split_package(import: &str) -> (&str, &str) {
        let segments = if import.starts_with('@') { 2 } else { 1 };
        let mut idx = 0;
        let mut seen = 0;
        for (i, c) in import.char_indices() {
            if c == '/' {
                seen += 1;
                if seen == segments {
                    idx = i;
                    break;
                }
            }
        }
        if idx == 0 {
            (import, "")
        } else {
            (&import[..idx], &import[idx + 1..])
        }
    }

    fn resolve_package(import: &str, dir: &Path, project_root: &Path) -> Option<PathBuf> {
        let (package, subpath) = Self::split_package(import);

        let modules_dir = probe::find_upward(dir, |d| probe::is_dir(&d.join("node_modules").join(package)));
        if let Some(base) = modules_dir {
            let pkg_dir = base.join("node_modules").join(package);
            if !subpath.is_empty() {
                if let Some(found) = Self::resolve_file_or_dir(&pkg_dir.join(subpath)) {
                    return Some(found);
                }
            } else {
                if let Some(entry) = PackageJson::read(&pkg_dir).as_ref().and_then(|p| p.entry_point()) {
                    if let Some(found) = Self::resolve_file_or_dir(&pkg_dir.join(entry)) {
                        return Some(found);
                    }
                }
                if let Some(found) = probe_index(&pkg_dir, INDEX_FILES) {
                    return Some(found);
                }
            }
        }

        let wanted = if subpath.is_empty() {
            package.rsplit('/').next().unwrap_or(package)
        } else {
            subpath.rsplit('/').next().unwrap_or(subpath)
        };
        probe::walk_find(project_root, |p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            let stem = p.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            SOURCE_EXTENSIONS.contains(&ext) && stem == wanted && probe::is_file(p)
        })
    }

    /// Build a function whose body is a brace block starting at `open`.
    fn block_function(text: &str, name: &str, offset: usize, open: usize) -> RawFunction {
        let end = block_end(text, open);
        RawFunction {
            name: name.to_string(),
            body: text[open..end].to_string(),
            offset,
            body_offset: open,
        }
    }

    fn bound_function(text: &str, caps: &regex::Captures) -> Option<RawFunction> {
        let whole = caps.get(0)?;
        let name = caps.get(1)?.as_str();
        let offset = whole.start() + (whole.as_str().len() - whole.as_str().trim_start().len());

        let arrow_at = if caps.get(2).is_some() {
            // function expression: body follows the parameter list
            let close = matching_paren(text, whole.end() - 1)?;
            let open = find_body_open(text, close + 1)?;
            return Some(Self::block_function(text, name, offset, open));
        } else if caps.get(3).is_some() {
            let close = matching_paren(text, whole.end() - 1)?;
            let rest = &text[close + 1..];
            let arrow = rest.find("=>")?;
            let between = &rest[..arrow];
            if !between.trim().is_empty() && !between.trim_start().starts_with(':') {
                return None;
            }
            if between.contains(';') || between.contains('{') {
                return None;
            }
            close + 1 + arrow + 2
        } else {
            whole.end()
        };

        let after = &text[arrow_at..];
        let skipped = after.len() - after.trim_start().len();
        let body_start = arrow_at + skipped;
        if text[body_start..].starts_with('{') {
            return Some(Self::block_function(text, name, offset, body_start));
        }
        let body_end = text[body_start..]
            .find(|c| c == '\n' || c == ';')
            .map(|i| body_start + i)
            .unwrap_or(text.len());
        Some(RawFunction {
            name: name.to_string(),
            body: text[body_start..body_end].to_string(),
            offset,
            body_offset: body_start,
        })
    }
}

impl Default for JavaScriptParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageParser for JavaScriptParser {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn extract_import_statements(&self, text: &str) -> Vec<ImportStatement> {
        let lines = LineIndex::new(text);
        let mut found: Vec<(usize, ImportStatement)> = Vec::new();

        for caps in IMPORT_FROM_RE.captures_iter(text) {
            let (Some(whole), Some(clause), Some(module)) = (caps.get(0), caps.get(1), caps.get(2)) else {
                continue;
            };
            let mut stmt = ImportStatement::new(module.as_str(), lines.line_of(whole.start()));
            Self::apply_clause(&mut stmt, clause.as_str());
            found.push((whole.start(), stmt));
        }
        for caps in SIDE_EFFECT_RE.captures_iter(text) {
            if let (Some(whole), Some(module)) = (caps.get(0), caps.get(1)) {
                found.push((
                    whole.start(),
                    ImportStatement::new(module.as_str(), lines.line_of(whole.start())),
                ));
            }
        }
        for caps in EXPORT_FROM_RE.captures_iter(text) {
            let (Some(whole), Some(clause), Some(module)) = (caps.get(0), caps.get(1), caps.get(2)) else {
                continue;
            };
            let mut stmt = ImportStatement::new(module.as_str(), lines.line_of(whole.start()));
            Self::apply_clause(&mut stmt, clause.as_str());
            found.push((whole.start(), stmt));
        }
        for caps in REQUIRE_RE.captures_iter(text) {
            let (Some(whole), Some(module)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            let mut stmt = ImportStatement::new(module.as_str(), lines.line_of(whole.start()));
            if let Some(target) = caps.get(1) {
                Self::apply_clause(&mut stmt, target.as_str());
            }
            found.push((whole.start(), stmt));
        }
        for caps in DYNAMIC_IMPORT_RE.captures_iter(text) {
            if let (Some(whole), Some(module)) = (caps.get(0), caps.get(1)) {
                found.push((
                    whole.start(),
                    ImportStatement::new(module.as_str(), lines.line_of(whole.start())),
                ));
            }
        }

        found.retain(|(offset, _)| !Self::is_comment_line(text, *offset));
        found.sort_by_key(|(offset, _)| *offset);
        found.into_iter().map(|(_, stmt)| stmt).collect()
    }

    fn extract_functions(&self, text: &str) -> Vec<RawFunction> {
        let mut functions = Vec::new();

        for caps in FUNCTION_DECL_RE.captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if Self::is_comment_line(text, whole.start()) {
                continue;
            }
            let Some(close) = matching_paren(text, whole.end() - 1) else {
                continue;
            };
            let Some(open) = find_body_open(text, close + 1) else {
                continue;
            };
            let offset = whole.start() + (whole.as_str().len() - whole.as_str().trim_start().len());
            functions.push(Self::block_function(text, name.as_str(), offset, open));
        }

        for caps in BOUND_FUNCTION_RE.captures_iter(text) {
            if caps.get(0).map(|m| Self::is_comment_line(text, m.start())).unwrap_or(true) {
                continue;
            }
            functions.extend(Self::bound_function(text, &caps));
        }

        for caps in METHOD_RE.captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let name = name.as_str();
            if CONTROL_KEYWORDS.contains(name) && name != "constructor" {
                continue;
            }
            if Self::is_comment_line(text, whole.start()) {
                continue;
            }
            let Some(close) = matching_paren(text, whole.end() - 1) else {
                continue;
            };
            let Some(open) = find_body_open(text, close + 1) else {
                continue;
            };
            // Only a return type annotation may sit between `)` and `{`.
            if !RETURN_ANNOTATION_RE.is_match(&text[close + 1..open]) {
                continue;
            }
            let offset = whole.start() + (whole.as_str().len() - whole.as_str().trim_start().len());
            functions.push(Self::block_function(text, name, offset, open));
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
        if import.is_empty() {
            return None;
        }
        let dir = probe::parent_dir(current_file, project_root);

        if import.starts_with("./") || import.starts_with("../") || import == "." || import == ".." {
            return Self::resolve_file_or_dir(&probe::normalize(&dir.join(import)));
        }
        if let Some(rooted) = import.strip_prefix('/') {
            return Self::resolve_file_or_dir(&probe::normalize(&project_root.join(rooted)));
        }
        if is_stdlib(Language::JavaScript, import) {
            return None;
        }

        Self::resolve_package(import, &dir, project_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_extract_imports_in_source_order() {
        let text = r#"
import React, { useState, useEffect as effect } from 'react';
import * as path from "path";
import './styles.css';
const lodash = require('lodash');
export { helper } from './helpers';
// import ignored from 'commented';
import {
  a,
  b,
} from './multi';
const lazy = () => import('./lazy');
import React2 from 'react';
"#;
        let parser = JavaScriptParser::new();
        assert_eq!(
            parser.extract_imports(text),
            vec!["react", "path", "./styles.css", "lodash", "./helpers", "./multi", "./lazy", "react"]
        );

        let stmts = parser.extract_import_statements(text);
        assert_eq!(stmts[0].alias.as_deref(), Some("React"));
        assert_eq!(stmts[0].members, vec!["useState", "useEffect"]);
        assert!(stmts[1].wildcard);
        assert_eq!(stmts[1].alias.as_deref(), Some("path"));
        assert_eq!(stmts[3].alias.as_deref(), Some("lodash"));
        assert_eq!(stmts[5].members, vec!["a", "b"]);
        assert_eq!(stmts[5].line, 8);
    }

    #[test]
    fn test_extract_functions() {
        let text = r#"
export async function load(url: string): Promise<Data> {
  const res = await fetch(url);
  return parse(res);
}

const add = (a, b) => a + b;
const total = (items) => {
  return items.reduce((s, x) => s + x, 0);
};
const value = (1 + 2) * 3;

class Store {
  private items: Item[] = [];

  constructor(initial) {
    this.items = initial;
  }

  async save(item: Item): Promise<void> {
    if (item) {
      this.items.push(item);
    }
  }
}
"#;
        let parser = JavaScriptParser::new();
        let funcs = parser.extract_functions(text);
        let names: Vec<&str> = funcs.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["load", "add", "total", "constructor", "save"]);
        assert_eq!(funcs[1].body.trim(), "a + b");
        assert!(funcs[4].body.contains("this.items.push(item)"));
    }

    #[test]
    fn test_calls_exclude_keywords() {
        let parser = JavaScriptParser::new();
        let calls = parser.extract_function_calls(
            "{ if (x) { foo(); } while (y) { this.bar(); this.bar(); } switch (z) {} return baz(); }",
        );
        assert_eq!(calls, vec!["foo", "bar", "this.bar", "bar", "baz"]);
    }

    #[test]
    fn test_get_function_line_number() {
        let text = "function a() {}\n\nconst b = () => {};\nfunction a() {}\n";
        let parser = JavaScriptParser::new();
        assert_eq!(parser.get_function_line_number(text, "a"), 1);
        assert_eq!(parser.get_function_line_number(text, "b"), 3);
        assert_eq!(parser.get_function_line_number(text, "missing"), 0);
    }

    #[test]
    fn test_resolve_relative_file() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::write(root.join("main.js"), "").unwrap();
        std::fs::write(root.join("util.js"), "").unwrap();

        let parser = JavaScriptParser::new();
        let resolved = parser
            .resolve_import_path("./util", &root.join("main.js"), root)
            .unwrap();
        assert_eq!(resolved, probe::normalize(&root.join("util.js")));
        assert!(resolved.is_absolute());
    }

    #[test]
    fn test_resolve_relative_index_fallback() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("util")).unwrap();
        std::fs::write(root.join("util/index.js"), "").unwrap();

        let parser = JavaScriptParser::new();
        let resolved = parser
            .resolve_import_path("./util", &root.join("main.js"), root)
            .unwrap();
        assert_eq!(resolved, probe::normalize(&root.join("util/index.js")));
    }

    #[test]
    fn test_relative_resolution_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("a")).unwrap();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("a/b.ts"), "").unwrap();

        let parser = JavaScriptParser::new();
        let from_root = parser.resolve_import_path("./a/b", &root.join("f.ts"), root);
        let from_deeper = parser.resolve_import_path("../a/b", &root.join("src/g.ts"), root);
        assert!(from_root.is_some());
        assert_eq!(from_root, from_deeper);
    }

    #[test]
    fn test_resolve_node_modules_main() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let pkg = root.join("node_modules/left-pad");
        std::fs::create_dir_all(pkg.join("lib")).unwrap();
        std::fs::write(pkg.join("package.json"), r#"{"name":"left-pad","main":"lib/pad"}"#).unwrap();
        std::fs::write(pkg.join("lib/pad.js"), "").unwrap();
        std::fs::create_dir_all(root.join("src/deep")).unwrap();

        let parser = JavaScriptParser::new();
        let resolved = parser
            .resolve_import_path("left-pad", &root.join("src/deep/x.js"), root)
            .unwrap();
        assert!(resolved.ends_with("node_modules/left-pad/lib/pad.js"));
    }

    #[test]
    fn test_resolve_builtin_and_missing() {
        let temp = TempDir::new().unwrap();
        let parser = JavaScriptParser::new();
        let file = temp.path().join("a.js");
        assert!(parser.resolve_import_path("fs", &file, temp.path()).is_none());
        assert!(parser.resolve_import_path("node:path", &file, temp.path()).is_none());
        assert!(parser.resolve_import_path("./nope", &file, temp.path()).is_none());
        assert!(parser.resolve_import_path("not-installed", &file, temp.path()).is_none());
    }

    #[test]
    fn test_split_package() {
        assert_eq!(JavaScriptParser::split_package("lodash"), ("lodash", ""));
        assert_eq!(JavaScriptParser::split_package("lodash/get"), ("lodash", "get"));
        assert_eq!(JavaScriptParser::split_package("@babel/core"), ("@babel/core", ""));
        assert_eq!(
            JavaScriptParser::split_package("@babel/core/lib/x"),
            ("@babel/core", "lib/x")
        );
    }
}
