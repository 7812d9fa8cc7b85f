//! Go semantic analyzer.
//!
//! Extracts:
//! - Package name (the namespace of every qualified name)
//! - Struct and interface types with fields, embedded types and interface
//!   method sets; `func` types as delegates
//! - Functions and methods, linked to their receiver type
//! - Package-level `var` and `const` declarations

use regex::Regex;

use crate::analysis::common::{
    self, member_lines, qualify, split_default, Modifiers, Signature, TypeSpan,
};
use crate::analysis::SemanticAnalyzer;
use crate::language::Language;
use crate::model::{
    AccessLevel, FunctionInfo, ParameterInfo, SemanticModel, TypeInfo, TypeKind, VariableInfo,
};
use crate::parser::scan::{block_end, generic_names, matching_paren, split_top_level, LineIndex};

lazy_static::lazy_static! {
    static ref PACKAGE_RE: Regex = Regex::new(r"(?m)^[ \t]*package\s+(\w+)").unwrap();
    static ref TYPE_RE: Regex = Regex::new(
        r"(?m)^[ \t]*type\s+(\w+)\s*(?:\[([^\]]*)\])?\s+(struct|interface)\s*\{"
    )
    .unwrap();
    static ref FUNC_TYPE_RE: Regex = Regex::new(r"(?m)^[ \t]*type\s+(\w+)\s*(?:\[([^\]]*)\])?\s+func\s*\(").unwrap();
    static ref SIGNATURE_RE: Regex = Regex::new(
        r"^func\s*(?:\(\s*(?:(\w+)\s+)?\*?\s*([\w.]+)(?:\[[^\]]*\])?\s*\)\s*)?(\w+)\s*(?:\[([^\]]*)\])?\s*\("
    )
    .unwrap();
    static ref FIELD_RE: Regex = Regex::new(r"^(\w+(?:\s*,\s*\w+)*)\s+(\S.*)$").unwrap();
    static ref INTERFACE_METHOD_RE: Regex = Regex::new(r"^(\w+)\s*\(").unwrap();
    static ref VAR_SPEC_RE: Regex = Regex::new(r"^(\w+(?:\s*,\s*\w+)*)(?:\s+([^=]+?))?\s*(?:=.*)?$").unwrap();
}

/// Words that begin an unnamed parameter type rather than a name.
const TYPE_WORDS: &[&str] = &["func", "map", "chan", "struct", "interface"];

/// Go semantic analyzer.
pub struct GoAnalyzer;

impl GoAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Exported identifiers are public; everything else is package-internal.
    fn access_of(name: &str) -> AccessLevel {
        if name.starts_with(|c: char| c.is_uppercase()) {
            AccessLevel::Public
        } else {
            AccessLevel::Internal
        }
    }

    fn package_name(text: &str) -> String {
        PACKAGE_RE
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    }

    /// Parse a Go parameter list, where consecutive names may share a type
    /// (`a, b int`).
    fn parse_params(list: &str) -> Vec<ParameterInfo> {
        let parts = split_top_level(list, ',');
        let split: Vec<(&str, &str)> = parts
            .iter()
            .map(|p| match p.split_once(char::is_whitespace) {
                Some((first, rest))
                    if first.chars().all(|c| c.is_alphanumeric() || c == '_')
                        && !TYPE_WORDS.contains(&first) =>
                {
                    (first, rest.trim())
                }
                _ => (*p, ""),
            })
            .collect();

        let named = split.iter().any(|(_, ty)| !ty.is_empty());
        let mut params = Vec::with_capacity(split.len());
        let mut pending_type = "";
        for (first, ty) in split.into_iter().rev() {
            let (name, type_name) = if !named {
                ("", first)
            } else if ty.is_empty() {
                (first, pending_type)
            } else {
                pending_type = ty;
                (first, ty)
            };
            params.push(ParameterInfo {
                name: name.to_string(),
                type_name: type_name.to_string(),
                is_optional: type_name.starts_with("..."),
                default_value: String::new(),
            });
        }
        params.reverse();
        params
    }

    fn signature(sig: &str) -> Option<Signature> {
        let caps = SIGNATURE_RE.captures(sig.trim_start())?;
        let whole = caps.get(0)?;
        let sig = sig.trim_start();
        let close = matching_paren(sig, whole.end() - 1)?;
        let name = caps.get(3)?.as_str();

        Some(Signature {
            parameters: Self::parse_params(&sig[whole.end()..close]),
            return_type: sig[close + 1..].trim().to_string(),
            generic_parameters: caps.get(4).map(|g| generic_names(g.as_str())).unwrap_or_default(),
            access: Self::access_of(name),
            modifiers: Modifiers::default(),
            owner: caps.get(2).map(|m| m.as_str().rsplit('.').next().unwrap_or("").to_string()),
            receiver_name: caps.get(1).map(|m| m.as_str().to_string()),
        })
    }

    fn scan_types(text: &str, lines: &LineIndex) -> Vec<TypeSpan> {
        let mut spans = Vec::new();

        for caps in TYPE_RE.captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let kind = match caps.get(3).map(|m| m.as_str()) {
                Some("interface") => TypeKind::Interface,
                _ => TypeKind::Struct,
            };
            let open = whole.end() - 1;
            let end = block_end(text, open);

            let mut info = TypeInfo::new(name.as_str(), kind, "");
            info.access = Self::access_of(name.as_str());
            info.generic_parameters = caps.get(2).map(|g| generic_names(g.as_str())).unwrap_or_default();
            Self::read_members(&mut info, text, open, end, lines);

            let start = whole.start() + (whole.as_str().len() - whole.as_str().trim_start().len());
            spans.push(TypeSpan { info, start, end });
        }

        for caps in FUNC_TYPE_RE.captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let mut info = TypeInfo::new(name.as_str(), TypeKind::Delegate, "");
            info.access = Self::access_of(name.as_str());
            info.generic_parameters = caps.get(2).map(|g| generic_names(g.as_str())).unwrap_or_default();
            let end = text[whole.end()..]
                .find('\n')
                .map(|i| whole.end() + i)
                .unwrap_or(text.len());
            let start = whole.start() + (whole.as_str().len() - whole.as_str().trim_start().len());
            spans.push(TypeSpan { info, start, end });
        }

        spans.sort_by_key(|s| s.start);
        spans
    }

    /// Fields and embedded types of a struct, or the method set and embedded
    /// interfaces of an interface.
    fn read_members(info: &mut TypeInfo, text: &str, open: usize, end: usize, lines: &LineIndex) {
        for (offset, line) in member_lines(text, open, end) {
            let line = line.split("//").next().unwrap_or("");
            let line = line.split('`').next().unwrap_or("").trim();
            if line.is_empty() || line == "}" {
                continue;
            }

            if info.kind == TypeKind::Interface {
                if let Some(caps) = INTERFACE_METHOD_RE.captures(line) {
                    let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                        continue;
                    };
                    let open_paren = whole.end() - 1;
                    let Some(close) = matching_paren(line, open_paren) else {
                        continue;
                    };
                    let line_no = lines.line_of(offset);
                    info.methods.push(FunctionInfo {
                        name: name.as_str().to_string(),
                        parameters: Self::parse_params(&line[open_paren + 1..close]),
                        return_type: line[close + 1..].trim().to_string(),
                        start_line: line_no,
                        end_line: line_no,
                        access: Self::access_of(name.as_str()),
                        is_abstract: true,
                        owning_type: info.name.clone(),
                        ..Default::default()
                    });
                    continue;
                }
            }

            match FIELD_RE.captures(line) {
                Some(caps) if info.kind == TypeKind::Struct => {
                    let (Some(names), Some(ty)) = (caps.get(1), caps.get(2)) else {
                        continue;
                    };
                    for name in names.as_str().split(',').map(str::trim) {
                        info.fields.push(VariableInfo {
                            name: name.to_string(),
                            type_name: ty.as_str().trim().to_string(),
                            line: lines.line_of(offset),
                            access: Self::access_of(name),
                            ..Default::default()
                        });
                    }
                }
                Some(_) => {}
                None => {
                    // embedded type: `Base`, `*Base` or `pkg.Base`
                    let embedded = line.trim_start_matches('*');
                    if embedded.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
                        info.base_types.push(embedded.to_string());
                    }
                }
            }
        }
    }

    /// Package-level `var`/`const` declarations, single or grouped.
    fn scan_variables(text: &str) -> Vec<VariableInfo> {
        let mut vars = Vec::new();
        let mut block: Option<bool> = None;

        for (idx, raw_line) in text.lines().enumerate() {
            let line = raw_line.split("//").next().unwrap_or("").trim_end();
            let line_no = idx + 1;

            if let Some(is_const) = block {
                let spec = line.trim();
                if spec.starts_with(')') {
                    block = None;
                } else if !spec.is_empty() {
                    Self::push_var_spec(&mut vars, spec, line_no, is_const);
                }
                continue;
            }

            // Package-level declarations start in column zero.
            let (is_const, rest) = if let Some(rest) = line.strip_prefix("var ") {
                (false, rest.trim())
            } else if let Some(rest) = line.strip_prefix("const ") {
                (true, rest.trim())
            } else {
                continue;
            };
            if rest.starts_with('(') {
                let inner = rest[1..].trim();
                if inner.is_empty() {
                    block = Some(is_const);
                } else if let Some(spec) = inner.strip_suffix(')') {
                    Self::push_var_spec(&mut vars, spec.trim(), line_no, is_const);
                }
            } else {
                Self::push_var_spec(&mut vars, rest, line_no, is_const);
            }
        }
        vars
    }

    fn push_var_spec(vars: &mut Vec<VariableInfo>, spec: &str, line: usize, is_const: bool) {
        let (decl, _) = split_default(spec);
        let Some(caps) = VAR_SPEC_RE.captures(decl) else {
            return;
        };
        let type_name = caps.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
        for name in caps.get(1).map(|m| m.as_str()).unwrap_or("").split(',').map(str::trim) {
            if name.is_empty() || name == "_" {
                continue;
            }
            vars.push(VariableInfo {
                name: name.to_string(),
                type_name: type_name.clone(),
                line,
                access: Self::access_of(name),
                is_const,
                is_readonly: is_const,
                ..Default::default()
            });
        }
    }
}

impl Default for GoAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SemanticAnalyzer for GoAnalyzer {
    fn language(&self) -> Language {
        Language::Go
    }

    fn analyze_file(&self, path: &str, content: &str) -> SemanticModel {
        let parser = self.parser();
        let lines = LineIndex::new(content);
        let namespace = Self::package_name(content);

        let mut types = Self::scan_types(content, &lines);
        for span in types.iter_mut() {
            for method in span.info.methods.iter_mut() {
                method.file_path = path.to_string();
                method.qualified_name = qualify(".", &[&namespace, &span.info.name, &method.name]);
            }
        }

        common::assemble(
            parser,
            path,
            content,
            namespace,
            common::import_infos(parser.extract_import_statements(content)),
            types,
            Self::scan_variables(content),
            |raw, _| Self::signature(raw.signature(content)),
        )
    }
}
