//! Python semantic analyzer.

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;

use crate::analysis::common::{self, enclosing_type, split_default, Modifiers, Signature, TypeSpan};
use crate::analysis::SemanticAnalyzer;
use crate::language::Language;
use crate::model::{AccessLevel, ParameterInfo, SemanticModel, TypeInfo, TypeKind, VariableInfo};
use crate::parser::scan::{
    generic_names, indent_width, indented_block, line_start, matching_paren, split_top_level,
};
use crate::parser::{LineIndex, PythonParser, RawFunction};

lazy_static::lazy_static! {
    static ref CLASS_RE: Regex = Regex::new(
        r"(?m)^([ \t]*)class[ \t]+(\w+)[ \t]*(?:\[([^\]]*)\])?[ \t]*(?:\(([^)]*)\))?[ \t]*:"
    )
    .unwrap();
    static ref DEF_HEADER_RE: Regex = Regex::new(
        r"^(async[ \t]+)?def[ \t]+\w+[ \t]*(?:\[([^\]]*)\])?[ \t]*\("
    )
    .unwrap();
    static ref CLASS_FIELD_RE: Regex = Regex::new(
        r"^(\w+)[ \t]*(?::[ \t]*([^=\n]+?))?[ \t]*(?:=[ \t]*([^=].*))?$"
    )
    .unwrap();
    static ref SELF_FIELD_RE: Regex = Regex::new(
        r"\bself\.(\w+)[ \t]*(?::[ \t]*([^=\n]+?))?[ \t]*=(?:[^=]|$)"
    )
    .unwrap();
    static ref MODULE_VAR_RE: Regex = Regex::new(
        r"(?m)^([A-Za-z_]\w*(?:[ \t]*,[ \t]*[A-Za-z_]\w*)*)[ \t]*(?::[ \t]*([^=\n]+?))?[ \t]*(=[^=]|=$|$)"
    )
    .unwrap();
}

const STATEMENT_KEYWORDS: &[&str] = &[
    "if", "elif", "else", "for", "while", "try", "except", "finally", "with", "lambda", "return",
    "pass", "break", "continue", "raise", "global", "nonlocal", "del", "assert", "yield", "import",
];

const ENUM_BASES: &[&str] = &["Enum", "IntEnum", "StrEnum", "Flag", "IntFlag"];

/// Python semantic analyzer.
pub struct PythonAnalyzer;

impl PythonAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Module name: the file stem, or the package directory for `__init__.py`.
    fn namespace(path: &str) -> String {
        let path = Path::new(path);
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        if stem == "__init__" {
            return path
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .unwrap_or("")
                .to_string();
        }
        stem.to_string()
    }

    /// Access implied by naming convention. `member` selects between
    /// class-member and module-level readings of a leading underscore.
    fn access(name: &str, member: bool) -> AccessLevel {
        if name.starts_with("__") && name.ends_with("__") {
            AccessLevel::Public
        } else if name.starts_with("__") && member {
            AccessLevel::Private
        } else if name.starts_with('_') {
            if member {
                AccessLevel::Protected
            } else {
                AccessLevel::Internal
            }
        } else {
            AccessLevel::Public
        }
    }

    /// Decorator names on the lines directly above `offset`, innermost last.
    /// `@functools.wraps(f)` yields `wraps`.
    fn decorators(text: &str, offset: usize) -> Vec<String> {
        let mut found = Vec::new();
        let mut end = line_start(text, offset);
        while end > 0 {
            let start = line_start(text, end - 1);
            let line = text[start..end].trim();
            let Some(decorator) = line.strip_prefix('@') else { break };
            let name = decorator.split('(').next().unwrap_or("");
            found.push(name.rsplit('.').next().unwrap_or(name).trim().to_string());
            end = start;
        }
        found.reverse();
        found
    }

    /// Indent of the first non-blank line of a block body.
    fn body_indent(text: &str, body_start: usize, body_end: usize) -> Option<usize> {
        text[body_start..body_end]
            .split('\n')
            .skip(1)
            .find(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
            .map(indent_width)
    }

    fn scan_types(masked: &str, indents: &mut HashMap<usize, usize>) -> Vec<TypeSpan> {
        let lines = LineIndex::new(masked);
        let mut spans = Vec::new();

        for caps in CLASS_RE.captures_iter(masked) {
            let (Some(whole), Some(indent), Some(name)) = (caps.get(0), caps.get(1), caps.get(2)) else {
                continue;
            };
            let colon = whole.end() - 1;
            let (body_start, body_end) = indented_block(masked, colon, indent_width(indent.as_str()));
            let decorators = Self::decorators(masked, indent.end());

            let mut bases = Vec::new();
            let mut is_abstract = false;
            let mut generics = caps.get(3).map(|g| generic_names(g.as_str())).unwrap_or_default();
            for base in caps.get(4).map(|b| split_top_level(b.as_str(), ',')).unwrap_or_default() {
                if let Some(meta) = base.strip_prefix("metaclass") {
                    is_abstract |= meta.contains("ABCMeta");
                    continue;
                }
                if base.contains('=') || base == "object" {
                    continue;
                }
                if let Some(params) = base.strip_prefix("Generic[").and_then(|b| b.strip_suffix(']')) {
                    generics.extend(generic_names(params));
                    continue;
                }
                is_abstract |= base == "ABC" || base == "abc.ABC";
                bases.push(base.to_string());
            }

            let base_name = |b: &String| b.rsplit('.').next().unwrap_or(b).to_string();
            let kind = if bases.iter().map(base_name).any(|b| b == "Protocol") {
                TypeKind::Interface
            } else if bases.iter().map(base_name).any(|b| ENUM_BASES.contains(&b.as_str())) {
                TypeKind::Enum
            } else if decorators.iter().any(|d| d == "dataclass") {
                TypeKind::Record
            } else {
                TypeKind::Class
            };

            let mut info = TypeInfo::new(name.as_str(), kind, "");
            info.access = Self::access(name.as_str(), !indent.as_str().is_empty());
            info.is_abstract = is_abstract;
            info.base_types = bases;
            info.generic_parameters = generics;

            if let Some(member_indent) = Self::body_indent(masked, body_start, body_end) {
                Self::read_class_fields(&mut info, masked, &lines, body_start, body_end, member_indent);
                indents.insert(indent.end(), member_indent);
            }

            spans.push(TypeSpan {
                info,
                start: indent.end(),
                end: body_end,
            });
        }

        Self::read_instance_fields(&mut spans, masked, &lines);
        spans
    }

    fn read_class_fields(
        info: &mut TypeInfo,
        text: &str,
        lines: &LineIndex,
        body_start: usize,
        body_end: usize,
        member_indent: usize,
    ) {
        let mut offset = body_start;
        for line in text[body_start..body_end].split('\n') {
            let line_offset = offset;
            offset += line.len() + 1;
            if line.trim().is_empty() || indent_width(line) != member_indent {
                continue;
            }
            let Some(caps) = CLASS_FIELD_RE.captures(line.trim()) else { continue };
            let Some(name) = caps.get(1).map(|m| m.as_str()) else { continue };
            let annotation = caps.get(2).map(|m| m.as_str().trim());
            let value = caps.get(3);
            if (annotation.is_none() && value.is_none()) || STATEMENT_KEYWORDS.contains(&name) {
                continue;
            }
            let is_enum = info.kind == TypeKind::Enum;
            info.fields.push(VariableInfo {
                name: name.to_string(),
                type_name: annotation.unwrap_or("").to_string(),
                line: lines.line_of(line_offset),
                access: Self::access(name, true),
                is_static: is_enum || (value.is_some() && info.kind == TypeKind::Class),
                is_readonly: is_enum,
                is_const: is_enum,
            });
        }
    }

    /// Attributes assigned through `self.` inside class bodies. Each belongs
    /// to the innermost enclosing class; the first assignment wins.
    fn read_instance_fields(spans: &mut [TypeSpan], text: &str, lines: &LineIndex) {
        for caps in SELF_FIELD_RE.captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else { continue };
            let Some(owner) = enclosing_type(spans, whole.start()).map(|s| s.start) else {
                continue;
            };
            let Some(span) = spans.iter_mut().find(|s| s.start == owner) else { continue };
            if span.info.fields.iter().any(|f| f.name == name.as_str()) {
                continue;
            }
            span.info.fields.push(VariableInfo {
                name: name.as_str().to_string(),
                type_name: caps.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
                line: lines.line_of(whole.start()),
                access: Self::access(name.as_str(), true),
                ..Default::default()
            });
        }
    }

    fn parse_params(list: &str, drop_receiver: bool) -> Vec<ParameterInfo> {
        let mut params: Vec<ParameterInfo> = split_top_level(list, ',')
            .into_iter()
            .filter(|p| *p != "*" && *p != "/")
            .map(|part| {
                let (decl, default) = split_default(part);
                let variadic = decl.starts_with('*');
                let decl = decl.trim_start_matches('*');
                let (name, type_name) = match decl.split_once(':') {
                    Some((name, ty)) => (name.trim(), ty.trim()),
                    None => (decl.trim(), ""),
                };
                ParameterInfo {
                    name: name.to_string(),
                    type_name: type_name.to_string(),
                    is_optional: variadic || default.is_some(),
                    default_value: default.unwrap_or("").to_string(),
                }
            })
            .collect();
        if drop_receiver && params.first().map(|p| p.name == "self" || p.name == "cls").unwrap_or(false) {
            params.remove(0);
        }
        params
    }

    fn signature(
        raw: &RawFunction,
        text: &str,
        enclosing: Option<&TypeSpan>,
        indents: &HashMap<usize, usize>,
    ) -> Option<Signature> {
        let sig = raw.signature(text);
        let header = DEF_HEADER_RE.captures(sig)?;
        let open = header.get(0)?.end() - 1;
        let close = matching_paren(sig, open)?;

        let line = &text[line_start(text, raw.offset)..raw.offset];
        let owner = enclosing.filter(|span| indents.get(&span.start) == Some(&indent_width(line)));

        let decorators = Self::decorators(text, raw.offset);
        let has = |d: &str| decorators.iter().any(|x| x == d);
        let is_static = has("staticmethod") || has("classmethod");

        let return_type = sig[close + 1..]
            .trim()
            .trim_end_matches(':')
            .trim()
            .trim_start_matches("->")
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .to_string();

        Some(Signature {
            parameters: Self::parse_params(&sig[open + 1..close], owner.is_some() && !has("staticmethod")),
            return_type,
            generic_parameters: header.get(2).map(|g| generic_names(g.as_str())).unwrap_or_default(),
            access: Self::access(&raw.name, owner.is_some()),
            modifiers: Modifiers {
                is_static,
                is_async: header.get(1).is_some(),
                is_abstract: has("abstractmethod"),
                is_override: has("override"),
                ..Default::default()
            },
            owner: owner.map(|t| t.info.name.clone()),
            receiver_name: None,
        })
    }

    fn scan_variables(masked: &str) -> Vec<VariableInfo> {
        let lines = LineIndex::new(masked);
        let mut variables = Vec::new();
        for caps in MODULE_VAR_RE.captures_iter(masked) {
            let (Some(whole), Some(names)) = (caps.get(0), caps.get(1)) else { continue };
            let annotation = caps.get(2).map(|m| m.as_str().trim());
            let assigned = caps.get(3).map(|m| m.as_str().starts_with('=')).unwrap_or(false);
            if !assigned && annotation.is_none() {
                continue;
            }
            for name in names.as_str().split(',').map(str::trim) {
                if STATEMENT_KEYWORDS.contains(&name) {
                    continue;
                }
                let is_const = name.chars().any(|c| c.is_ascii_uppercase())
                    && name.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
                variables.push(VariableInfo {
                    name: name.to_string(),
                    type_name: annotation.unwrap_or("").to_string(),
                    line: lines.line_of(whole.start()),
                    access: Self::access(name, false),
                    is_const,
                    ..Default::default()
                });
            }
        }
        variables
    }
}

impl Default for PythonAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SemanticAnalyzer for PythonAnalyzer {
    fn language(&self) -> Language {
        Language::Python
    }

    fn analyze_file(&self, path: &str, content: &str) -> SemanticModel {
        let parser = self.parser();
        let masked = PythonParser::mask_docstrings(content);
        let mut indents = HashMap::new();
        let types = Self::scan_types(&masked, &mut indents);

        common::assemble(
            parser,
            path,
            content,
            Self::namespace(path),
            common::import_infos(parser.extract_import_statements(content)),
            types,
            Self::scan_variables(&masked),
            |raw, enclosing| Self::signature(raw, content, enclosing, &indents),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#""""Billing models.

class NotAClass:
"""
import os
from dataclasses import dataclass
from abc import ABC, abstractmethod

MAX_RETRIES = 3
timeout: float = 2.5
_cache = {}


class Shape(ABC):
    """A shape."""

    sides = 0

    def __init__(self, name: str, scale: float = 1.0):
        self.name = name
        self.__scale = scale
        self.describe()

    @abstractmethod
    def area(self) -> float:
        ...

    def describe(self):
        print(self.name)
        return helper(self.name)

    @staticmethod
    def unit(*args, **kwargs) -> "Shape":
        return Square.create(1)

    def _hidden(self):
        def inner(x):
            return x
        return inner(1)


@dataclass(frozen=True)
class Point:
    x: int
    y: int = 0


class Square(Shape):
    @classmethod
    def create(cls, size):
        return cls(size)


async def helper(value, *, retries=MAX_RETRIES):
    await os.fsync(value)


def pair[T](a: T, b: T) -> tuple[T, T]:
    return (a, b)
"#;

    fn analyze() -> SemanticModel {
        PythonAnalyzer::new().analyze_file("billing/models.py", SOURCE)
    }

    #[test]
    fn test_namespace_from_path() {
        assert_eq!(PythonAnalyzer::namespace("billing/models.py"), "models");
        assert_eq!(PythonAnalyzer::namespace("billing/__init__.py"), "billing");
        assert_eq!(analyze().namespace, "models");
    }

    #[test]
    fn test_types_skip_docstrings() {
        let model = analyze();
        let names: Vec<&str> = model.types.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Shape", "Point", "Square"]);

        let shape = model.find_type("Shape").unwrap();
        assert_eq!(shape.qualified_name, "models.Shape");
        assert!(shape.is_abstract);
        assert_eq!(shape.base_types, vec!["ABC"]);
        assert_eq!((shape.start_line, shape.end_line), (14, 39));

        assert_eq!(model.find_type("Point").unwrap().kind, TypeKind::Record);
        assert_eq!(model.find_type("Square").unwrap().base_types, vec!["Shape"]);
    }

    #[test]
    fn test_fields() {
        let model = analyze();
        let shape = model.find_type("Shape").unwrap();
        let fields: Vec<(&str, AccessLevel)> =
            shape.fields.iter().map(|f| (f.name.as_str(), f.access)).collect();
        assert_eq!(
            fields,
            vec![
                ("sides", AccessLevel::Public),
                ("name", AccessLevel::Public),
                ("__scale", AccessLevel::Private)
            ]
        );
        assert!(shape.fields[0].is_static);
        assert_eq!(shape.fields[1].line, 20);

        let point = model.find_type("Point").unwrap();
        let fields: Vec<(&str, &str)> =
            point.fields.iter().map(|f| (f.name.as_str(), f.type_name.as_str())).collect();
        assert_eq!(fields, vec![("x", "int"), ("y", "int")]);
        assert!(!point.fields[1].is_static);
    }

    #[test]
    fn test_methods() {
        let model = analyze();
        let shape = model.find_type("Shape").unwrap();
        let methods: Vec<&str> = shape.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(methods, vec!["__init__", "area", "describe", "unit", "_hidden"]);

        let init = shape.find_method("__init__").unwrap();
        assert_eq!(init.access, AccessLevel::Public);
        assert_eq!(init.parameters.len(), 2);
        assert_eq!(init.parameters[0].type_name, "str");
        assert_eq!(init.parameters[1].default_value, "1.0");
        assert_eq!(init.start_line, 19);
        let describe = &init.calls[0];
        assert_eq!(describe.qualified_name.as_deref(), Some("models.Shape.describe"));

        let area = shape.find_method("area").unwrap();
        assert!(area.is_abstract);
        assert_eq!(area.return_type, "float");

        let unit = shape.find_method("unit").unwrap();
        assert!(unit.is_static);
        assert_eq!(unit.return_type, "Shape");
        assert!(unit.parameters.iter().all(|p| p.is_optional));
        assert_eq!(unit.calls[0].qualified_name.as_deref(), Some("models.Square.create"));

        assert_eq!(shape.find_method("_hidden").unwrap().access, AccessLevel::Protected);

        let create = model.find_type("Square").unwrap().find_method("create").unwrap();
        assert!(create.is_static);
        assert_eq!(create.parameters[0].name, "size");
    }

    #[test]
    fn test_nested_def_is_not_a_method() {
        let model = analyze();
        let inner = model.find_function("inner").unwrap();
        assert!(inner.owning_type.is_empty());
        assert_eq!(inner.qualified_name, "models.inner");
    }

    #[test]
    fn test_free_functions() {
        let model = analyze();
        let describe = model.find_type("Shape").unwrap().find_method("describe").unwrap();
        let callees: Vec<&str> = describe.calls.iter().map(|c| c.callee.as_str()).collect();
        assert_eq!(callees, vec!["helper"]);
        assert_eq!(describe.calls[0].qualified_name.as_deref(), Some("models.helper"));

        let helper = model.find_function("helper").unwrap();
        assert!(helper.is_async);
        let params: Vec<&str> = helper.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(params, vec!["value", "retries"]);
        assert_eq!(helper.parameters[1].default_value, "MAX_RETRIES");
        let fsync = &helper.calls[0];
        assert!(fsync.is_static);
        assert_eq!(fsync.qualified_name.as_deref(), Some("os.fsync"));

        let pair = model.find_function("pair").unwrap();
        assert_eq!(pair.generic_parameters, vec!["T"]);
        assert_eq!(pair.return_type, "tuple[T, T]");
    }

    #[test]
    fn test_module_variables() {
        let model = analyze();
        let vars: Vec<(&str, bool, usize)> =
            model.variables.iter().map(|v| (v.name.as_str(), v.is_const, v.line)).collect();
        assert_eq!(vars, vec![("MAX_RETRIES", true, 9), ("timeout", false, 10), ("_cache", false, 11)]);
        assert_eq!(model.variables[1].type_name, "float");
        assert_eq!(model.variables[2].access, AccessLevel::Internal);
    }
}
