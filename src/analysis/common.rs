//! Helpers shared by the per-language semantic analyzers.
//!
//! The analyzers differ in how they read declarations; everything after
//! that (owner linking, qualified names, call lifting, model assembly) is
//! done here the same way for every language.

use std::collections::{HashMap, HashSet};

use crate::language::Language;
use crate::model::{
    AccessLevel, FunctionCallInfo, FunctionInfo, ImportInfo, SemanticModel, TypeInfo, VariableInfo,
};
use crate::parser::{ImportStatement, LanguageParser, LineIndex, RawFunction};

/// A type declaration together with the byte range it covers.
#[derive(Debug, Clone)]
pub(crate) struct TypeSpan {
    pub info: TypeInfo,
    /// Offset of the declaration.
    pub start: usize,
    /// End of the body (exclusive).
    pub end: usize,
}

impl TypeSpan {
    pub fn contains(&self, offset: usize) -> bool {
        offset > self.start && offset < self.end
    }
}

/// Innermost type whose range contains `offset`.
pub(crate) fn enclosing_type(spans: &[TypeSpan], offset: usize) -> Option<&TypeSpan> {
    spans
        .iter()
        .filter(|s| s.contains(offset))
        .min_by_key(|s| s.end - s.start)
}

/// Declaration modifiers read from surface keywords.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Modifiers {
    pub access: Option<AccessLevel>,
    pub is_static: bool,
    pub is_async: bool,
    pub is_abstract: bool,
    pub is_virtual: bool,
    pub is_override: bool,
    pub is_final: bool,
    pub is_const: bool,
    pub is_readonly: bool,
}

impl Modifiers {
    /// Read modifiers from a whitespace-separated word list. Unknown words
    /// are ignored.
    pub fn parse(words: &str) -> Self {
        let mut m = Self::default();
        for word in words.split_whitespace() {
            match word {
                "public" => m.access = Some(AccessLevel::Public),
                "private" => {
                    m.access = Some(match m.access {
                        Some(AccessLevel::Protected) => AccessLevel::PrivateProtected,
                        _ => AccessLevel::Private,
                    })
                }
                "protected" => {
                    m.access = Some(match m.access {
                        Some(AccessLevel::Internal) => AccessLevel::ProtectedInternal,
                        Some(AccessLevel::Private) => AccessLevel::PrivateProtected,
                        _ => AccessLevel::Protected,
                    })
                }
                "internal" => {
                    m.access = Some(match m.access {
                        Some(AccessLevel::Protected) => AccessLevel::ProtectedInternal,
                        _ => AccessLevel::Internal,
                    })
                }
                "static" => m.is_static = true,
                "async" => m.is_async = true,
                "abstract" => m.is_abstract = true,
                "virtual" => m.is_virtual = true,
                "override" | "@Override" => m.is_override = true,
                "final" | "sealed" => m.is_final = true,
                "const" | "constexpr" => m.is_const = true,
                "readonly" => m.is_readonly = true,
                _ => {}
            }
        }
        m
    }
}

/// Details a language analyzer reads from a function's declaration text.
#[derive(Debug, Clone, Default)]
pub(crate) struct Signature {
    pub parameters: Vec<crate::model::ParameterInfo>,
    pub return_type: String,
    pub generic_parameters: Vec<String>,
    pub access: AccessLevel,
    pub modifiers: Modifiers,
    /// Owning type name, if the function is a method.
    pub owner: Option<String>,
    /// Name the body uses for its receiver besides `this`/`self`
    /// (Go receivers).
    pub receiver_name: Option<String>,
}

/// Join non-empty parts with the language's qualifier.
pub(crate) fn qualify(separator: &str, parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(separator)
}

/// Split `decl = default` at the first top-level `=` that is not part of
/// `==`, `=>`, `<=`, `>=` or `!=`.
pub(crate) fn split_default(part: &str) -> (&str, Option<&str>) {
    let bytes = part.as_bytes();
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'[' | b'{' | b'<' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'>' if i == 0 || bytes[i - 1] != b'=' => depth -= 1,
            b'=' if depth <= 0 => {
                let prev = if i > 0 { bytes[i - 1] } else { b' ' };
                let next = bytes.get(i + 1).copied().unwrap_or(b' ');
                if next == b'=' || next == b'>' || matches!(prev, b'=' | b'<' | b'>' | b'!') {
                    continue;
                }
                return (part[..i].trim(), Some(part[i + 1..].trim()));
            }
            _ => {}
        }
    }
    (part.trim(), None)
}

/// Convert parser import statements into model imports. Resolution is
/// filled in later by the orchestrator.
pub(crate) fn import_infos(statements: Vec<ImportStatement>) -> Vec<ImportInfo> {
    statements
        .into_iter()
        .map(|s| ImportInfo {
            raw: s.raw,
            alias: s.alias,
            resolved_path: String::new(),
            is_wildcard: s.wildcard,
            members: s.members,
        })
        .collect()
}

/// Names visible to call lifting within one file.
#[derive(Debug, Default)]
pub(crate) struct CallContext {
    namespace: String,
    separator: &'static str,
    free_functions: HashSet<String>,
    methods: HashMap<String, HashSet<String>>,
    declared_types: HashSet<String>,
    known_types: HashSet<String>,
    aliases: HashSet<String>,
}

impl CallContext {
    pub fn new(language: Language, namespace: &str, imports: &[ImportInfo]) -> Self {
        let mut ctx = Self {
            namespace: namespace.to_string(),
            separator: language.qualifier(),
            ..Default::default()
        };
        for import in imports {
            if let Some(alias) = &import.alias {
                if alias != "_" {
                    ctx.aliases.insert(alias.clone());
                }
            }
            ctx.known_types.extend(import.members.iter().cloned());
            if language == Language::Java && !import.is_wildcard {
                if let Some(last) = import.raw.rsplit('.').next() {
                    ctx.known_types.insert(last.to_string());
                }
            }
            if language == Language::Go && import.alias.is_none() {
                if let Some(last) = import.raw.rsplit('/').next() {
                    ctx.aliases.insert(last.to_string());
                }
            }
            if language == Language::Python && import.alias.is_none() && import.members.is_empty() {
                ctx.aliases.insert(import.raw.clone());
            }
        }
        ctx
    }

    pub fn add_type(&mut self, name: &str) {
        self.declared_types.insert(name.to_string());
    }

    pub fn add_function(&mut self, name: &str, owner: Option<&str>) {
        match owner {
            Some(owner) => {
                self.methods
                    .entry(owner.to_string())
                    .or_default()
                    .insert(name.to_string());
            }
            None => {
                self.free_functions.insert(name.to_string());
            }
        }
    }

    fn has_method(&self, owner: &str, name: &str) -> bool {
        self.methods.get(owner).map(|m| m.contains(name)).unwrap_or(false)
    }

    fn is_type_receiver(&self, receiver: &str) -> bool {
        receiver.starts_with(|c: char| c.is_uppercase())
            && (self.declared_types.contains(receiver) || self.known_types.contains(receiver))
    }

    /// Lift the call sites of one function into call infos, one per site.
    pub fn lift(
        &self,
        parser: &dyn LanguageParser,
        raw: &RawFunction,
        lines: &LineIndex,
        owner: Option<&str>,
        receiver_name: Option<&str>,
    ) -> Vec<FunctionCallInfo> {
        parser
            .extract_call_sites(&raw.body)
            .into_iter()
            .map(|site| {
                let mut call = FunctionCallInfo {
                    callee: site.name.clone(),
                    line: lines.line_of(raw.body_offset + site.offset),
                    ..Default::default()
                };
                let name = site.name.as_str();

                match site.receiver.as_deref() {
                    None => {
                        if let Some(owner) = owner.filter(|o| self.has_method(o, name)) {
                            call.qualified_name = Some(qualify(self.separator, &[&self.namespace, owner, name]));
                            call.receiver_type = Some(owner.to_string());
                        } else if self.free_functions.contains(name) {
                            call.qualified_name = Some(qualify(self.separator, &[&self.namespace, name]));
                        }
                    }
                    Some(r) if r == "this" || r == "self" || Some(r) == receiver_name => {
                        if let Some(owner) = owner {
                            call.receiver_type = Some(owner.to_string());
                            if self.has_method(owner, name) {
                                call.qualified_name =
                                    Some(qualify(self.separator, &[&self.namespace, owner, name]));
                            }
                        }
                    }
                    Some(r) if self.aliases.contains(r) => {
                        call.is_static = true;
                        call.qualified_name = Some(format!("{}{}{}", r, self.separator, name));
                    }
                    Some(r) if site.separator == "::" || self.is_type_receiver(r) => {
                        call.is_static = true;
                        call.receiver_type = Some(r.to_string());
                        if self.has_method(r, name) {
                            call.qualified_name = Some(qualify(self.separator, &[&self.namespace, r, name]));
                        }
                    }
                    Some(_) => {}
                }
                call
            })
            .collect()
    }
}

/// Assemble a file's semantic model from its types, captured functions and
/// variables.
///
/// `signature` reads a function's declaration. Returning `None` drops that
/// one declaration; the rest of the file is still analyzed.
#[allow(clippy::too_many_arguments)]
pub(crate) fn assemble<F>(
    parser: &dyn LanguageParser,
    path: &str,
    text: &str,
    namespace: String,
    imports: Vec<ImportInfo>,
    mut types: Vec<TypeSpan>,
    variables: Vec<VariableInfo>,
    signature: F,
) -> SemanticModel
where
    F: Fn(&RawFunction, Option<&TypeSpan>) -> Option<Signature>,
{
    let language = parser.language();
    let separator = language.qualifier();
    let lines = LineIndex::new(text);

    let mut ctx = CallContext::new(language, &namespace, &imports);
    for span in &types {
        ctx.add_type(&span.info.name);
    }

    let mut declared = Vec::new();
    for raw in parser.extract_functions(text) {
        let enclosing = enclosing_type(&types, raw.offset);
        match signature(&raw, enclosing) {
            Some(sig) => {
                ctx.add_function(&raw.name, sig.owner.as_deref());
                declared.push((raw, sig));
            }
            None => log::debug!("{}: skipped declaration of {}", path, raw.name),
        }
    }

    for span in types.iter_mut() {
        span.info.qualified_name = qualify(separator, &[&namespace, &span.info.name]);
        span.info.file_path = path.to_string();
        span.info.start_line = lines.line_of(span.start);
        span.info.end_line = lines.line_of(span.end.saturating_sub(1));
    }

    let mut functions = Vec::new();
    for (raw, sig) in declared {
        let owner = sig.owner.as_deref();
        let calls = ctx.lift(parser, &raw, &lines, owner, sig.receiver_name.as_deref());
        let info = FunctionInfo {
            qualified_name: qualify(separator, &[&namespace, owner.unwrap_or(""), &raw.name]),
            file_path: path.to_string(),
            start_line: lines.line_of(raw.offset),
            end_line: lines.line_of(raw.end_offset().saturating_sub(1)),
            return_type: sig.return_type,
            parameters: sig.parameters,
            generic_parameters: sig.generic_parameters,
            calls,
            access: sig.access,
            is_static: sig.modifiers.is_static,
            is_async: sig.modifiers.is_async,
            is_abstract: sig.modifiers.is_abstract,
            is_virtual: sig.modifiers.is_virtual,
            is_override: sig.modifiers.is_override,
            owning_type: owner.unwrap_or("").to_string(),
            name: raw.name,
        };

        match owner.and_then(|o| types.iter_mut().find(|t| t.info.name == o)) {
            Some(span) => span.info.methods.push(info),
            None => functions.push(info),
        }
    }

    SemanticModel {
        file_path: path.to_string(),
        namespace,
        types: types.into_iter().map(|t| t.info).collect(),
        functions,
        imports,
        variables,
    }
}

/// Lines that start at the top nesting level of the brace block opened at
/// `open` and ending at `end`, with their offsets. Brace counting skips
/// string literals but not comments.
pub(crate) fn member_lines(text: &str, open: usize, end: usize) -> Vec<(usize, &str)> {
    let end = end.min(text.len());
    if open >= end {
        return Vec::new();
    }
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut line_start = open + 1;
    let mut depth_at_line_start = 0usize;
    let mut i = open + 1;

    while i < end {
        let b = bytes[i];
        match quote {
            Some(_) if b == b'\\' => {
                i += 2;
                continue;
            }
            Some(q) if b == q || b == b'\n' => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'{' => depth += 1,
                b'}' => depth = depth.saturating_sub(1),
                _ => {}
            },
        }
        if b == b'\n' {
            if depth_at_line_start == 0 {
                lines.push((line_start, &text[line_start..i]));
            }
            line_start = i + 1;
            depth_at_line_start = depth;
        }
        i += 1;
    }
    if depth_at_line_start == 0 && line_start < end {
        lines.push((line_start, &text[line_start..end]));
    }
    lines
}

/// Start offsets of the top-level member lines of a type body. A function
/// whose declaration starts on one of these lines is a direct member; one
/// nested deeper (inside a method body) is not.
pub(crate) fn member_starts(text: &str, open: usize, end: usize) -> HashSet<usize> {
    member_lines(text, open, end)
        .into_iter()
        .map(|(offset, line)| offset + (line.len() - line.trim_start().len()))
        .collect()
}

/// Whether `offset` falls inside any captured function body.
pub(crate) fn inside_function(functions: &[RawFunction], offset: usize) -> bool {
    functions
        .iter()
        .any(|f| offset >= f.body_offset && offset < f.end_offset())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifiers_parse() {
        let m = Modifiers::parse("public static async");
        assert_eq!(m.access, Some(AccessLevel::Public));
        assert!(m.is_static && m.is_async);

        assert_eq!(
            Modifiers::parse("protected internal").access,
            Some(AccessLevel::ProtectedInternal)
        );
        assert_eq!(
            Modifiers::parse("private protected").access,
            Some(AccessLevel::PrivateProtected)
        );
        assert_eq!(Modifiers::parse("final int").access, None);
    }

    #[test]
    fn test_qualify_skips_empty_parts() {
        assert_eq!(qualify(".", &["", "Foo"]), "Foo");
        assert_eq!(qualify(".", &["pkg", "", "Foo"]), "pkg.Foo");
        assert_eq!(qualify("::", &["ui", "Widget", "draw"]), "ui::Widget::draw");
    }

    #[test]
    fn test_split_default() {
        assert_eq!(split_default("a: int = 1"), ("a: int", Some("1")));
        assert_eq!(split_default("cb = () => x"), ("cb", Some("() => x")));
        assert_eq!(split_default("f = a == b"), ("f", Some("a == b")));
        assert_eq!(split_default("Map<K, V> m"), ("Map<K, V> m", None));
        assert_eq!(split_default("x"), ("x", None));
    }

    #[test]
    fn test_member_lines_top_level_only() {
        let text = "class A {\n  int x;\n  void f() {\n    int y;\n  }\n  String s = \"{\";\n}";
        let open = text.find('{').unwrap();
        let lines: Vec<&str> = member_lines(text, open, text.len())
            .into_iter()
            .map(|(_, l)| l.trim())
            .filter(|l| !l.is_empty())
            .collect();
        assert_eq!(lines, vec!["int x;", "void f() {", "String s = \"{\";", "}"]);
    }

    #[test]
    fn test_enclosing_type_picks_innermost() {
        let span = |name: &str, start, end| TypeSpan {
            info: TypeInfo::new(name, crate::model::TypeKind::Class, "f"),
            start,
            end,
        };
        let spans = vec![span("Outer", 0, 100), span("Inner", 10, 50)];
        assert_eq!(enclosing_type(&spans, 20).map(|s| s.info.name.as_str()), Some("Inner"));
        assert_eq!(enclosing_type(&spans, 60).map(|s| s.info.name.as_str()), Some("Outer"));
        assert!(enclosing_type(&spans, 150).is_none());
    }
}
