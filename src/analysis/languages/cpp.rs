//! C/C++ semantic analyzer.
//!
//! Out-of-line definitions (`Widget::draw`) take their owner from the scope
//! prefix and their access and modifiers from the in-class declaration when
//! that is in the same file. Bodiless in-class declarations are not
//! reported as functions, except pure virtual ones.

use std::collections::{HashMap, HashSet};

use regex::Regex;

use crate::analysis::common::{self, inside_function, member_lines, split_default, Modifiers, Signature, TypeSpan};
use crate::analysis::SemanticAnalyzer;
use crate::language::Language;
use crate::model::{
    AccessLevel, FunctionInfo, ParameterInfo, SemanticModel, TypeInfo, TypeKind, VariableInfo,
};
use crate::parser::scan::{block_end, find_body_open, generic_names, matching_paren, split_top_level};
use crate::parser::{LineIndex, RawFunction};

lazy_static::lazy_static! {
    static ref NAMESPACE_RE: Regex = Regex::new(r"(?m)^[ \t]*(?:inline\s+)?namespace\s+([\w:]+)\s*\{").unwrap();
    static ref TYPE_RE: Regex = Regex::new(
        r"(?m)^[ \t]*(?:template\s*<([^;{}]*)>\s*)?(class|struct|union|enum(?:\s+class|\s+struct)?)\s+(?:\[\[[^\]]*\]\]\s*)?([A-Za-z_]\w*)"
    )
    .unwrap();
    static ref SECTION_RE: Regex = Regex::new(r"^(public|protected|private)\b[\w\s]*:$").unwrap();
    static ref DECLARATION_RE: Regex = Regex::new(
        r"(?m)^[ \t]*((?:(?:static|const|constexpr|extern|inline|thread_local|volatile|mutable)[ \t]+)*)([A-Za-z_][\w:<>,*& \t]*?)[ \t*&]+([A-Za-z_]\w*)[ \t]*(?:\[[^\]]*\])?[ \t]*(?:=[^;]*|\{[^;]*\})?;"
    )
    .unwrap();
}

/// Words leading a declaration that is not a variable.
const NON_VARIABLE_WORDS: &[&str] = &[
    "return", "using", "typedef", "friend", "class", "struct", "union", "enum", "namespace",
    "delete", "goto", "case", "template", "throw", "public", "protected", "private", "co_return",
];

const FUNCTION_MODIFIERS: &[&str] = &[
    "virtual", "static", "inline", "explicit", "constexpr", "friend", "extern",
];

/// Access and modifiers of a method as declared inside its class.
#[derive(Debug, Clone, Copy)]
struct Declared {
    access: AccessLevel,
    modifiers: Modifiers,
}

/// A bodiless in-class method declaration.
struct MethodDeclaration {
    name: String,
    return_type: String,
    parameters: Vec<ParameterInfo>,
    modifiers: Modifiers,
    pure: bool,
}

/// What the type scan collects besides the types themselves.
#[derive(Default)]
struct ClassMembers {
    /// Access in effect at each top-level member line of a class body.
    access_at: HashMap<usize, AccessLevel>,
    /// In-class declarations by (type, method).
    declared: HashMap<(String, String), Declared>,
}

/// C and C++ semantic analyzer.
pub struct CppAnalyzer;

impl CppAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Split leading function modifier words off a declaration head.
    fn split_modifiers(text: &str) -> (Modifiers, &str) {
        let mut words = Vec::new();
        let mut rest = text.trim_start();
        loop {
            let word = rest.split_whitespace().next().unwrap_or("");
            if !FUNCTION_MODIFIERS.contains(&word) {
                break;
            }
            words.push(word);
            rest = rest[word.len()..].trim_start();
        }
        (Modifiers::parse(&words.join(" ")), rest)
    }

    fn parse_params(list: &str) -> Vec<ParameterInfo> {
        split_top_level(list, ',')
            .into_iter()
            .filter(|p| *p != "void")
            .map(|part| {
                let (decl, default) = split_default(part);
                if decl == "..." {
                    return ParameterInfo {
                        name: "...".to_string(),
                        is_optional: true,
                        ..Default::default()
                    };
                }
                let trimmed = decl.trim_end_matches("[]");
                let ident_start = trimmed
                    .rfind(|c: char| !(c.is_alphanumeric() || c == '_'))
                    .map(|i| i + 1)
                    .unwrap_or(0);
                let type_part = trimmed[..ident_start].trim();
                let (name, type_name) = if type_part.is_empty() || type_part.ends_with("::") {
                    ("", decl.to_string())
                } else {
                    let suffix = &decl[trimmed.len()..];
                    (&trimmed[ident_start..], format!("{}{}", type_part, suffix))
                };
                ParameterInfo {
                    name: name.to_string(),
                    type_name,
                    is_optional: default.is_some(),
                    default_value: default.unwrap_or("").to_string(),
                }
            })
            .collect()
    }

    /// Parse a bodiless in-class method declaration such as
    /// `virtual void draw() const = 0;`.
    fn parse_declaration(line: &str) -> Option<MethodDeclaration> {
        let (mut modifiers, rest) = Self::split_modifiers(line);
        let open = rest.find('(')?;
        let close = matching_paren(rest, open)?;
        let head = rest[..open].trim_end();
        let name_start = head
            .rfind(|c: char| !(c.is_alphanumeric() || c == '_' || c == '~'))
            .map(|i| i + 1)
            .unwrap_or(0);
        let name = &head[name_start..];
        if name.is_empty() {
            return None;
        }
        let trailer = &rest[close + 1..];
        modifiers.is_override |= trailer.split_whitespace().any(|w| w == "override" || w == "override;");
        let pure = is_pure_specifier(trailer);
        modifiers.is_abstract = pure;
        modifiers.is_virtual |= pure || modifiers.is_override;
        Some(MethodDeclaration {
            name: name.to_string(),
            return_type: head[..name_start].trim().to_string(),
            parameters: Self::parse_params(&rest[open + 1..close]),
            modifiers,
            pure,
        })
    }

    fn scan_types(text: &str, members: &mut ClassMembers) -> Vec<TypeSpan> {
        let lines = LineIndex::new(text);
        let mut spans = Vec::new();

        for caps in TYPE_RE.captures_iter(text) {
            let (Some(keyword_match), Some(name)) = (caps.get(2), caps.get(3)) else {
                continue;
            };
            let Some(open) = find_body_open(text, name.end()) else {
                continue;
            };
            let header = &text[name.end()..open];
            // `struct Point make() {` is a function returning a struct
            if header.contains('(') {
                continue;
            }
            let end = block_end(text, open);
            let keyword = keyword_match.as_str();
            let (kind, default_access) = match keyword {
                "class" => (TypeKind::Class, AccessLevel::Private),
                "struct" | "union" => (TypeKind::Struct, AccessLevel::Public),
                _ => (TypeKind::Enum, AccessLevel::Public),
            };

            let mut info = TypeInfo::new(name.as_str(), kind, "");
            info.generic_parameters = caps.get(1).map(|g| generic_names(g.as_str())).unwrap_or_default();
            let header = header.trim();
            let header = match header.strip_prefix("final") {
                Some(rest) => {
                    info.is_sealed = true;
                    rest.trim()
                }
                None => header,
            };
            if kind != TypeKind::Enum {
                if let Some(bases) = header.strip_prefix(':') {
                    info.base_types = split_top_level(bases, ',')
                        .into_iter()
                        .map(|base| {
                            base.split_whitespace()
                                .filter(|w| !matches!(*w, "public" | "protected" | "private" | "virtual"))
                                .collect::<Vec<_>>()
                                .join(" ")
                        })
                        .collect();
                }
            }

            if kind == TypeKind::Enum {
                Self::read_enumerators(&mut info, text, &lines, open, end);
            } else {
                Self::read_members(&mut info, text, &lines, open, end, default_access, members);
            }
            spans.push(TypeSpan {
                info,
                start: keyword_match.start(),
                end,
            });
        }
        spans
    }

    fn read_enumerators(info: &mut TypeInfo, text: &str, lines: &LineIndex, open: usize, end: usize) {
        let body = &text[open + 1..end.saturating_sub(1).max(open + 1)];
        let mut cursor = 0;
        for entry in split_top_level(body, ',') {
            let name: String = entry
                .trim()
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            if name.is_empty() {
                continue;
            }
            let at = body[cursor..].find(&name).map(|i| cursor + i).unwrap_or(cursor);
            cursor = at + name.len();
            info.fields.push(VariableInfo {
                name,
                type_name: info.name.clone(),
                line: lines.line_of(open + 1 + at),
                is_static: true,
                is_readonly: true,
                is_const: true,
                ..Default::default()
            });
        }
    }

    fn read_members(
        info: &mut TypeInfo,
        text: &str,
        lines: &LineIndex,
        open: usize,
        end: usize,
        default_access: AccessLevel,
        members: &mut ClassMembers,
    ) {
        let mut access = default_access;
        for (offset, raw_line) in member_lines(text, open, end) {
            let line = raw_line.split("//").next().unwrap_or("").trim();
            if line.is_empty() || line.starts_with('}') || line.starts_with('#') {
                continue;
            }
            if let Some(caps) = SECTION_RE.captures(line) {
                access = match caps.get(1).map(|m| m.as_str()) {
                    Some("public") => AccessLevel::Public,
                    Some("protected") => AccessLevel::Protected,
                    _ => AccessLevel::Private,
                };
                continue;
            }
            let start = offset + (raw_line.len() - raw_line.trim_start().len());
            members.access_at.insert(start, access);
            let line_no = lines.line_of(offset);

            let paren = line.find('(');
            let assign = line.find('=');
            let is_call_like = match (paren, assign) {
                (Some(p), Some(a)) => p < a,
                (Some(_), None) => true,
                _ => false,
            };

            if is_call_like {
                if !line.ends_with(';') {
                    continue;
                }
                let Some(decl) = Self::parse_declaration(line) else { continue };
                members.declared.insert(
                    (info.name.clone(), decl.name.clone()),
                    Declared {
                        access,
                        modifiers: decl.modifiers,
                    },
                );
                if decl.pure {
                    info.is_abstract = true;
                    info.methods.push(FunctionInfo {
                        name: decl.name,
                        return_type: decl.return_type,
                        parameters: decl.parameters,
                        start_line: line_no,
                        end_line: line_no,
                        access,
                        is_abstract: true,
                        is_virtual: true,
                        is_static: decl.modifiers.is_static,
                        owning_type: info.name.clone(),
                        ..Default::default()
                    });
                }
                continue;
            }

            let first_word = line.split_whitespace().next().unwrap_or("");
            if NON_VARIABLE_WORDS.contains(&first_word) {
                continue;
            }
            if let Some(field) = Self::variable(line, line_no, access) {
                info.fields.push(field);
            }
        }
    }

    /// Read a single variable declaration (`static const int kMax = 4;`).
    fn variable(line: &str, line_no: usize, access: AccessLevel) -> Option<VariableInfo> {
        let caps = DECLARATION_RE.captures(line)?;
        let modifiers_text = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let type_start = caps.get(2)?.start();
        let name = caps.get(3)?;
        let modifiers = Modifiers::parse(modifiers_text);
        Some(VariableInfo {
            name: name.as_str().to_string(),
            type_name: line[type_start..name.start()].trim().to_string(),
            line: line_no,
            access,
            is_static: modifiers_text.split_whitespace().any(|w| w == "static"),
            is_readonly: modifiers.is_const,
            is_const: modifiers.is_const,
        })
    }

    /// Template parameters of a `template <...>` clause directly before `offset`.
    fn template_before(text: &str, offset: usize) -> Vec<String> {
        let head = text[..offset].trim_end();
        if !head.ends_with('>') {
            return Vec::new();
        }
        let Some(at) = head.rfind("template") else {
            return Vec::new();
        };
        let clause = head[at + "template".len()..].trim_start();
        if clause.contains(|c| c == ';' || c == '{' || c == '}') || !clause.starts_with('<') {
            return Vec::new();
        }
        generic_names(&clause[1..clause.len() - 1])
    }

    fn signature(
        raw: &RawFunction,
        text: &str,
        enclosing: Option<&TypeSpan>,
        members: &ClassMembers,
        namespaces: &HashSet<String>,
    ) -> Option<Signature> {
        let sig = raw.signature(text);
        let is_ident = |c: char| c.is_alphanumeric() || c == '_';
        let pos = sig.match_indices(raw.name.as_str()).map(|(i, _)| i).find(|&i| {
            let before_ok = sig[..i].chars().next_back().map(|c| !is_ident(c)).unwrap_or(true);
            before_ok && sig[i + raw.name.len()..].trim_start().starts_with('(')
        })?;
        let open = pos + raw.name.len() + sig[pos + raw.name.len()..].find('(')?;
        let close = matching_paren(sig, open)?;

        let before = &sig[..pos];
        let (scope, head) = if before.ends_with("::") {
            let chain_start = before
                .rfind(|c: char| c.is_whitespace() || c == '*' || c == '&')
                .map(|i| i + 1)
                .unwrap_or(0);
            let chain = before[chain_start..].trim_end_matches("::");
            let last = chain.rsplit("::").next().unwrap_or(chain);
            let last = last.split('<').next().unwrap_or(last);
            (Some(last.to_string()), &before[..chain_start])
        } else {
            (None, before)
        };

        let owner = match scope {
            Some(scope) if !namespaces.contains(&scope) => Some(scope),
            Some(_) => None,
            None => enclosing
                .filter(|_| members.access_at.contains_key(&raw.offset))
                .map(|t| t.info.name.clone()),
        };

        let (mut modifiers, return_type) = Self::split_modifiers(head);
        let trailer = &sig[close + 1..];
        let trailer = trailer.split(':').next().unwrap_or(trailer);
        if trailer.split_whitespace().any(|w| w == "override") {
            modifiers.is_override = true;
        }

        let declared = owner
            .as_ref()
            .and_then(|o| members.declared.get(&(o.clone(), raw.name.clone())));
        let access = members
            .access_at
            .get(&raw.offset)
            .copied()
            .or_else(|| declared.map(|d| d.access))
            .unwrap_or_default();
        if let Some(declared) = declared {
            modifiers.is_static |= declared.modifiers.is_static;
            modifiers.is_virtual |= declared.modifiers.is_virtual;
            modifiers.is_override |= declared.modifiers.is_override;
        }

        Some(Signature {
            parameters: Self::parse_params(&sig[open + 1..close]),
            return_type: return_type.trim().to_string(),
            generic_parameters: Self::template_before(text, raw.offset),
            access,
            modifiers,
            owner,
            receiver_name: None,
        })
    }

    fn scan_variables(text: &str, types: &[TypeSpan], functions: &[RawFunction]) -> Vec<VariableInfo> {
        let lines = LineIndex::new(text);
        DECLARATION_RE
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let trimmed = whole.as_str().trim_start();
                let start = whole.start() + (whole.as_str().len() - trimmed.len());
                let first_word = trimmed.split_whitespace().next().unwrap_or("");
                if NON_VARIABLE_WORDS.contains(&first_word)
                    || types.iter().any(|t| t.contains(start))
                    || inside_function(functions, start)
                {
                    return None;
                }
                Self::variable(trimmed, lines.line_of(start), AccessLevel::Public)
            })
            .collect()
    }
}

/// Whether a declaration trailer is a pure specifier (`= 0`), possibly
/// after qualifiers.
fn is_pure_specifier(trailer: &str) -> bool {
    let compact: String = trailer.chars().filter(|c| !c.is_whitespace()).collect();
    compact
        .trim_start_matches("const")
        .trim_start_matches("override")
        .trim_start_matches("noexcept")
        .starts_with("=0")
}

impl Default for CppAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SemanticAnalyzer for CppAnalyzer {
    fn language(&self) -> Language {
        Language::Cpp
    }

    fn analyze_file(&self, path: &str, content: &str) -> SemanticModel {
        let parser = self.parser();
        let mut namespaces = HashSet::new();
        let mut namespace = String::new();
        for caps in NAMESPACE_RE.captures_iter(content) {
            let Some(name) = caps.get(1) else { continue };
            if namespace.is_empty() {
                namespace = name.as_str().to_string();
            }
            namespaces.extend(name.as_str().split("::").map(str::to_string));
        }

        let mut members = ClassMembers::default();
        let mut types = Self::scan_types(content, &mut members);
        for span in types.iter_mut() {
            for method in span.info.methods.iter_mut() {
                method.file_path = path.to_string();
                method.qualified_name = common::qualify("::", &[&namespace, &span.info.name, &method.name]);
            }
        }
        let variables = Self::scan_variables(content, &types, &parser.extract_functions(content));

        common::assemble(
            parser,
            path,
            content,
            namespace,
            common::import_infos(parser.extract_import_statements(content)),
            types,
            variables,
            |raw, enclosing| Self::signature(raw, content, enclosing, &members, &namespaces),
        )
    }
}
