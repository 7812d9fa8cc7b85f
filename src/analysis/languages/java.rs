//! Java semantic analyzer.
//!
//! Types are qualified by the package. Members without an access modifier
//! are package-private (`Internal`), except inside interfaces where they
//! are public.

use std::collections::HashSet;

use regex::Regex;

use crate::analysis::common::{
    self, enclosing_type, member_lines, member_starts, Modifiers, Signature, TypeSpan,
};
use crate::analysis::SemanticAnalyzer;
use crate::language::Language;
use crate::model::{
    AccessLevel, FunctionInfo, ParameterInfo, SemanticModel, TypeInfo, TypeKind, VariableInfo,
};
use crate::parser::scan::{block_end, find_body_open, generic_names, matching_paren, split_top_level};
use crate::parser::{LineIndex, RawFunction};

lazy_static::lazy_static! {
    static ref PACKAGE_RE: Regex = Regex::new(r"(?m)^\s*package\s+([\w.]+)\s*;").unwrap();
    static ref TYPE_RE: Regex = Regex::new(
        r"(?m)^[ \t]*((?:(?:public|protected|private|static|abstract|final|sealed|non-sealed|strictfp)\s+)*)(class|interface|enum|record|@interface)\s+([A-Za-z_$][\w$]*)"
    )
    .unwrap();
    static ref CLAUSE_RE: Regex = Regex::new(r"\b(extends|implements|permits)\b").unwrap();
    static ref FIELD_RE: Regex = Regex::new(
        r"^((?:(?:public|protected|private|static|final|transient|volatile)\s+)*)([\w$.<>\[\],? ]+?)\s+([A-Za-z_$][\w$]*)\s*(?:=.*)?;$"
    )
    .unwrap();
    static ref ANNOTATION_RE: Regex = Regex::new(r"^@[\w$.]+(?:\s*\([^)]*\))?\s*").unwrap();
}

static MODIFIER_WORDS: &[&str] = &[
    "public", "protected", "private", "static", "final", "abstract", "synchronized", "native",
    "default", "strictfp", "transient", "volatile", "sealed", "non-sealed",
];

/// Java semantic analyzer.
pub struct JavaAnalyzer;

impl JavaAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Drop leading annotations from a declaration fragment.
    fn strip_annotations(mut text: &str) -> &str {
        text = text.trim_start();
        while let Some(m) = ANNOTATION_RE.find(text) {
            text = text[m.end()..].trim_start();
        }
        text
    }

    /// Split leading modifier words (and annotations) off a declaration.
    fn split_modifiers(text: &str) -> (Modifiers, &str) {
        let mut words = Vec::new();
        let mut rest = Self::strip_annotations(text);
        loop {
            let word = rest.split_whitespace().next().unwrap_or("");
            if !MODIFIER_WORDS.contains(&word) {
                break;
            }
            words.push(word);
            rest = Self::strip_annotations(&rest[word.len()..]);
        }
        (Modifiers::parse(&words.join(" ")), rest)
    }

    /// Offset of the `>` closing the `<` at the start of `text`.
    fn angle_close(text: &str) -> Option<usize> {
        let mut depth = 0usize;
        for (i, c) in text.char_indices() {
            match c {
                '<' => depth += 1,
                '>' => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Text between the end of the previous statement or block and `offset`,
    /// where a declaration's annotations sit.
    fn annotations_before(text: &str, offset: usize) -> &str {
        let head = &text[..offset];
        let start = head
            .rfind(|c| c == ';' || c == '{' || c == '}')
            .map(|i| i + 1)
            .unwrap_or(0);
        &head[start..]
    }

    fn parse_params(list: &str) -> Vec<ParameterInfo> {
        split_top_level(list, ',')
            .into_iter()
            .filter_map(|part| {
                let mut decl = Self::strip_annotations(part);
                while let Some(rest) = decl.strip_prefix("final ") {
                    decl = Self::strip_annotations(rest);
                }
                let split = decl.rfind(|c: char| c.is_whitespace())?;
                let mut type_name = decl[..split].trim().to_string();
                let mut name = decl[split..].trim();
                while let Some(stripped) = name.strip_suffix("[]") {
                    type_name.push_str("[]");
                    name = stripped;
                }
                Some(ParameterInfo {
                    name: name.to_string(),
                    is_optional: type_name.ends_with("..."),
                    type_name,
                    default_value: String::new(),
                })
            })
            .collect()
    }

    fn type_list(text: &str) -> Vec<String> {
        split_top_level(text, ',').into_iter().map(str::to_string).collect()
    }

    fn scan_types(text: &str, members: &mut HashSet<usize>) -> Vec<TypeSpan> {
        let lines = LineIndex::new(text);
        let mut spans: Vec<TypeSpan> = Vec::new();

        for caps in TYPE_RE.captures_iter(text) {
            let (Some(whole), Some(keyword), Some(name)) = (caps.get(0), caps.get(2), caps.get(3)) else {
                continue;
            };
            let Some(open) = find_body_open(text, whole.end()) else {
                continue;
            };
            let end = block_end(text, open);
            let modifiers = Modifiers::parse(caps.get(1).map(|m| m.as_str()).unwrap_or(""));
            let kind = match keyword.as_str() {
                "interface" | "@interface" => TypeKind::Interface,
                "enum" => TypeKind::Enum,
                "record" => TypeKind::Record,
                _ => TypeKind::Class,
            };

            let start = whole.start() + (whole.as_str().len() - whole.as_str().trim_start().len());
            let in_interface = enclosing_type(&spans, start)
                .map(|t| t.info.kind == TypeKind::Interface)
                .unwrap_or(false);

            let mut info = TypeInfo::new(name.as_str(), kind, "");
            info.access = modifiers.access.unwrap_or(if in_interface {
                AccessLevel::Public
            } else {
                AccessLevel::Internal
            });
            info.is_abstract = modifiers.is_abstract;
            info.is_sealed = modifiers.is_final;
            info.is_static = modifiers.is_static;

            let components = Self::read_header(&mut info, &text[whole.end()..open]);
            if let Some(components) = components {
                let line = lines.line_of(start);
                for param in Self::parse_params(&components) {
                    info.fields.push(VariableInfo {
                        name: param.name,
                        type_name: param.type_name,
                        line,
                        access: AccessLevel::Private,
                        is_readonly: true,
                        ..Default::default()
                    });
                }
            }
            if kind == TypeKind::Enum {
                Self::read_enum_constants(&mut info, text, &lines, open, end);
            }
            Self::read_members(&mut info, text, &lines, open, end);
            members.extend(member_starts(text, open, end));

            spans.push(TypeSpan { info, start, end });
        }
        spans
    }

    /// Read generics, record components and the extends/implements clauses.
    /// Returns the record component list if there is one.
    fn read_header(info: &mut TypeInfo, header: &str) -> Option<String> {
        let mut rest = header.trim_start();
        if rest.starts_with('<') {
            if let Some(close) = Self::angle_close(rest) {
                info.generic_parameters = generic_names(&rest[1..close]);
                rest = rest[close + 1..].trim_start();
            }
        }
        let mut components = None;
        if rest.starts_with('(') {
            if let Some(close) = matching_paren(rest, 0) {
                components = Some(rest[1..close].to_string());
                rest = &rest[close + 1..];
            }
        }

        let clauses: Vec<(&str, usize, usize)> = CLAUSE_RE
            .captures_iter(rest)
            .filter_map(|c| c.get(1).map(|m| (m.as_str(), m.start(), m.end())))
            .collect();
        for (i, (keyword, _, body_start)) in clauses.iter().enumerate() {
            let body_end = clauses.get(i + 1).map(|c| c.1).unwrap_or(rest.len());
            let list = Self::type_list(&rest[*body_start..body_end]);
            match (*keyword, info.kind) {
                ("extends", TypeKind::Interface) => info.interfaces.extend(list),
                ("extends", _) => info.base_types.extend(list),
                ("implements", _) => info.interfaces.extend(list),
                _ => {}
            }
        }
        components
    }

    /// Enum constants: the entries before the first top-level `;`.
    fn read_enum_constants(info: &mut TypeInfo, text: &str, lines: &LineIndex, open: usize, end: usize) {
        let bytes = text.as_bytes();
        let mut depth = 0i32;
        let mut stop = end.saturating_sub(1).max(open + 1);
        for (i, &b) in bytes.iter().enumerate().take(end).skip(open + 1) {
            match b {
                b'(' | b'{' => depth += 1,
                b')' | b'}' => depth -= 1,
                b';' if depth == 0 => {
                    stop = i;
                    break;
                }
                _ => {}
            }
            if depth < 0 {
                stop = i;
                break;
            }
        }

        let section = &text[open + 1..stop];
        let mut cursor = 0;
        for entry in split_top_level(section, ',') {
            let entry = Self::strip_annotations(entry);
            let name: String = entry
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
                .collect();
            if name.is_empty() {
                continue;
            }
            let at = section[cursor..].find(&name).map(|i| cursor + i).unwrap_or(cursor);
            cursor = at + name.len();
            info.fields.push(VariableInfo {
                name,
                type_name: info.name.clone(),
                line: lines.line_of(open + 1 + at),
                access: AccessLevel::Public,
                is_static: true,
                is_readonly: true,
                is_const: true,
            });
        }
    }

    fn read_members(info: &mut TypeInfo, text: &str, lines: &LineIndex, open: usize, end: usize) {
        let is_interface = info.kind == TypeKind::Interface;
        let default_access = if is_interface {
            AccessLevel::Public
        } else {
            AccessLevel::Internal
        };

        for (offset, line) in member_lines(text, open, end) {
            let line = line.split("//").next().unwrap_or("").trim();
            let line = Self::strip_annotations(line);
            if line.is_empty() || line.starts_with('}') || line.starts_with('*') || line.starts_with("/*") {
                continue;
            }
            let paren = line.find('(');
            let assign = line.find('=');
            let line_no = lines.line_of(offset);

            match (paren, assign) {
                (Some(p), a) if a.map(|a| p < a).unwrap_or(true) => {
                    // bodiless method: abstract, or any method of an interface
                    if !line.ends_with(';') {
                        continue;
                    }
                    let (modifiers, rest) = Self::split_modifiers(line);
                    if !(is_interface || modifiers.is_abstract) {
                        continue;
                    }
                    let Some(p) = rest.find('(') else { continue };
                    let Some(close) = matching_paren(rest, p) else { continue };
                    let head = rest[..p].trim();
                    let Some(split) = head.rfind(|c: char| c.is_whitespace()) else {
                        continue;
                    };
                    let (return_type, generic_parameters) = Self::return_and_generics(&head[..split]);
                    info.methods.push(FunctionInfo {
                        name: head[split..].trim().to_string(),
                        return_type,
                        parameters: Self::parse_params(&rest[p + 1..close]),
                        generic_parameters,
                        start_line: line_no,
                        end_line: line_no,
                        access: modifiers.access.unwrap_or(default_access),
                        is_static: modifiers.is_static,
                        is_abstract: true,
                        owning_type: info.name.clone(),
                        ..Default::default()
                    });
                }
                _ => {
                    let Some(caps) = FIELD_RE.captures(line) else { continue };
                    let (Some(type_name), Some(name)) = (caps.get(2), caps.get(3)) else {
                        continue;
                    };
                    let modifiers = Modifiers::parse(caps.get(1).map(|m| m.as_str()).unwrap_or(""));
                    let constant = is_interface || (modifiers.is_static && modifiers.is_final);
                    info.fields.push(VariableInfo {
                        name: name.as_str().to_string(),
                        type_name: type_name.as_str().trim().to_string(),
                        line: line_no,
                        access: modifiers.access.unwrap_or(default_access),
                        is_static: is_interface || modifiers.is_static,
                        is_readonly: constant || modifiers.is_final,
                        is_const: constant,
                    });
                }
            }
        }
    }

    /// Split `<T> List<T>` into the return type and generic names.
    fn return_and_generics(text: &str) -> (String, Vec<String>) {
        let text = text.trim();
        if text.starts_with('<') {
            if let Some(close) = Self::angle_close(text) {
                return (text[close + 1..].trim().to_string(), generic_names(&text[1..close]));
            }
        }
        (text.to_string(), Vec::new())
    }

    fn signature(
        raw: &RawFunction,
        text: &str,
        owner: Option<&TypeSpan>,
    ) -> Option<Signature> {
        let sig = raw.signature(text);
        let is_ident = |c: char| c.is_alphanumeric() || c == '_' || c == '$';
        let pos = sig.match_indices(raw.name.as_str()).map(|(i, _)| i).find(|&i| {
            let before_ok = sig[..i].chars().next_back().map(|c| !is_ident(c)).unwrap_or(true);
            before_ok && sig[i + raw.name.len()..].trim_start().starts_with('(')
        })?;
        let open = pos + raw.name.len() + sig[pos + raw.name.len()..].find('(')?;
        let close = matching_paren(sig, open)?;

        let (mut modifiers, rest) = Self::split_modifiers(&sig[..pos]);
        let (return_type, generic_parameters) = Self::return_and_generics(rest);
        if Self::annotations_before(text, raw.offset).contains("@Override") {
            modifiers.is_override = true;
        }

        let in_interface = owner.map(|t| t.info.kind == TypeKind::Interface).unwrap_or(false);
        let access = modifiers.access.unwrap_or(if in_interface {
            AccessLevel::Public
        } else {
            AccessLevel::Internal
        });

        Some(Signature {
            parameters: Self::parse_params(&sig[open + 1..close]),
            return_type,
            generic_parameters,
            access,
            modifiers,
            owner: owner.map(|t| t.info.name.clone()),
            receiver_name: None,
        })
    }
}

impl Default for JavaAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SemanticAnalyzer for JavaAnalyzer {
    fn language(&self) -> Language {
        Language::Java
    }

    fn analyze_file(&self, path: &str, content: &str) -> SemanticModel {
        let parser = self.parser();
        let namespace = PACKAGE_RE
            .captures(content)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        let mut members = HashSet::new();
        let mut types = Self::scan_types(content, &mut members);
        for span in types.iter_mut() {
            for method in span.info.methods.iter_mut() {
                method.file_path = path.to_string();
                method.qualified_name = common::qualify(".", &[&namespace, &span.info.name, &method.name]);
            }
        }

        common::assemble(
            parser,
            path,
            content,
            namespace,
            common::import_infos(parser.extract_import_statements(content)),
            types,
            Vec::new(),
            |raw, enclosing| {
                let owner = enclosing.filter(|_| members.contains(&raw.offset));
                Self::signature(raw, content, owner)
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"package com.acme.users;

import java.util.List;
import com.acme.data.Repo;

/** Service. */
@Service
public class UserService extends BaseService implements Closeable, Auditable<User> {
    private static final int LIMIT = 10;
    @Inject
    private Repo repo;
    protected List<String> names = new ArrayList<>();

    public UserService(Repo repo) {
        this.repo = repo;
        init();
    }

    private void init() {
        Repo.connect(LIMIT);
    }

    @Override
    public <T> List<T> findAll(final String name, int... ids) throws IOException {
        Runnable r = new Runnable() {
            public void run() {
                log();
            }
        };
        return repo.query(name);
    }

    static void log() {
    }
}

interface Auditable<T> extends Serializable {
    int VERSION = 2;
    void audit(T item, String reason);
}

enum Status {
    ACTIVE("a"), INACTIVE("i");

    private final String code;

    Status(String code) {
        this.code = code;
    }
}

record Point(int x, int y) implements Shape {
    double norm() {
        return Math.sqrt(x * x + y * y);
    }
}

abstract class Base {
    abstract void run(int times);
}
"#;

    fn analyze() -> SemanticModel {
        JavaAnalyzer::new().analyze_file("src/main/java/com/acme/users/UserService.java", SOURCE)
    }

    #[test]
    fn test_types() {
        let model = analyze();
        assert_eq!(model.namespace, "com.acme.users");
        let kinds: Vec<(&str, TypeKind)> = model.types.iter().map(|t| (t.name.as_str(), t.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("UserService", TypeKind::Class),
                ("Auditable", TypeKind::Interface),
                ("Status", TypeKind::Enum),
                ("Point", TypeKind::Record),
                ("Base", TypeKind::Class),
            ]
        );

        let service = model.find_type("UserService").unwrap();
        assert_eq!(service.qualified_name, "com.acme.users.UserService");
        assert_eq!((service.start_line, service.end_line), (8, 35));
        assert_eq!(service.access, AccessLevel::Public);
        assert_eq!(service.base_types, vec!["BaseService"]);
        assert_eq!(service.interfaces, vec!["Closeable", "Auditable<User>"]);

        let auditable = model.find_type("Auditable").unwrap();
        assert_eq!(auditable.access, AccessLevel::Internal);
        assert_eq!(auditable.generic_parameters, vec!["T"]);
        assert_eq!(auditable.interfaces, vec!["Serializable"]);

        assert!(model.find_type("Base").unwrap().is_abstract);
    }

    #[test]
    fn test_fields() {
        let model = analyze();
        let service = model.find_type("UserService").unwrap();
        let fields: Vec<(&str, &str, AccessLevel)> = service
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.type_name.as_str(), f.access))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("LIMIT", "int", AccessLevel::Private),
                ("repo", "Repo", AccessLevel::Private),
                ("names", "List<String>", AccessLevel::Protected),
            ]
        );
        assert!(service.fields[0].is_const);
        assert_eq!(service.fields[1].line, 11);

        let version = &model.find_type("Auditable").unwrap().fields[0];
        assert_eq!(version.name, "VERSION");
        assert!(version.is_const && version.is_static);
        assert_eq!(version.access, AccessLevel::Public);

        let status = model.find_type("Status").unwrap();
        let names: Vec<&str> = status.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["ACTIVE", "INACTIVE", "code"]);
        assert_eq!(status.fields[1].line, 43);

        let point = model.find_type("Point").unwrap();
        let components: Vec<&str> = point.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(components, vec!["x", "y"]);
        assert!(point.fields.iter().all(|f| f.is_readonly));
        assert_eq!(point.interfaces, vec!["Shape"]);
    }

    #[test]
    fn test_methods() {
        let model = analyze();
        let service = model.find_type("UserService").unwrap();
        let names: Vec<&str> = service.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["UserService", "init", "findAll", "log"]);

        let find_all = service.find_method("findAll").unwrap();
        assert_eq!(find_all.qualified_name, "com.acme.users.UserService.findAll");
        assert_eq!(find_all.start_line, 24);
        assert_eq!(find_all.generic_parameters, vec!["T"]);
        assert_eq!(find_all.return_type, "List<T>");
        assert!(find_all.is_override);
        let params: Vec<(&str, &str)> = find_all
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.type_name.as_str()))
            .collect();
        assert_eq!(params, vec![("name", "String"), ("ids", "int...")]);
        assert!(find_all.parameters[1].is_optional);
        let log = find_all.calls.iter().find(|c| c.callee == "log").unwrap();
        assert_eq!(log.qualified_name.as_deref(), Some("com.acme.users.UserService.log"));

        let init = service.find_method("init").unwrap();
        assert_eq!(init.access, AccessLevel::Private);
        assert_eq!(init.calls[0].callee, "connect");
        assert!(init.calls[0].is_static);
        assert_eq!(init.calls[0].receiver_type.as_deref(), Some("Repo"));

        let ctor = service.find_method("UserService").unwrap();
        assert_eq!(ctor.return_type, "");
        assert_eq!(ctor.calls[0].qualified_name.as_deref(), Some("com.acme.users.UserService.init"));

        let log = service.find_method("log").unwrap();
        assert!(log.is_static);
        assert_eq!(log.access, AccessLevel::Internal);
    }

    #[test]
    fn test_anonymous_class_method_is_not_a_member() {
        let model = analyze();
        let run = model.find_function("run").unwrap();
        assert!(run.owning_type.is_empty());
    }

    #[test]
    fn test_bodiless_methods() {
        let model = analyze();
        let audit = model.find_type("Auditable").unwrap().find_method("audit").unwrap();
        assert!(audit.is_abstract);
        assert_eq!(audit.access, AccessLevel::Public);
        assert_eq!(audit.qualified_name, "com.acme.users.Auditable.audit");
        assert_eq!(audit.parameters.len(), 2);

        let run = model.find_type("Base").unwrap().find_method("run").unwrap();
        assert!(run.is_abstract);
        assert_eq!(run.return_type, "void");
        assert_eq!(run.parameters[0].type_name, "int");

        let status = model.find_type("Status").unwrap();
        assert_eq!(status.methods.len(), 1);
        let norm = model.find_type("Point").unwrap().find_method("norm").unwrap();
        assert_eq!(norm.return_type, "double");
    }
}
