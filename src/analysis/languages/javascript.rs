//! JavaScript / TypeScript semantic analyzer.
//!
//! JavaScript has no namespace declaration, so qualified names are
//! `Class.method` or the bare function name.

use std::collections::HashSet;

use regex::Regex;

use crate::analysis::common::{
    self, member_lines, member_starts, qualify, split_default, Modifiers, Signature, TypeSpan,
};
use crate::analysis::SemanticAnalyzer;
use crate::language::Language;
use crate::model::{
    AccessLevel, FunctionInfo, ParameterInfo, SemanticModel, TypeInfo, TypeKind, VariableInfo,
};
use crate::parser::scan::{block_end, generic_names, matching_paren, split_top_level, LineIndex};
use crate::parser::RawFunction;

lazy_static::lazy_static! {
    static ref TYPE_RE: Regex = Regex::new(
        r"(?m)^[ \t]*(?:export\s+)?(?:default\s+)?(?:declare\s+)?(abstract\s+)?(class|interface|enum)\s+([\w$]+)\s*(?:<([^{]*?)>)?\s*(?:extends\s+([^{]*?))?\s*(?:implements\s+([^{]*?))?\s*\{"
    )
    .unwrap();
    static ref FIELD_RE: Regex = Regex::new(
        r"^((?:(?:public|private|protected|static|readonly|declare|abstract|override)\s+)*)(#?[\w$]+)\s*([?!])?\s*(?::\s*([^=;(]+?))?\s*(?:=\s*[^;]*)?;?$"
    )
    .unwrap();
    static ref MEMBER_SIGNATURE_RE: Regex = Regex::new(
        r"^((?:(?:public|private|protected|abstract|static|readonly)\s+)*)([\w$]+)\s*\??\s*(?:<[^>]*>)?\s*\("
    )
    .unwrap();
    static ref ENUM_MEMBER_RE: Regex = Regex::new(r"^([\w$]+)\s*(?:=\s*[^,]+)?,?$").unwrap();
    static ref VARIABLE_RE: Regex = Regex::new(
        r"(?m)^(?:export\s+)?(const|let|var)\s+([\w$]+)\s*(?::\s*([^=;\n]+?))?\s*(=|;|$)"
    )
    .unwrap();
    static ref FUNCTION_INIT_RE: Regex = Regex::new(
        r"^\s*(?:async\s+)?(?:function\b|\([^()]*\)\s*(?::[^=]+)?=>|[\w$]+\s*=>|require\s*\()"
    )
    .unwrap();
    static ref SINGLE_PARAM_RE: Regex = Regex::new(r"([\w$]+)\s*=>\s*$").unwrap();
}

/// JavaScript and TypeScript semantic analyzer.
pub struct JavaScriptAnalyzer;

impl JavaScriptAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn type_list(list: Option<regex::Match>) -> Vec<String> {
        list.map(|m| split_top_level(m.as_str(), ',').into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn scan_types(text: &str, members: &mut HashSet<usize>) -> Vec<TypeSpan> {
        let mut spans = Vec::new();

        for caps in TYPE_RE.captures_iter(text) {
            let (Some(whole), Some(keyword), Some(name)) = (caps.get(0), caps.get(2), caps.get(3)) else {
                continue;
            };
            let kind = match keyword.as_str() {
                "interface" => TypeKind::Interface,
                "enum" => TypeKind::Enum,
                _ => TypeKind::Class,
            };
            let open = whole.end() - 1;
            let end = block_end(text, open);

            let mut info = TypeInfo::new(name.as_str(), kind, "");
            info.is_abstract = caps.get(1).is_some();
            info.generic_parameters = caps.get(4).map(|g| generic_names(g.as_str())).unwrap_or_default();
            let extends = Self::type_list(caps.get(5));
            if kind == TypeKind::Interface {
                info.interfaces = extends;
            } else {
                info.base_types = extends;
                info.interfaces = Self::type_list(caps.get(6));
            }
            Self::read_members(&mut info, text, open, end);
            members.extend(member_starts(text, open, end));

            let start = whole.start() + (whole.as_str().len() - whole.as_str().trim_start().len());
            spans.push(TypeSpan { info, start, end });
        }
        spans
    }

    fn read_members(info: &mut TypeInfo, text: &str, open: usize, end: usize) {
        let lines = LineIndex::new(text);
        for (offset, line) in member_lines(text, open, end) {
            let line = line.split("//").next().unwrap_or("").trim();
            if line.is_empty() || line == "}" || line.starts_with('*') || line.starts_with("/*") {
                continue;
            }
            let line_no = lines.line_of(offset);

            if info.kind == TypeKind::Enum {
                if let Some(name) = ENUM_MEMBER_RE.captures(line).and_then(|c| c.get(1)) {
                    info.fields.push(VariableInfo {
                        name: name.as_str().to_string(),
                        type_name: info.name.clone(),
                        line: line_no,
                        is_static: true,
                        is_readonly: true,
                        is_const: true,
                        ..Default::default()
                    });
                }
                continue;
            }

            // bodiless signatures: interface members and abstract class methods
            if let Some(caps) = MEMBER_SIGNATURE_RE.captures(line) {
                let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
                    continue;
                };
                let modifiers = Modifiers::parse(caps.get(1).map(|m| m.as_str()).unwrap_or(""));
                let bodiless = info.kind == TypeKind::Interface || (modifiers.is_abstract && line.ends_with(';'));
                if bodiless {
                    let Some(close) = matching_paren(line, whole.end() - 1) else {
                        continue;
                    };
                    info.methods.push(FunctionInfo {
                        name: name.as_str().to_string(),
                        parameters: Self::parse_params(&line[whole.end()..close]),
                        return_type: Self::return_annotation(&line[close + 1..]),
                        start_line: line_no,
                        end_line: line_no,
                        access: modifiers.access.unwrap_or_default(),
                        is_abstract: true,
                        is_static: modifiers.is_static,
                        owning_type: info.name.clone(),
                        ..Default::default()
                    });
                    continue;
                }
            }

            if let Some(caps) = FIELD_RE.captures(line) {
                let Some(name) = caps.get(2) else { continue };
                let modifiers = Modifiers::parse(caps.get(1).map(|m| m.as_str()).unwrap_or(""));
                let name = name.as_str();
                info.fields.push(VariableInfo {
                    name: name.trim_start_matches('#').to_string(),
                    type_name: caps.get(4).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
                    line: line_no,
                    access: Self::access(name, &modifiers),
                    is_static: modifiers.is_static,
                    is_readonly: modifiers.is_readonly,
                    ..Default::default()
                });
            }
        }
    }

    fn access(name: &str, modifiers: &Modifiers) -> AccessLevel {
        if name.starts_with('#') {
            AccessLevel::Private
        } else {
            modifiers.access.unwrap_or_default()
        }
    }

    /// `: Type` after a parameter list, up to an arrow if there is one.
    fn return_annotation(rest: &str) -> String {
        let rest = rest.trim();
        let Some(annotation) = rest.strip_prefix(':') else {
            return String::new();
        };
        let annotation = annotation.split("=>").next().unwrap_or("");
        annotation.trim().trim_end_matches(';').trim().to_string()
    }

    fn parse_params(list: &str) -> Vec<ParameterInfo> {
        split_top_level(list, ',')
            .into_iter()
            .map(|part| {
                let (decl, default) = split_default(part);
                let mut decl = decl;
                for word in ["public ", "private ", "protected ", "readonly ", "override "] {
                    decl = decl.trim_start_matches(word).trim_start();
                }
                let rest = decl.starts_with("...");
                let decl = decl.trim_start_matches("...");

                let (name, type_name) = match split_top_level(decl, ':').as_slice() {
                    [name, ty, ..] => (*name, *ty),
                    [name] => (*name, ""),
                    [] => ("", ""),
                };
                let optional_mark = name.ends_with('?');
                ParameterInfo {
                    name: name.trim_end_matches('?').to_string(),
                    type_name: type_name.to_string(),
                    is_optional: optional_mark || default.is_some() || rest,
                    default_value: default.unwrap_or("").to_string(),
                }
            })
            .collect()
    }

    /// Byte position of `name` as a whole word in `sig`.
    fn name_position(sig: &str, name: &str) -> Option<usize> {
        let is_ident = |c: char| c.is_alphanumeric() || c == '_' || c == '$' || c == '#';
        sig.match_indices(name).map(|(i, _)| i).find(|&i| {
            let before_ok = sig[..i].chars().next_back().map(|c| !is_ident(c)).unwrap_or(true);
            let after_ok = sig[i + name.len()..].chars().next().map(|c| !is_ident(c)).unwrap_or(true);
            before_ok && after_ok
        })
    }

    fn signature(raw: &RawFunction, text: &str, owner: Option<&TypeSpan>) -> Option<Signature> {
        let sig = raw.signature(text);
        let pos = Self::name_position(sig, &raw.name)?;
        let before = &sig[..pos];
        let after = &sig[pos + raw.name.len()..];

        let mut modifiers = Modifiers::parse(before);
        let paren = after.find('(');
        let arrow = after.find("=>");
        if after[..paren.or(arrow).unwrap_or(0)].split_whitespace().any(|w| w == "async") {
            modifiers.is_async = true;
        }

        let generic_parameters = after
            .find('<')
            .filter(|&lt| paren.map(|p| lt < p).unwrap_or(true))
            .and_then(|lt| after[lt..].find('>').map(|gt| &after[lt + 1..lt + gt]))
            .map(generic_names)
            .unwrap_or_default();

        let (parameters, return_type) = match paren.filter(|&p| arrow.map(|a| p < a).unwrap_or(true)) {
            Some(open) => {
                let close = matching_paren(after, open)?;
                (
                    Self::parse_params(&after[open + 1..close]),
                    Self::return_annotation(&after[close + 1..]),
                )
            }
            None => {
                let single = SINGLE_PARAM_RE
                    .captures(after)
                    .and_then(|c| c.get(1))
                    .map(|m| Self::parse_params(m.as_str()))
                    .unwrap_or_default();
                (single, String::new())
            }
        };

        Some(Signature {
            parameters,
            return_type,
            generic_parameters,
            access: Self::access(&raw.name, &modifiers),
            modifiers,
            owner: owner.map(|t| t.info.name.clone()),
            receiver_name: None,
        })
    }

    fn scan_variables(text: &str) -> Vec<VariableInfo> {
        let lines = LineIndex::new(text);
        VARIABLE_RE
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let keyword = caps.get(1)?.as_str();
                let name = caps.get(2)?.as_str();
                if caps.get(4).map(|m| m.as_str()) == Some("=")
                    && FUNCTION_INIT_RE.is_match(&text[whole.end()..])
                {
                    return None;
                }
                Some(VariableInfo {
                    name: name.to_string(),
                    type_name: caps.get(3).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
                    line: lines.line_of(whole.start()),
                    is_const: keyword == "const",
                    is_readonly: keyword == "const",
                    ..Default::default()
                })
            })
            .collect()
    }
}

impl Default for JavaScriptAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SemanticAnalyzer for JavaScriptAnalyzer {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn analyze_file(&self, path: &str, content: &str) -> SemanticModel {
        let parser = self.parser();
        let mut members = HashSet::new();
        let mut types = Self::scan_types(content, &mut members);
        for span in types.iter_mut() {
            for method in span.info.methods.iter_mut() {
                method.file_path = path.to_string();
                method.qualified_name = qualify(".", &[&span.info.name, &method.name]);
            }
        }

        common::assemble(
            parser,
            path,
            content,
            String::new(),
            common::import_infos(parser.extract_import_statements(content)),
            types,
            Self::scan_variables(content),
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

    const SOURCE: &str = r#"import { Repo } from './repo';
import * as util from './util';

export const MAX_ITEMS: number = 10;
let counter = 0;
const double = (x) => x * 2;

export interface Store<T> extends Base {
  name: string;
  get(id: string): Promise<T>;
}

export enum Color {
  Red = 1,
  Green,
}

export abstract class UserService extends BaseService implements Store<User>, Disposable {
  private readonly repo: Repo;
  static count = 0;
  #secret = 'x';

  constructor(private db: Db, opts = {}) {
    super(db);
    this.init();
  }

  init() {
    const inner = () => util.log('init');
    inner();
  }

  static async create<T>(id: string, ...rest: T[]): Promise<UserService> {
    return Repo.open(id);
  }

  protected abstract validate(user: User): boolean;
}

export async function load(url, retries = 3) {
  const res = await fetch(url);
  return double(res);
}
"#;

    fn analyze() -> SemanticModel {
        JavaScriptAnalyzer::new().analyze_file("src/user.ts", SOURCE)
    }

    #[test]
    fn test_class_shape() {
        let model = analyze();
        let service = model.find_type("UserService").unwrap();
        assert_eq!(service.kind, TypeKind::Class);
        assert!(service.is_abstract);
        assert_eq!(service.qualified_name, "UserService");
        assert_eq!(service.base_types, vec!["BaseService"]);
        assert_eq!(service.interfaces, vec!["Store<User>", "Disposable"]);

        let fields: Vec<(&str, AccessLevel)> =
            service.fields.iter().map(|f| (f.name.as_str(), f.access)).collect();
        assert_eq!(
            fields,
            vec![
                ("repo", AccessLevel::Private),
                ("count", AccessLevel::Public),
                ("secret", AccessLevel::Private)
            ]
        );
        assert!(service.fields[0].is_readonly);
        assert_eq!(service.fields[0].type_name, "Repo");
        assert!(service.fields[1].is_static);
    }

    #[test]
    fn test_methods_are_direct_members_only() {
        let model = analyze();
        let service = model.find_type("UserService").unwrap();
        let methods: Vec<&str> = service.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(methods, vec!["validate", "constructor", "init", "create"]);
        let validate = service.find_method("validate").unwrap();
        assert!(validate.is_abstract);
        assert_eq!(validate.access, AccessLevel::Protected);
        assert_eq!(validate.return_type, "boolean");

        // nested arrow function inside a method is not a member
        let inner = model.find_function("inner").unwrap();
        assert!(inner.owning_type.is_empty());
    }

    #[test]
    fn test_method_signature() {
        let model = analyze();
        let service = model.find_type("UserService").unwrap();
        let create = service.find_method("create").unwrap();
        assert_eq!(create.qualified_name, "UserService.create");
        assert!(create.is_static && create.is_async);
        assert_eq!(create.generic_parameters, vec!["T"]);
        assert_eq!(create.return_type, "Promise<UserService>");
        assert_eq!(create.parameters[0].type_name, "string");
        assert!(create.parameters[1].is_optional);
        assert_eq!(create.parameters[1].name, "rest");

        let call = &create.calls[0];
        assert_eq!(call.callee, "open");
        assert!(call.is_static);
        assert_eq!(call.receiver_type.as_deref(), Some("Repo"));

        let ctor = service.find_method("constructor").unwrap();
        assert_eq!(ctor.parameters[0].name, "db");
        assert_eq!(ctor.parameters[1].default_value, "{}");
        let init_call = ctor.calls.iter().find(|c| c.callee == "init").unwrap();
        assert_eq!(init_call.qualified_name.as_deref(), Some("UserService.init"));
        assert_eq!(init_call.receiver_type.as_deref(), Some("UserService"));
    }

    #[test]
    fn test_free_functions_and_calls() {
        let model = analyze();
        let load = model.find_function("load").unwrap();
        assert!(load.is_async);
        assert_eq!(load.parameters.len(), 2);
        assert_eq!(load.parameters[1].default_value, "3");
        assert!(load.parameters[1].is_optional);
        let double = load.calls.iter().find(|c| c.callee == "double").unwrap();
        assert_eq!(double.qualified_name.as_deref(), Some("double"));

        let double_fn = model.find_function("double").unwrap();
        assert_eq!(double_fn.parameters[0].name, "x");
        assert_eq!(double_fn.start_line, 6);
        assert_eq!(double_fn.end_line, 6);

        let init = model.find_type("UserService").unwrap().find_method("init").unwrap();
        let log = init.calls.iter().find(|c| c.callee == "log").unwrap();
        assert_eq!(log.qualified_name.as_deref(), Some("util.log"));
    }

    #[test]
    fn test_interface_and_enum() {
        let model = analyze();
        let store = model.find_type("Store").unwrap();
        assert_eq!(store.kind, TypeKind::Interface);
        assert_eq!(store.generic_parameters, vec!["T"]);
        assert_eq!(store.interfaces, vec!["Base"]);
        assert_eq!(store.fields[0].name, "name");
        let get = store.find_method("get").unwrap();
        assert!(get.is_abstract);
        assert_eq!(get.return_type, "Promise<T>");
        assert_eq!(get.qualified_name, "Store.get");

        let color = model.find_type("Color").unwrap();
        assert_eq!(color.kind, TypeKind::Enum);
        let members: Vec<&str> = color.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(members, vec!["Red", "Green"]);
    }

    #[test]
    fn test_top_level_variables() {
        let model = analyze();
        let vars: Vec<(&str, bool)> = model.variables.iter().map(|v| (v.name.as_str(), v.is_const)).collect();
        assert_eq!(vars, vec![("MAX_ITEMS", true), ("counter", false)]);
        assert_eq!(model.variables[0].type_name, "number");
        assert_eq!(model.variables[0].line, 4);
    }
}
