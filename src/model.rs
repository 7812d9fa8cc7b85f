//! Semantic model structures produced by the analyzers.
//!
//! All line numbers are 1-indexed. A line of `0` means the declaration could
//! not be located; it is never a guess.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Declared visibility of a function, type or variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    #[default]
    Public,
    Private,
    Protected,
    Internal,
    ProtectedInternal,
    PrivateProtected,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Public => "public",
            AccessLevel::Private => "private",
            AccessLevel::Protected => "protected",
            AccessLevel::Internal => "internal",
            AccessLevel::ProtectedInternal => "protected_internal",
            AccessLevel::PrivateProtected => "private_protected",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of a type declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Class,
    Interface,
    Struct,
    Enum,
    Delegate,
    Record,
}

impl TypeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeKind::Class => "class",
            TypeKind::Interface => "interface",
            TypeKind::Struct => "struct",
            TypeKind::Enum => "enum",
            TypeKind::Delegate => "delegate",
            TypeKind::Record => "record",
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    /// Declared type as written in source (empty when undeclared).
    pub type_name: String,
    pub is_optional: bool,
    /// Default value text (empty when there is none).
    pub default_value: String,
}

/// A single call site inside a function body.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FunctionCallInfo {
    pub callee: String,
    /// Qualified name of the callee when it can be resolved locally.
    pub qualified_name: Option<String>,
    pub line: usize,
    pub receiver_type: Option<String>,
    pub is_static: bool,
}

/// A function or method declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub qualified_name: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub return_type: String,
    pub parameters: Vec<ParameterInfo>,
    pub generic_parameters: Vec<String>,
    pub calls: Vec<FunctionCallInfo>,
    pub access: AccessLevel,
    pub is_static: bool,
    pub is_async: bool,
    pub is_abstract: bool,
    pub is_virtual: bool,
    pub is_override: bool,
    /// Owning type name, empty for free functions.
    pub owning_type: String,
}

impl FunctionInfo {
    /// Whether this function is a method of some type.
    pub fn is_method(&self) -> bool {
        !self.owning_type.is_empty()
    }

    /// Whether any recorded call targets the given callee name.
    pub fn calls_name(&self, callee: &str) -> bool {
        self.calls.iter().any(|c| c.callee == callee)
    }
}

/// A variable, field or constant declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VariableInfo {
    pub name: String,
    pub type_name: String,
    pub line: usize,
    pub access: AccessLevel,
    pub is_static: bool,
    pub is_readonly: bool,
    pub is_const: bool,
}

/// An import statement.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImportInfo {
    /// The import text as written (module, path or package).
    pub raw: String,
    pub alias: Option<String>,
    /// Resolved file path, empty when unresolved.
    pub resolved_path: String,
    pub is_wildcard: bool,
    pub members: Vec<String>,
}

impl ImportInfo {
    pub fn new<S: Into<String>>(raw: S) -> Self {
        Self {
            raw: raw.into(),
            ..Default::default()
        }
    }

    pub fn is_resolved(&self) -> bool {
        !self.resolved_path.is_empty()
    }
}

/// A type declaration (class, interface, struct, enum, delegate, record).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub name: String,
    pub qualified_name: String,
    pub kind: TypeKind,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub base_types: Vec<String>,
    pub interfaces: Vec<String>,
    pub methods: Vec<FunctionInfo>,
    pub fields: Vec<VariableInfo>,
    pub generic_parameters: Vec<String>,
    pub access: AccessLevel,
    pub is_abstract: bool,
    pub is_sealed: bool,
    pub is_static: bool,
}

impl TypeInfo {
    pub fn new(name: &str, kind: TypeKind, file_path: &str) -> Self {
        Self {
            name: name.to_string(),
            qualified_name: name.to_string(),
            kind,
            file_path: file_path.to_string(),
            start_line: 0,
            end_line: 0,
            base_types: Vec::new(),
            interfaces: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            generic_parameters: Vec::new(),
            access: AccessLevel::Public,
            is_abstract: false,
            is_sealed: false,
            is_static: false,
        }
    }

    pub fn find_method(&self, name: &str) -> Option<&FunctionInfo> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// Semantic model of a single file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SemanticModel {
    pub file_path: String,
    /// Namespace or package, empty when the language has none.
    pub namespace: String,
    pub types: Vec<TypeInfo>,
    pub functions: Vec<FunctionInfo>,
    pub imports: Vec<ImportInfo>,
    pub variables: Vec<VariableInfo>,
}

impl SemanticModel {
    /// Create an empty model for a file.
    pub fn empty(path: &str) -> Self {
        Self {
            file_path: path.to_string(),
            ..Default::default()
        }
    }

    pub fn find_type(&self, name: &str) -> Option<&TypeInfo> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn find_function(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// All functions in the file, free functions first, then methods by type.
    pub fn all_functions(&self) -> impl Iterator<Item = &FunctionInfo> {
        self.functions
            .iter()
            .chain(self.types.iter().flat_map(|t| t.methods.iter()))
    }
}

/// Project-wide semantic model.
///
/// Every map is ordered so that serialization is stable across runs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectSemanticModel {
    pub files: BTreeMap<String, SemanticModel>,
    pub dependencies: BTreeMap<String, Vec<String>>,
    pub all_types: BTreeMap<String, TypeInfo>,
    pub all_functions: BTreeMap<String, FunctionInfo>,
}

impl ProjectSemanticModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dependencies of a file, empty when the file is unknown.
    pub fn dependencies_of(&self, file: &str) -> &[String] {
        self.dependencies
            .get(file)
            .map(|d| d.as_slice())
            .unwrap_or(&[])
    }

    /// Files that depend on the given file.
    pub fn dependents_of(&self, file: &str) -> Vec<&str> {
        self.dependencies
            .iter()
            .filter(|(_, deps)| deps.iter().any(|d| d == file))
            .map(|(src, _)| src.as_str())
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.dependencies.values().map(|d| d.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependents_of() {
        let mut model = ProjectSemanticModel::new();
        model
            .dependencies
            .insert("a.js".to_string(), vec!["util.js".to_string()]);
        model
            .dependencies
            .insert("b.js".to_string(), vec!["util.js".to_string(), "a.js".to_string()]);
        model.dependencies.insert("util.js".to_string(), vec![]);

        assert_eq!(model.dependents_of("util.js"), vec!["a.js", "b.js"]);
        assert_eq!(model.dependents_of("a.js"), vec!["b.js"]);
        assert!(model.dependencies_of("missing.js").is_empty());
        assert_eq!(model.edge_count(), 3);
    }

    #[test]
    fn test_access_level_serializes_snake_case() {
        let json = serde_json::to_string(&AccessLevel::ProtectedInternal).unwrap();
        assert_eq!(json, "\"protected_internal\"");
    }

    #[test]
    fn test_all_functions_includes_methods() {
        let mut model = SemanticModel::empty("a.py");
        model.functions.push(FunctionInfo {
            name: "main".to_string(),
            ..Default::default()
        });
        let mut ty = TypeInfo::new("Config", TypeKind::Class, "a.py");
        ty.methods.push(FunctionInfo {
            name: "load".to_string(),
            owning_type: "Config".to_string(),
            ..Default::default()
        });
        model.types.push(ty);

        let names: Vec<&str> = model.all_functions().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["main", "load"]);
        assert!(model.find_type("Config").unwrap().find_method("load").unwrap().is_method());
    }
}
