//! Deterministic merge of per-file models into the project model.
//!
//! Files are merged in sorted key order regardless of the order their
//! analyses completed in. The first declaration of a qualified name wins;
//! later ones are rejected and recorded as collisions.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::language::Language;
use crate::model::{ProjectSemanticModel, SemanticModel};
use crate::parser::probe;
use crate::parser::stdlib::is_stdlib;

/// Which symbol index a collision occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionKind {
    Type,
    Function,
}

impl fmt::Display for CollisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollisionKind::Type => write!(f, "type"),
            CollisionKind::Function => write!(f, "function"),
        }
    }
}

/// A qualified name declared more than once across the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolCollision {
    pub kind: CollisionKind,
    pub qualified_name: String,
    /// File whose declaration was kept.
    pub kept_file: String,
    /// File whose declaration was rejected.
    pub rejected_file: String,
}

/// Result of aggregation.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub model: ProjectSemanticModel,
    pub collisions: Vec<SymbolCollision>,
    /// Per file, non-standard-library imports that resolved to nothing.
    pub unresolved_imports: BTreeMap<String, Vec<String>>,
}

/// Collects per-file models and merges them into a project model.
///
/// Models are keyed by their `file_path`, which must be the path the caller
/// used to name the file. Resolved import paths are mapped back to these
/// keys through `root`.
#[derive(Debug, Clone)]
pub struct ProjectAggregator {
    root: PathBuf,
    models: BTreeMap<String, SemanticModel>,
}

impl ProjectAggregator {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            models: BTreeMap::new(),
        }
    }

    /// Add a file's model. A second model for the same key replaces the first.
    pub fn add(&mut self, model: SemanticModel) {
        self.models.insert(model.file_path.clone(), model);
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Merge everything added so far.
    pub fn finish(self) -> Aggregation {
        let keys_by_path: HashMap<PathBuf, &str> = self
            .models
            .keys()
            .map(|key| (probe::anchor(Path::new(key), &self.root), key.as_str()))
            .collect();

        let mut model = ProjectSemanticModel::new();
        let mut collisions = Vec::new();
        let mut unresolved_imports = BTreeMap::new();
        let mut type_owner: HashMap<String, String> = HashMap::new();
        let mut function_owner: HashMap<String, String> = HashMap::new();

        for (key, file) in &self.models {
            model
                .dependencies
                .insert(key.clone(), self.edges(key, file, &keys_by_path));

            let unresolved = unresolved(file);
            if !unresolved.is_empty() {
                unresolved_imports.insert(key.clone(), unresolved);
            }

            for ty in &file.types {
                if ty.qualified_name.is_empty() {
                    continue;
                }
                match type_owner.get(&ty.qualified_name) {
                    Some(kept) => collisions.push(collision(CollisionKind::Type, &ty.qualified_name, kept, key)),
                    None => {
                        type_owner.insert(ty.qualified_name.clone(), key.clone());
                        model.all_types.insert(ty.qualified_name.clone(), ty.clone());
                    }
                }
            }

            for function in file.all_functions() {
                if function.qualified_name.is_empty() {
                    continue;
                }
                match function_owner.get(&function.qualified_name) {
                    Some(kept) => collisions.push(collision(
                        CollisionKind::Function,
                        &function.qualified_name,
                        kept,
                        key,
                    )),
                    None => {
                        function_owner.insert(function.qualified_name.clone(), key.clone());
                        model
                            .all_functions
                            .insert(function.qualified_name.clone(), function.clone());
                    }
                }
            }
        }

        model.files = self.models;

        log::info!(
            "aggregated {} files: {} types, {} functions, {} edges, {} collisions",
            model.files.len(),
            model.all_types.len(),
            model.all_functions.len(),
            model.edge_count(),
            collisions.len()
        );

        Aggregation {
            model,
            collisions,
            unresolved_imports,
        }
    }

    /// In-project dependency edges of one file, first-seen order, no self-edges.
    fn edges(&self, key: &str, file: &SemanticModel, keys_by_path: &HashMap<PathBuf, &str>) -> Vec<String> {
        let mut seen = HashSet::new();
        file.imports
            .iter()
            .filter(|import| import.is_resolved())
            .filter_map(|import| {
                let resolved = probe::anchor(Path::new(&import.resolved_path), &self.root);
                keys_by_path.get(&resolved).copied()
            })
            .filter(|target| *target != key && seen.insert(*target))
            .map(str::to_string)
            .collect()
    }
}

fn collision(kind: CollisionKind, name: &str, kept: &str, rejected: &str) -> SymbolCollision {
    log::warn!(
        "{} {} declared in both {} and {}; keeping {}",
        kind,
        name,
        kept,
        rejected,
        kept
    );
    SymbolCollision {
        kind,
        qualified_name: name.to_string(),
        kept_file: kept.to_string(),
        rejected_file: rejected.to_string(),
    }
}

fn unresolved(file: &SemanticModel) -> Vec<String> {
    let language = Language::from_path(&file.file_path);
    file.imports
        .iter()
        .filter(|import| !import.is_resolved())
        .filter(|import| !language.is_some_and(|lang| is_stdlib(lang, &import.raw)))
        .map(|import| import.raw.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FunctionInfo, ImportInfo, TypeInfo, TypeKind};

    fn function(name: &str, file: &str) -> FunctionInfo {
        FunctionInfo {
            name: name.to_string(),
            qualified_name: format!("main.{}", name),
            file_path: file.to_string(),
            start_line: 1,
            ..Default::default()
        }
    }

    fn resolved(raw: &str, path: &str) -> ImportInfo {
        ImportInfo {
            resolved_path: path.to_string(),
            ..ImportInfo::new(raw)
        }
    }

    #[test]
    fn test_first_file_in_sorted_order_wins() {
        let mut zeta = SemanticModel::empty("zeta.go");
        zeta.functions.push(function("Run", "zeta.go"));
        let mut alpha = SemanticModel::empty("alpha.go");
        alpha.functions.push(function("Run", "alpha.go"));

        let mut aggregator = ProjectAggregator::new("/proj");
        aggregator.add(zeta);
        aggregator.add(alpha);
        let result = aggregator.finish();

        assert_eq!(result.model.all_functions["main.Run"].file_path, "alpha.go");
        assert_eq!(
            result.collisions,
            vec![SymbolCollision {
                kind: CollisionKind::Function,
                qualified_name: "main.Run".to_string(),
                kept_file: "alpha.go".to_string(),
                rejected_file: "zeta.go".to_string(),
            }]
        );
    }

    #[test]
    fn test_methods_are_indexed_and_types_collide() {
        let mut ty = TypeInfo::new("Server", TypeKind::Struct, "a.go");
        ty.qualified_name = "main.Server".to_string();
        let mut method = function("Start", "a.go");
        method.qualified_name = "main.Server.Start".to_string();
        method.owning_type = "Server".to_string();
        ty.methods.push(method);

        let mut a = SemanticModel::empty("a.go");
        a.types.push(ty.clone());
        let mut b = SemanticModel::empty("b.go");
        ty.file_path = "b.go".to_string();
        b.types.push(ty);

        let mut aggregator = ProjectAggregator::new("/proj");
        aggregator.add(b);
        aggregator.add(a);
        let result = aggregator.finish();

        assert_eq!(result.model.all_types["main.Server"].file_path, "a.go");
        assert!(result.model.all_functions.contains_key("main.Server.Start"));
        let kinds: Vec<CollisionKind> = result.collisions.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![CollisionKind::Type, CollisionKind::Function]);
    }

    #[test]
    fn test_edges_are_in_project_deduplicated_and_not_self() {
        let mut app = SemanticModel::empty("src/app.js");
        app.imports = vec![
            resolved("./util", "/proj/src/util.js"),
            resolved("../lib/x", "/proj/lib/x.js"),
            resolved("./util.js", "/proj/src/./util.js"),
            resolved("./app", "/proj/src/app.js"),
            resolved("/outside", "/elsewhere/outside.js"),
            ImportInfo::new("lodash"),
            ImportInfo::new("fs"),
        ];
        let util = SemanticModel::empty("src/util.js");

        let mut aggregator = ProjectAggregator::new("/proj");
        aggregator.add(app);
        aggregator.add(util);
        let result = aggregator.finish();

        assert_eq!(result.model.dependencies_of("src/app.js"), &["src/util.js".to_string()]);
        assert!(result.model.dependencies_of("src/util.js").is_empty());
        assert_eq!(
            result.unresolved_imports.get("src/app.js"),
            Some(&vec!["lodash".to_string()])
        );
        assert!(!result.unresolved_imports.contains_key("src/util.js"));
    }

    #[test]
    fn test_insertion_order_does_not_change_result() {
        let build = |order: &[&str]| {
            let mut aggregator = ProjectAggregator::new("/proj");
            for name in order {
                let mut model = SemanticModel::empty(name);
                model.functions.push(function("Shared", name));
                model.functions.push(function(&format!("Only{}", name.len()), name));
                aggregator.add(model);
            }
            aggregator.finish()
        };

        let first = build(&["a.go", "bb.go", "ccc.go"]);
        let second = build(&["ccc.go", "a.go", "bb.go"]);
        assert_eq!(first.model, second.model);
        assert_eq!(first.collisions, second.collisions);
        assert_eq!(first.collisions.len(), 2);
    }
}
