//! Integration tests for whole-project analysis.
//!
//! The fixture under `testdata/project` is a small shop written in all five
//! supported languages; the other tests build throwaway trees with tempfile.

use std::fs;
use std::path::{Path, PathBuf};

use repomodel::analysis::{AnalysisOutcome, CollisionKind, ProjectAnalyzer};
use repomodel::config::{collect_files, IndexConfig};
use repomodel::{analyze_project, get_parser};
use tempfile::TempDir;

fn fixture_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("testdata")
        .join("project")
}

fn write(dir: &TempDir, path: &str, content: &str) {
    let full = dir.path().join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, content).unwrap();
}

fn paths(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn analyze_fixture() -> repomodel::ProjectAnalysis {
    let root = fixture_root();
    let files = collect_files(&root, &IndexConfig::default()).expect("should collect fixture files");
    analyze_project(&root, &files).expect("analysis should run")
}

#[test]
fn test_fixture_files_are_collected_in_order() {
    let files = collect_files(&fixture_root(), &IndexConfig::default()).unwrap();
    assert_eq!(
        files,
        vec![
            "cmd/server/main.go",
            "cpp/src/cart.cpp",
            "cpp/src/cart.h",
            "internal/store/store.go",
            "java/com/shop/Cart.java",
            "java/com/shop/model/Item.java",
            "py/shop/__init__.py",
            "py/shop/models.py",
            "py/shop/service.py",
            "web/api/index.js",
            "web/app.js",
            "web/util.js",
        ]
    );
}

#[test]
fn test_fixture_dependency_graph() {
    let analysis = analyze_fixture();
    let model = &analysis.model;

    assert_eq!(analysis.outcome, AnalysisOutcome::Completed);
    assert!(analysis.skipped_files.is_empty());
    assert_eq!(model.files.len(), 12);

    assert_eq!(
        model.dependencies_of("cmd/server/main.go"),
        &["internal/store/store.go".to_string()]
    );
    assert_eq!(
        model.dependencies_of("web/app.js"),
        &["web/util.js".to_string(), "web/api/index.js".to_string()]
    );
    assert_eq!(
        model.dependencies_of("py/shop/service.py"),
        &["py/shop/models.py".to_string()]
    );
    assert_eq!(
        model.dependencies_of("java/com/shop/Cart.java"),
        &["java/com/shop/model/Item.java".to_string()]
    );
    assert_eq!(
        model.dependencies_of("cpp/src/cart.cpp"),
        &["cpp/src/cart.h".to_string()]
    );
    assert!(model.dependencies_of("internal/store/store.go").is_empty());
    assert_eq!(model.dependents_of("web/util.js"), vec!["web/app.js"]);
}

#[test]
fn test_fixture_symbols() {
    let analysis = analyze_fixture();
    let model = &analysis.model;

    assert!(model.all_types.contains_key("store.Store"));
    assert!(model.all_types.contains_key("com.shop.Cart"));
    assert!(model.all_types.contains_key("com.shop.model.Item"));
    assert!(model.all_types.contains_key("models.Item"));
    assert!(model.all_types.contains_key("shop::Cart"));

    assert!(model.all_functions.contains_key("main.main"));
    assert!(model.all_functions.contains_key("store.New"));
    assert!(model.all_functions.contains_key("store.Store.Count"));
    assert!(model.all_functions.contains_key("com.shop.Cart.size"));
    assert!(model.all_functions.contains_key("models.Item.label"));
    assert!(model.all_functions.contains_key("shop::Cart::size"));

    let count = &model.all_functions["store.Store.Count"];
    assert_eq!(count.file_path, "internal/store/store.go");
    assert_eq!(count.owning_type, "Store");
    assert_eq!(count.start_line, 16);

    let main = &model.all_functions["main.main"];
    assert!(main.calls_name("New"));
    assert!(main.calls_name("Println"));
}

#[test]
fn test_fixture_unresolved_imports_exclude_standard_library() {
    let analysis = analyze_fixture();
    assert_eq!(analysis.unresolved_imports.len(), 1);
    assert_eq!(
        analysis.unresolved_imports.get("web/app.js"),
        Some(&vec!["react".to_string()])
    );
}

#[test]
fn test_go_two_file_project() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "a.go",
        "package main\n\nimport \"fmt\"\n\nfunc Foo() {\n\tBar()\n\tfmt.Println(\"done\")\n}\n",
    );
    write(&dir, "b.go", "package main\n\nfunc Bar() {}\n");

    let analysis = analyze_project(dir.path(), &paths(&["a.go", "b.go"])).unwrap();
    let model = &analysis.model;

    let foo = model.all_functions.get("main.Foo").expect("Foo should be indexed");
    assert_eq!(model.all_functions["main.Bar"].file_path, "b.go");
    assert!(foo.calls_name("Bar"));
    assert!(model.dependencies_of("a.go").is_empty());
    assert!(analysis.collisions.is_empty());
}

#[test]
fn test_js_relative_import_prefers_file_then_index() {
    let dir = TempDir::new().unwrap();
    write(&dir, "src/app.js", "import { add } from './util';\n");
    write(&dir, "src/util.js", "export const add = (a, b) => a + b;\n");
    write(&dir, "src/util/index.js", "export const add = () => 0;\n");

    let analysis = analyze_project(dir.path(), &paths(&["src/app.js", "src/util.js"])).unwrap();
    let import = &analysis.model.files["src/app.js"].imports[0];
    assert!(Path::new(&import.resolved_path).is_absolute());
    assert!(import.resolved_path.ends_with("src/util.js"));

    fs::remove_file(dir.path().join("src/util.js")).unwrap();
    let analysis =
        analyze_project(dir.path(), &paths(&["src/app.js", "src/util/index.js"])).unwrap();
    let import = &analysis.model.files["src/app.js"].imports[0];
    assert!(import.resolved_path.ends_with("src/util/index.js"));
    assert_eq!(
        analysis.model.dependencies_of("src/app.js"),
        &["src/util/index.js".to_string()]
    );
}

#[test]
fn test_relative_resolution_is_idempotent_across_depths() {
    let dir = TempDir::new().unwrap();
    write(&dir, "lib/a/b.js", "export const b = 1;\n");
    write(&dir, "lib/main.js", "");
    write(&dir, "lib/deep/main.js", "");

    let parser = get_parser("js").unwrap();
    let shallow = parser.resolve_import_path("./a/b", Path::new("lib/main.js"), dir.path());
    let deep = parser.resolve_import_path("../a/b", Path::new("lib/deep/main.js"), dir.path());
    assert!(shallow.is_some());
    assert_eq!(shallow, deep);
}

#[test]
fn test_collision_keeps_earlier_file() {
    let dir = TempDir::new().unwrap();
    write(&dir, "util/zeta.py", "def helper():\n    return 2\n");
    write(&dir, "other/zeta.py", "def helper():\n    return 1\n");

    let analysis =
        analyze_project(dir.path(), &paths(&["util/zeta.py", "other/zeta.py"])).unwrap();

    assert_eq!(analysis.collisions.len(), 1);
    let collision = &analysis.collisions[0];
    assert_eq!(collision.kind, CollisionKind::Function);
    assert_eq!(collision.qualified_name, "zeta.helper");
    assert_eq!(collision.kept_file, "other/zeta.py");
    assert_eq!(collision.rejected_file, "util/zeta.py");
    assert_eq!(analysis.model.all_functions["zeta.helper"].file_path, "other/zeta.py");
}

#[test]
fn test_analysis_is_deterministic_across_concurrency() {
    let root = fixture_root();
    let files = collect_files(&root, &IndexConfig::default()).unwrap();
    let mut reversed = files.clone();
    reversed.reverse();

    let serial = ProjectAnalyzer::new(&root).concurrency(1).analyze(&files).unwrap();
    let parallel = ProjectAnalyzer::new(&root).concurrency(16).analyze(&reversed).unwrap();

    assert_eq!(
        serde_json::to_string(&serial.model).unwrap(),
        serde_json::to_string(&parallel.model).unwrap()
    );
    assert_eq!(serial.collisions, parallel.collisions);
}

#[test]
fn test_overall_timeout_keeps_finished_files() {
    let root = fixture_root();
    let files = collect_files(&root, &IndexConfig::default()).unwrap();

    let analysis = ProjectAnalyzer::new(&root)
        .timeout(Some(std::time::Duration::ZERO))
        .analyze(&files)
        .unwrap();

    assert_eq!(analysis.outcome, AnalysisOutcome::TimedOut);
    assert!(analysis.model.files.len() < files.len());
}
