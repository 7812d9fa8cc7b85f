//! Package-manager manifests consulted during import resolution.
//!
//! - `go.mod`: module path and local `replace` directives
//! - `package.json`: package entry point (`main`, then `module`)
//!
//! Unreadable or malformed manifests are ignored, never fatal.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::probe::find_upward;

/// A Go module located by its `go.mod`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoModule {
    /// Directory containing `go.mod`.
    pub root: PathBuf,
    /// Declared module path (e.g. "example.com/app").
    pub module_path: String,
    /// Replace directives pointing at local directories: module → directory.
    pub local_replacements: HashMap<String, PathBuf>,
}

impl GoModule {
    /// Find the nearest `go.mod` at or above `start_dir`.
    pub fn find(start_dir: &Path) -> Option<Self> {
        let root = find_upward(start_dir, |d| d.join("go.mod").is_file())?;
        let content = fs::read_to_string(root.join("go.mod")).ok()?;
        Self::parse(&root, &content)
    }

    /// Parse go.mod content rooted at `root`.
    pub fn parse(root: &Path, content: &str) -> Option<Self> {
        let mut module_path = String::new();
        let mut local_replacements = HashMap::new();
        let mut in_replace_block = false;

        for line in content.lines() {
            let line = line.split("//").next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            if let Some(rest) = line.strip_prefix("module ") {
                module_path = rest.trim().trim_matches('"').to_string();
                continue;
            }
            if line == "replace (" {
                in_replace_block = true;
                continue;
            }
            if line == ")" {
                in_replace_block = false;
                continue;
            }

            let replace = if in_replace_block {
                Some(line)
            } else {
                line.strip_prefix("replace ")
            };
            if let Some((from, to)) = replace.and_then(parse_replace_line) {
                if to.starts_with('.') || to.starts_with('/') {
                    local_replacements.insert(from, root.join(to));
                }
            }
        }

        if module_path.is_empty() {
            return None;
        }

        Some(Self {
            root: root.to_path_buf(),
            module_path,
            local_replacements,
        })
    }

    /// Map an import path to a directory inside this module or one of its
    /// local replacements.
    pub fn package_dir(&self, import: &str) -> Option<PathBuf> {
        if let Some(rest) = strip_module_prefix(import, &self.module_path) {
            return Some(self.root.join(rest));
        }
        self.local_replacements.iter().find_map(|(module, dir)| {
            strip_module_prefix(import, module).map(|rest| dir.join(rest))
        })
    }
}

/// `example.com/app/pkg/x` with module `example.com/app` → `pkg/x`.
fn strip_module_prefix<'a>(import: &'a str, module: &str) -> Option<&'a str> {
    if import == module {
        return Some("");
    }
    import
        .strip_prefix(module)
        .and_then(|rest| rest.strip_prefix('/'))
}

/// Parse a replace line: "example.com/lib => ../lib"
fn parse_replace_line(line: &str) -> Option<(String, String)> {
    let (from, to) = line.split_once("=>")?;
    let from = from.split_whitespace().next()?.to_string();
    let to = to.split_whitespace().next()?.to_string();
    Some((from, to))
}

/// The fields of `package.json` that matter for resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageJson {
    pub name: Option<String>,
    pub main: Option<String>,
    pub module: Option<String>,
}

impl PackageJson {
    /// Read `package.json` in `dir`. Missing or malformed files yield `None`.
    pub fn read(dir: &Path) -> Option<Self> {
        let content = fs::read_to_string(dir.join("package.json")).ok()?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(content).ok()?;
        let field = |key: &str| {
            value
                .get(key)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Some(Self {
            name: field("name"),
            main: field("main"),
            module: field("module"),
        })
    }

    /// Declared entry file, preferring `main`.
    pub fn entry_point(&self) -> Option<&str> {
        self.main.as_deref().or(self.module.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_go_mod() {
        let content = r#"
module example.com/app

go 1.21

require (
    github.com/spf13/cobra v1.8.0
)

replace example.com/lib => ../lib
replace (
    example.com/other => ./third_party/other // local fork
    example.com/remote => example.com/fork v1.0.0
)
"#;
        let module = GoModule::parse(Path::new("/src/app"), content).unwrap();
        assert_eq!(module.module_path, "example.com/app");
        assert_eq!(
            module.local_replacements.get("example.com/lib"),
            Some(&PathBuf::from("/src/app/../lib"))
        );
        assert!(module.local_replacements.contains_key("example.com/other"));
        assert!(!module.local_replacements.contains_key("example.com/remote"));
    }

    #[test]
    fn test_package_dir() {
        let module = GoModule::parse(Path::new("/src/app"), "module example.com/app\n").unwrap();
        assert_eq!(
            module.package_dir("example.com/app/internal/db"),
            Some(PathBuf::from("/src/app/internal/db"))
        );
        assert_eq!(module.package_dir("example.com/application"), None);
        assert_eq!(module.package_dir("github.com/x/y"), None);
    }

    #[test]
    fn test_go_mod_without_module_is_ignored() {
        assert!(GoModule::parse(Path::new("/x"), "go 1.21\n").is_none());
    }

    #[test]
    fn test_find_go_mod_upward() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("go.mod"), "module example.com/m\n").unwrap();
        let nested = temp.path().join("cmd/tool");
        std::fs::create_dir_all(&nested).unwrap();

        let module = GoModule::find(&nested).unwrap();
        assert_eq!(module.root, temp.path());
        assert_eq!(module.module_path, "example.com/m");
    }

    #[test]
    fn test_package_json_entry_point() {
        let pkg = PackageJson::parse(r#"{"name": "lib", "main": "dist/index.js", "module": "esm/index.js"}"#)
            .unwrap();
        assert_eq!(pkg.entry_point(), Some("dist/index.js"));

        let pkg = PackageJson::parse(r#"{"name": "lib", "module": "esm/index.js"}"#).unwrap();
        assert_eq!(pkg.entry_point(), Some("esm/index.js"));

        assert!(PackageJson::parse("{ not json").is_none());
    }
}
