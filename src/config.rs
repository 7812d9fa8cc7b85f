//! Indexer configuration.
//!
//! Loaded from `repomodel.yaml` (or `.repomodel.yaml`) in the analyzed root
//! unless a path is given explicitly. Every field has a default, so an empty
//! file and a missing file mean the same thing.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{IndexError, Result};
use crate::language::Language;

/// Config file names searched for in the analyzed root, in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["repomodel.yaml", ".repomodel.yaml"];

/// Commented default config written by `repomodel init`.
pub const DEFAULT_TEMPLATE: &str = include_str!("templates/default.yaml");

const DEFAULT_SKIP_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "vendor",
    "target",
    "build",
    "dist",
    "__pycache__",
    ".venv",
    "venv",
];

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct IndexConfig {
    pub version: String,
    pub name: String,
    /// Glob patterns matched against paths relative to the root.
    pub excluded_paths: Vec<String>,
    /// Whether test sources are analyzed (default: false).
    pub include_test_files: bool,
    /// Files analyzed at once (default: 8).
    pub max_concurrency: usize,
    /// Overall run deadline in seconds. No deadline when absent.
    pub timeout_secs: Option<u64>,
    /// Per-file read deadline in milliseconds (default: 5000).
    pub read_timeout_ms: u64,
    /// Larger files contribute an empty model (default: 2 MiB).
    pub max_file_bytes: u64,
    /// Directory names never descended into.
    pub skip_dirs: Vec<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            name: String::new(),
            excluded_paths: Vec::new(),
            include_test_files: false,
            max_concurrency: 8,
            timeout_secs: None,
            read_timeout_ms: 5000,
            max_file_bytes: 2 * 1024 * 1024,
            skip_dirs: DEFAULT_SKIP_DIRS.iter().map(|d| d.to_string()).collect(),
        }
    }
}

impl IndexConfig {
    /// Parse a config from YAML text.
    pub fn parse(content: &str) -> Result<Self> {
        let blank = content.lines().all(|line| {
            let line = line.trim();
            line.is_empty() || line.starts_with('#')
        });
        if blank {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load a config from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| IndexError::io(path, e))?;
        Self::parse(&content)
    }

    /// Find a config file in `root`.
    pub fn discover<P: AsRef<Path>>(root: P) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| root.as_ref().join(name))
            .find(|path| path.is_file())
    }

    /// Load the explicit config if given, else a discovered one, else defaults.
    ///
    /// Returns the path the config came from, if any.
    pub fn resolve(explicit: Option<&Path>, root: &Path) -> Result<(Option<PathBuf>, Self)> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::discover(root),
        };
        let config = match &path {
            Some(path) => {
                log::info!("loading config from {}", path.display());
                Self::load(path)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok((path, config))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(IndexError::Config("max_concurrency must be at least 1".to_string()));
        }
        if self.read_timeout_ms == 0 {
            return Err(IndexError::Config("read_timeout_ms must be at least 1".to_string()));
        }
        if self.timeout_secs == Some(0) {
            return Err(IndexError::Config("timeout_secs must be at least 1".to_string()));
        }
        self.exclusions()?;
        Ok(())
    }

    /// Compiled `excluded_paths`.
    pub fn exclusions(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.excluded_paths {
            let glob = Glob::new(pattern).map_err(|source| IndexError::Glob {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|source| IndexError::Glob {
            pattern: self.excluded_paths.join(", "),
            source,
        })
    }

    fn skips_dir(&self, name: &str) -> bool {
        name.starts_with('.') || self.skip_dirs.iter().any(|d| d == name)
    }
}

/// Whether a file name follows a test naming convention of its language.
pub fn is_test_file(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return false,
    };
    let stem = name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name);

    match Language::from_path(path) {
        Some(Language::Go) => stem.ends_with("_test"),
        Some(Language::JavaScript) => stem.ends_with(".test") || stem.ends_with(".spec"),
        Some(Language::Python) => stem.starts_with("test_") || stem.ends_with("_test"),
        Some(Language::Java) => stem.ends_with("Test") || stem.ends_with("Tests"),
        Some(Language::Cpp) | None => false,
    }
}

/// Supported source files under `root`, relative to it and sorted.
///
/// Hidden directories and `skip_dirs` are not descended into. Files matching
/// `excluded_paths`, and test files unless included, are left out.
pub fn collect_files(root: &Path, config: &IndexConfig) -> Result<Vec<String>> {
    let exclusions = config.exclusions()?;
    let mut files = Vec::new();

    let walker = WalkDir::new(root).follow_links(true).into_iter().filter_entry(|e| {
        e.depth() == 0 || !e.file_type().is_dir() || !config.skips_dir(&e.file_name().to_string_lossy())
    });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if Language::from_path(path).is_none() {
            continue;
        }
        let relative = path.strip_prefix(root).unwrap_or(path);
        if exclusions.is_match(relative) {
            log::debug!("{}: excluded by config", relative.display());
            continue;
        }
        if !config.include_test_files && is_test_file(relative) {
            log::debug!("{}: test file, skipped", relative.display());
            continue;
        }
        files.push(relative.to_string_lossy().replace('\\', "/"));
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, path: &str) {
        let full = dir.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, "").unwrap();
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
version: "1"
name: "backend"
excluded_paths:
  - "**/generated/**"
max_concurrency: 4
timeout_secs: 30
"#;
        let config = IndexConfig::parse(yaml).unwrap();
        assert_eq!(config.name, "backend");
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.timeout_secs, Some(30));
        assert_eq!(config.read_timeout_ms, 5000);
        assert!(config.skip_dirs.iter().any(|d| d == "node_modules"));
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(IndexConfig::parse("").unwrap(), IndexConfig::default());
        assert_eq!(IndexConfig::parse("\n# nothing\n").unwrap(), IndexConfig::default());
    }

    #[test]
    fn test_default_template_parses_and_validates() {
        let config = IndexConfig::parse(DEFAULT_TEMPLATE).unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero = IndexConfig {
            max_concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(zero.validate(), Err(IndexError::Config(_))));

        let bad_glob = IndexConfig {
            excluded_paths: vec!["src/[".to_string()],
            ..Default::default()
        };
        assert!(matches!(bad_glob.validate(), Err(IndexError::Glob { .. })));
    }

    #[test]
    fn test_is_test_file() {
        assert!(is_test_file(Path::new("pkg/server_test.go")));
        assert!(is_test_file(Path::new("src/app.test.ts")));
        assert!(is_test_file(Path::new("src/app.spec.js")));
        assert!(is_test_file(Path::new("tests/test_models.py")));
        assert!(is_test_file(Path::new("src/UserServiceTest.java")));
        assert!(!is_test_file(Path::new("src/testing.py")));
        assert!(!is_test_file(Path::new("src/contest.go")));
        assert!(!is_test_file(Path::new("src/widget_test.cpp")));
    }

    #[test]
    fn test_collect_files() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "main.go");
        touch(&dir, "main_test.go");
        touch(&dir, "web/app.js");
        touch(&dir, "web/node_modules/lib/index.js");
        touch(&dir, ".cache/x.py");
        touch(&dir, "gen/generated/api.go");
        touch(&dir, "README.md");
        touch(&dir, "core/model.py");

        let config = IndexConfig {
            excluded_paths: vec!["**/generated/**".to_string()],
            ..Default::default()
        };
        let files = collect_files(dir.path(), &config).unwrap();
        assert_eq!(files, vec!["core/model.py", "main.go", "web/app.js"]);

        let with_tests = IndexConfig {
            include_test_files: true,
            ..config
        };
        let files = collect_files(dir.path(), &with_tests).unwrap();
        assert!(files.contains(&"main_test.go".to_string()));
    }

    #[test]
    fn test_resolve_discovers_config_in_root() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".repomodel.yaml"), "max_concurrency: 2\n").unwrap();

        let (path, config) = IndexConfig::resolve(None, dir.path()).unwrap();
        assert_eq!(path, Some(dir.path().join(".repomodel.yaml")));
        assert_eq!(config.max_concurrency, 2);

        let empty = TempDir::new().unwrap();
        let (path, config) = IndexConfig::resolve(None, empty.path()).unwrap();
        assert!(path.is_none());
        assert_eq!(config, IndexConfig::default());
    }
}
