//! Supported languages and the fixed extension table.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// A language the indexer knows how to analyze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Go,
    JavaScript,
    Python,
    Java,
    Cpp,
}

impl Language {
    /// All supported languages, in a fixed order.
    pub const ALL: [Language; 5] = [
        Language::Go,
        Language::JavaScript,
        Language::Python,
        Language::Java,
        Language::Cpp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Go => "go",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Java => "java",
            Language::Cpp => "cpp",
        }
    }

    /// File extensions handled by this language (without dot).
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Go => &["go"],
            Language::JavaScript => &["js", "jsx", "ts", "tsx", "mjs", "cjs"],
            Language::Python => &["py"],
            Language::Java => &["java"],
            Language::Cpp => &["cpp", "hpp", "cc", "h", "cxx", "hh", "hxx"],
        }
    }

    /// Determine the language from a file extension (with or without dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.strip_prefix('.').unwrap_or(ext);
        match ext {
            "go" => Some(Language::Go),
            "js" | "jsx" | "ts" | "tsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "py" => Some(Language::Python),
            "java" => Some(Language::Java),
            "cpp" | "hpp" | "cc" | "h" | "cxx" | "hh" | "hxx" => Some(Language::Cpp),
            _ => None,
        }
    }

    /// Determine the language of a file from its path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Separator used between namespace/type/member in qualified names.
    pub fn qualifier(&self) -> &'static str {
        match self {
            Language::Cpp => "::",
            _ => ".",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Return all supported file extensions.
pub fn supported_extensions() -> Vec<&'static str> {
    Language::ALL
        .iter()
        .flat_map(|l| l.extensions().iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension() {
        assert_eq!(Language::from_extension("go"), Some(Language::Go));
        assert_eq!(Language::from_extension(".tsx"), Some(Language::JavaScript));
        assert_eq!(Language::from_extension("h"), Some(Language::Cpp));
        assert_eq!(Language::from_extension("rb"), None);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(Language::from_path("src/app/main.py"), Some(Language::Python));
        assert_eq!(Language::from_path("Makefile"), None);
    }

    #[test]
    fn test_every_extension_maps_back() {
        for lang in Language::ALL {
            for ext in lang.extensions() {
                assert_eq!(Language::from_extension(ext), Some(lang));
            }
        }
    }
}
