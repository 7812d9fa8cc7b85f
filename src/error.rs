//! Library error type.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the library's fallible entry points.
///
/// Per-file problems (unreadable sources, unresolvable imports, malformed
/// declarations) are not errors; they degrade the affected file's model.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Config(String),
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
    #[error("invalid glob pattern {pattern:?}: {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl IndexError {
    pub fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        IndexError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
