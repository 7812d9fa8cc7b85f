//! Filesystem probing used by import resolution.
//!
//! Every probe is soft-failing: an I/O error while checking a candidate is
//! treated as "the candidate does not exist".

use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Directory names never descended into by the fallback walk.
const WALK_SKIP_DIRS: &[&str] = &["node_modules", "__pycache__", "target", "vendor"];

pub fn is_file(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

pub fn is_dir(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

/// Lexically normalize a path, folding `.` and `..` without touching the
/// filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                ) && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Absolute (or root-anchored) form of `file`, normalized.
pub fn anchor(file: &Path, project_root: &Path) -> PathBuf {
    if file.is_absolute() {
        normalize(file)
    } else {
        normalize(&project_root.join(file))
    }
}

/// Directory containing `file`, anchored at the project root.
pub fn parent_dir(file: &Path, project_root: &Path) -> PathBuf {
    let anchored = anchor(file, project_root);
    anchored
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| project_root.to_path_buf())
}

/// Append `.ext` to a path without replacing an existing extension.
fn with_appended_extension(base: &Path, ext: &str) -> PathBuf {
    let mut s = base.as_os_str().to_os_string();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

/// Probe `base` as-is, then with each extension appended in order.
pub fn probe_extensions(base: &Path, extensions: &[&str]) -> Option<PathBuf> {
    if is_file(base) {
        return Some(normalize(base));
    }
    extensions
        .iter()
        .map(|ext| with_appended_extension(base, ext))
        .find(|candidate| is_file(candidate))
        .map(|p| normalize(&p))
}

/// Probe index-style entry files inside `dir`, in order.
pub fn probe_index(dir: &Path, names: &[&str]) -> Option<PathBuf> {
    if !is_dir(dir) {
        return None;
    }
    names
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| is_file(candidate))
        .map(|p| normalize(&p))
}

/// Walk upward from `start` (inclusive) until `found` matches.
///
/// Terminates at the filesystem root: the walk stops when a directory has no
/// parent or its parent is itself.
pub fn find_upward<F>(start: &Path, found: F) -> Option<PathBuf>
where
    F: Fn(&Path) -> bool,
{
    let mut dir = start.to_path_buf();
    loop {
        if found(&dir) {
            return Some(dir);
        }
        match dir.parent() {
            Some(parent) if parent != dir && !parent.as_os_str().is_empty() => {
                dir = parent.to_path_buf();
            }
            _ => return None,
        }
    }
}

/// First file (in sorted order) directly inside `dir` with one of the
/// given extensions, skipping files for which `skip` returns true.
pub fn first_file_with_extension<F>(dir: &Path, extensions: &[&str], skip: F) -> Option<PathBuf>
where
    F: Fn(&str) -> bool,
{
    let entries = std::fs::read_dir(dir).ok()?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| is_file(p))
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            let name = p.file_name().and_then(|n| n.to_str()).unwrap_or("");
            extensions.contains(&ext) && !skip(name)
        })
        .collect();
    files.sort();
    files.into_iter().next().map(|p| normalize(&p))
}

/// Exhaustive walk under `root` returning the first path (in sorted walk
/// order) accepted by `matches`.
///
/// Hidden directories and heavyweight dependency directories are skipped.
pub fn walk_find<F>(root: &Path, matches: F) -> Option<PathBuf>
where
    F: Fn(&Path) -> bool,
{
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            !name.starts_with('.') && !WALK_SKIP_DIRS.contains(&name.as_ref())
        })
        .filter_map(|e| e.ok())
        .find(|e| matches(e.path()))
        .map(|e| normalize(e.path()))
}
