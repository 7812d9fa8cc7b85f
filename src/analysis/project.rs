//! Project-level orchestration.
//!
//! Files are analyzed concurrently, bounded by a concurrency limit. Reads are
//! async with a per-file timeout; pattern extraction and import resolution
//! run on the blocking pool. Results are merged by [`ProjectAggregator`]
//! only after collection, so completion order never affects the model.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::aggregate::{ProjectAggregator, SymbolCollision};
use super::{analyzer_for_path, SemanticAnalyzer};
use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::model::{ProjectSemanticModel, SemanticModel};
use crate::parser::{probe, LanguageParser};

/// Coarse progress milestone, reported after each file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Receiver of progress milestones.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, progress: Progress);
}

/// Sink that discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _progress: Progress) {}
}

/// Shared flag that stops scheduling of further files.
///
/// Files already in flight finish and are aggregated.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a file's model is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    ReadTimeout { millis: u64 },
    TooLarge { bytes: u64, limit: u64 },
    Unreadable { message: String },
    AnalysisFailed { message: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ReadTimeout { millis } => write!(f, "read timed out after {}ms", millis),
            SkipReason::TooLarge { bytes, limit } => {
                write!(f, "file is {} bytes, limit is {}", bytes, limit)
            }
            SkipReason::Unreadable { message } => write!(f, "unreadable: {}", message),
            SkipReason::AnalysisFailed { message } => write!(f, "analysis failed: {}", message),
        }
    }
}

/// A file that contributed an empty model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: SkipReason,
}

/// Result of analyzing one file.
#[derive(Debug, Clone)]
pub struct FileAnalysis {
    pub model: SemanticModel,
    pub skipped: Option<SkipReason>,
}

impl FileAnalysis {
    fn analyzed(model: SemanticModel) -> Self {
        Self { model, skipped: None }
    }

    fn skipped(path: &str, reason: SkipReason) -> Self {
        log::warn!("{}: {}", path, reason);
        Self {
            model: SemanticModel::empty(path),
            skipped: Some(reason),
        }
    }
}

/// How the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Completed,
    Cancelled,
    TimedOut,
}

impl fmt::Display for AnalysisOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisOutcome::Completed => write!(f, "completed"),
            AnalysisOutcome::Cancelled => write!(f, "cancelled"),
            AnalysisOutcome::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Project model plus diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectAnalysis {
    pub model: ProjectSemanticModel,
    pub collisions: Vec<SymbolCollision>,
    pub unresolved_imports: BTreeMap<String, Vec<String>>,
    pub skipped_files: Vec<SkippedFile>,
    pub outcome: AnalysisOutcome,
}

impl ProjectAnalysis {
    pub fn is_complete(&self) -> bool {
        self.outcome == AnalysisOutcome::Completed
    }
}

/// Configurable project analysis run.
pub struct ProjectAnalyzer {
    root: PathBuf,
    concurrency: usize,
    timeout: Option<Duration>,
    read_timeout: Duration,
    max_file_bytes: u64,
    cancel: CancelToken,
    progress: Arc<dyn ProgressSink>,
}

impl ProjectAnalyzer {
    /// Create an analyzer rooted at `root` with default limits.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let defaults = IndexConfig::default();
        Self {
            root: absolute(root.as_ref()),
            concurrency: defaults.max_concurrency,
            timeout: None,
            read_timeout: Duration::from_millis(defaults.read_timeout_ms),
            max_file_bytes: defaults.max_file_bytes,
            cancel: CancelToken::new(),
            progress: Arc::new(NoProgress),
        }
    }

    /// Create an analyzer with the limits of a loaded config.
    pub fn from_config<P: AsRef<Path>>(root: P, config: &IndexConfig) -> Self {
        Self::new(root)
            .concurrency(config.max_concurrency)
            .timeout(config.timeout_secs.map(Duration::from_secs))
            .read_timeout(Duration::from_millis(config.read_timeout_ms))
            .max_file_bytes(config.max_file_bytes)
    }

    /// Maximum number of files in flight. Zero is treated as one.
    pub fn concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    /// Overall deadline for the run.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn max_file_bytes(mut self, limit: u64) -> Self {
        self.max_file_bytes = limit;
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Analyze `files` on a private runtime.
    ///
    /// The only error is failure to start the runtime.
    pub fn analyze(&self, files: &[String]) -> Result<ProjectAnalysis> {
        let runtime = tokio::runtime::Runtime::new().map_err(IndexError::Runtime)?;
        let analysis = runtime.block_on(self.analyze_async(files));
        // Blocking tasks abandoned by a timeout must not hold up the caller.
        runtime.shutdown_background();
        Ok(analysis)
    }

    /// Analyze `files` on the caller's runtime.
    ///
    /// Paths may be relative to the root or absolute; they key the model
    /// exactly as given. Files with unsupported extensions are omitted.
    pub async fn analyze_async(&self, files: &[String]) -> ProjectAnalysis {
        let files: Vec<String> = files
            .iter()
            .filter(|path| {
                let supported = analyzer_for_path(path.as_str()).is_some();
                if !supported {
                    log::debug!("{}: unsupported extension, not analyzed", path);
                }
                supported
            })
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let total = files.len();
        let completed = AtomicUsize::new(0);
        let cancel = self.cancel.clone();
        log::info!("analyzing {} files under {}", total, self.root.display());

        let analyses = stream::iter(files)
            .take_while(move |_| futures::future::ready(!cancel.is_cancelled()))
            .map(|path| self.analyze_file(path))
            .buffer_unordered(self.concurrency);
        let mut analyses = std::pin::pin!(analyses);

        let deadline = self.timeout.map(|t| tokio::time::Instant::now() + t);
        let mut results = Vec::with_capacity(total);
        let mut outcome = AnalysisOutcome::Completed;

        loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, analyses.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        log::warn!(
                            "analysis timed out after {} of {} files",
                            results.len(),
                            total
                        );
                        outcome = AnalysisOutcome::TimedOut;
                        break;
                    }
                },
                None => analyses.next().await,
            };
            let Some(analysis) = next else { break };
            results.push(analysis);
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            self.progress.on_progress(Progress {
                completed: done,
                total,
            });
        }

        if outcome == AnalysisOutcome::Completed && results.len() < total && self.cancel.is_cancelled() {
            log::warn!("analysis cancelled after {} of {} files", results.len(), total);
            outcome = AnalysisOutcome::Cancelled;
        }

        self.aggregate(results, outcome)
    }

    fn aggregate(&self, mut results: Vec<FileAnalysis>, outcome: AnalysisOutcome) -> ProjectAnalysis {
        results.sort_by(|a, b| a.model.file_path.cmp(&b.model.file_path));

        let mut skipped_files = Vec::new();
        let mut aggregator = ProjectAggregator::new(&self.root);
        for result in results {
            if let Some(reason) = result.skipped {
                skipped_files.push(SkippedFile {
                    path: result.model.file_path.clone(),
                    reason,
                });
            }
            aggregator.add(result.model);
        }
        let aggregation = aggregator.finish();

        ProjectAnalysis {
            model: aggregation.model,
            collisions: aggregation.collisions,
            unresolved_imports: aggregation.unresolved_imports,
            skipped_files,
            outcome,
        }
    }

    /// Read, analyze and resolve the imports of one file.
    ///
    /// Never fails: problems degrade to an empty model.
    pub async fn analyze_file(&self, path: String) -> FileAnalysis {
        let Some(analyzer) = analyzer_for_path(&path) else {
            return FileAnalysis::analyzed(SemanticModel::empty(&path));
        };
        let full_path = probe::anchor(Path::new(&path), &self.root);

        let content = match self.read_source(&full_path).await {
            Ok(content) => content,
            Err(reason) => return FileAnalysis::skipped(&path, reason),
        };

        let root = self.root.clone();
        let key = path.clone();
        let task = tokio::task::spawn_blocking(move || {
            let mut model = analyzer.analyze_file(&key, &content);
            resolve_imports(analyzer, &mut model, &root);
            model
        });

        match task.await {
            Ok(model) => {
                log::debug!(
                    "{}: {} types, {} functions, {} imports",
                    path,
                    model.types.len(),
                    model.all_functions().count(),
                    model.imports.len()
                );
                FileAnalysis::analyzed(model)
            }
            Err(e) => FileAnalysis::skipped(
                &path,
                SkipReason::AnalysisFailed {
                    message: e.to_string(),
                },
            ),
        }
    }

    async fn read_source(&self, path: &Path) -> std::result::Result<String, SkipReason> {
        let limit = self.max_file_bytes;
        let read = async {
            let metadata = tokio::fs::metadata(path).await?;
            if metadata.len() > limit {
                return Ok(Err(metadata.len()));
            }
            let bytes = tokio::fs::read(path).await?;
            Ok::<_, std::io::Error>(Ok(bytes))
        };

        match tokio::time::timeout(self.read_timeout, read).await {
            Err(_) => Err(SkipReason::ReadTimeout {
                millis: self.read_timeout.as_millis() as u64,
            }),
            Ok(Err(e)) => Err(SkipReason::Unreadable {
                message: e.to_string(),
            }),
            Ok(Ok(Err(bytes))) => Err(SkipReason::TooLarge { bytes, limit }),
            Ok(Ok(Ok(bytes))) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        }
    }
}

/// Analyze `files` under `root` with default limits.
pub fn analyze_project<P: AsRef<Path>>(root: P, files: &[String]) -> Result<ProjectAnalysis> {
    ProjectAnalyzer::new(root).analyze(files)
}

/// Fill `resolved_path` of every import the file's parser can resolve.
fn resolve_imports(analyzer: &dyn SemanticAnalyzer, model: &mut SemanticModel, root: &Path) {
    let parser: &dyn LanguageParser = analyzer.parser();
    let current = PathBuf::from(&model.file_path);
    for import in &mut model.imports {
        if let Some(resolved) = parser.resolve_import_path(&import.raw, &current, root) {
            import.resolved_path = resolved.to_string_lossy().into_owned();
        }
    }
}

fn absolute(root: &Path) -> PathBuf {
    if root.is_absolute() {
        return probe::normalize(root);
    }
    match std::env::current_dir() {
        Ok(cwd) => probe::normalize(&cwd.join(root)),
        Err(_) => probe::normalize(root),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn write(dir: &TempDir, path: &str, content: &str) {
        let full = dir.path().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }

    fn paths(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Progress>>);

    impl ProgressSink for Recorder {
        fn on_progress(&self, progress: Progress) {
            self.0.lock().unwrap().push(progress);
        }
    }

    #[test]
    fn test_reports_progress_per_file() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.py", "def a():\n    pass\n");
        write(&dir, "b.py", "def b():\n    pass\n");
        let recorder = Arc::new(Recorder::default());

        let analysis = ProjectAnalyzer::new(dir.path())
            .concurrency(1)
            .progress(recorder.clone())
            .analyze(&paths(&["a.py", "b.py"]))
            .unwrap();

        assert!(analysis.is_complete());
        let seen = recorder.0.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], Progress { completed: 2, total: 2 });
    }

    #[test]
    fn test_unsupported_extensions_are_omitted() {
        let dir = TempDir::new().unwrap();
        write(&dir, "main.go", "package main\n\nfunc main() {}\n");
        write(&dir, "README.md", "# readme\n");

        let analysis = analyze_project(dir.path(), &paths(&["main.go", "README.md"])).unwrap();

        let keys: Vec<&str> = analysis.model.files.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["main.go"]);
        assert!(analysis.skipped_files.is_empty());
    }

    #[test]
    fn test_missing_and_oversized_files_degrade_to_empty_models() {
        let dir = TempDir::new().unwrap();
        write(&dir, "big.js", &"function f() {}\n".repeat(100));
        write(&dir, "ok.js", "function ok() {}\n");

        let analysis = ProjectAnalyzer::new(dir.path())
            .max_file_bytes(200)
            .analyze(&paths(&["big.js", "gone.js", "ok.js"]))
            .unwrap();

        assert!(analysis.is_complete());
        assert_eq!(analysis.model.files.len(), 3);
        assert!(analysis.model.files["big.js"].functions.is_empty());
        assert!(analysis.model.files["gone.js"].functions.is_empty());
        assert_eq!(analysis.model.files["ok.js"].functions.len(), 1);

        let reasons: Vec<(&str, &SkipReason)> = analysis
            .skipped_files
            .iter()
            .map(|s| (s.path.as_str(), &s.reason))
            .collect();
        assert_eq!(reasons.len(), 2);
        assert_eq!(reasons[0].0, "big.js");
        assert!(matches!(reasons[0].1, SkipReason::TooLarge { limit: 200, .. }));
        assert_eq!(reasons[1].0, "gone.js");
        assert!(matches!(reasons[1].1, SkipReason::Unreadable { .. }));
    }

    #[test]
    fn test_cancelled_before_start_schedules_nothing() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.go", "package main\n\nfunc A() {}\n");
        let token = CancelToken::new();
        token.cancel();

        let analysis = ProjectAnalyzer::new(dir.path())
            .cancel_token(token)
            .analyze(&paths(&["a.go"]))
            .unwrap();

        assert_eq!(analysis.outcome, AnalysisOutcome::Cancelled);
        assert!(analysis.model.files.is_empty());
    }

    #[test]
    fn test_imports_are_resolved_to_absolute_paths() {
        let dir = TempDir::new().unwrap();
        write(&dir, "src/app.js", "import { add } from './util';\nimport fs from 'fs';\n");
        write(&dir, "src/util.js", "export function add(a, b) { return a + b; }\n");

        let analysis = analyze_project(dir.path(), &paths(&["src/util.js", "src/app.js"])).unwrap();

        let app = &analysis.model.files["src/app.js"];
        let expected = probe::normalize(&dir.path().join("src/util.js"));
        assert_eq!(app.imports[0].resolved_path, expected.to_string_lossy());
        assert!(!app.imports[1].is_resolved());
        assert_eq!(analysis.model.dependencies_of("src/app.js"), &["src/util.js".to_string()]);
        assert!(analysis.unresolved_imports.is_empty());
    }

    #[test]
    fn test_progress_fraction() {
        assert_eq!(Progress { completed: 1, total: 4 }.fraction(), 0.25);
        assert_eq!(Progress { completed: 0, total: 0 }.fraction(), 1.0);
    }
}
