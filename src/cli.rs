//! Command-line interface for repomodel.

use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{self, BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::analysis::{Progress, ProgressSink, ProjectAnalyzer};
use crate::config::{self, IndexConfig, CONFIG_FILE_NAMES, DEFAULT_TEMPLATE};
use crate::report::{self, Format};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_INCOMPLETE: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Cross-language repository indexer.
///
/// Builds a semantic model of a source tree: imports and their resolution to
/// project files, type and function declarations, call sites, and the
/// file-level dependency graph.
#[derive(Parser)]
#[command(name = "repomodel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a source tree and print its model
    #[command(visible_alias = "index")]
    Analyze(AnalyzeArgs),
    /// Write a default repomodel.yaml
    Init(InitArgs),
}

/// Arguments for the analyze command.
#[derive(Parser)]
pub struct AnalyzeArgs {
    /// Directory (or single file) to analyze
    pub path: PathBuf,

    /// Path to config YAML file (default: auto-discover in the analyzed root)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Write output to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Files analyzed at once (overrides config)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Overall deadline in seconds (overrides config)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Analyze test files too (overrides config)
    #[arg(long)]
    pub include_tests: bool,

    /// Do not draw a progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "repomodel.yaml")]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Progress sink drawing an indicatif bar on stderr.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new(visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new(0)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::with_template("  {bar:40.cyan/blue} {pos}/{len} files {msg}") {
            bar.set_style(style);
        }
        Self { bar }
    }
}

impl ProgressSink for BarProgress {
    fn on_progress(&self, progress: Progress) {
        self.bar.set_length(progress.total as u64);
        self.bar.set_position(progress.completed as u64);
    }
}

/// Split the analyzed path into a root and the files to analyze.
fn plan(path: &Path, config: &IndexConfig) -> anyhow::Result<(PathBuf, Vec<String>)> {
    if path.is_dir() {
        let files = config::collect_files(path, config)?;
        return Ok((path.to_path_buf(), files));
    }
    let root = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok((root, vec![name]))
}

/// Run the analyze command.
pub fn run_analyze(args: &AnalyzeArgs) -> anyhow::Result<i32> {
    let format = match Format::parse(&args.format) {
        Some(f) => f,
        None => {
            eprintln!(
                "Error: invalid format {:?}, must be 'pretty' or 'json'",
                args.format
            );
            return Ok(EXIT_ERROR);
        }
    };

    let abs_path = match args.path.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: cannot access path {:?}: {}", args.path, e);
            return Ok(EXIT_ERROR);
        }
    };
    let config_root = if abs_path.is_dir() {
        abs_path.clone()
    } else {
        abs_path.parent().map(Path::to_path_buf).unwrap_or_default()
    };

    let (config_path, mut config) = match IndexConfig::resolve(args.config.as_deref(), &config_root) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Run 'repomodel init' to create a config file");
            return Ok(EXIT_ERROR);
        }
    };

    if let Some(limit) = args.concurrency {
        config.max_concurrency = limit;
    }
    if let Some(secs) = args.timeout {
        config.timeout_secs = Some(secs);
    }
    if args.include_tests {
        config.include_test_files = true;
    }
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return Ok(EXIT_ERROR);
    }

    let (root, files) = plan(&abs_path, &config)?;
    if files.is_empty() {
        eprintln!("Warning: no supported source files under {}", root.display());
    }

    let progress = Arc::new(BarProgress::new(!args.no_progress && io::stderr().is_terminal()));
    progress.bar.enable_steady_tick(Duration::from_millis(200));

    let analysis = ProjectAnalyzer::from_config(&root, &config)
        .progress(progress.clone())
        .analyze(&files)?;
    progress.bar.finish_and_clear();

    let root_str = root.to_string_lossy().to_string();
    let config_str = config_path.map(|p| p.to_string_lossy().to_string());

    match &args.output {
        Some(path) => {
            colored::control::set_override(false);
            let mut out = BufWriter::new(File::create(path)?);
            write_report(&mut out, format, &root_str, config_str.as_deref(), &analysis)?;
            out.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            write_report(&mut out, format, &root_str, config_str.as_deref(), &analysis)?;
        }
    }

    if analysis.is_complete() {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_INCOMPLETE)
    }
}

fn write_report<W: Write>(
    out: &mut W,
    format: Format,
    root: &str,
    config: Option<&str>,
    analysis: &crate::analysis::ProjectAnalysis,
) -> anyhow::Result<()> {
    match format {
        Format::Json => report::write_json(out, root, config, analysis),
        Format::Pretty => report::write_pretty(out, root, config, analysis),
    }
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    if args.output.exists() && !args.force {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Remove it, pass --force, or use --output to choose another path");
        return Ok(EXIT_ERROR);
    }

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Error: failed to create directory: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    if let Err(e) = std::fs::write(&args.output, DEFAULT_TEMPLATE) {
        eprintln!("Error: failed to write config: {}", e);
        return Ok(EXIT_ERROR);
    }

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to customize for your project", args.output.display());
    println!(
        "  2. Run: repomodel analyze .  (picks up {} automatically)",
        CONFIG_FILE_NAMES.join(" or ")
    );

    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cli_parses_analyze_flags() {
        let cli = Cli::try_parse_from([
            "repomodel", "-vv", "analyze", "src", "--format", "json", "--concurrency", "4",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Analyze(args) => {
                assert_eq!(args.path, PathBuf::from("src"));
                assert_eq!(args.format, "json");
                assert_eq!(args.concurrency, Some(4));
                assert!(args.timeout.is_none());
            }
            Commands::Init(_) => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_plan_single_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("main.go");
        std::fs::write(&file, "package main\n").unwrap();

        let (root, files) = plan(&file, &IndexConfig::default()).unwrap();
        assert_eq!(root, dir.path());
        assert_eq!(files, vec!["main.go"]);
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("repomodel.yaml");
        let args = InitArgs {
            output: output.clone(),
            force: false,
        };
        assert_eq!(run_init(&args).unwrap(), EXIT_SUCCESS);
        assert_eq!(run_init(&args).unwrap(), EXIT_ERROR);

        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(written, DEFAULT_TEMPLATE);
    }

    #[test]
    fn test_analyze_rejects_unknown_format() {
        let args = AnalyzeArgs {
            path: PathBuf::from("."),
            config: None,
            format: "xml".to_string(),
            output: None,
            concurrency: None,
            timeout: None,
            include_tests: false,
            no_progress: true,
        };
        assert_eq!(run_analyze(&args).unwrap(), EXIT_ERROR);
    }
}
