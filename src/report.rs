//! Output formatting for analysis results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal summary for human readability
//! - JSON: the full project model and diagnostics for downstream tools

use colored::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

use crate::analysis::{AnalysisOutcome, ProjectAnalysis};
use crate::language::Language;

/// Output format selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Pretty,
    Json,
}

impl Format {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pretty" => Some(Format::Pretty),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

// =============================================================================
// JSON Format
// =============================================================================

/// Top-level JSON document.
#[derive(Serialize)]
pub struct JsonReport<'a> {
    pub version: &'static str,
    pub root: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<&'a str>,
    #[serde(flatten)]
    pub analysis: &'a ProjectAnalysis,
}

/// Write the analysis as pretty-printed JSON.
pub fn write_json<W: Write>(
    out: &mut W,
    root: &str,
    config: Option<&str>,
    analysis: &ProjectAnalysis,
) -> anyhow::Result<()> {
    let report = JsonReport {
        version: env!("CARGO_PKG_VERSION"),
        root,
        config,
        analysis,
    };
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Write a human-readable summary.
pub fn write_pretty<W: Write>(
    out: &mut W,
    root: &str,
    config: Option<&str>,
    analysis: &ProjectAnalysis,
) -> anyhow::Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "  {} v{}",
        "repomodel".cyan().bold(),
        env!("CARGO_PKG_VERSION")
    )?;
    writeln!(out)?;
    writeln!(out, "  {}{}", "Root:    ".dimmed(), root)?;
    writeln!(out, "  {}{}", "Config:  ".dimmed(), config.unwrap_or("(defaults)"))?;
    writeln!(out)?;

    write_outcome(out, analysis)?;
    writeln!(out)?;

    write_languages(out, analysis)?;
    writeln!(out)?;

    let model = &analysis.model;
    writeln!(out, "  {}", "Symbols:".bold())?;
    writeln!(out, "    {:<20} {:>6}", "types", model.all_types.len())?;
    writeln!(out, "    {:<20} {:>6}", "functions", model.all_functions.len())?;
    writeln!(out, "    {:<20} {:>6}", "dependency edges", model.edge_count())?;
    writeln!(out)?;

    if !analysis.collisions.is_empty() {
        writeln!(
            out,
            "  {} ({}):",
            "Collisions".yellow().bold(),
            analysis.collisions.len()
        )?;
        for c in &analysis.collisions {
            writeln!(
                out,
                "    {} {:<9}{}  kept {}  rejected {}",
                "WARN ".yellow(),
                c.kind.to_string().dimmed(),
                c.qualified_name,
                c.kept_file.blue(),
                c.rejected_file.blue()
            )?;
        }
        writeln!(out)?;
    }

    if !analysis.unresolved_imports.is_empty() {
        let count: usize = analysis.unresolved_imports.values().map(Vec::len).sum();
        writeln!(out, "  {} ({}):", "Unresolved imports".bold(), count)?;
        for (file, imports) in &analysis.unresolved_imports {
            writeln!(out, "    {}", file.blue())?;
            for import in imports {
                writeln!(out, "      {}", import.dimmed())?;
            }
        }
        writeln!(out)?;
    }

    if !analysis.skipped_files.is_empty() {
        writeln!(
            out,
            "  {} ({}):",
            "Skipped files".yellow().bold(),
            analysis.skipped_files.len()
        )?;
        for s in &analysis.skipped_files {
            writeln!(out, "    {}  {}", s.path.blue(), s.reason.to_string().dimmed())?;
        }
        writeln!(out)?;
    }

    Ok(())
}

fn write_outcome<W: Write>(out: &mut W, analysis: &ProjectAnalysis) -> anyhow::Result<()> {
    let files = analysis.model.files.len();
    let plural = if files != 1 { "s" } else { "" };
    match analysis.outcome {
        AnalysisOutcome::Completed => write!(out, "  {}", "✓ COMPLETE".green())?,
        AnalysisOutcome::Cancelled => write!(out, "  {}", "✗ CANCELLED".yellow())?,
        AnalysisOutcome::TimedOut => write!(out, "  {}", "✗ TIMED OUT".red())?,
    }
    writeln!(out, "  {} file{} analyzed", files, plural)?;
    Ok(())
}

fn write_languages<W: Write>(out: &mut W, analysis: &ProjectAnalysis) -> anyhow::Result<()> {
    writeln!(out, "  {}", "Files:".bold())?;
    for (language, count) in files_by_language(analysis) {
        writeln!(out, "    {:<20} {:>6}", language, count)?;
    }
    Ok(())
}

/// Count of analyzed files per language name.
pub fn files_by_language(analysis: &ProjectAnalysis) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for path in analysis.model.files.keys() {
        if let Some(language) = Language::from_path(path) {
            *counts.entry(language.as_str()).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{CollisionKind, SkipReason, SkippedFile, SymbolCollision};
    use crate::model::{ProjectSemanticModel, SemanticModel};

    fn sample() -> ProjectAnalysis {
        let mut model = ProjectSemanticModel::new();
        for path in ["a.go", "b.go", "web/app.js"] {
            model.files.insert(path.to_string(), SemanticModel::empty(path));
        }
        ProjectAnalysis {
            model,
            collisions: vec![SymbolCollision {
                kind: CollisionKind::Function,
                qualified_name: "main.Run".to_string(),
                kept_file: "a.go".to_string(),
                rejected_file: "b.go".to_string(),
            }],
            unresolved_imports: BTreeMap::from([(
                "web/app.js".to_string(),
                vec!["lodash".to_string()],
            )]),
            skipped_files: vec![SkippedFile {
                path: "b.go".to_string(),
                reason: SkipReason::ReadTimeout { millis: 5000 },
            }],
            outcome: AnalysisOutcome::Completed,
        }
    }

    #[test]
    fn test_files_by_language() {
        let counts = files_by_language(&sample());
        assert_eq!(counts.get("go"), Some(&2));
        assert_eq!(counts.get("javascript"), Some(&1));
    }

    #[test]
    fn test_json_report_flattens_analysis() {
        let mut buf = Vec::new();
        write_json(&mut buf, "/proj", Some("repomodel.yaml"), &sample()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(value["root"], "/proj");
        assert_eq!(value["config"], "repomodel.yaml");
        assert_eq!(value["outcome"], "completed");
        assert_eq!(value["collisions"][0]["kind"], "function");
        assert_eq!(value["skipped_files"][0]["reason"]["kind"], "read_timeout");
        assert!(value["model"]["files"]["web/app.js"].is_object());
    }

    #[test]
    fn test_pretty_report_lists_diagnostics() {
        colored::control::set_override(false);
        let mut buf = Vec::new();
        write_pretty(&mut buf, "/proj", None, &sample()).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("3 files analyzed"));
        assert!(text.contains("(defaults)"));
        assert!(text.contains("main.Run"));
        assert!(text.contains("lodash"));
        assert!(text.contains("read timed out after 5000ms"));
    }
}
