//! Language-specific analyzer implementations.

mod cpp;
mod go;
mod java;
mod javascript;
mod python;

pub use cpp::CppAnalyzer;
pub use go::GoAnalyzer;
pub use java::JavaAnalyzer;
pub use javascript::JavaScriptAnalyzer;
pub use python::PythonAnalyzer;

use super::SemanticAnalyzer;
use crate::language::Language;
use once_cell::sync::OnceCell;

/// Static storage for Go analyzer.
static GO_ANALYZER: OnceCell<GoAnalyzer> = OnceCell::new();

/// Static storage for JavaScript analyzer.
static JAVASCRIPT_ANALYZER: OnceCell<JavaScriptAnalyzer> = OnceCell::new();

/// Static storage for Python analyzer.
static PYTHON_ANALYZER: OnceCell<PythonAnalyzer> = OnceCell::new();

/// Static storage for Java analyzer.
static JAVA_ANALYZER: OnceCell<JavaAnalyzer> = OnceCell::new();

/// Static storage for C++ analyzer.
static CPP_ANALYZER: OnceCell<CppAnalyzer> = OnceCell::new();

/// Get the analyzer for a language.
pub fn analyzer_for(language: Language) -> &'static dyn SemanticAnalyzer {
    match language {
        Language::Go => GO_ANALYZER.get_or_init(GoAnalyzer::new),
        Language::JavaScript => JAVASCRIPT_ANALYZER.get_or_init(JavaScriptAnalyzer::new),
        Language::Python => PYTHON_ANALYZER.get_or_init(PythonAnalyzer::new),
        Language::Java => JAVA_ANALYZER.get_or_init(JavaAnalyzer::new),
        Language::Cpp => CPP_ANALYZER.get_or_init(CppAnalyzer::new),
    }
}

/// Get an analyzer for the given file extension.
///
/// Returns None if no analyzer is registered for the extension.
pub fn get_analyzer(ext: &str) -> Option<&'static dyn SemanticAnalyzer> {
    Language::from_extension(ext).map(analyzer_for)
}
