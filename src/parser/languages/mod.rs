//! Language-specific parser implementations.

mod cpp;
mod go;
mod java;
mod javascript;
mod python;

pub use cpp::CppParser;
pub use go::GoParser;
pub use java::JavaParser;
pub use javascript::JavaScriptParser;
pub use python::PythonParser;

use super::LanguageParser;
use crate::language::Language;
use once_cell::sync::OnceCell;

static GO_PARSER: OnceCell<GoParser> = OnceCell::new();
static JAVASCRIPT_PARSER: OnceCell<JavaScriptParser> = OnceCell::new();
static PYTHON_PARSER: OnceCell<PythonParser> = OnceCell::new();
static JAVA_PARSER: OnceCell<JavaParser> = OnceCell::new();
static CPP_PARSER: OnceCell<CppParser> = OnceCell::new();

/// Get the parser for a language.
pub fn parser_for(language: Language) -> &'static dyn LanguageParser {
    match language {
        Language::Go => GO_PARSER.get_or_init(GoParser::new),
        Language::JavaScript => JAVASCRIPT_PARSER.get_or_init(JavaScriptParser::new),
        Language::Python => PYTHON_PARSER.get_or_init(PythonParser::new),
        Language::Java => JAVA_PARSER.get_or_init(JavaParser::new),
        Language::Cpp => CPP_PARSER.get_or_init(CppParser::new),
    }
}

/// Get a parser for the given file extension (with or without the dot).
///
/// Returns None if no language claims the extension.
pub fn get_parser(ext: &str) -> Option<&'static dyn LanguageParser> {
    Language::from_extension(ext).map(parser_for)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_parser_by_extension() {
        for (ext, lang) in [
            ("go", Language::Go),
            (".ts", Language::JavaScript),
            ("jsx", Language::JavaScript),
            ("py", Language::Python),
            ("java", Language::Java),
            ("hpp", Language::Cpp),
            ("h", Language::Cpp),
        ] {
            assert_eq!(get_parser(ext).map(|p| p.language()), Some(lang), "{}", ext);
        }
        assert!(get_parser("rs").is_none());
        assert!(get_parser("").is_none());
    }

    #[test]
    fn test_parser_for_is_shared() {
        let a = parser_for(Language::Python) as *const dyn LanguageParser as *const u8;
        let b = parser_for(Language::Python) as *const dyn LanguageParser as *const u8;
        assert_eq!(a, b);
    }
}
