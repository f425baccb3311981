//! SourceParser - the built-in tree-sitter front end.
//!
//! Detects the language from the file extension, parses the file, hands the
//! tree to the matching extractor and drops it. Syntax errors do not fail a
//! file: tree-sitter still produces a tree and whatever parsed cleanly is
//! extracted.

use crate::error::{ParseError, Result};
use crate::front_end::FrontEnd;
use crate::language::Language;
use crate::languages::{extractor_for, FileContext};
use crate::records::FileRecords;
use std::fs;
use std::path::Path;
use tracing::debug;
use tree_sitter::Parser;

/// Tree-sitter backed [`FrontEnd`] for Python, C and C++.
///
/// A parser holds mutable tree-sitter state, so each thread needs its own.
pub struct SourceParser {
    parser: Parser,
}

impl Default for SourceParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceParser {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }

    /// Parses a file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is empty, or has an
    /// extension no grammar is registered for.
    pub fn parse_path(&mut self, path: &Path, display_path: &str) -> Result<FileRecords> {
        let language = Language::from_path(path)
            .ok_or_else(|| ParseError::UnsupportedLanguage(path.to_path_buf()))?;

        let source = fs::read_to_string(path).map_err(|e| ParseError::io(path, e))?;

        self.parse_source(&source, display_path, language)
    }

    /// Parses in-memory source (for testing or editor buffers).
    pub fn parse_source(
        &mut self,
        source: &str,
        display_path: &str,
        language: Language,
    ) -> Result<FileRecords> {
        if source.trim().is_empty() {
            return Err(ParseError::EmptyFile(display_path.into()));
        }

        let extractor = extractor_for(language);
        self.parser
            .set_language(&extractor.grammar())
            .map_err(|e| ParseError::ParserError(format!("Failed to set language: {}", e)))?;

        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| ParseError::ParserError("Tree-sitter returned no tree".into()))?;

        let stem = Path::new(display_path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown");
        let file = FileContext {
            display_path,
            stem,
        };

        let mut records = FileRecords::new(display_path);
        records.language = Some(language);
        extractor.extract(&tree, source, file, &mut records);

        debug!(
            "{}: {} functions, {} calls, {} variables",
            display_path,
            records.functions.len(),
            records.calls.len(),
            records.variables.len()
        );

        Ok(records)
    }
}

impl FrontEnd for SourceParser {
    fn parse_file(&mut self, path: &Path, display_path: &str) -> Result<FileRecords> {
        self.parse_path(path, display_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{CallRecord, VariableRecord};
    use pretty_assertions::assert_eq;

    fn function_names(records: &FileRecords) -> Vec<&str> {
        records
            .functions
            .iter()
            .map(|f| f.qualified_name.as_str())
            .collect()
    }

    #[test]
    fn test_parse_python_functions_and_calls() {
        let mut parser = SourceParser::new();
        let source = r#"
def main():
    data = load()
    process(data)

class Worker:
    def run(self, job: Job, retries: int = 3):
        self.step(job)

def load():
    return 1
"#;

        let records = parser
            .parse_source(source, "app/main.py", Language::Python)
            .unwrap();

        assert_eq!(function_names(&records), vec!["main", "Worker.run", "load"]);
        assert_eq!(records.functions[1].param_types, vec!["Job", "int"]);
        assert_eq!(
            records.calls,
            vec![
                CallRecord::new("main", "load"),
                CallRecord::new("main", "process"),
                CallRecord::new("Worker.run", "self.step"),
            ]
        );
        assert_eq!(
            records.variables,
            vec![VariableRecord::new("main::data", "main", "load", true)]
        );
        assert_eq!(records.language, Some(Language::Python));
    }

    #[test]
    fn test_python_nested_function_calls_stay_with_inner() {
        let mut parser = SourceParser::new();
        let source = r#"
def outer():
    def inner():
        helper()
    inner()
"#;

        let records = parser
            .parse_source(source, "nested.py", Language::Python)
            .unwrap();

        assert_eq!(function_names(&records), vec!["outer", "inner"]);
        assert!(records.calls.contains(&CallRecord::new("outer", "inner")));
        assert!(records.calls.contains(&CallRecord::new("inner", "helper")));
        assert!(!records.calls.contains(&CallRecord::new("outer", "helper")));
    }

    #[test]
    fn test_parse_c_scopes_by_file_stem() {
        let mut parser = SourceParser::new();
        let source = r#"
static int *lookup(const char *key, int n) {
    int v = compute(n);
    return table_get(key);
}
"#;

        let records = parser.parse_source(source, "src/util.c", Language::C).unwrap();

        assert_eq!(function_names(&records), vec!["util::lookup"]);
        assert_eq!(records.functions[0].param_types, vec!["char", "int"]);
        assert!(records
            .calls
            .contains(&CallRecord::new("util::lookup", "compute")));
        assert!(records
            .calls
            .contains(&CallRecord::new("util::lookup", "table_get")));
        assert_eq!(
            records.variables,
            vec![VariableRecord::new(
                "util::lookup::v",
                "util::lookup",
                "compute",
                true
            )]
        );
    }

    #[test]
    fn test_parse_cpp_namespaces_and_classes() {
        let mut parser = SourceParser::new();
        let source = r#"
namespace geo {
class Shape {
public:
    double area(int scale) { return compute(scale); }
};

void draw(int x) {}
void draw(int x, int y) { geo::draw(x); }
}

int Shape::perimeter() { return 0; }
"#;

        let records = parser
            .parse_source(source, "shape.cpp", Language::Cpp)
            .unwrap();

        assert_eq!(
            function_names(&records),
            vec![
                "geo::Shape::area",
                "geo::draw",
                "geo::draw",
                "Shape::perimeter"
            ]
        );
        assert_eq!(records.functions[2].param_types, vec!["int", "int"]);
        assert!(records
            .calls
            .contains(&CallRecord::new("geo::Shape::area", "compute")));
        assert!(records
            .calls
            .contains(&CallRecord::new("geo::draw", "geo::draw")));
    }

    #[test]
    fn test_empty_source_is_reported() {
        let mut parser = SourceParser::new();
        let err = parser
            .parse_source("   \n", "blank.py", Language::Python)
            .unwrap_err();
        assert!(matches!(err, ParseError::EmptyFile(_)));
    }

    #[test]
    fn test_parse_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.py");
        std::fs::write(&path, "def run():\n    schedule()\n").unwrap();

        let mut parser = SourceParser::new();
        let records = parser.parse_file(&path, "jobs.py").unwrap();

        assert_eq!(records.file_path, "jobs.py");
        assert_eq!(function_names(&records), vec!["run"]);
        assert_eq!(records.calls, vec![CallRecord::new("run", "schedule")]);
    }

    #[test]
    fn test_unsupported_extension() {
        let mut parser = SourceParser::new();
        let err = parser
            .parse_file(Path::new("README.md"), "README.md")
            .unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedLanguage(_)));
    }
}
