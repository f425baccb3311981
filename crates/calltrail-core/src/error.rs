//! Error types for the front end.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result alias used throughout the front end.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Everything that can go wrong while turning a source file into records.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file has no content.
    #[error("empty file: {0}")]
    EmptyFile(PathBuf),

    /// No grammar is registered for this file's extension.
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(PathBuf),

    /// Tree-sitter failed to initialise or produce a tree.
    #[error("parser error: {0}")]
    ParserError(String),
}

impl ParseError {
    /// Wraps an I/O error with the offending path.
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
