//! The seam between parsing and graph building.

use crate::error::Result;
use crate::records::FileRecords;
use std::path::Path;

/// Turns one source file into records.
///
/// Implementations are not required to be thread-safe: the indexer gives
/// every worker thread its own instance.
pub trait FrontEnd {
    /// Parses `path`, recording `display_path` as the file's name.
    ///
    /// An empty file yields [`ParseError::EmptyFile`](crate::ParseError::EmptyFile),
    /// which callers treat as "nothing to index" rather than a failure.
    fn parse_file(&mut self, path: &Path, display_path: &str) -> Result<FileRecords>;
}
