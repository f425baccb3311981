//! Finding the source files to index.

use crate::config::IndexerConfig;
use calltrail_core::Language;
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Returns every supported source file under `root`, sorted.
///
/// Hidden entries and anything named in the config's ignore list are
/// skipped, whole directories included.
pub fn discover_files(root: &Path, config: &IndexerConfig) -> Vec<PathBuf> {
    let ignored: HashSet<String> = config.ignore.iter().cloned().collect();

    let walker = WalkBuilder::new(root)
        .follow_links(false)
        .hidden(true)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .filter_entry(move |entry| {
            entry
                .file_name()
                .to_str()
                .map_or(true, |name| !ignored.contains(name))
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!("Error walking directory: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        if Language::from_path(entry.path()).is_some() {
            files.push(entry.into_path());
        }
    }

    files.sort();
    files
}

/// The name a file is recorded under: relative to `root`, `/`-separated.
pub fn display_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
