//! Indexer configuration, stored as `.calltrail/config.json`.

use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory holding the config and the default index file.
pub const CONFIG_DIR: &str = ".calltrail";
pub const CONFIG_FILE: &str = "config.json";
pub const INDEX_FILE: &str = "index.json";

const MIN_AUTO_THREADS: usize = 4;

/// Settings for discovery and the parallel parse.
///
/// Every field has a default, so a partial config file is fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Worker threads; 0 picks the hardware concurrency (at least 4).
    pub threads: usize,
    /// File or directory names skipped during discovery.
    pub ignore: Vec<String>,
    /// Divided by the file count to size batches.
    pub batch_budget: usize,
    /// Smallest batch, unless there are fewer files than this.
    pub min_batch: usize,
    /// Records a worker buffers before handing them to the builder.
    pub flush_threshold: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            ignore: [
                "build",
                "node_modules",
                "__pycache__",
                ".git",
                ".venv",
                "venv",
                "dist",
                "target",
                ".cache",
                "CMakeFiles",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            batch_budget: 2_000_000,
            min_batch: 256,
            flush_threshold: 4096,
        }
    }
}

impl IndexerConfig {
    /// Path of the config file for a project root.
    pub fn path_for(root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Default index location for a project root.
    pub fn index_path_for(root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join(INDEX_FILE)
    }

    /// Reads the project's config, falling back to defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = Self::path_for(root);
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_file(&path)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| IndexError::ConfigIo {
            op: "read",
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| IndexError::ConfigDecode {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the config under `root`, creating `.calltrail/` if needed.
    pub fn save(&self, root: &Path) -> Result<PathBuf> {
        let path = Self::path_for(root);
        let io_err = |op, source| IndexError::ConfigIo {
            op,
            path: path.clone(),
            source,
        };

        fs::create_dir_all(root.join(CONFIG_DIR)).map_err(|e| io_err("create", e))?;
        let text = serde_json::to_string_pretty(self).map_err(|source| IndexError::ConfigDecode {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, text).map_err(|e| io_err("write", e))?;
        Ok(path)
    }

    /// Number of workers to spawn.
    pub fn worker_count(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .max(MIN_AUTO_THREADS)
    }

    /// Files per batch: shrinks as the project grows.
    pub fn batch_size(&self, total_files: usize) -> usize {
        if total_files == 0 {
            return 0;
        }
        (self.batch_budget / total_files).clamp(self.min_batch.min(total_files), total_files)
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignore.iter().any(|i| i == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_batch_size_is_inverse_to_file_count() {
        let config = IndexerConfig {
            batch_budget: 10_000,
            min_batch: 10,
            ..Default::default()
        };

        assert_eq!(config.batch_size(0), 0);
        assert_eq!(config.batch_size(5), 5);
        assert_eq!(config.batch_size(50), 50);
        assert_eq!(config.batch_size(500), 20);
        assert_eq!(config.batch_size(5_000), 10);
    }

    #[test]
    fn test_worker_count() {
        let config = IndexerConfig {
            threads: 3,
            ..Default::default()
        };
        assert_eq!(config.worker_count(), 3);
        assert!(IndexerConfig::default().worker_count() >= MIN_AUTO_THREADS);
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempdir().unwrap();
        assert_eq!(IndexerConfig::load(dir.path()).unwrap(), IndexerConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let config = IndexerConfig {
            threads: 2,
            ignore: vec!["third_party".to_string()],
            ..Default::default()
        };

        let path = config.save(dir.path()).unwrap();
        assert!(path.ends_with(".calltrail/config.json"));
        assert_eq!(IndexerConfig::load(dir.path()).unwrap(), config);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"threads": 8}"#).unwrap();

        let config = IndexerConfig::load_file(&path).unwrap();
        assert_eq!(config.threads, 8);
        assert_eq!(config.min_batch, 256);
        assert!(config.is_ignored("node_modules"));
    }

    #[test]
    fn test_malformed_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ threads").unwrap();

        let err = IndexerConfig::load_file(&path).unwrap_err();
        assert!(matches!(err, IndexError::ConfigDecode { .. }));
    }
}
