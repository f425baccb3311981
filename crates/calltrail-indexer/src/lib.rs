//! Calltrail Indexer - discovery and parallel indexing
//!
//! Walks a project, parses every supported file on a fixed pool of worker
//! threads and builds the finalized [`CallGraph`](calltrail_graph::CallGraph).
//!
//! # Example
//!
//! ```no_run
//! use calltrail_indexer::{Indexer, IndexerConfig};
//!
//! let result = Indexer::new(".", IndexerConfig::default()).run().unwrap();
//! println!(
//!     "{} files, {} symbols in {}ms",
//!     result.files_indexed,
//!     result.graph.num_symbols(),
//!     result.duration_ms
//! );
//! ```

mod config;
mod discovery;
mod error;
mod indexer;

pub use config::{IndexerConfig, CONFIG_DIR, CONFIG_FILE, INDEX_FILE};
pub use discovery::{discover_files, display_path};
pub use error::{IndexError, Result};
pub use indexer::{index_directory, IndexResult, Indexer, ProgressFn};
