//! Calltrail Graph - call and data-flow graph, persistence and queries
//!
//! This crate owns everything after parsing: the interned symbol registry,
//! the two-phase graph (building, then finalized), the builder that merges
//! per-file records, the persisted JSON index, and the query engine.
//!
//! # Example
//!
//! ```no_run
//! use calltrail_graph::{store, GraphBuilder, LoadMode, QueryEngine, END};
//! use std::path::Path;
//!
//! let builder = GraphBuilder::new();
//! // builder.add_batch(records) for every batch the front end produced
//! let graph = builder.build();
//! store::save(&graph, Path::new(".calltrail/index.json")).unwrap();
//!
//! let graph = store::load(Path::new(".calltrail/index.json"), LoadMode::Full).unwrap();
//! QueryEngine::new(&graph).find_paths("main", END, |path| {
//!     println!("{}", path.join(" -> "));
//!     true
//! });
//! ```

mod builder;
mod edge;
mod graph;
mod path_trie;
mod query;
pub mod store;
mod string_pool;
mod symbol_table;
pub mod version;

pub use builder::{build_param_signature, short_name, BuildStats, GraphBuilder};
pub use edge::EdgeFamily;
pub use graph::{BuildingGraph, CallGraph};
pub use path_trie::PathTrie;
pub use query::{QueryEngine, SymbolMatch, END, START};
pub use store::{LoadMode, StoreError};
pub use string_pool::{StrId, StringPool};
pub use symbol_table::{FileUid, SymbolTable, SymbolType, SymbolUid, END_NAME};
pub use version::SchemaVersion;
