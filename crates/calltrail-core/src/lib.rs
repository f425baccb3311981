//! Calltrail Core - source front end
//!
//! This crate turns source files into the plain records the graph builder
//! consumes: function definitions (with parameter types for overload
//! disambiguation), call sites and variable assignments.
//!
//! # Example
//!
//! ```no_run
//! use calltrail_core::{FrontEnd, SourceParser};
//! use std::path::Path;
//!
//! let mut parser = SourceParser::new();
//! let records = parser.parse_file(Path::new("src/main.cpp"), "src/main.cpp").unwrap();
//!
//! for f in &records.functions {
//!     println!("{} ({})", f.qualified_name, f.param_types.join(", "));
//! }
//! ```
//!
//! Any other [`FrontEnd`] implementation can feed the indexer; the records
//! are the only contract.

mod error;
mod front_end;
mod language;
pub mod languages;
mod parser;
mod records;

pub use error::{ParseError, Result};
pub use front_end::FrontEnd;
pub use language::Language;
pub use parser::SourceParser;
pub use records::{CallRecord, FileRecords, FunctionRecord, VariableRecord};
