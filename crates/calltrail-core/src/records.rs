//! The narrow record interface between a front end and the graph builder.
//!
//! A front end turns one source file into a [`FileRecords`] value. Nothing
//! here refers back into a syntax tree: once a file has been parsed, its
//! tree is dropped and only these plain values travel on.

use crate::language::Language;
use serde::{Deserialize, Serialize};

/// A function definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    /// Scoped name without any signature, e.g. `Parser::parse`.
    pub qualified_name: String,
    /// Path of the defining file, as displayed to users.
    pub file_path: String,
    /// Declared parameter types, in order. Empty for untyped languages.
    pub param_types: Vec<String>,
}

impl FunctionRecord {
    pub fn new(qualified_name: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            file_path: file_path.into(),
            param_types: Vec::new(),
        }
    }

    pub fn with_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.param_types = params.into_iter().map(Into::into).collect();
        self
    }
}

/// A call site, attributed to its enclosing function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Qualified name of the calling function (as it appears in a [`FunctionRecord`]).
    pub caller_name: String,
    /// Callee text as written at the call site, possibly scoped (`ns::f`, `obj.m`).
    pub callee_name: String,
}

impl CallRecord {
    pub fn new(caller: impl Into<String>, callee: impl Into<String>) -> Self {
        Self {
            caller_name: caller.into(),
            callee_name: callee.into(),
        }
    }
}

/// A variable assignment or initialisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableRecord {
    /// `<containing function>::<variable>`.
    pub qualified_name: String,
    /// Qualified name of the function the assignment appears in.
    pub containing_func: String,
    /// Right-hand side: a callee, an identifier, or the word `literal`.
    pub value_source: String,
    /// Whether `value_source` names a called function.
    pub is_from_call: bool,
}

impl VariableRecord {
    pub fn new(
        qualified_name: impl Into<String>,
        containing_func: impl Into<String>,
        value_source: impl Into<String>,
        is_from_call: bool,
    ) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            containing_func: containing_func.into(),
            value_source: value_source.into(),
            is_from_call,
        }
    }
}

/// All records extracted from one file, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecords {
    pub file_path: String,
    pub language: Option<Language>,
    pub functions: Vec<FunctionRecord>,
    pub calls: Vec<CallRecord>,
    pub variables: Vec<VariableRecord>,
}

impl FileRecords {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            ..Self::default()
        }
    }

    /// Total number of records held.
    pub fn len(&self) -> usize {
        self.functions.len() + self.calls.len() + self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
