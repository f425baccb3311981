//! Graph builder for merging per-file records into one graph.
//!
//! Records arrive in batches. Each batch goes through three sequential
//! passes:
//! 1. Register every function, disambiguating overloads by signature
//! 2. Resolve call targets by short name and add call edges
//! 3. Register variables and add data-flow edges
//!
//! The short-name index outlives a batch, so calls in a later batch
//! resolve against functions registered by an earlier one. Resolution is
//! textual: a call to `f` goes to the first registered function whose
//! short name is `f`.

use crate::graph::{BuildingGraph, CallGraph};
use crate::symbol_table::{FileUid, SymbolType, SymbolUid};
use calltrail_core::FileRecords;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Counters accumulated over every batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub batches: usize,
    pub files: usize,
    pub functions: usize,
    /// Definitions registered under a signature-suffixed name.
    pub overloads: usize,
    pub calls: usize,
    /// Calls whose callee was found in the short-name index.
    pub resolved_calls: usize,
    pub variables: usize,
    pub data_flow_edges: usize,
}

/// Builds a [`CallGraph`] from batches of [`FileRecords`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: BuildingGraph,
    /// Short function name to every final name sharing it, in registration order.
    short_names: HashMap<String, Vec<SymbolUid>>,
    stats: BuildStats,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one batch into the graph.
    ///
    /// Files are processed in path order so that UIDs do not depend on
    /// the order in which workers finished.
    pub fn add_batch(&mut self, mut batch: Vec<FileRecords>) {
        batch.sort_by(|a, b| a.file_path.cmp(&b.file_path));

        let files: Vec<FileUid> = batch
            .iter()
            .map(|f| self.graph.table_mut().intern_file(&f.file_path))
            .collect();

        let lookup = self.register_functions(&batch);
        self.resolve_calls(&batch, &lookup);
        self.register_variables(&batch, &files);

        self.stats.batches += 1;
        self.stats.files += batch.len();
        debug!(
            "merged batch {} ({} files, {} symbols so far)",
            self.stats.batches,
            batch.len(),
            self.graph.table().num_symbols()
        );
    }

    /// Registers function definitions and returns the
    /// `(qualified name, file) -> final name` table for this batch.
    ///
    /// A name defined more than once in the same file maps to `None`:
    /// call records do not say which overload they came from.
    fn register_functions<'b>(
        &mut self,
        batch: &'b [FileRecords],
    ) -> HashMap<(&'b str, &'b str), Option<String>> {
        let mut occurrences: HashMap<&str, usize> = HashMap::new();
        for file in batch {
            for f in &file.functions {
                *occurrences.entry(f.qualified_name.as_str()).or_default() += 1;
            }
        }

        let mut lookup = HashMap::new();
        for file in batch {
            for f in &file.functions {
                let overloaded = occurrences
                    .get(f.qualified_name.as_str())
                    .is_some_and(|&n| n > 1);
                let final_name = if overloaded {
                    self.stats.overloads += 1;
                    format!("{}{}", f.qualified_name, build_param_signature(&f.param_types))
                } else {
                    f.qualified_name.clone()
                };

                let uid = self.graph.add_symbol(&final_name, SymbolType::Function);
                let file_uid = self.graph.table_mut().intern_file(&f.file_path);
                self.graph.table_mut().associate(uid, file_uid);

                let entries = self
                    .short_names
                    .entry(short_name(&f.qualified_name).to_string())
                    .or_default();
                if !entries.contains(&uid) {
                    entries.push(uid);
                }

                lookup
                    .entry((f.qualified_name.as_str(), f.file_path.as_str()))
                    .and_modify(|known: &mut Option<String>| {
                        if known.as_deref() != Some(final_name.as_str()) {
                            *known = None;
                        }
                    })
                    .or_insert_with(|| Some(final_name.clone()));
                self.stats.functions += 1;
            }
        }
        lookup
    }

    fn resolve_calls(
        &mut self,
        batch: &[FileRecords],
        lookup: &HashMap<(&str, &str), Option<String>>,
    ) {
        for file in batch {
            for call in &file.calls {
                let key = (call.caller_name.as_str(), file.file_path.as_str());
                let caller_name = match lookup.get(&key) {
                    Some(Some(name)) => name.as_str(),
                    // Unknown or ambiguous between overloads: keep the raw name.
                    _ => call.caller_name.as_str(),
                };
                let caller = self
                    .graph
                    .intern_or_create(caller_name, SymbolType::Function);

                let (callee, resolved) = self.resolve_function(&call.callee_name);
                if resolved {
                    self.stats.resolved_calls += 1;
                }
                self.graph.add_call_uids(caller, callee);
                self.stats.calls += 1;
            }
        }
    }

    fn register_variables(&mut self, batch: &[FileRecords], files: &[FileUid]) {
        for (file, &file_uid) in batch.iter().zip(files) {
            for var in &file.variables {
                let uid = self.graph.add_symbol(&var.qualified_name, SymbolType::Variable);
                self.graph.table_mut().associate(uid, file_uid);
                self.stats.variables += 1;

                if var.value_source.is_empty() {
                    continue;
                }
                let source = if var.is_from_call {
                    self.resolve_function(&var.value_source).0
                } else {
                    self.graph
                        .intern_or_create(&var.value_source, SymbolType::Variable)
                };
                self.graph.add_data_flow_uids(source, uid);
                self.stats.data_flow_edges += 1;
            }
        }
    }

    /// Maps call-site text to a function symbol: the first registered
    /// function with the same short name, or the raw text. The flag says
    /// whether the short-name index had a match.
    fn resolve_function(&mut self, callee: &str) -> (SymbolUid, bool) {
        if let Some(&first) = self
            .short_names
            .get(short_name(callee))
            .and_then(|uids| uids.first())
        {
            return (first, true);
        }
        (self.graph.intern_or_create(callee, SymbolType::Function), false)
    }

    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    /// Read access to the graph so far.
    pub fn graph(&self) -> &BuildingGraph {
        &self.graph
    }

    /// Finalizes the graph.
    pub fn build(self) -> CallGraph {
        self.graph.finalize()
    }
}

/// The unqualified name: everything after the last `::`, then after the
/// last `.`.
pub fn short_name(name: &str) -> &str {
    let name = match name.rfind("::") {
        Some(i) => &name[i + 2..],
        None => name,
    };
    match name.rfind('.') {
        Some(i) => &name[i + 1..],
        None => name,
    }
}

/// Renders parameter types as `(T1, T2)`.
///
/// Each type is trimmed, loses `const` qualifiers and has runs of spaces
/// collapsed, so `const  std::string &` and `std::string &` compare equal.
pub fn build_param_signature(param_types: &[String]) -> String {
    let types: Vec<String> = param_types.iter().map(|t| normalize_type(t)).collect();
    format!("({})", types.join(", "))
}

fn normalize_type(ty: &str) -> String {
    let padded = format!(" {} ", ty.trim_matches(|c| c == ' ' || c == '\t'));
    let stripped = padded.replace(" const ", " ").replace(" const ", " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use calltrail_core::{CallRecord, FunctionRecord, VariableRecord};
    use pretty_assertions::assert_eq;

    fn file(path: &str) -> FileRecords {
        FileRecords::new(path)
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("ns::Class::method"), "method");
        assert_eq!(short_name("self.helper"), "helper");
        assert_eq!(short_name("obj.inner::f"), "f");
        assert_eq!(short_name("plain"), "plain");
    }

    #[test]
    fn test_param_signature() {
        assert_eq!(build_param_signature(&[]), "()");
        let params = vec![
            "  const std::string &".to_string(),
            "int".to_string(),
            "char * const".to_string(),
            "unsigned   long".to_string(),
        ];
        assert_eq!(
            build_param_signature(&params),
            "(std::string &, int, char *, unsigned long)"
        );
    }

    #[test]
    fn test_overloads_are_disambiguated() {
        let mut a = file("a.cpp");
        a.functions
            .push(FunctionRecord::new("C::f", "a.cpp").with_params(["int"]));
        a.functions
            .push(FunctionRecord::new("C::f", "a.cpp").with_params(["int", "int"]));
        a.functions.push(FunctionRecord::new("main", "a.cpp"));
        a.calls.push(CallRecord::new("main", "obj.f"));

        let mut builder = GraphBuilder::new();
        builder.add_batch(vec![a]);
        assert_eq!(builder.stats().overloads, 2);

        let graph = builder.build();
        let first = graph.lookup("C::f(int)").unwrap();
        assert!(graph.lookup("C::f(int, int)").is_some());
        assert!(graph.lookup("C::f").is_none());

        let main = graph.lookup("main").unwrap();
        assert_eq!(graph.callees_of(main).collect::<Vec<_>>(), vec![first]);
    }

    #[test]
    fn test_call_from_overload_keeps_raw_caller() {
        let mut a = file("a.cpp");
        a.functions
            .push(FunctionRecord::new("C::f", "a.cpp").with_params(["int"]));
        a.functions
            .push(FunctionRecord::new("C::f", "a.cpp").with_params(["int", "int"]));
        a.functions.push(FunctionRecord::new("main", "a.cpp"));
        a.calls.push(CallRecord::new("C::f", "f"));
        a.calls.push(CallRecord::new("main", "C::f"));

        let mut builder = GraphBuilder::new();
        builder.add_batch(vec![a]);
        let graph = builder.build();

        let one = graph.lookup("C::f(int)").unwrap();
        let two = graph.lookup("C::f(int, int)").unwrap();
        let raw = graph.lookup("C::f").unwrap();

        // No overload is credited with the call it may not have made.
        assert_eq!(graph.callees_of(one).collect::<Vec<_>>(), vec![graph.end()]);
        assert_eq!(graph.callees_of(two).collect::<Vec<_>>(), vec![graph.end()]);
        assert_eq!(graph.callees_of(raw).collect::<Vec<_>>(), vec![one]);

        let mut callers: Vec<_> = graph.callers_of(one).collect();
        callers.sort();
        let mut expected = vec![raw, graph.lookup("main").unwrap()];
        expected.sort();
        assert_eq!(callers, expected);
    }

    #[test]
    fn test_data_flow_sources_are_not_counted_as_calls() {
        let mut a = file("a.py");
        a.functions.push(FunctionRecord::new("load", "a.py"));
        a.functions.push(FunctionRecord::new("main", "a.py"));
        a.calls.push(CallRecord::new("main", "load"));
        a.variables
            .push(VariableRecord::new("main::data", "main", "load", true));

        let mut builder = GraphBuilder::new();
        builder.add_batch(vec![a]);
        let stats = builder.stats();
        assert_eq!(stats.calls, 1);
        assert_eq!(stats.resolved_calls, 1);
        assert_eq!(stats.data_flow_edges, 1);
    }

    #[test]
    fn test_unresolved_callee_is_created() {
        let mut a = file("a.py");
        a.functions.push(FunctionRecord::new("run", "a.py"));
        a.calls.push(CallRecord::new("run", "print"));

        let mut builder = GraphBuilder::new();
        builder.add_batch(vec![a]);
        let graph = builder.build();

        let print = graph.lookup("print").unwrap();
        assert_eq!(graph.type_of(print), Some(SymbolType::Function));
        // Unresolved callees count as leaves too.
        assert_eq!(graph.callees_of(print).collect::<Vec<_>>(), vec![graph.end()]);
        assert_eq!(graph.table().file_of(print), None);
    }

    #[test]
    fn test_short_names_persist_across_batches() {
        let mut lib = file("lib.py");
        lib.functions.push(FunctionRecord::new("Store.fetch", "lib.py"));

        let mut app = file("app.py");
        app.functions.push(FunctionRecord::new("main", "app.py"));
        app.calls.push(CallRecord::new("main", "store.fetch"));

        let mut builder = GraphBuilder::new();
        builder.add_batch(vec![lib]);
        builder.add_batch(vec![app]);
        assert_eq!(builder.stats().batches, 2);
        assert_eq!(builder.stats().resolved_calls, 1);

        let graph = builder.build();
        let main = graph.lookup("main").unwrap();
        let fetch = graph.lookup("Store.fetch").unwrap();
        assert_eq!(graph.callees_of(main).collect::<Vec<_>>(), vec![fetch]);
    }

    #[test]
    fn test_variables_and_data_flow() {
        let mut a = file("src/main.py");
        a.functions.push(FunctionRecord::new("load", "src/main.py"));
        a.functions.push(FunctionRecord::new("main", "src/main.py"));
        a.variables
            .push(VariableRecord::new("main::data", "main", "self.load", true));
        a.variables
            .push(VariableRecord::new("main::copy", "main", "data", false));
        a.variables
            .push(VariableRecord::new("main::hint", "main", "", false));

        let mut builder = GraphBuilder::new();
        builder.add_batch(vec![a]);
        let graph = builder.build();

        let load = graph.lookup("load").unwrap();
        let data = graph.lookup("main::data").unwrap();
        let copy = graph.lookup("main::copy").unwrap();
        let raw = graph.lookup("data").unwrap();
        let hint = graph.lookup("main::hint").unwrap();

        assert_eq!(graph.data_sinks_of(load).collect::<Vec<_>>(), vec![data]);
        assert_eq!(graph.data_sources_of(copy).collect::<Vec<_>>(), vec![raw]);
        assert_eq!(graph.type_of(raw), Some(SymbolType::Variable));
        assert_eq!(graph.data_sources_of(hint).count(), 0);

        let file = graph.table().file_uid("src/main.py").unwrap();
        assert_eq!(graph.table().file_of(data), Some(file));
        assert_eq!(graph.table().symbols_in_file(file).len(), 5);
    }

    #[test]
    fn test_batch_order_does_not_change_uids() {
        let make = |names: &[&str]| -> Vec<FileRecords> {
            names
                .iter()
                .map(|n| {
                    let mut f = file(n);
                    f.functions.push(FunctionRecord::new(format!("{}_fn", n), *n));
                    f
                })
                .collect()
        };

        let mut one = GraphBuilder::new();
        one.add_batch(make(&["b.py", "a.py", "c.py"]));
        let mut two = GraphBuilder::new();
        two.add_batch(make(&["c.py", "b.py", "a.py"]));

        let (g1, g2) = (one.build(), two.build());
        for name in ["a.py_fn", "b.py_fn", "c.py_fn"] {
            assert_eq!(g1.lookup(name), g2.lookup(name));
        }
    }
}
