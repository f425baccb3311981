//! Call graph and data-flow graph.
//!
//! A graph is built in two phases. [`BuildingGraph`] accepts symbols and
//! edges; [`BuildingGraph::finalize`] consumes it, adds the END sentinel
//! and returns a [`CallGraph`], which only answers questions. Neither type
//! can be finalized twice.
//!
//! Both edge families are stored as petgraph `DiGraphMap`s keyed by symbol
//! UID, which gives forward and reverse adjacency from one structure and
//! makes re-adding an edge a no-op.

use crate::edge::EdgeFamily;
use crate::symbol_table::{SymbolTable, SymbolType, SymbolUid};
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use tracing::debug;

pub(crate) type Adjacency = DiGraphMap<SymbolUid, ()>;

/// A graph under construction.
#[derive(Debug, Default, Clone)]
pub struct BuildingGraph {
    table: SymbolTable,
    calls: Adjacency,
    data_flow: Adjacency,
}

impl BuildingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` with type `kind`, overriding the type if the symbol
    /// already exists.
    pub fn add_symbol(&mut self, name: &str, kind: SymbolType) -> SymbolUid {
        let uid = self.table.intern_or_create(name, kind);
        self.table.set_type(uid, kind);
        uid
    }

    /// Returns the UID for `name`, creating it with type `kind` if needed.
    pub fn intern_or_create(&mut self, name: &str, kind: SymbolType) -> SymbolUid {
        self.table.intern_or_create(name, kind)
    }

    /// Adds a call edge, creating Function symbols for unknown names.
    pub fn add_call(&mut self, caller: &str, callee: &str) {
        let from = self.table.intern_or_create(caller, SymbolType::Function);
        let to = self.table.intern_or_create(callee, SymbolType::Function);
        self.add_call_uids(from, to);
    }

    pub fn add_call_uids(&mut self, caller: SymbolUid, callee: SymbolUid) {
        self.calls.add_edge(caller, callee, ());
    }

    /// Adds a data-flow edge from a value source into a variable.
    pub fn add_data_flow(&mut self, source: &str, variable: &str) {
        let from = self.table.intern_or_create(source, SymbolType::Variable);
        let to = self.table.intern_or_create(variable, SymbolType::Variable);
        self.add_data_flow_uids(from, to);
    }

    pub fn add_data_flow_uids(&mut self, source: SymbolUid, variable: SymbolUid) {
        self.data_flow.add_edge(source, variable, ());
    }

    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut SymbolTable {
        &mut self.table
    }

    /// Adds the END sentinel and connects every function without callees
    /// to it.
    pub fn finalize(self) -> CallGraph {
        let Self {
            mut table,
            mut calls,
            data_flow,
        } = self;

        let end = table.create_end();

        let mut leaves: Vec<SymbolUid> = table
            .symbols()
            .filter(|&(uid, _, kind)| {
                kind == SymbolType::Function
                    && calls
                        .neighbors_directed(uid, Direction::Outgoing)
                        .next()
                        .is_none()
            })
            .map(|(uid, _, _)| uid)
            .collect();
        leaves.sort_unstable();

        for &leaf in &leaves {
            calls.add_edge(leaf, end, ());
        }

        debug!(
            "finalized graph: {} symbols, {} leaf functions",
            table.num_symbols(),
            leaves.len()
        );

        CallGraph {
            table,
            calls,
            data_flow,
            end,
        }
    }
}

/// A finalized, read-only graph.
#[derive(Debug, Clone)]
pub struct CallGraph {
    table: SymbolTable,
    calls: Adjacency,
    data_flow: Adjacency,
    end: SymbolUid,
}

impl CallGraph {
    pub(crate) fn from_parts(
        table: SymbolTable,
        calls: Adjacency,
        data_flow: Adjacency,
        end: SymbolUid,
    ) -> Self {
        Self {
            table,
            calls,
            data_flow,
            end,
        }
    }

    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    /// The END sentinel.
    pub fn end(&self) -> SymbolUid {
        self.end
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolUid> {
        self.table.lookup(name)
    }

    pub fn name_of(&self, uid: SymbolUid) -> &str {
        self.table.name_of(uid)
    }

    pub fn type_of(&self, uid: SymbolUid) -> Option<SymbolType> {
        self.table.type_of(uid)
    }

    /// Functions called by `uid`. Empty for unknown UIDs.
    pub fn callees_of(&self, uid: SymbolUid) -> impl Iterator<Item = SymbolUid> + '_ {
        self.calls.neighbors_directed(uid, Direction::Outgoing)
    }

    /// Functions calling `uid`. Empty for unknown UIDs.
    pub fn callers_of(&self, uid: SymbolUid) -> impl Iterator<Item = SymbolUid> + '_ {
        self.calls.neighbors_directed(uid, Direction::Incoming)
    }

    /// Symbols whose value flows into `variable`.
    pub fn data_sources_of(&self, variable: SymbolUid) -> impl Iterator<Item = SymbolUid> + '_ {
        self.data_flow
            .neighbors_directed(variable, Direction::Incoming)
    }

    /// Variables that `source` flows into.
    pub fn data_sinks_of(&self, source: SymbolUid) -> impl Iterator<Item = SymbolUid> + '_ {
        self.data_flow.neighbors_directed(source, Direction::Outgoing)
    }

    /// Neighbours of `uid` in one edge family and direction.
    pub fn neighbors(
        &self,
        family: EdgeFamily,
        uid: SymbolUid,
        direction: Direction,
    ) -> impl Iterator<Item = SymbolUid> + '_ {
        let graph = match family {
            EdgeFamily::Calls => &self.calls,
            EdgeFamily::DataFlow => &self.data_flow,
        };
        graph.neighbors_directed(uid, direction)
    }

    pub fn call_edges(&self) -> impl Iterator<Item = (SymbolUid, SymbolUid)> + '_ {
        self.calls.all_edges().map(|(a, b, _)| (a, b))
    }

    pub fn data_flow_edges(&self) -> impl Iterator<Item = (SymbolUid, SymbolUid)> + '_ {
        self.data_flow.all_edges().map(|(a, b, _)| (a, b))
    }

    pub fn call_edge_count(&self) -> usize {
        self.calls.edge_count()
    }

    pub fn data_flow_edge_count(&self) -> usize {
        self.data_flow.edge_count()
    }

    pub fn num_symbols(&self) -> usize {
        self.table.num_symbols()
    }

    pub fn num_functions(&self) -> usize {
        self.table.num_functions()
    }

    pub fn num_variables(&self) -> usize {
        self.table.num_variables()
    }

    pub fn num_files(&self) -> usize {
        self.table.num_files()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readding_edge_is_noop() {
        let mut g = BuildingGraph::new();
        g.add_call("a", "b");
        g.add_call("a", "b");
        let graph = g.finalize();

        let a = graph.lookup("a").unwrap();
        assert_eq!(graph.callees_of(a).count(), 1);
    }

    #[test]
    fn test_finalize_connects_leaves_to_end() {
        let mut g = BuildingGraph::new();
        g.add_call("main", "foo");
        g.add_symbol("lonely", SymbolType::Function);
        g.add_symbol("x", SymbolType::Variable);
        let graph = g.finalize();

        let end = graph.end();
        let foo = graph.lookup("foo").unwrap();
        let lonely = graph.lookup("lonely").unwrap();
        let main = graph.lookup("main").unwrap();
        let x = graph.lookup("x").unwrap();

        assert_eq!(graph.callees_of(foo).collect::<Vec<_>>(), vec![end]);
        assert_eq!(graph.callees_of(lonely).collect::<Vec<_>>(), vec![end]);
        assert!(!graph.callees_of(main).any(|c| c == end));
        assert_eq!(graph.callees_of(x).count(), 0);
        assert_eq!(graph.callees_of(end).count(), 0);
        assert_eq!(graph.name_of(end), "END");
    }

    #[test]
    fn test_missing_adjacency_is_empty() {
        let graph = BuildingGraph::new().finalize();
        let unknown = SymbolUid(4242);
        assert_eq!(graph.callers_of(unknown).count(), 0);
        assert_eq!(graph.data_sources_of(unknown).count(), 0);
        assert_eq!(graph.data_sinks_of(unknown).count(), 0);
    }

    #[test]
    fn test_data_flow_both_directions() {
        let mut g = BuildingGraph::new();
        g.add_symbol("load", SymbolType::Function);
        g.add_data_flow("load", "main::data");
        let graph = g.finalize();

        let load = graph.lookup("load").unwrap();
        let data = graph.lookup("main::data").unwrap();
        assert_eq!(graph.data_sinks_of(load).collect::<Vec<_>>(), vec![data]);
        assert_eq!(graph.data_sources_of(data).collect::<Vec<_>>(), vec![load]);
        assert_eq!(graph.type_of(load), Some(SymbolType::Function));
    }
}
