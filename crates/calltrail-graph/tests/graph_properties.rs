use calltrail_core::{CallRecord, FileRecords, FunctionRecord, VariableRecord};
use calltrail_graph::store::{read_index, write_index, DEFAULT_FLUSH_THRESHOLD};
use calltrail_graph::{
    BuildingGraph, CallGraph, GraphBuilder, LoadMode, QueryEngine, StoreError, SymbolType, END,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashSet};

fn save_to_string(graph: &CallGraph) -> String {
    let mut out = Vec::new();
    write_index(graph, &mut out, DEFAULT_FLUSH_THRESHOLD).unwrap();
    String::from_utf8(out).unwrap()
}

/// Everything a round trip must preserve, keyed by name.
#[derive(Debug, PartialEq)]
struct Snapshot {
    symbols: BTreeMap<String, SymbolType>,
    calls: BTreeSet<(String, String)>,
    data_flow: BTreeSet<(String, String)>,
    files: BTreeMap<String, String>,
}

fn snapshot(graph: &CallGraph) -> Snapshot {
    let table = graph.table();
    let name = |uid| graph.name_of(uid).to_string();
    Snapshot {
        symbols: table
            .symbols()
            .map(|(_, n, kind)| (n.to_string(), kind))
            .collect(),
        calls: graph.call_edges().map(|(a, b)| (name(a), name(b))).collect(),
        data_flow: graph
            .data_flow_edges()
            .map(|(a, b)| (name(a), name(b)))
            .collect(),
        files: table
            .symbols()
            .filter_map(|(uid, n, _)| {
                let file = table.file_of(uid)?;
                Some((n.to_string(), table.path_of(file)?.to_string()))
            })
            .collect(),
    }
}

fn sample_records() -> Vec<FileRecords> {
    let mut shapes = FileRecords::new("src/shapes.cpp");
    shapes
        .functions
        .push(FunctionRecord::new("C::f", "src/shapes.cpp").with_params(["int"]));
    shapes
        .functions
        .push(FunctionRecord::new("C::f", "src/shapes.cpp").with_params(["int", "int"]));
    shapes.functions.push(FunctionRecord::new("main", "src/shapes.cpp"));
    shapes.calls.push(CallRecord::new("main", "c.f"));
    shapes.calls.push(CallRecord::new("main", "printf"));
    shapes
        .variables
        .push(VariableRecord::new("main::area", "main", "C::f", true));

    let mut util = FileRecords::new("src/util/io.c");
    util.functions.push(FunctionRecord::new("io::read_all", "src/util/io.c"));
    util.calls.push(CallRecord::new("io::read_all", "main"));

    vec![util, shapes]
}

#[test]
fn overloads_register_with_signatures_and_first_wins() {
    let mut builder = GraphBuilder::new();
    builder.add_batch(sample_records());
    let graph = builder.build();

    let first = graph.lookup("C::f(int)").unwrap();
    let second = graph.lookup("C::f(int, int)").unwrap();
    assert!(first < second);

    let main = graph.lookup("main").unwrap();
    let callees: HashSet<_> = graph.callees_of(main).collect();
    assert!(callees.contains(&first));
    assert!(!callees.contains(&second));

    let area = graph.lookup("main::area").unwrap();
    assert_eq!(graph.data_sources_of(area).collect::<Vec<_>>(), vec![first]);
}

#[test]
fn finalize_gives_every_function_an_outgoing_edge() {
    let mut builder = GraphBuilder::new();
    builder.add_batch(sample_records());
    let graph = builder.build();

    for (uid, name, kind) in graph.table().symbols() {
        if kind == SymbolType::Function {
            assert!(graph.callees_of(uid).next().is_some(), "{} has no callees", name);
        }
    }
    assert_eq!(graph.callees_of(graph.end()).count(), 0);
    assert_eq!(graph.type_of(graph.end()), Some(SymbolType::End));
}

#[test]
fn forward_trace_of_simple_chain() {
    let mut g = BuildingGraph::new();
    g.add_call("main", "foo");
    g.add_call("foo", "bar");
    g.add_call("bar", "baz");
    let graph = g.finalize();

    let mut paths = Vec::new();
    QueryEngine::new(&graph).find_paths("main", END, |p| {
        paths.push(p.join(" -> "));
        true
    });
    assert_eq!(paths, vec!["main -> foo -> bar -> baz -> END"]);
}

#[test]
fn round_trip_preserves_graph() {
    let mut builder = GraphBuilder::new();
    builder.add_batch(sample_records());
    let graph = builder.build();

    let json = save_to_string(&graph);
    let loaded = read_index(json.as_bytes(), LoadMode::Full).unwrap();

    assert_eq!(snapshot(&loaded), snapshot(&graph));
    assert_eq!(loaded.end(), graph.end());
    for (uid, name, _) in graph.table().symbols() {
        assert_eq!(loaded.lookup(name), Some(uid));
    }
    // Saving the reloaded graph reproduces the same document.
    assert_eq!(save_to_string(&loaded), json);
}

#[test]
fn symbols_only_is_a_subset_of_full() {
    let mut builder = GraphBuilder::new();
    builder.add_batch(sample_records());
    let json = save_to_string(&builder.build());

    let full = read_index(json.as_bytes(), LoadMode::Full).unwrap();
    let minimal = read_index(json.as_bytes(), LoadMode::SymbolsOnly).unwrap();

    assert_eq!(snapshot(&minimal).symbols, snapshot(&full).symbols);
    assert_eq!(minimal.call_edge_count(), 0);
    assert_eq!(minimal.data_flow_edge_count(), 0);
    assert!(snapshot(&minimal).files.is_empty());
}

#[test]
fn newer_major_version_fails_to_load() {
    let json = save_to_string(&BuildingGraph::new().finalize());
    let bumped = json.replacen("\"version\":\"2.1.0\"", "\"version\":\"3.1.0\"", 1);
    assert_ne!(json, bumped);

    let err = read_index(bumped.as_bytes(), LoadMode::Full).unwrap_err();
    assert!(matches!(err, StoreError::IncompatibleVersion { .. }));
    assert!(err.to_string().contains("3.1.0"));
}

proptest! {
    #[test]
    fn distinct_names_get_distinct_uids(
        names in prop::collection::hash_set("[a-z:_.]{1,12}", 1..40)
    ) {
        let mut g = BuildingGraph::new();
        let uids: Vec<_> = names
            .iter()
            .map(|n| g.intern_or_create(n, SymbolType::Function))
            .collect();

        let unique: HashSet<_> = uids.iter().collect();
        prop_assert_eq!(unique.len(), names.len());
        for (name, uid) in names.iter().zip(&uids) {
            prop_assert_eq!(g.table().lookup(name), Some(*uid));
            prop_assert_eq!(g.intern_or_create(name, SymbolType::Variable), *uid);
        }
    }

    #[test]
    fn save_then_load_round_trips(
        edges in prop::collection::vec((0usize..12, 0usize..12), 0..40),
        flows in prop::collection::vec((0usize..12, 0usize..12), 0..20),
    ) {
        let mut g = BuildingGraph::new();
        let file = g.table_mut().intern_file("src/a b/\"quoted\".py");
        for i in 0..12 {
            let uid = g.add_symbol(&format!("fn_{}", i), SymbolType::Function);
            if i % 3 == 0 {
                g.table_mut().associate(uid, file);
            }
        }
        for (a, b) in edges {
            g.add_call(&format!("fn_{}", a), &format!("fn_{}", b));
        }
        for (a, b) in flows {
            g.add_data_flow(&format!("fn_{}", a), &format!("var\n{}", b));
        }
        let graph = g.finalize();

        let loaded = read_index(save_to_string(&graph).as_bytes(), LoadMode::Full).unwrap();
        prop_assert_eq!(snapshot(&loaded), snapshot(&graph));
    }

    #[test]
    fn forward_paths_are_simple(edges in prop::collection::vec((0usize..8, 0usize..8), 0..30)) {
        let mut g = BuildingGraph::new();
        g.add_symbol("fn_0", SymbolType::Function);
        for (a, b) in edges {
            g.add_call(&format!("fn_{}", a), &format!("fn_{}", b));
        }
        let graph = g.finalize();

        let mut ok = true;
        QueryEngine::new(&graph).trace_forward("fn_0", |path| {
            let unique: HashSet<_> = path.iter().collect();
            ok &= unique.len() == path.len() && path.last() == Some(&END);
            true
        });
        prop_assert!(ok);
    }
}
