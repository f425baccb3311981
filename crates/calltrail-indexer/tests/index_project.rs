use calltrail_graph::{store, LoadMode, QueryEngine, END};
use calltrail_indexer::{index_directory, IndexerConfig};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn sample_project(root: &Path) {
    write(
        root,
        "app/main.py",
        "def main():\n    data = load()\n    report(data)\n",
    );
    write(
        root,
        "app/io.py",
        "def load():\n    return read_file()\n\ndef read_file():\n    return 1\n",
    );
    write(root, "app/report.py", "def report(data):\n    print(data)\n");
    write(root, "app/empty.py", "");
    write(root, "build/generated.py", "def generated():\n    pass\n");
}

#[test]
fn indexes_python_project_and_traces_paths() {
    let dir = tempdir().unwrap();
    sample_project(dir.path());

    let result = index_directory(dir.path()).unwrap();
    assert_eq!(result.files_indexed, 3);
    assert!(result.errors.is_empty());

    let graph = &result.graph;
    assert!(graph.lookup("generated").is_none());
    assert_eq!(
        graph.table().path_of(graph.table().file_of(graph.lookup("load").unwrap()).unwrap()),
        Some("app/io.py")
    );

    let mut paths = Vec::new();
    QueryEngine::new(graph).find_paths("main", END, |p| {
        paths.push(p.join(" -> "));
        true
    });
    paths.sort();
    assert_eq!(
        paths,
        vec![
            "main -> load -> read_file -> END",
            "main -> report -> print -> END",
        ]
    );

    let engine = QueryEngine::new(graph);
    assert_eq!(engine.data_sources("main::data"), vec!["load"]);
}

#[test]
fn index_survives_save_and_load() {
    let dir = tempdir().unwrap();
    sample_project(dir.path());
    let result = index_directory(dir.path()).unwrap();

    let index = IndexerConfig::index_path_for(dir.path());
    store::save(&result.graph, &index).unwrap();
    let loaded = store::load(&index, LoadMode::Full).unwrap();

    assert_eq!(loaded.num_symbols(), result.graph.num_symbols());
    assert_eq!(loaded.call_edge_count(), result.graph.call_edge_count());
    assert_eq!(loaded.lookup("report"), result.graph.lookup("report"));
}

#[test]
fn reindexing_an_unchanged_tree_is_deterministic() {
    let dir = tempdir().unwrap();
    sample_project(dir.path());

    let first = index_directory(dir.path()).unwrap().graph;
    let second = index_directory(dir.path()).unwrap().graph;

    let mut a = Vec::new();
    let mut b = Vec::new();
    store::write_index(&first, &mut a, store::DEFAULT_FLUSH_THRESHOLD).unwrap();
    store::write_index(&second, &mut b, store::DEFAULT_FLUSH_THRESHOLD).unwrap();
    assert_eq!(String::from_utf8(a).unwrap(), String::from_utf8(b).unwrap());
}
