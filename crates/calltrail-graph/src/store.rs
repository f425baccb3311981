//! Persisted index: a single JSON document.
//!
//! The writer emits compact JSON through its own buffer, flushing to the
//! sink whenever the buffer grows past a threshold, so memory stays bounded
//! regardless of graph size. Output is sorted by UID, which makes two saves
//! of the same graph byte-identical.
//!
//! The reader is a single streaming pass over the document. Every top-level
//! section is dispatched straight into the graph under construction; the
//! sections a [`LoadMode`] does not need are skipped without allocating
//! anything. Sections may come in any order. An incompatible schema version
//! stops the pass as soon as it is read, and a graph is only returned once a
//! compatible version has been seen. The writer puts the version first, so
//! its own documents are rejected before any section is decoded.

use crate::graph::{Adjacency, CallGraph};
use crate::path_trie::PathTrie;
use crate::symbol_table::{FileUid, SymbolTable, SymbolType, SymbolUid};
use crate::version::{SchemaVersion, INDEX_SCHEMA, MIN_COMPAT_SCHEMA};
use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Writer buffer size that triggers a flush.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 32 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("index schema {found} is not compatible (requires >= {required}, major <= {current})")]
    IncompatibleVersion {
        found: String,
        required: SchemaVersion,
        current: SchemaVersion,
    },

    #[error("malformed index {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    fn incompatible(found: impl Into<String>) -> Self {
        Self::IncompatibleVersion {
            found: found.into(),
            required: MIN_COMPAT_SCHEMA,
            current: INDEX_SCHEMA,
        }
    }
}

/// Which sections of the index a load materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Symbols, file associations and both edge families.
    #[default]
    Full,
    /// Symbol UIDs, names and types only.
    SymbolsOnly,
    /// Symbols plus file associations, no edges.
    WithPaths,
}

impl LoadMode {
    fn loads_files(self) -> bool {
        matches!(self, Self::Full | Self::WithPaths)
    }

    fn loads_edges(self) -> bool {
        self == Self::Full
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Writing
// ─────────────────────────────────────────────────────────────────────────────

/// Saves a graph to `path`, creating parent directories as needed.
pub fn save(graph: &CallGraph, path: &Path) -> Result<(), StoreError> {
    let io_err = |op: &'static str| {
        move |source: io::Error| StoreError::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err("create directory"))?;
    }
    let file = File::create(path).map_err(io_err("create"))?;
    write_index(graph, file, DEFAULT_FLUSH_THRESHOLD).map_err(io_err("write"))?;

    info!(
        "saved index to {} ({} symbols, {} files)",
        path.display(),
        graph.num_symbols(),
        graph.num_files()
    );
    Ok(())
}

/// Writes a graph as compact JSON, flushing `out` whenever more than
/// `flush_threshold` bytes are buffered.
pub fn write_index<W: Write>(graph: &CallGraph, out: W, flush_threshold: usize) -> io::Result<()> {
    let table = graph.table();
    let mut w = JsonWriter::new(out, flush_threshold);

    let mut symbols: Vec<(SymbolUid, &str, SymbolType)> = table.all_symbols().collect();
    symbols.sort_unstable_by_key(|&(uid, _, _)| uid);

    w.raw("{\"metadata\":{\"version\":");
    w.string(&INDEX_SCHEMA.to_string());
    w.raw(",\"num_symbols\":");
    w.uint(graph.num_symbols() as u64);
    w.raw(",\"num_functions\":");
    w.uint(graph.num_functions() as u64);
    w.raw(",\"num_variables\":");
    w.uint(graph.num_variables() as u64);
    w.raw(",\"end_uid\":");
    w.uint(graph.end().0);
    w.raw(",\"num_files\":");
    w.uint(graph.num_files() as u64);

    w.raw(",\"UIDs\":{");
    for (i, &(uid, name, _)) in symbols.iter().enumerate() {
        w.comma(i);
        w.string(name);
        w.byte(b':');
        w.uint(uid.0);
        w.flush_if_large()?;
    }
    w.raw("}},\"symbol_types\":{");
    for (i, &(uid, _, kind)) in symbols.iter().enumerate() {
        w.comma(i);
        w.key(uid.0);
        w.uint(u64::from(kind.tag()));
        w.flush_if_large()?;
    }
    w.raw("},\"call_mapping\":");
    write_adjacency(&mut w, &symbols, |uid| graph.callees_of(uid).collect())?;
    w.raw(",\"data_flow\":");
    write_adjacency(&mut w, &symbols, |uid| graph.data_sinks_of(uid).collect())?;

    let mut files: Vec<(FileUid, &str)> = table.files().collect();
    files.sort_unstable_by_key(|&(uid, _)| uid);

    w.raw(",\"file_paths\":{");
    for (i, &(uid, path)) in files.iter().enumerate() {
        w.comma(i);
        w.key(uid.0);
        w.string(path);
        w.flush_if_large()?;
    }

    w.raw("},\"file_symbols\":{");
    let mut first = true;
    for &(uid, _) in &files {
        let members = table.symbols_in_file(uid);
        if members.is_empty() {
            continue;
        }
        if !std::mem::take(&mut first) {
            w.byte(b',');
        }
        w.key(uid.0);
        w.uint_array(members.iter().map(|s| s.0));
        w.flush_if_large()?;
    }

    w.raw("},\"symbol_files\":{");
    let mut owners: Vec<(SymbolUid, FileUid)> = table.symbol_file_pairs().collect();
    owners.sort_unstable();
    for (i, &(symbol, file)) in owners.iter().enumerate() {
        w.comma(i);
        w.key(symbol.0);
        w.uint(file.0);
        w.flush_if_large()?;
    }

    w.raw("},\"path_trie\":");
    let trie = PathTrie::build(files.iter().copied());
    serde_json::to_writer(&mut w.buf, &trie)?;
    w.byte(b'}');

    w.finish()
}

fn write_adjacency<W: Write>(
    w: &mut JsonWriter<W>,
    symbols: &[(SymbolUid, &str, SymbolType)],
    targets_of: impl Fn(SymbolUid) -> Vec<SymbolUid>,
) -> io::Result<()> {
    w.byte(b'{');
    let mut first = true;
    for &(uid, _, _) in symbols {
        let mut targets = targets_of(uid);
        if targets.is_empty() {
            continue;
        }
        targets.sort_unstable();
        if !std::mem::take(&mut first) {
            w.byte(b',');
        }
        w.key(uid.0);
        w.uint_array(targets.iter().map(|t| t.0));
        w.flush_if_large()?;
    }
    w.byte(b'}');
    Ok(())
}

/// Minimal compact JSON emitter over a flush-on-threshold buffer.
struct JsonWriter<W: Write> {
    out: W,
    buf: Vec<u8>,
    flush_threshold: usize,
}

impl<W: Write> JsonWriter<W> {
    fn new(out: W, flush_threshold: usize) -> Self {
        Self {
            out,
            buf: Vec::with_capacity(flush_threshold.min(DEFAULT_FLUSH_THRESHOLD) + 1024),
            flush_threshold,
        }
    }

    fn raw(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
    }

    fn byte(&mut self, b: u8) {
        self.buf.push(b);
    }

    fn comma(&mut self, index: usize) {
        if index > 0 {
            self.buf.push(b',');
        }
    }

    fn uint(&mut self, mut n: u64) {
        let mut digits = [0u8; 20];
        let mut i = digits.len();
        loop {
            i -= 1;
            digits[i] = b'0' + (n % 10) as u8;
            n /= 10;
            if n == 0 {
                break;
            }
        }
        self.buf.extend_from_slice(&digits[i..]);
    }

    /// An integer object key: `"42":`.
    fn key(&mut self, n: u64) {
        self.buf.push(b'"');
        self.uint(n);
        self.buf.extend_from_slice(b"\":");
    }

    fn uint_array(&mut self, values: impl Iterator<Item = u64>) {
        self.buf.push(b'[');
        for (i, v) in values.enumerate() {
            self.comma(i);
            self.uint(v);
        }
        self.buf.push(b']');
    }

    /// Quotes a string, escaping only `"`, `\` and control characters.
    fn string(&mut self, s: &str) {
        const HEX: &[u8; 16] = b"0123456789abcdef";

        self.buf.push(b'"');
        let bytes = s.as_bytes();
        let mut start = 0;
        for (i, &b) in bytes.iter().enumerate() {
            let escape: &[u8] = match b {
                b'"' => b"\\\"",
                b'\\' => b"\\\\",
                0x08 => b"\\b",
                0x0c => b"\\f",
                b'\n' => b"\\n",
                b'\r' => b"\\r",
                b'\t' => b"\\t",
                0x00..=0x1f => b"",
                _ => continue,
            };
            self.buf.extend_from_slice(&bytes[start..i]);
            if escape.is_empty() {
                self.buf.extend_from_slice(b"\\u00");
                self.buf.push(HEX[(b >> 4) as usize]);
                self.buf.push(HEX[(b & 0xf) as usize]);
            } else {
                self.buf.extend_from_slice(escape);
            }
            start = i + 1;
        }
        self.buf.extend_from_slice(&bytes[start..]);
        self.buf.push(b'"');
    }

    fn flush_if_large(&mut self) -> io::Result<()> {
        if self.buf.len() > self.flush_threshold {
            self.out.write_all(&self.buf)?;
            self.buf.clear();
        }
        Ok(())
    }

    fn finish(mut self) -> io::Result<()> {
        self.out.write_all(&self.buf)?;
        self.buf.clear();
        self.out.flush()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reading
// ─────────────────────────────────────────────────────────────────────────────

/// Loads an index from `path`, materializing only what `mode` asks for.
///
/// # Errors
///
/// Fails without returning a partial graph if the file cannot be read, its
/// schema version is incompatible, or the document is malformed.
pub fn load(path: &Path, mode: LoadMode) -> Result<CallGraph, StoreError> {
    let file = File::open(path).map_err(|source| StoreError::Io {
        op: "open",
        path: path.to_path_buf(),
        source,
    })?;
    let graph = read_from(BufReader::new(file), mode, path)?;

    debug!(
        "loaded {} ({:?}): {} symbols, {} call edges",
        path.display(),
        mode,
        graph.num_symbols(),
        graph.call_edge_count()
    );
    Ok(graph)
}

/// Reads an index from any reader. Wrap unbuffered readers in a `BufReader`.
pub fn read_index<R: Read>(reader: R, mode: LoadMode) -> Result<CallGraph, StoreError> {
    read_from(reader, mode, Path::new("<stream>"))
}

fn read_from<R: Read>(reader: R, mode: LoadMode, path: &Path) -> Result<CallGraph, StoreError> {
    let mut state = LoadState::new(mode);
    let mut de = serde_json::Deserializer::from_reader(reader);

    let result = IndexSeed { state: &mut state }
        .deserialize(&mut de)
        .and_then(|()| de.end());

    if let Err(e) = result {
        if let Some(err) = state.version_error.take() {
            return Err(err);
        }
        if e.is_io() {
            return Err(StoreError::Io {
                op: "read",
                path: path.to_path_buf(),
                source: e.into(),
            });
        }
        return Err(StoreError::Malformed {
            path: path.to_path_buf(),
            source: e,
        });
    }

    Ok(state.finish())
}

/// Graph parts accumulated during one load.
struct LoadState {
    mode: LoadMode,
    table: SymbolTable,
    calls: Adjacency,
    data_flow: Adjacency,
    end: Option<SymbolUid>,
    version_checked: bool,
    version_error: Option<StoreError>,
    /// Types seen before their symbol's name.
    pending_types: HashMap<SymbolUid, SymbolType>,
}

impl LoadState {
    fn new(mode: LoadMode) -> Self {
        Self {
            mode,
            table: SymbolTable::new(),
            calls: Adjacency::new(),
            data_flow: Adjacency::new(),
            end: None,
            version_checked: false,
            version_error: None,
            pending_types: HashMap::new(),
        }
    }

    /// Records a version failure and returns the error that stops the
    /// deserializer.
    fn reject<E: de::Error>(&mut self, found: &str) -> E {
        self.version_error = Some(StoreError::incompatible(found));
        E::custom("incompatible schema version")
    }

    fn check_version<E: de::Error>(&mut self, found: &str) -> Result<(), E> {
        match found.parse::<SchemaVersion>() {
            Ok(v) if v.is_compatible() => {
                self.version_checked = true;
                Ok(())
            }
            _ => Err(self.reject(found)),
        }
    }

    fn require_version<E: de::Error>(&mut self) -> Result<(), E> {
        if self.version_checked {
            Ok(())
        } else {
            Err(self.reject("missing"))
        }
    }

    fn restore_type(&mut self, uid: u64, tag: u64) -> Result<(), String> {
        let kind = SymbolType::from_tag(tag).ok_or_else(|| format!("unknown symbol type {}", tag))?;
        let uid = SymbolUid(uid);
        if self.table.contains(uid) {
            self.table.set_type(uid, kind);
        } else {
            self.pending_types.insert(uid, kind);
        }
        Ok(())
    }

    fn finish(mut self) -> CallGraph {
        for (uid, kind) in std::mem::take(&mut self.pending_types) {
            self.table.set_type(uid, kind);
        }
        // Presence is enforced while reading metadata.
        let end = self.end.unwrap_or(SymbolUid(0));
        self.table.restore_end(end);
        CallGraph::from_parts(self.table, self.calls, self.data_flow, end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(field_identifier, rename_all = "snake_case")]
enum Section {
    Metadata,
    SymbolTypes,
    CallMapping,
    DataFlow,
    FilePaths,
    FileSymbols,
    SymbolFiles,
    PathTrie,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(field_identifier, rename_all = "snake_case")]
enum MetadataField {
    Version,
    EndUid,
    #[serde(rename = "UIDs")]
    Uids,
    #[serde(other)]
    Other,
}

struct IndexSeed<'a> {
    state: &'a mut LoadState,
}

impl<'de, 'a> DeserializeSeed<'de> for IndexSeed<'a> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, 'a> Visitor<'de> for IndexSeed<'a> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an index object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let state = self.state;
        let mode = state.mode;

        while let Some(section) = map.next_key::<Section>()? {
            match section {
                Section::Metadata => map.next_value_seed(MetadataSeed {
                    state: &mut *state,
                })?,
                Section::SymbolTypes => {
                    map.next_value_seed(entries(|uid: u64, tag: u64| state.restore_type(uid, tag)))?
                }
                Section::CallMapping if mode.loads_edges() => {
                    map.next_value_seed(EdgeMapSeed(&mut state.calls))?
                }
                Section::DataFlow if mode.loads_edges() => {
                    map.next_value_seed(EdgeMapSeed(&mut state.data_flow))?
                }
                Section::FilePaths if mode.loads_files() => {
                    let table = &mut state.table;
                    map.next_value_seed(entries(|uid: u64, path: String| {
                        table.restore_file(FileUid(uid), &path);
                        Ok(())
                    }))?
                }
                Section::FileSymbols if mode.loads_files() => {
                    let table = &mut state.table;
                    map.next_value_seed(entries(|uid: u64, symbols: Vec<u64>| {
                        let symbols = symbols.into_iter().map(SymbolUid).collect();
                        table.restore_file_symbols(FileUid(uid), symbols);
                        Ok(())
                    }))?
                }
                Section::SymbolFiles if mode.loads_files() => {
                    let table = &mut state.table;
                    map.next_value_seed(entries(|symbol: u64, file: u64| {
                        table.restore_symbol_file(SymbolUid(symbol), FileUid(file));
                        Ok(())
                    }))?
                }
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        state.require_version()
    }
}

struct MetadataSeed<'a> {
    state: &'a mut LoadState,
}

impl<'de, 'a> DeserializeSeed<'de> for MetadataSeed<'a> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, 'a> Visitor<'de> for MetadataSeed<'a> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an index metadata object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let state = self.state;

        while let Some(field) = map.next_key::<MetadataField>()? {
            match field {
                MetadataField::Version => {
                    let found: String = map.next_value()?;
                    state.check_version::<A::Error>(&found)?;
                }
                MetadataField::EndUid => {
                    state.end = Some(SymbolUid(map.next_value()?));
                }
                MetadataField::Uids => {
                    let table = &mut state.table;
                    map.next_value_seed(entries(|name: String, uid: u64| {
                        table.restore_symbol(SymbolUid(uid), &name, SymbolType::Function);
                        Ok(())
                    }))?;
                }
                MetadataField::Other => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        state.require_version::<A::Error>()?;
        if state.end.is_none() {
            return Err(de::Error::missing_field("end_uid"));
        }
        Ok(())
    }
}

/// Visits a JSON object, handing each decoded entry to a callback.
struct Entries<K, V, F> {
    on_entry: F,
    marker: PhantomData<fn() -> (K, V)>,
}

fn entries<K, V, F>(on_entry: F) -> Entries<K, V, F>
where
    F: FnMut(K, V) -> Result<(), String>,
{
    Entries {
        on_entry,
        marker: PhantomData,
    }
}

impl<'de, K, V, F> DeserializeSeed<'de> for Entries<K, V, F>
where
    K: Deserialize<'de>,
    V: Deserialize<'de>,
    F: FnMut(K, V) -> Result<(), String>,
{
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, K, V, F> Visitor<'de> for Entries<K, V, F>
where
    K: Deserialize<'de>,
    V: Deserialize<'de>,
    F: FnMut(K, V) -> Result<(), String>,
{
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(mut self, mut map: A) -> Result<(), A::Error> {
        while let Some((key, value)) = map.next_entry::<K, V>()? {
            (self.on_entry)(key, value).map_err(de::Error::custom)?;
        }
        Ok(())
    }
}

/// `{"from": [to, ...], ...}` inserted edge by edge.
struct EdgeMapSeed<'a>(&'a mut Adjacency);

impl<'de, 'a> DeserializeSeed<'de> for EdgeMapSeed<'a> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, 'a> Visitor<'de> for EdgeMapSeed<'a> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an adjacency object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let graph = self.0;
        while let Some(from) = map.next_key::<u64>()? {
            map.next_value_seed(TargetsSeed {
                graph: &mut *graph,
                from: SymbolUid(from),
            })?;
        }
        Ok(())
    }
}

struct TargetsSeed<'a> {
    graph: &'a mut Adjacency,
    from: SymbolUid,
}

impl<'de, 'a> DeserializeSeed<'de> for TargetsSeed<'a> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, 'a> Visitor<'de> for TargetsSeed<'a> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of symbol UIDs")
    }

    fn visit_seq<S: SeqAccess<'de>>(self, mut seq: S) -> Result<(), S::Error> {
        while let Some(to) = seq.next_element::<u64>()? {
            self.graph.add_edge(self.from, SymbolUid(to), ());
        }
        Ok(())
    }
}
