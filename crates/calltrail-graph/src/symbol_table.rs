//! Symbol & file registry.
//!
//! Allocates UIDs from two independent counters, one for symbols and one
//! for files, and keeps names and paths in their own string pools. A symbol
//! is owned by at most one file; the first association wins.

use crate::string_pool::{StrId, StringPool};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Name the finalize sentinel is reported under.
pub const END_NAME: &str = "END";

/// Identity of a symbol. Stable for the lifetime of one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolUid(pub u64);

/// Identity of a file. Numerically unrelated to [`SymbolUid`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileUid(pub u64);

impl std::fmt::Display for SymbolUid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for FileUid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a symbol stands for.
///
/// The persisted index stores the tag as an integer: 0, 1, 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolType {
    Function,
    Variable,
    /// The terminal sentinel added by finalize.
    End,
}

impl SymbolType {
    pub fn tag(self) -> u8 {
        match self {
            Self::Function => 0,
            Self::Variable => 1,
            Self::End => 2,
        }
    }

    pub fn from_tag(tag: u64) -> Option<Self> {
        match tag {
            0 => Some(Self::Function),
            1 => Some(Self::Variable),
            2 => Some(Self::End),
            _ => None,
        }
    }
}

impl std::fmt::Display for SymbolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Function => "function",
            Self::Variable => "variable",
            Self::End => "end",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy)]
struct SymbolEntry {
    name: StrId,
    kind: SymbolType,
}

/// Interned registry of symbols and files.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    names: StringPool,
    symbols: HashMap<SymbolUid, SymbolEntry>,
    by_name: HashMap<StrId, SymbolUid>,
    next_symbol: u64,

    paths: StringPool,
    files: HashMap<FileUid, StrId>,
    by_path: HashMap<StrId, FileUid>,
    next_file: u64,

    symbol_files: HashMap<SymbolUid, FileUid>,
    file_symbols: HashMap<FileUid, Vec<SymbolUid>>,

    end: Option<SymbolUid>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the UID for `name`, creating a symbol of type `kind` if the
    /// name is new. An existing symbol keeps its type.
    pub fn intern_or_create(&mut self, name: &str, kind: SymbolType) -> SymbolUid {
        if let Some(uid) = self.lookup(name) {
            return uid;
        }
        let id = self.names.intern(name);
        self.next_symbol += 1;
        let uid = SymbolUid(self.next_symbol);
        self.symbols.insert(uid, SymbolEntry { name: id, kind });
        self.by_name.insert(id, uid);
        uid
    }

    /// Overrides the type of an existing symbol.
    pub fn set_type(&mut self, uid: SymbolUid, kind: SymbolType) {
        if let Some(entry) = self.symbols.get_mut(&uid) {
            entry.kind = kind;
        }
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolUid> {
        let id = self.names.lookup(name)?;
        self.by_name.get(&id).copied()
    }

    /// Name of a symbol; `"END"` for the sentinel and `""` for unknown UIDs.
    pub fn name_of(&self, uid: SymbolUid) -> &str {
        if self.end == Some(uid) {
            return END_NAME;
        }
        self.symbols
            .get(&uid)
            .and_then(|e| self.names.get(e.name))
            .unwrap_or("")
    }

    pub fn type_of(&self, uid: SymbolUid) -> Option<SymbolType> {
        self.symbols.get(&uid).map(|e| e.kind)
    }

    pub fn contains(&self, uid: SymbolUid) -> bool {
        self.symbols.contains_key(&uid)
    }

    pub fn intern_file(&mut self, path: &str) -> FileUid {
        if let Some(uid) = self.file_uid(path) {
            return uid;
        }
        let id = self.paths.intern(path);
        self.next_file += 1;
        let uid = FileUid(self.next_file);
        self.files.insert(uid, id);
        self.by_path.insert(id, uid);
        uid
    }

    pub fn file_uid(&self, path: &str) -> Option<FileUid> {
        let id = self.paths.lookup(path)?;
        self.by_path.get(&id).copied()
    }

    pub fn path_of(&self, file: FileUid) -> Option<&str> {
        self.files.get(&file).and_then(|&id| self.paths.get(id))
    }

    /// Records that `file` defines `symbol`. Ignored if the symbol already
    /// belongs to a file.
    pub fn associate(&mut self, symbol: SymbolUid, file: FileUid) {
        if self.symbol_files.contains_key(&symbol) {
            return;
        }
        self.symbol_files.insert(symbol, file);
        self.file_symbols.entry(file).or_default().push(symbol);
    }

    pub fn file_of(&self, symbol: SymbolUid) -> Option<FileUid> {
        self.symbol_files.get(&symbol).copied()
    }

    /// Symbols defined in `file`, in association order.
    pub fn symbols_in_file(&self, file: FileUid) -> &[SymbolUid] {
        self.file_symbols.get(&file).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every symbol except the sentinel, in no particular order.
    pub fn symbols(&self) -> impl Iterator<Item = (SymbolUid, &str, SymbolType)> + '_ {
        self.symbols.iter().filter_map(move |(&uid, entry)| {
            if entry.kind == SymbolType::End {
                return None;
            }
            Some((uid, self.names.get(entry.name).unwrap_or(""), entry.kind))
        })
    }

    /// Every file, in no particular order.
    pub fn files(&self) -> impl Iterator<Item = (FileUid, &str)> + '_ {
        self.files
            .iter()
            .map(move |(&uid, &id)| (uid, self.paths.get(id).unwrap_or("")))
    }

    pub fn end(&self) -> Option<SymbolUid> {
        self.end
    }

    /// Allocates the sentinel. Returns the existing one if already present.
    pub(crate) fn create_end(&mut self) -> SymbolUid {
        if let Some(end) = self.end {
            return end;
        }
        let id = self.names.intern(END_NAME);
        self.next_symbol += 1;
        let uid = SymbolUid(self.next_symbol);
        self.symbols.insert(
            uid,
            SymbolEntry {
                name: id,
                kind: SymbolType::End,
            },
        );
        self.by_name.entry(id).or_insert(uid);
        self.end = Some(uid);
        uid
    }

    /// Inserts a symbol under a UID read from disk.
    ///
    /// When two UIDs carry the same name the lower one answers lookups.
    pub(crate) fn restore_symbol(&mut self, uid: SymbolUid, name: &str, kind: SymbolType) {
        let id = self.names.intern(name);
        self.symbols.insert(uid, SymbolEntry { name: id, kind });
        let slot = self.by_name.entry(id).or_insert(uid);
        if uid < *slot {
            *slot = uid;
        }
        self.next_symbol = self.next_symbol.max(uid.0);
    }

    pub(crate) fn restore_file(&mut self, uid: FileUid, path: &str) {
        let id = self.paths.intern(path);
        self.files.insert(uid, id);
        self.by_path.entry(id).or_insert(uid);
        self.next_file = self.next_file.max(uid.0);
    }

    /// Restores a file's ordered symbol list verbatim.
    pub(crate) fn restore_file_symbols(&mut self, file: FileUid, symbols: Vec<SymbolUid>) {
        self.file_symbols.insert(file, symbols);
    }

    pub(crate) fn restore_symbol_file(&mut self, symbol: SymbolUid, file: FileUid) {
        self.symbol_files.insert(symbol, file);
    }

    pub(crate) fn restore_end(&mut self, uid: SymbolUid) {
        self.end = Some(uid);
        self.next_symbol = self.next_symbol.max(uid.0);
    }

    /// Number of symbols, not counting the sentinel.
    pub fn num_symbols(&self) -> usize {
        self.symbols.len() - usize::from(self.end.is_some_and(|e| self.symbols.contains_key(&e)))
    }

    pub fn num_functions(&self) -> usize {
        self.count(SymbolType::Function)
    }

    pub fn num_variables(&self) -> usize {
        self.count(SymbolType::Variable)
    }

    pub fn num_files(&self) -> usize {
        self.files.len()
    }

    fn count(&self, kind: SymbolType) -> usize {
        self.symbols.values().filter(|e| e.kind == kind).count()
    }

    pub(crate) fn symbol_file_pairs(&self) -> impl Iterator<Item = (SymbolUid, FileUid)> + '_ {
        self.symbol_files.iter().map(|(&s, &f)| (s, f))
    }

    /// Symbol entries including the sentinel, for persistence.
    pub(crate) fn all_symbols(&self) -> impl Iterator<Item = (SymbolUid, &str, SymbolType)> + '_ {
        self.symbols
            .iter()
            .map(move |(&uid, e)| (uid, self.names.get(e.name).unwrap_or(""), e.kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_intern_and_resolve() {
        let mut table = SymbolTable::new();
        let foo = table.intern_or_create("main::foo", SymbolType::Function);
        let bar = table.intern_or_create("main::bar", SymbolType::Variable);

        assert_ne!(foo, bar);
        assert_eq!(table.intern_or_create("main::foo", SymbolType::Variable), foo);
        assert_eq!(table.type_of(foo), Some(SymbolType::Function));
        assert_eq!(table.lookup("main::foo"), Some(foo));
        assert_eq!(table.lookup("main::baz"), None);
        assert_eq!(table.name_of(bar), "main::bar");
        assert_eq!(table.name_of(SymbolUid(999)), "");
    }

    #[test]
    fn test_file_association_first_wins() {
        let mut table = SymbolTable::new();
        let sym = table.intern_or_create("helper", SymbolType::Function);
        let a = table.intern_file("src/a.c");
        let b = table.intern_file("src/b.c");

        table.associate(sym, a);
        table.associate(sym, b);

        assert_eq!(table.file_of(sym), Some(a));
        assert_eq!(table.symbols_in_file(a), &[sym]);
        assert!(table.symbols_in_file(b).is_empty());
        assert_eq!(table.path_of(b), Some("src/b.c"));
        assert_eq!(table.intern_file("src/a.c"), a);
    }

    #[test]
    fn test_end_is_named_and_not_counted() {
        let mut table = SymbolTable::new();
        table.intern_or_create("f", SymbolType::Function);
        let end = table.create_end();

        assert_eq!(table.create_end(), end);
        assert_eq!(table.name_of(end), END_NAME);
        assert_eq!(table.type_of(end), Some(SymbolType::End));
        assert_eq!(table.num_symbols(), 1);
        assert_eq!(table.symbols().count(), 1);
    }
}
