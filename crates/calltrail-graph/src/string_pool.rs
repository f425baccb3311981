//! Append-only string interning.
//!
//! Qualified names and file paths are referenced once per edge endpoint and
//! once per file association; the pool stores each distinct string once and
//! hands out dense indexes.

use std::collections::HashMap;
use std::sync::Arc;

/// Index of a string inside a [`StringPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StrId(u32);

impl StrId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interned string arena. Strings are never removed.
#[derive(Debug, Default, Clone)]
pub struct StringPool {
    strings: Vec<Arc<str>>,
    index: HashMap<Arc<str>, StrId>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `s`, adding it if it is not already pooled.
    pub fn intern(&mut self, s: &str) -> StrId {
        if let Some(&id) = self.index.get(s) {
            return id;
        }
        let id = StrId(self.strings.len() as u32);
        let shared: Arc<str> = Arc::from(s);
        self.strings.push(Arc::clone(&shared));
        self.index.insert(shared, id);
        id
    }

    /// Looks up a string without adding it.
    pub fn lookup(&self, s: &str) -> Option<StrId> {
        self.index.get(s).copied()
    }

    pub fn get(&self, id: StrId) -> Option<&str> {
        self.strings.get(id.index()).map(|s| &**s)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
