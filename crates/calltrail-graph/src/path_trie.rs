//! Directory-structured view of the indexed file paths.
//!
//! Written into the index next to `file_paths`. No reader consumes it yet;
//! it is kept so that tools browsing the index by directory do not have to
//! split every path themselves.

use crate::symbol_table::FileUid;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PathTrie {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub subdirs: BTreeMap<String, PathTrie>,
    /// Files directly inside this directory.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileUid>,
}

impl PathTrie {
    /// Builds a trie from `(uid, path)` pairs. `/` and `\` both separate
    /// components; file UIDs are kept sorted.
    pub fn build<'a>(files: impl IntoIterator<Item = (FileUid, &'a str)>) -> Self {
        let mut root = PathTrie::default();
        for (uid, path) in files {
            let mut components: Vec<&str> = path
                .split(|c| c == '/' || c == '\\')
                .filter(|c| !c.is_empty() && *c != ".")
                .collect();
            // The last component is the file itself.
            components.pop();

            let mut node = &mut root;
            for dir in components {
                node = node.subdirs.entry(dir.to_string()).or_default();
            }
            node.files.push(uid);
        }
        root.sort();
        root
    }

    fn sort(&mut self) {
        self.files.sort_unstable();
        for child in self.subdirs.values_mut() {
            child.sort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_groups_by_directory() {
        let trie = PathTrie::build([
            (FileUid(3), "src/net/socket.c"),
            (FileUid(1), "src/main.c"),
            (FileUid(2), "src/net/addr.c"),
            (FileUid(4), "README.c"),
        ]);

        assert_eq!(trie.files, vec![FileUid(4)]);
        let src = &trie.subdirs["src"];
        assert_eq!(src.files, vec![FileUid(1)]);
        assert_eq!(src.subdirs["net"].files, vec![FileUid(2), FileUid(3)]);
    }

    #[test]
    fn test_serializes_without_empty_fields() {
        let trie = PathTrie::build([(FileUid(7), "lib/a.py")]);
        let json = serde_json::to_string(&trie).unwrap();
        assert_eq!(json, r#"{"subdirs":{"lib":{"files":[7]}}}"#);
    }
}
