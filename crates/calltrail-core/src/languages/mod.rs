//! Per-language record extraction.
//!
//! Each extractor walks a tree-sitter tree once for definitions and then
//! scans every function body for calls and assignments. Syntax nodes never
//! leave this module: extractors only push plain records.

mod c;
mod cpp;
mod python;

pub use c::CExtractor;
pub use cpp::CppExtractor;
pub use python::PythonExtractor;

use crate::language::Language;
use crate::records::FileRecords;
use tree_sitter::{Node, Tree};

/// Per-file information an extractor needs besides the tree.
#[derive(Debug, Clone, Copy)]
pub struct FileContext<'a> {
    /// Path recorded in function records.
    pub display_path: &'a str,
    /// File name without extension, used to scope C functions.
    pub stem: &'a str,
}

/// Turns a parsed tree into records.
pub trait LanguageExtractor: Sync {
    /// The tree-sitter grammar for this language.
    fn grammar(&self) -> tree_sitter::Language;

    /// Appends every function, call and variable record found in `tree`.
    fn extract(&self, tree: &Tree, source: &str, file: FileContext<'_>, out: &mut FileRecords);
}

static PYTHON: PythonExtractor = PythonExtractor;
static C: CExtractor = CExtractor;
static CPP: CppExtractor = CppExtractor;

/// Returns the extractor registered for a language.
pub fn extractor_for(language: Language) -> &'static dyn LanguageExtractor {
    match language {
        Language::Python => &PYTHON,
        Language::C => &C,
        Language::Cpp => &CPP,
    }
}

/// Source text covered by a node.
pub(crate) fn text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// Visits `root` and its descendants in source order without recursion.
///
/// Descendants whose kind is in `stop_at` are not visited (nor is anything
/// below them); `root` itself is always visited.
pub(crate) fn walk_body<'t>(root: Node<'t>, stop_at: &[&str], mut visit: impl FnMut(Node<'t>)) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node != root && stop_at.contains(&node.kind()) {
            continue;
        }
        visit(node);
        for i in (0..node.child_count()).rev() {
            if let Some(child) = node.child(i) {
                stack.push(child);
            }
        }
    }
}

/// First identifier found under a declarator (`*p`, `&r`, `a[4]`, ...).
pub(crate) fn declarator_name<'s>(node: Node<'_>, source: &'s str) -> Option<&'s str> {
    match node.kind() {
        "identifier" | "field_identifier" => Some(text(node, source)),
        _ => {
            for i in 0..node.named_child_count() {
                if let Some(name) = node.named_child(i).and_then(|c| declarator_name(c, source)) {
                    return Some(name);
                }
            }
            None
        }
    }
}
