//! C++ extraction.
//!
//! Handles .cpp, .hpp, .cc, .hh, .cxx, .hxx files. Functions are named by
//! their enclosing namespaces and classes (`ns::Widget::draw`); out-of-line
//! definitions such as `void Widget::draw()` keep their written qualifier.

use super::c::{function_signature, record_function};
use super::{text, FileContext, LanguageExtractor};
use crate::records::FileRecords;
use tree_sitter::{Node, Tree};

pub struct CppExtractor;

impl LanguageExtractor for CppExtractor {
    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_cpp::language()
    }

    fn extract(&self, tree: &Tree, source: &str, file: FileContext<'_>, out: &mut FileRecords) {
        let mut scopes = Vec::new();
        extract_from_node(tree.root_node(), source, file, &mut scopes, out);
    }
}

/// Recursively walks declarations, tracking namespace and class scopes.
fn extract_from_node(
    node: Node<'_>,
    source: &str,
    file: FileContext<'_>,
    scopes: &mut Vec<String>,
    out: &mut FileRecords,
) {
    match node.kind() {
        "namespace_definition" | "class_specifier" | "struct_specifier" => {
            // Anonymous namespaces and structs add no scope.
            let name = node
                .child_by_field_name("name")
                .map(|n| text(n, source).to_string())
                .filter(|n| !n.is_empty());
            if let Some(body) = node.child_by_field_name("body") {
                let pushed = name.map(|n| scopes.push(n)).is_some();
                for i in 0..body.child_count() {
                    if let Some(member) = body.child(i) {
                        extract_from_node(member, source, file, scopes, out);
                    }
                }
                if pushed {
                    scopes.pop();
                }
            }
            return;
        }
        "function_definition" => {
            extract_function(node, source, file, scopes, out);
            // Local classes may define methods of their own.
            if let Some(body) = node.child_by_field_name("body") {
                extract_from_node(body, source, file, scopes, out);
            }
            return;
        }
        _ => {}
    }

    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            extract_from_node(child, source, file, scopes, out);
        }
    }
}

fn extract_function(
    node: Node<'_>,
    source: &str,
    file: FileContext<'_>,
    scopes: &[String],
    out: &mut FileRecords,
) {
    let Some(signature) = function_signature(node, source, true) else {
        return;
    };

    let qualified_name = if scopes.is_empty() {
        signature.name.to_string()
    } else {
        format!("{}::{}", scopes.join("::"), signature.name)
    };

    record_function(node, source, file, qualified_name, signature.params, true, out);
}
