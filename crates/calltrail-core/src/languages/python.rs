//! Python extraction.
//!
//! Methods are named `Class.method` (nested classes chain with `.`);
//! module-level functions keep their bare name.

use super::{text, walk_body, FileContext, LanguageExtractor};
use crate::records::{CallRecord, FileRecords, FunctionRecord, VariableRecord};
use tree_sitter::{Node, Tree};

/// Bodies of these node kinds belong to another definition.
const NESTED_SCOPES: &[&str] = &["function_definition", "class_definition", "lambda"];

pub struct PythonExtractor;

impl LanguageExtractor for PythonExtractor {
    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_python::language()
    }

    fn extract(&self, tree: &Tree, source: &str, file: FileContext<'_>, out: &mut FileRecords) {
        let mut classes = Vec::new();
        walk(tree.root_node(), source, file, &mut classes, out);
    }
}

fn walk(
    node: Node<'_>,
    source: &str,
    file: FileContext<'_>,
    classes: &mut Vec<String>,
    out: &mut FileRecords,
) {
    match node.kind() {
        "class_definition" => {
            if let Some(name) = node.child_by_field_name("name") {
                classes.push(text(name, source).to_string());
                if let Some(body) = node.child_by_field_name("body") {
                    walk(body, source, file, classes, out);
                }
                classes.pop();
                return;
            }
        }
        "function_definition" => extract_function(node, source, file, classes, out),
        _ => {}
    }

    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            walk(child, source, file, classes, out);
        }
    }
}

fn extract_function(
    node: Node<'_>,
    source: &str,
    file: FileContext<'_>,
    classes: &[String],
    out: &mut FileRecords,
) {
    let Some(name) = node.child_by_field_name("name").map(|n| text(n, source)) else {
        return;
    };
    if name.is_empty() {
        return;
    }

    let qualified_name = if classes.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", classes.join("."), name)
    };

    let mut param_types = Vec::new();
    if let Some(params) = node.child_by_field_name("parameters") {
        for i in 0..params.named_child_count() {
            let Some(param) = params.named_child(i) else {
                continue;
            };
            if matches!(param.kind(), "typed_parameter" | "typed_default_parameter") {
                if let Some(ty) = param.child_by_field_name("type") {
                    param_types.push(text(ty, source).to_string());
                }
            }
        }
    }

    out.functions.push(FunctionRecord {
        qualified_name: qualified_name.clone(),
        file_path: file.display_path.to_string(),
        param_types,
    });

    let Some(body) = node.child_by_field_name("body") else {
        return;
    };
    walk_body(body, NESTED_SCOPES, |n| match n.kind() {
        "call" => {
            if let Some(callee) = call_target(n, source) {
                out.calls.push(CallRecord::new(&qualified_name, callee));
            }
        }
        "assignment" => {
            if let Some(var) = assignment(n, source, &qualified_name) {
                out.variables.push(var);
            }
        }
        _ => {}
    });
}

fn call_target<'s>(call: Node<'_>, source: &'s str) -> Option<&'s str> {
    let function = call.child_by_field_name("function")?;
    match function.kind() {
        "identifier" | "attribute" => Some(text(function, source)).filter(|t| !t.is_empty()),
        _ => None,
    }
}

fn assignment(node: Node<'_>, source: &str, func: &str) -> Option<VariableRecord> {
    let left = node.child_by_field_name("left")?;
    if !matches!(left.kind(), "identifier" | "attribute") {
        return None;
    }
    let var = text(left, source);

    let (value_source, is_from_call) = match node.child_by_field_name("right") {
        Some(right) if right.kind() == "call" => match call_target(right, source) {
            Some(callee) => (callee.to_string(), true),
            None => ("literal".to_string(), false),
        },
        Some(right) if matches!(right.kind(), "identifier" | "attribute") => {
            (text(right, source).to_string(), false)
        }
        Some(_) => ("literal".to_string(), false),
        // Bare annotation (`x: int`) carries no value.
        None => (String::new(), false),
    };

    Some(VariableRecord::new(
        format!("{}::{}", func, var),
        func,
        value_source,
        is_from_call,
    ))
}
