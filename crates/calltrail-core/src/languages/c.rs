//! C extraction, plus the body scanning shared with C++.
//!
//! C has no namespaces, so functions are scoped by their file stem:
//! `helper` defined in `util.c` becomes `util::helper`.

use super::{declarator_name, text, walk_body, FileContext, LanguageExtractor};
use crate::records::{CallRecord, FileRecords, FunctionRecord, VariableRecord};
use tree_sitter::{Node, Tree};

const NESTED_SCOPES: &[&str] = &["function_definition", "lambda_expression"];

pub struct CExtractor;

impl LanguageExtractor for CExtractor {
    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_c::language()
    }

    fn extract(&self, tree: &Tree, source: &str, file: FileContext<'_>, out: &mut FileRecords) {
        walk_body(tree.root_node(), &[], |node| {
            if node.kind() != "function_definition" {
                return;
            }
            let Some(signature) = function_signature(node, source, false) else {
                return;
            };
            let qualified_name = if signature.name.contains("::") || signature.name.contains('.')
            {
                signature.name.to_string()
            } else {
                format!("{}::{}", file.stem, signature.name)
            };
            record_function(node, source, file, qualified_name, signature.params, false, out);
        });
    }
}

/// Name and parameter types of a `function_definition`.
pub(crate) struct Signature<'s> {
    pub name: &'s str,
    pub params: Vec<String>,
}

/// Reads the declarator of a function definition, looking through
/// pointer and reference wrappers (`int *f()`, `T &g()`).
pub(crate) fn function_signature<'s>(
    definition: Node<'_>,
    source: &'s str,
    cpp: bool,
) -> Option<Signature<'s>> {
    let declarator = find_function_declarator(definition.child_by_field_name("declarator")?)?;
    let name = text(declarator.child_by_field_name("declarator")?, source);
    if name.is_empty() {
        return None;
    }

    let mut params = Vec::new();
    if let Some(list) = declarator.child_by_field_name("parameters") {
        for i in 0..list.named_child_count() {
            let Some(param) = list.named_child(i) else {
                continue;
            };
            let accepted = match param.kind() {
                "parameter_declaration" => true,
                "optional_parameter_declaration" => cpp,
                _ => false,
            };
            if accepted {
                if let Some(ty) = param.child_by_field_name("type") {
                    params.push(text(ty, source).to_string());
                }
            }
        }
    }

    Some(Signature { name, params })
}

fn find_function_declarator(node: Node<'_>) -> Option<Node<'_>> {
    match node.kind() {
        "function_declarator" => Some(node),
        "pointer_declarator" | "reference_declarator" | "parenthesized_declarator" => {
            (0..node.named_child_count())
                .filter_map(|i| node.named_child(i))
                .find_map(find_function_declarator)
        }
        _ => None,
    }
}

/// Pushes the function record and every call and variable in its body.
pub(crate) fn record_function(
    definition: Node<'_>,
    source: &str,
    file: FileContext<'_>,
    qualified_name: String,
    param_types: Vec<String>,
    cpp: bool,
    out: &mut FileRecords,
) {
    out.functions.push(FunctionRecord {
        qualified_name: qualified_name.clone(),
        file_path: file.display_path.to_string(),
        param_types,
    });

    let Some(body) = definition.child_by_field_name("body") else {
        return;
    };
    walk_body(body, NESTED_SCOPES, |node| match node.kind() {
        "call_expression" => {
            if let Some(callee) = call_target(node, source, cpp) {
                out.calls.push(CallRecord::new(&qualified_name, callee));
            }
        }
        "new_expression" if cpp => {
            if let Some(ty) = node.child_by_field_name("type") {
                out.calls.push(CallRecord::new(&qualified_name, text(ty, source)));
            }
        }
        "init_declarator" => {
            let target = node.child_by_field_name("declarator");
            let value = node.child_by_field_name("value");
            if let Some(var) = variable(target, value, source, &qualified_name, cpp) {
                out.variables.push(var);
            }
        }
        "assignment_expression" => {
            let target = node.child_by_field_name("left");
            let value = node.child_by_field_name("right");
            if let Some(var) = variable(target, value, source, &qualified_name, cpp) {
                out.variables.push(var);
            }
        }
        _ => {}
    });
}

/// Callee text of a `call_expression`.
fn call_target<'s>(call: Node<'_>, source: &'s str, cpp: bool) -> Option<&'s str> {
    let function = call.child_by_field_name("function")?;
    let callee = match function.kind() {
        "identifier" | "parenthesized_expression" => text(function, source),
        "field_expression" => text(function.child_by_field_name("field")?, source),
        "qualified_identifier" if cpp => text(function, source),
        "template_function" if cpp => text(function.child_by_field_name("name")?, source),
        _ if cpp => text(function, source),
        _ => return None,
    };
    Some(callee).filter(|c| !c.is_empty())
}

fn variable(
    target: Option<Node<'_>>,
    value: Option<Node<'_>>,
    source: &str,
    func: &str,
    cpp: bool,
) -> Option<VariableRecord> {
    let target = target?;
    let name = match target.kind() {
        "field_expression" | "qualified_identifier" => text(target, source),
        _ => declarator_name(target, source)?,
    };
    if name.is_empty() {
        return None;
    }

    let (value_source, is_from_call) = match value {
        Some(v) if v.kind() == "call_expression" => match call_target(v, source, cpp) {
            Some(callee) => (callee.to_string(), true),
            None => ("literal".to_string(), false),
        },
        Some(v)
            if matches!(
                v.kind(),
                "identifier" | "field_expression" | "qualified_identifier"
            ) =>
        {
            (text(v, source).to_string(), false)
        }
        Some(_) => ("literal".to_string(), false),
        None => return None,
    };

    Some(VariableRecord::new(
        format!("{}::{}", func, name),
        func,
        value_source,
        is_from_call,
    ))
}
