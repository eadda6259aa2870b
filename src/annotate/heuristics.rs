//! Questions asked about a function definition before annotating it. All of
//! them are bounded searches that stop at nested definitions.

use crate::annotate::params::ParameterSlot;
use crate::annotate::tree::{NodeId, SyntaxNode, SyntaxTree};

pub const CONSTRUCTOR: &str = "__init__";
const FUNCTION: &str = "function_definition";
const CLASS: &str = "class_definition";

fn is_definition(node: &SyntaxNode) -> bool {
    node.kind == FUNCTION || node.kind == CLASS
}

/// True when the closest enclosing definition is a class body.
pub fn is_method(tree: &SyntaxTree, func: NodeId) -> bool {
    tree.ancestors(func)
        .find(|&id| is_definition(tree.node(id)))
        .is_some_and(|id| tree.kind(id) == CLASS)
}

/// `return <expr>` somewhere in the function's own body.
pub fn has_value_return(tree: &SyntaxTree, func: NodeId) -> bool {
    tree.search_descendants(func, is_definition, |node| {
        node.kind == "return_statement" && node.children.len() > 1
    })
    .is_some()
}

pub fn is_generator(tree: &SyntaxTree, func: NodeId) -> bool {
    tree.search_descendants(func, is_definition, |node| node.kind == "yield")
        .is_some()
}

fn decorated_definition(tree: &SyntaxTree, func: NodeId) -> Option<NodeId> {
    tree.parent(func)
        .filter(|&parent| tree.kind(parent) == "decorated_definition")
}

/// Names of the bare `@name` decorators. Attribute and call decorators are
/// left out.
pub fn plain_decorators(tree: &SyntaxTree, func: NodeId) -> Vec<String> {
    let Some(decorated) = decorated_definition(tree, func) else {
        return Vec::new();
    };
    tree.children(decorated)
        .iter()
        .filter(|&&child| tree.kind(child) == "decorator")
        .filter_map(|&decorator| {
            let mut exprs = tree.children(decorator).iter().filter(|&&child| tree.value(child) != "@");
            match (exprs.next(), exprs.next()) {
                (Some(&expr), None) if tree.kind(expr) == "identifier" => Some(tree.value(expr).to_string()),
                _ => None,
            }
        })
        .collect()
}

/// Line of the first decorator, for functions that have one.
pub fn decorated_line(tree: &SyntaxTree, func: NodeId) -> Option<usize> {
    decorated_definition(tree, func).map(|decorated| tree.node(decorated).line)
}

/// Whether the first parameter is the bound instance or class and so gets
/// no type.
pub fn skips_first_parameter(
    tree: &SyntaxTree,
    func: NodeId,
    decorators: &[String],
    slots: &[ParameterSlot],
) -> bool {
    let Some(first) = slots.first() else {
        return false;
    };
    let has = |name: &str| decorators.iter().any(|decorator| decorator == name);
    is_method(tree, func) && !has("staticmethod") && (first.name == "self" || has("classmethod"))
}

pub fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}
