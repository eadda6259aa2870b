use crate::annotate::tree::{NodeId, SyntaxTree};
use crate::errors::AnnotateError;
use crate::types::{ArgKind, TypeExpression};

/// Literal node kinds whose default value implies a parameter type.
const LITERAL_TYPES: &[(&str, &str)] = &[
    ("integer", "int"),
    ("float", "float"),
    ("string", "str"),
    ("true", "bool"),
    ("false", "bool"),
];

/// One parameter position in a function's parameter list.
#[derive(Debug, Clone)]
pub struct ParameterSlot {
    pub node: NodeId,
    /// Identifier token, the one that receives an inline annotation.
    pub name_leaf: NodeId,
    pub name: String,
    pub kind: ArgKind,
    pub column: usize,
    pub default: Option<NodeId>,
    /// Text of an annotation already written in the source.
    pub annotation: Option<String>,
}

impl ParameterSlot {
    pub fn is_annotated(&self) -> bool {
        self.annotation.is_some()
    }

    pub fn default_type(&self, tree: &SyntaxTree) -> Option<TypeExpression> {
        self.default.and_then(|node| literal_type(tree, node))
    }
}

pub fn extract_parameters(tree: &SyntaxTree, parameters: NodeId) -> Result<Vec<ParameterSlot>, AnnotateError> {
    let children = tree.children(parameters);
    let (Some(&open), Some(&close)) = (children.first(), children.last()) else {
        return Err(AnnotateError::Structural("empty parameter list".to_string()));
    };
    if children.len() < 2 || tree.value(open) != "(" || tree.value(close) != ")" {
        return Err(AnnotateError::Structural(format!(
            "parameter list `{}` is not parenthesised",
            tree.text(parameters)
        )));
    }

    let mut slots = Vec::new();
    for &child in &children[1..children.len() - 1] {
        match tree.kind(child) {
            "," | "keyword_separator" | "positional_separator" | "*" | "/" => {}
            _ => slots.push(slot(tree, child)?),
        }
    }
    Ok(slots)
}

fn slot(tree: &SyntaxTree, node: NodeId) -> Result<ParameterSlot, AnnotateError> {
    let (target, default, annotation) = match tree.kind(node) {
        "identifier" | "keyword_identifier" | "list_splat_pattern" | "dictionary_splat_pattern" => {
            (node, None, None)
        }
        "default_parameter" => (
            required_field(tree, node, "name")?,
            tree.child_by_field(node, "value"),
            None,
        ),
        "typed_parameter" => {
            let target = tree
                .children(node)
                .first()
                .copied()
                .ok_or_else(|| structural(tree, node))?;
            (target, None, Some(type_text(tree, node)?))
        }
        "typed_default_parameter" => (
            required_field(tree, node, "name")?,
            tree.child_by_field(node, "value"),
            Some(type_text(tree, node)?),
        ),
        _ => return Err(structural(tree, node)),
    };

    let (kind, name_leaf) = match tree.kind(target) {
        "identifier" | "keyword_identifier" => (ArgKind::Positional, target),
        "list_splat_pattern" => (ArgKind::Star, splat_name(tree, target)?),
        "dictionary_splat_pattern" => (ArgKind::DoubleStar, splat_name(tree, target)?),
        _ => return Err(structural(tree, node)),
    };
    if !tree.node(name_leaf).is_leaf() {
        return Err(structural(tree, node));
    }

    Ok(ParameterSlot {
        node,
        name_leaf,
        name: tree.value(name_leaf).to_string(),
        kind,
        column: tree.node(node).column,
        default,
        annotation,
    })
}

fn splat_name(tree: &SyntaxTree, pattern: NodeId) -> Result<NodeId, AnnotateError> {
    tree.children(pattern)
        .iter()
        .copied()
        .find(|&child| matches!(tree.kind(child), "identifier" | "keyword_identifier"))
        .ok_or_else(|| structural(tree, pattern))
}

fn required_field(tree: &SyntaxTree, node: NodeId, field: &str) -> Result<NodeId, AnnotateError> {
    tree.child_by_field(node, field).ok_or_else(|| structural(tree, node))
}

fn type_text(tree: &SyntaxTree, node: NodeId) -> Result<String, AnnotateError> {
    Ok(tree.text(required_field(tree, node, "type")?))
}

fn structural(tree: &SyntaxTree, node: NodeId) -> AnnotateError {
    AnnotateError::Structural(format!(
        "unsupported parameter `{}` ({})",
        tree.text(node),
        tree.kind(node)
    ))
}

/// Type implied by a literal default value, if the literal is one we know.
pub fn literal_type(tree: &SyntaxTree, node: NodeId) -> Option<TypeExpression> {
    let kind = tree.kind(node);
    let &(_, base) = LITERAL_TYPES.iter().find(|(literal, _)| *literal == kind)?;
    let value = tree.text(node);
    let name = match kind {
        "integer" | "float" if value.ends_with(['j', 'J']) => "complex",
        "string" => {
            let prefix = value
                .split(['\'', '"'])
                .next()
                .unwrap_or_default()
                .to_ascii_lowercase();
            if prefix.contains('b') {
                "bytes"
            } else if prefix.contains('u') {
                "unicode"
            } else {
                base
            }
        }
        _ => base,
    };
    Some(TypeExpression::atomic(name))
}
