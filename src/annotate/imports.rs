use std::collections::BTreeSet;

use crate::annotate::tree::{Edit, NodeId, SyntaxTree};
use crate::errors::AnnotateError;

const TYPING: &str = "typing";
const IMPORT_KINDS: &[&str] = &["import_statement", "import_from_statement", "future_import_statement"];

/// Adds one `from typing import X` line for every name in `needed` that the
/// module does not already import from `typing`. Returns the names added.
pub fn patch_imports(tree: &mut SyntaxTree, needed: &BTreeSet<String>) -> Result<Vec<String>, AnnotateError> {
    let Some(existing) = imported_typing_names(tree) else {
        return Ok(Vec::new());
    };
    let missing: Vec<String> = needed.difference(&existing).cloned().collect();
    if missing.is_empty() {
        return Ok(Vec::new());
    }
    let newline = tree.line_ending();
    let block: String = missing
        .iter()
        .map(|name| format!("from {TYPING} import {name}{newline}"))
        .collect();

    let edit = match anchor_statement(tree) {
        Some(anchor) => insert_after(tree, anchor, &block)?,
        None => insert_at_top(tree, &block)?,
    };
    tree.apply(vec![edit])?;
    Ok(missing)
}

fn top_level_statements(tree: &SyntaxTree) -> impl Iterator<Item = NodeId> + '_ {
    let root = tree.root();
    tree.children(root)
        .iter()
        .copied()
        .filter(move |&child| child != tree.endmarker())
}

/// Names brought in by top-level `from typing import ...`. `None` means a
/// wildcard import already covers everything.
fn imported_typing_names(tree: &SyntaxTree) -> Option<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    for stmt in top_level_statements(tree) {
        if tree.kind(stmt) != "import_from_statement" {
            continue;
        }
        let from_typing = tree
            .child_by_field(stmt, "module_name")
            .is_some_and(|module| tree.text(module) == TYPING);
        if !from_typing {
            continue;
        }
        if tree.children(stmt).iter().any(|&child| tree.kind(child) == "wildcard_import") {
            return None;
        }
        // `from typing import Any as A` does not bind `Any`.
        for name in tree.children_by_field(stmt, "name") {
            if tree.kind(name) == "dotted_name" {
                names.insert(tree.text(name));
            }
        }
    }
    Some(names)
}

fn anchor_statement(tree: &SyntaxTree) -> Option<NodeId> {
    let last_import = top_level_statements(tree)
        .filter(|&stmt| IMPORT_KINDS.contains(&tree.kind(stmt)))
        .last();
    last_import.or_else(|| module_docstring(tree))
}

fn module_docstring(tree: &SyntaxTree) -> Option<NodeId> {
    let first = top_level_statements(tree).next()?;
    let children = tree.children(first);
    let is_docstring = tree.kind(first) == "expression_statement"
        && children.len() == 1
        && tree.kind(children[0]) == "string";
    is_docstring.then_some(first)
}

/// Places `block` on the line after `anchor`.
fn insert_after(tree: &SyntaxTree, anchor: NodeId, block: &str) -> Result<Edit, AnnotateError> {
    let last = tree
        .last_leaf(anchor)
        .ok_or_else(|| AnnotateError::ImportPatch("import statement has no tokens".to_string()))?;
    let next = tree
        .next_leaf(last)
        .ok_or_else(|| AnnotateError::ImportPatch("no token after import statement".to_string()))?;
    let prefix = tree.prefix(next);
    let patched = match prefix.find('\n') {
        Some(newline) => format!("{}{block}{}", &prefix[..=newline], &prefix[newline + 1..]),
        None if next == tree.endmarker() => format!("{prefix}{}{block}", tree.line_ending()),
        None => {
            return Err(AnnotateError::ImportPatch(format!(
                "statement on line {} is followed by more code on the same line",
                tree.node(anchor).line
            )));
        }
    };
    Ok(Edit::Prefix(next, patched))
}

/// Places `block` before the first statement, after any leading comments
/// such as a shebang or encoding line.
fn insert_at_top(tree: &SyntaxTree, block: &str) -> Result<Edit, AnnotateError> {
    let first = tree
        .first_leaf(tree.root())
        .ok_or_else(|| AnnotateError::ImportPatch("module has no tokens".to_string()))?;
    let prefix = tree.prefix(first);
    let mut offset = 0;
    for line in prefix.split_inclusive('\n') {
        if !line.trim_start().starts_with('#') {
            break;
        }
        offset += line.len();
    }
    let (head, tail) = prefix.split_at(offset);
    let separator = if head.is_empty() || head.ends_with('\n') {
        ""
    } else {
        tree.line_ending()
    };
    Ok(Edit::Prefix(first, format!("{head}{separator}{block}{tail}")))
}
