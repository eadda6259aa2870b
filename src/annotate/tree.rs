//! Lossless, mutable view of a Python parse tree.
//!
//! tree-sitter trees are immutable and only know byte ranges, so every file
//! is copied once into an arena of [`SyntaxNode`]s. Each token leaf owns the
//! source text between the previous token and itself (`prefix`, which is
//! where comments and line continuations end up) plus its own text
//! (`value`). Concatenating `prefix + value` over all leaves, including the
//! trailing `endmarker`, reproduces the input byte for byte.

use tree_sitter::{Node, Parser, TreeCursor};

use crate::errors::AnnotateError;

pub type NodeId = usize;

pub const ENDMARKER: &str = "endmarker";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub prefix: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct SyntaxNode {
    pub kind: &'static str,
    /// Grammar field this node fills in its parent (`name`, `body`, ...).
    pub field: Option<&'static str>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// 1-based.
    pub line: usize,
    /// Character (not byte) column of the node's first character.
    pub column: usize,
    pub token: Option<Token>,
    leaf_index: Option<usize>,
}

impl SyntaxNode {
    pub fn is_leaf(&self) -> bool {
        self.token.is_some()
    }
}

pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    pub fn new() -> Result<Self, AnnotateError> {
        let mut parser = Parser::new();
        let language = tree_sitter_python::LANGUAGE;
        parser.set_language(&language.into())?;
        Ok(Self { parser })
    }

    pub fn parse(&mut self, source: &str) -> Result<SyntaxTree, AnnotateError> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or(AnnotateError::ParseCancelled)?;
        let root = tree.root_node();
        if root.has_error() {
            let line = first_error(root).map(|node| node.start_position().row + 1);
            return Err(AnnotateError::Syntax {
                line: line.unwrap_or(1),
            });
        }
        SyntaxTree::build(root, source)
    }
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() {
            if let Some(found) = first_error(child) {
                return Some(found);
            }
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Value(NodeId, String),
    Prefix(NodeId, String),
}

#[derive(Debug, Clone)]
pub struct SyntaxTree {
    nodes: Vec<SyntaxNode>,
    leaves: Vec<NodeId>,
    root: NodeId,
    endmarker: NodeId,
    newline: &'static str,
}

struct Builder<'s> {
    source: &'s str,
    nodes: Vec<SyntaxNode>,
    leaves: Vec<NodeId>,
    consumed: usize,
}

impl<'s> Builder<'s> {
    fn push(&mut self, node: SyntaxNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn slice(&self, start: usize, end: usize) -> Result<&'s str, AnnotateError> {
        self.source.get(start..end).ok_or_else(|| {
            AnnotateError::Structural(format!("token range {start}..{end} is not valid UTF-8"))
        })
    }

    fn char_column(&self, byte: usize) -> usize {
        let line_start = self.source[..byte].rfind('\n').map_or(0, |idx| idx + 1);
        self.source[line_start..byte].chars().count()
    }

    fn visit(&mut self, cursor: &mut TreeCursor<'_>, parent: Option<NodeId>) -> Result<NodeId, AnnotateError> {
        let node = cursor.node();
        let start = node.start_byte();
        let id = self.push(SyntaxNode {
            kind: node.kind(),
            field: cursor.field_name(),
            parent,
            children: Vec::new(),
            line: node.start_position().row + 1,
            column: self.char_column(start),
            token: None,
            leaf_index: None,
        });

        // Strings stay whole so edits never land inside a literal.
        if parent.is_some() && (node.child_count() == 0 || node.kind() == "string") {
            let end = node.end_byte();
            let prefix = self.slice(self.consumed, start)?.to_string();
            let value = self.slice(start, end)?.to_string();
            self.consumed = end;
            self.nodes[id].token = Some(Token { prefix, value });
            self.nodes[id].leaf_index = Some(self.leaves.len());
            self.leaves.push(id);
            return Ok(id);
        }

        if cursor.goto_first_child() {
            loop {
                let child = cursor.node();
                if !child.is_extra() && child.start_byte() < child.end_byte() {
                    let child_id = self.visit(cursor, Some(id))?;
                    self.nodes[id].children.push(child_id);
                }
                if !cursor.goto_next_sibling() {
                    break;
                }
            }
            cursor.goto_parent();
        }
        Ok(id)
    }
}

impl SyntaxTree {
    fn build(root: Node<'_>, source: &str) -> Result<Self, AnnotateError> {
        let mut builder = Builder {
            source,
            nodes: Vec::new(),
            leaves: Vec::new(),
            consumed: 0,
        };
        let mut cursor = root.walk();
        let root_id = builder.visit(&mut cursor, None)?;

        let tail = builder.slice(builder.consumed, source.len())?.to_string();
        let line = source.matches('\n').count() + 1;
        let column = builder.char_column(source.len());
        let endmarker = builder.push(SyntaxNode {
            kind: ENDMARKER,
            field: None,
            parent: Some(root_id),
            children: Vec::new(),
            line,
            column,
            token: Some(Token {
                prefix: tail,
                value: String::new(),
            }),
            leaf_index: Some(builder.leaves.len()),
        });
        builder.leaves.push(endmarker);
        builder.nodes[root_id].children.push(endmarker);

        let newline = match source.find('\n') {
            Some(idx) if source[..idx].ends_with('\r') => "\r\n",
            _ => "\n",
        };

        Ok(Self {
            nodes: builder.nodes,
            leaves: builder.leaves,
            root: root_id,
            endmarker,
            newline,
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn endmarker(&self) -> NodeId {
        self.endmarker
    }

    /// Line terminator of the file's first line; inserted lines use it too.
    pub fn line_ending(&self) -> &'static str {
        self.newline
    }

    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id]
    }

    pub fn kind(&self, id: NodeId) -> &'static str {
        self.nodes[id].kind
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn child_by_field(&self, id: NodeId, field: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&child| self.nodes[child].field == Some(field))
    }

    pub fn children_by_field<'a>(&'a self, id: NodeId, field: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.children(id)
            .iter()
            .copied()
            .filter(move |&child| self.nodes[child].field == Some(field))
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&child| child == id)?;
        siblings.get(pos + 1).copied()
    }

    pub fn prefix(&self, leaf: NodeId) -> &str {
        self.nodes[leaf].token.as_ref().map_or("", |token| token.prefix.as_str())
    }

    pub fn value(&self, leaf: NodeId) -> &str {
        self.nodes[leaf].token.as_ref().map_or("", |token| token.value.as_str())
    }

    pub fn first_leaf(&self, id: NodeId) -> Option<NodeId> {
        if self.nodes[id].is_leaf() {
            return Some(id);
        }
        self.children(id).iter().find_map(|&child| self.first_leaf(child))
    }

    pub fn last_leaf(&self, id: NodeId) -> Option<NodeId> {
        if self.nodes[id].is_leaf() {
            return Some(id);
        }
        self.children(id).iter().rev().find_map(|&child| self.last_leaf(child))
    }

    pub fn next_leaf(&self, leaf: NodeId) -> Option<NodeId> {
        let index = self.nodes[leaf].leaf_index?;
        self.leaves.get(index + 1).copied()
    }

    /// Source text of a subtree, without the prefix of its first token.
    pub fn text(&self, id: NodeId) -> String {
        let (Some(first), Some(last)) = (self.first_leaf(id), self.last_leaf(id)) else {
            return String::new();
        };
        let (Some(start), Some(end)) = (self.nodes[first].leaf_index, self.nodes[last].leaf_index) else {
            return String::new();
        };
        let mut out = String::new();
        for (offset, &leaf) in self.leaves[start..=end].iter().enumerate() {
            if offset > 0 {
                out.push_str(self.prefix(leaf));
            }
            out.push_str(self.value(leaf));
        }
        out
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for &leaf in &self.leaves {
            out.push_str(self.prefix(leaf));
            out.push_str(self.value(leaf));
        }
        out
    }

    /// Pre-order walk of `id`'s subtree, `id` included.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    pub fn descendants_of_kind(&self, id: NodeId, kind: &str) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&node| self.kind(node) == kind)
            .collect()
    }

    /// Looks for a strict descendant of `root` satisfying `matches`. Nodes
    /// satisfying `stop` are neither tested nor entered.
    pub fn search_descendants(
        &self,
        root: NodeId,
        stop: impl Fn(&SyntaxNode) -> bool,
        matches: impl Fn(&SyntaxNode) -> bool,
    ) -> Option<NodeId> {
        let mut stack: Vec<NodeId> = self.children(root).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if stop(node) {
                continue;
            }
            if matches(node) {
                return Some(id);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        None
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&node| self.parent(node))
    }

    /// Applies every edit or none of them.
    pub fn apply(&mut self, edits: Vec<Edit>) -> Result<(), AnnotateError> {
        for edit in &edits {
            let (Edit::Value(id, _) | Edit::Prefix(id, _)) = edit;
            if self.nodes.get(*id).is_none_or(|node| !node.is_leaf()) {
                return Err(AnnotateError::Structural(format!("edit targets non-token node {id}")));
            }
        }
        for edit in edits {
            match edit {
                Edit::Value(id, value) => {
                    if let Some(token) = self.nodes[id].token.as_mut() {
                        token.value = value;
                    }
                }
                Edit::Prefix(id, prefix) => {
                    if let Some(token) = self.nodes[id].token.as_mut() {
                        token.prefix = prefix;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> SyntaxTree {
        PythonParser::new().unwrap().parse(source).unwrap()
    }

    #[test]
    fn renders_input_unchanged() {
        let source = "#!/usr/bin/env python\n\"\"\"Doc.\"\"\"\nimport os  # os\n\n\ndef f(a, b=1,\n      *c, **d):\n    x = f'{a}' \\\n        + 'y'\n    return x\n\n# trailing\n";
        let tree = parse(source);
        assert_eq!(tree.render(), source);
    }

    #[test]
    fn strings_are_single_tokens() {
        let tree = parse("x = 'a{b}c'\n");
        let strings = tree.descendants_of_kind(tree.root(), "string");
        assert_eq!(strings.len(), 1);
        assert!(tree.node(strings[0]).is_leaf());
        assert_eq!(tree.value(strings[0]), "'a{b}c'");
    }

    #[test]
    fn comments_live_in_prefixes() {
        let tree = parse("def f():\n    # hello\n    pass\n");
        let body = tree.descendants_of_kind(tree.root(), "block")[0];
        let first = tree.first_leaf(body).unwrap();
        assert_eq!(tree.value(first), "pass");
        assert_eq!(tree.prefix(first), "\n    # hello\n    ");
    }

    #[test]
    fn fields_positions_and_text() {
        let tree = parse("class C:\n    def meth(self, x):\n        return x\n");
        let func = tree.descendants_of_kind(tree.root(), "function_definition")[0];
        let name = tree.child_by_field(func, "name").unwrap();
        assert_eq!(tree.value(name), "meth");
        assert_eq!(tree.node(func).line, 2);
        assert_eq!(tree.node(func).column, 4);
        let params = tree.child_by_field(func, "parameters").unwrap();
        assert_eq!(tree.text(params), "(self, x)");
        assert!(tree.ancestors(func).any(|id| tree.kind(id) == "class_definition"));
    }

    #[test]
    fn search_respects_stop_predicate() {
        let tree = parse("def outer():\n    def inner():\n        return 1\n    return\n");
        let outer = tree.descendants_of_kind(tree.root(), "function_definition")[0];
        let found = tree.search_descendants(
            outer,
            |node| node.kind == "function_definition",
            |node| node.kind == "return_statement" && node.children.len() > 1,
        );
        assert!(found.is_none());
    }

    #[test]
    fn apply_rewrites_tokens() {
        let mut tree = parse("def f(a):\n    pass\n");
        let name = tree.descendants_of_kind(tree.root(), "identifier")[1];
        assert_eq!(tree.value(name), "a");
        tree.apply(vec![Edit::Value(name, "a: int".to_string())]).unwrap();
        assert_eq!(tree.render(), "def f(a: int):\n    pass\n");
    }

    #[test]
    fn apply_rejects_interior_nodes_without_changing_anything() {
        let mut tree = parse("def f(a):\n    pass\n");
        let name = tree.descendants_of_kind(tree.root(), "identifier")[1];
        let edits = vec![
            Edit::Value(name, "b".to_string()),
            Edit::Prefix(tree.root(), String::new()),
        ];
        assert!(tree.apply(edits).is_err());
        assert_eq!(tree.render(), "def f(a):\n    pass\n");
    }

    #[test]
    fn syntax_errors_are_reported() {
        let err = PythonParser::new().unwrap().parse("def f(:\n    pass\n").unwrap_err();
        assert!(matches!(err, AnnotateError::Syntax { .. }));
    }

    #[test]
    fn detects_line_endings() {
        assert_eq!(parse("x = 1\r\ny = 2\r\n").line_ending(), "\r\n");
        assert_eq!(parse("x = 1\ny = 2\n").line_ending(), "\n");
        assert_eq!(parse("x = 1").line_ending(), "\n");
    }

    #[test]
    fn empty_source_has_only_the_endmarker() {
        let tree = parse("");
        assert_eq!(tree.first_leaf(tree.root()), Some(tree.endmarker()));
        assert_eq!(tree.render(), "");
    }
}
