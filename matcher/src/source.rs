//! Parsed Python sources.

use tree_sitter::{Node, Parser, Tree};

use crate::error::{MatcherError, Result};

const IMPORT_KINDS: &[&str] = &["import_statement", "import_from_statement"];

/// A Python file's text and its syntax tree.
pub struct PythonSource {
    text: String,
    tree: Tree,
}

impl PythonSource {
    /// Parse Python source text.
    pub fn parse(text: impl Into<String>) -> Result<Self> {
        let text = text.into();

        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_python::LANGUAGE.into())?;
        let tree = parser.parse(&text, None).ok_or(MatcherError::Parse)?;

        Ok(Self { text, tree })
    }

    /// Raw source text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The syntax tree.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Root node of the tree.
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Text covered by `node`.
    pub fn node_text(&self, node: Node<'_>) -> &str {
        node.utf8_text(self.text.as_bytes()).unwrap_or_default()
    }

    /// Text of a byte range, empty if the range is out of bounds.
    pub fn slice(&self, start: usize, end: usize) -> &str {
        self.text.get(start..end).unwrap_or_default()
    }

    /// Smallest node covering `offset`.
    pub fn node_at(&self, offset: usize) -> Option<Node<'_>> {
        if offset > self.text.len() {
            return None;
        }
        self.root().descendant_for_byte_range(offset, offset)
    }

    /// Text of every import statement in the module.
    ///
    /// When the tree has syntax errors, import lines swallowed by error
    /// recovery are picked up from the raw text as well.
    pub fn import_statements(&self) -> Vec<&str> {
        let root = self.root();
        let mut cursor = root.walk();
        let mut imports: Vec<&str> = root
            .named_children(&mut cursor)
            .filter(|child| IMPORT_KINDS.contains(&child.kind()))
            .map(|child| self.node_text(child))
            .collect();

        if root.has_error() {
            for line in self.text.lines() {
                let trimmed = line.trim_start();
                let is_import = trimmed.starts_with("import ") || trimmed.starts_with("from ");
                if is_import && !imports.iter().any(|existing| existing.contains(trimmed)) {
                    imports.push(trimmed);
                }
            }
        }

        imports
    }
}

/// Byte range of a string literal's content, without prefix and quotes.
pub(crate) fn string_content_range(node: Node<'_>) -> (usize, usize) {
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();

    let start = children
        .iter()
        .find(|child| child.kind() == "string_start")
        .map_or(node.start_byte(), Node::end_byte);
    let end = children
        .iter()
        .rev()
        .find(|child| child.kind() == "string_end" && !child.is_missing())
        .map_or(node.end_byte(), Node::start_byte);

    (start, end.max(start))
}
