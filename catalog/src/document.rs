//! Parsed YAML catalog documents.
//!
//! A `CatalogDocument` owns the file text and its tree-sitter tree. The
//! helpers in this module read the tree structurally: top-level key/value
//! pairs, nested mappings, anchors and aliases.

use std::path::{Path, PathBuf};

use tree_sitter::{Node, Parser, Tree};

use crate::error::{CatalogError, Result};
use crate::record::DeclarationAnchor;

const MAPPING_KINDS: &[&str] = &["block_mapping", "flow_mapping"];
const PAIR_KINDS: &[&str] = &["block_mapping_pair", "flow_pair"];
const WRAPPER_KINDS: &[&str] = &["stream", "document", "block_node", "flow_node"];

/// A parsed catalog file.
pub struct CatalogDocument {
    path: PathBuf,
    text: String,
    tree: Tree,
}

impl CatalogDocument {
    /// Parse YAML text belonging to the file at `path`.
    pub fn parse(path: impl Into<PathBuf>, text: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let text = text.into();

        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_yaml::LANGUAGE.into())?;
        let tree = parser
            .parse(&text, None)
            .ok_or_else(|| CatalogError::Parse(path.clone()))?;

        Ok(Self { path, text, tree })
    }

    /// Path of the catalog file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw file text.
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

    /// Whether the document has no content besides whitespace.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Text covered by `node`.
    pub fn node_text(&self, node: Node<'_>) -> &str {
        node.utf8_text(self.text.as_bytes()).unwrap_or_default()
    }

    /// First syntax error in the document, as a human readable position.
    pub fn first_error(&self) -> Option<String> {
        let root = self.root();
        if !root.has_error() {
            return None;
        }

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.is_error() || node.is_missing() {
                let point = node.start_position();
                return Some(format!(
                    "syntax error at line {}, column {}",
                    point.row + 1,
                    point.column + 1
                ));
            }
            let mut cursor = node.walk();
            let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev().filter(Node::has_error));
        }

        Some("syntax error".to_string())
    }

    /// The top-level mapping of the first document, if it has one.
    pub fn top_level_mapping(&self) -> Option<Node<'_>> {
        find_mapping(self.root())
    }

    /// Key/value pairs of the top-level mapping, in document order.
    pub fn top_level_pairs(&self) -> Vec<Node<'_>> {
        self.top_level_mapping()
            .map(mapping_pairs)
            .unwrap_or_default()
    }

    /// Build a declaration anchor for a key node of this document.
    pub fn anchor_for(&self, key: Node<'_>) -> DeclarationAnchor {
        let start = key.start_position();
        DeclarationAnchor {
            path: self.path.clone(),
            start_byte: key.start_byte(),
            end_byte: key.end_byte(),
            line: start.row,
            column: start.column,
        }
    }

    /// Resolve an anchor back to the key node it points at.
    pub fn node_for(&self, anchor: &DeclarationAnchor) -> Option<Node<'_>> {
        if anchor.path != self.path || anchor.end_byte > self.text.len() {
            return None;
        }
        self.root()
            .descendant_for_byte_range(anchor.start_byte, anchor.end_byte)
    }
}

/// Pairs of a block or flow mapping.
pub(crate) fn mapping_pairs(mapping: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = mapping.walk();
    mapping
        .named_children(&mut cursor)
        .filter(|child| PAIR_KINDS.contains(&child.kind()))
        .collect()
}

fn find_mapping(node: Node<'_>) -> Option<Node<'_>> {
    if MAPPING_KINDS.contains(&node.kind()) {
        return Some(node);
    }
    if !WRAPPER_KINDS.contains(&node.kind()) {
        return None;
    }

    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
    children.into_iter().find_map(find_mapping)
}

/// Structural view of a mapping value: its anchor, alias and mapping body.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ValueShape<'tree> {
    /// `&name` declared on the value.
    pub anchor: Option<Node<'tree>>,

    /// `*name` when the value is an alias.
    pub alias: Option<Node<'tree>>,

    /// Mapping body, if the value is a mapping.
    pub mapping: Option<Node<'tree>>,

    /// Scalar body, if the value is a scalar.
    pub scalar: Option<Node<'tree>>,
}

impl<'tree> ValueShape<'tree> {
    pub(crate) fn of(node: Node<'tree>) -> Self {
        let mut shape = Self::default();
        shape.visit(node);
        shape
    }

    fn visit(&mut self, node: Node<'tree>) {
        match node.kind() {
            "anchor" => self.anchor = Some(node),
            "alias" => self.alias = Some(node),
            "tag" | "comment" => {}
            kind if MAPPING_KINDS.contains(&kind) => self.mapping = Some(node),
            "block_node" | "flow_node" => {
                let mut cursor = node.walk();
                let children: Vec<Node<'tree>> = node.named_children(&mut cursor).collect();
                for child in children {
                    self.visit(child);
                }
            }
            "block_sequence" | "flow_sequence" => {}
            _ => self.scalar = Some(node),
        }
    }
}

/// Name declared by an `anchor` node, without the `&`.
pub(crate) fn anchor_name(doc: &CatalogDocument, anchor: Node<'_>) -> String {
    doc.node_text(anchor).trim().trim_start_matches('&').to_string()
}

/// Target named by an `alias` node, without the `*`.
pub(crate) fn alias_name(doc: &CatalogDocument, alias: Node<'_>) -> String {
    doc.node_text(alias).trim().trim_start_matches('*').to_string()
}

/// All alias nodes below `node`, in document order.
pub(crate) fn collect_aliases(node: Node<'_>) -> Vec<Node<'_>> {
    let mut aliases = Vec::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == "alias" {
            aliases.push(current);
            continue;
        }
        let mut cursor = current.walk();
        let children: Vec<Node<'_>> = current.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    aliases
}

/// Text of a scalar value with surrounding quotes removed.
pub(crate) fn scalar_text(doc: &CatalogDocument, scalar: Node<'_>) -> String {
    let text = doc.node_text(scalar).trim();
    ['"', '\'']
        .into_iter()
        .find_map(|quote| text.strip_prefix(quote)?.strip_suffix(quote))
        .unwrap_or(text)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CATALOG: &str = "\
_csv: &csv
  type: pandas.CSVDataSet

companies:
  <<: *csv
  filepath: data/01_raw/companies.csv
";

    #[test]
    fn test_top_level_pairs() {
        let doc = CatalogDocument::parse("conf/base/catalog.yml", CATALOG).unwrap();
        let keys: Vec<&str> = doc
            .top_level_pairs()
            .into_iter()
            .filter_map(|pair| pair.child_by_field_name("key"))
            .map(|key| doc.node_text(key))
            .collect();

        assert_eq!(keys, vec!["_csv", "companies"]);
        assert!(doc.first_error().is_none());
    }

    #[test]
    fn test_value_shape_reads_anchor_and_alias() {
        let doc = CatalogDocument::parse("catalog.yml", CATALOG).unwrap();
        let pairs = doc.top_level_pairs();

        let placeholder = ValueShape::of(pairs[0].child_by_field_name("value").unwrap());
        assert_eq!(anchor_name(&doc, placeholder.anchor.unwrap()), "csv");
        assert!(placeholder.mapping.is_some());

        let dataset = pairs[1].child_by_field_name("value").unwrap();
        let aliases = collect_aliases(dataset);
        assert_eq!(aliases.len(), 1);
        assert_eq!(alias_name(&doc, aliases[0]), "csv");
    }

    #[test]
    fn test_anchor_round_trips_to_key_node() {
        let doc = CatalogDocument::parse("catalog.yml", CATALOG).unwrap();
        let key = doc.top_level_pairs()[1].child_by_field_name("key").unwrap();

        let anchor = doc.anchor_for(key);
        assert_eq!(anchor.line, 3);
        assert_eq!(anchor.column, 0);

        let node = doc.node_for(&anchor).unwrap();
        assert_eq!(doc.node_text(node), "companies");
    }

    #[test]
    fn test_blank_document_has_no_pairs() {
        let doc = CatalogDocument::parse("catalog.yml", "\n# nothing here\n").unwrap();
        assert!(doc.top_level_pairs().is_empty());
    }
}
