//! Shared helpers for tree-sitter-backed plugins.

use crate::tree::Span;

/// Clip error excerpts to a readable length on a character boundary.
pub(crate) fn truncate(text: &str) -> &str {
    let end = text
        .char_indices()
        .nth(24)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    &text[..end]
}

/// Span of a tree-sitter node in our span shape (tree-sitter rows/columns
/// are 0-indexed).
pub(crate) fn span_of(node: tree_sitter::Node<'_>) -> Span {
    let start = node.start_position();
    let end = node.end_position();
    Span {
        start_byte: node.start_byte(),
        end_byte: node.end_byte(),
        start_line: start.row + 1,
        start_col: start.column + 1,
        end_line: end.row + 1,
        end_col: end.column + 1,
    }
}

/// Source text of a node.
pub(crate) fn node_text<'s>(node: tree_sitter::Node<'_>, source: &'s str) -> &'s str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// First ERROR or MISSING node in the tree, if any.
///
/// Tree-sitter yields partial trees for malformed input; the parser boundary
/// treats any error node as a fatal `ParseError` for the file.
pub(crate) fn first_error(node: tree_sitter::Node<'_>) -> Option<tree_sitter::Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() || child.is_missing() {
            if let Some(found) = first_error(child) {
                return Some(found);
            }
        }
    }
    // has_error was set but no child carried it; report this node.
    Some(node)
}
