//! Cursor and selection views over the document.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::Block;
use crate::node::{Node, Visit};
use crate::schema::BlockSchema;

use super::convert::{BlockCache, node_to_block};
use super::resolve::{get_block_info_from_pos, get_block_info_by_id, get_parent_group_info};
use super::transform::TextSelection;

/// The block holding the cursor and its neighbours.
#[derive(Debug, Clone, PartialEq)]
pub struct TextCursorPosition {
    pub block: Block,
    /// Previous sibling in the same group.
    pub prev_block: Option<Block>,
    /// Next sibling in the same group.
    pub next_block: Option<Block>,
    pub parent_block: Option<Block>,
}

/// Blocks whose content a non-empty selection touches, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub blocks: Vec<Block>,
}

/// End of a block's content the cursor is put at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorPlacement {
    Start,
    End,
}

pub fn get_text_cursor_position(
    doc: &Node,
    schema: &BlockSchema,
    cache: Option<&BlockCache>,
    selection: TextSelection,
) -> Result<TextCursorPosition> {
    let info = get_block_info_from_pos(doc, selection.head)?;
    let parent = get_parent_group_info(doc, &info)?;
    let group = parent.group.group.node;
    let read = |node: &Node| node_to_block(node, schema, cache);

    let prev_block = match parent.index.checked_sub(1).and_then(|i| group.child(i)) {
        Some(node) => Some(read(node)?),
        None => None,
    };
    let next_block = match group.child(parent.index + 1) {
        Some(node) => Some(read(node)?),
        None => None,
    };
    let parent_block = match parent.group.parent {
        Some(container) => Some(read(container.node)?),
        None => None,
    };

    Ok(TextCursorPosition {
        block: read(info.container.node)?,
        prev_block,
        next_block,
        parent_block,
    })
}

/// Collapsed selection at the start or end of the content of block `id`.
pub fn set_text_cursor_position(doc: &Node, id: &str, placement: CursorPlacement) -> Result<TextSelection> {
    let info = get_block_info_by_id(id, doc)?;
    let pos = match placement {
        CursorPlacement::Start => info.content.start(),
        CursorPlacement::End => info.content.end(),
    };
    Ok(TextSelection::cursor(pos))
}

/// Blocks whose content intersects the selection, each listed once.
/// `None` when the selection is collapsed.
pub fn get_selection(
    doc: &Node,
    schema: &BlockSchema,
    cache: Option<&BlockCache>,
    selection: TextSelection,
) -> Result<Option<Selection>> {
    if selection.is_empty() {
        return Ok(None);
    }

    let mut containers: Vec<&Node> = Vec::new();
    let mut current: Option<&Node> = None;
    doc.nodes_between(selection.from(), selection.to(), |node, pos| {
        if node.is_container() {
            current = Some(node);
            return Visit::Descend;
        }
        if node.is_content() {
            let start = pos + 1;
            let end = start + node.content_size();
            // Ending exactly where the content starts does not count.
            let touches = selection.to() > start || (start == end && selection.to() >= start);
            if touches
                && selection.from() <= end
                && let Some(container) = current
                && !containers.iter().any(|seen| std::ptr::eq(*seen, container))
            {
                containers.push(container);
            }
            return Visit::Skip;
        }
        Visit::Descend
    });

    let blocks = containers
        .into_iter()
        .map(|container| node_to_block(container, schema, cache))
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(Selection { blocks }))
}

/// Move both ends of `selection` into the content of the nearest block.
pub fn normalize_selection(doc: &Node, selection: TextSelection) -> TextSelection {
    TextSelection::new(
        normalize_position(doc, selection.anchor),
        normalize_position(doc, selection.head),
    )
}

fn normalize_position(doc: &Node, pos: usize) -> usize {
    let pos = pos.min(doc.content_size());
    if let Ok(rp) = doc.resolve(pos)
        && rp.parent().is_content()
    {
        return pos;
    }
    match get_block_info_from_pos(doc, pos) {
        Ok(info) if pos <= info.content.start() => info.content.start(),
        Ok(info) => info.content.end(),
        Err(_) => pos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::commands::test_support::Harness;
    use crate::model::PartialBlock;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn harness() -> Harness {
        Harness::new(vec![
            PartialBlock::paragraph("one").with_id("one"),
            PartialBlock::paragraph("two").with_id("two").with_children(vec![
                PartialBlock::paragraph("kid1").with_id("kid1"),
                PartialBlock::paragraph("kid2").with_id("kid2"),
            ]),
            PartialBlock::paragraph("three").with_id("three"),
        ])
    }

    fn ids(blocks: &[Block]) -> Vec<&str> {
        blocks.iter().map(|block| block.id.as_str()).collect()
    }

    #[test]
    fn test_cursor_position_neighbours_are_siblings() {
        let mut h = harness();
        h.cursor_in("two", 1);
        let cursor = get_text_cursor_position(&h.doc, &h.schema, None, h.selection).unwrap();

        assert_eq!(cursor.block.id, "two");
        assert_eq!(cursor.prev_block.map(|b| b.id).as_deref(), Some("one"));
        assert_eq!(cursor.next_block.map(|b| b.id).as_deref(), Some("three"));
        assert!(cursor.parent_block.is_none());
    }

    #[test]
    fn test_cursor_position_in_child() {
        let mut h = harness();
        h.cursor_in("kid1", 0);
        let cursor = get_text_cursor_position(&h.doc, &h.schema, None, h.selection).unwrap();

        assert_eq!(cursor.block.id, "kid1");
        assert!(cursor.prev_block.is_none());
        assert_eq!(cursor.next_block.map(|b| b.id).as_deref(), Some("kid2"));
        assert_eq!(cursor.parent_block.map(|b| b.id).as_deref(), Some("two"));
    }

    #[rstest]
    #[case(CursorPlacement::Start, 0)]
    #[case(CursorPlacement::End, 5)]
    fn test_set_text_cursor_position(#[case] placement: CursorPlacement, #[case] offset: usize) {
        let h = harness();
        let selection = set_text_cursor_position(&h.doc, "three", placement).unwrap();
        let start = get_block_info_by_id("three", &h.doc).unwrap().content.start();
        assert_eq!(selection, TextSelection::cursor(start + offset));
    }

    #[test]
    fn test_set_cursor_on_missing_block_fails() {
        let h = harness();
        assert!(set_text_cursor_position(&h.doc, "ghost", CursorPlacement::Start).is_err());
    }

    #[test]
    fn test_collapsed_selection_has_no_blocks() {
        let mut h = harness();
        h.cursor_in("one", 1);
        assert!(get_selection(&h.doc, &h.schema, None, h.selection).unwrap().is_none());
    }

    #[test]
    fn test_selection_spanning_nested_blocks() {
        let h = harness();
        let from = get_block_info_by_id("one", &h.doc).unwrap().content.start() + 1;
        let to = get_block_info_by_id("kid1", &h.doc).unwrap().content.start() + 2;
        let selection = get_selection(&h.doc, &h.schema, None, TextSelection::new(to, from))
            .unwrap()
            .unwrap();

        assert_eq!(ids(&selection.blocks), vec!["one", "two", "kid1"]);
    }

    #[test]
    fn test_selection_ending_at_content_start_excludes_block() {
        let h = harness();
        let from = get_block_info_by_id("one", &h.doc).unwrap().content.start();
        let to = get_block_info_by_id("two", &h.doc).unwrap().content.start();
        let selection = get_selection(&h.doc, &h.schema, None, TextSelection::new(from, to))
            .unwrap()
            .unwrap();

        assert_eq!(ids(&selection.blocks), vec!["one"]);
    }

    #[test]
    fn test_normalize_moves_positions_into_content() {
        let h = harness();
        let one = get_block_info_by_id("one", &h.doc).unwrap();
        let three = get_block_info_by_id("three", &h.doc).unwrap();

        let normalized = normalize_selection(&h.doc, TextSelection::new(one.container.before_pos, h.doc.content_size()));
        assert_eq!(normalized.anchor, one.content.start());
        assert_eq!(normalized.head, three.content.end());
    }
}
