//! Document-order walks over blocks.
//!
//! Document order is pre-order: a block comes before its children, and the
//! children come before the block's next sibling.

use crate::error::Result;
use crate::node::{Node, Visit};

use super::resolve::{NodeWithPos, get_nearest_block_pos};

/// The block after the one at `pos` in document order.
pub fn find_next_block(doc: &Node, pos: usize) -> Result<Option<NodeWithPos<'_>>> {
    let current = get_nearest_block_pos(doc, pos)?;

    if let (Some(content), Some(group)) = (current.node.content_node(), current.node.group_node())
        && let Some(first) = group.first_child()
    {
        return Ok(Some(NodeWithPos {
            node: first,
            pos_before: current.pos_before + 1 + content.node_size() + 1,
        }));
    }

    // Climb until some ancestor level has a following sibling.
    let rp = doc.resolve(current.pos_before)?;
    let mut depth = rp.depth();
    let mut after = current.pos_after();
    loop {
        if let Some(next) = rp.node(depth).child(rp.index(depth) + 1) {
            return Ok(Some(NodeWithPos {
                node: next,
                pos_before: after,
            }));
        }
        if depth < 2 || !rp.node(depth - 1).is_container() {
            return Ok(None);
        }
        let Some(parent_after) = rp.after(depth - 1) else {
            return Ok(None);
        };
        after = parent_after;
        depth -= 2;
    }
}

/// The block before the one at `pos` in document order: the deepest last
/// descendant of the previous sibling, or else the parent block.
pub fn find_previous_block(doc: &Node, pos: usize) -> Result<Option<NodeWithPos<'_>>> {
    let current = get_nearest_block_pos(doc, pos)?;
    let rp = doc.resolve(current.pos_before)?;
    let depth = rp.depth();
    let index = rp.index(depth);

    let Some(previous) = index.checked_sub(1).and_then(|i| rp.parent().child(i)) else {
        if depth >= 2 && rp.node(depth - 1).is_container() {
            return Ok(rp.before(depth - 1).map(|pos_before| NodeWithPos {
                node: rp.node(depth - 1),
                pos_before,
            }));
        }
        return Ok(None);
    };

    let mut found = NodeWithPos {
        node: previous,
        pos_before: current.pos_before - previous.node_size(),
    };
    while let Some(last) = found.node.group_node().and_then(Node::last_child) {
        // Closing tokens of the group and the container sit after `last`.
        let pos_before = found.pos_after() - 2 - last.node_size();
        found = NodeWithPos {
            node: last,
            pos_before,
        };
    }
    Ok(Some(found))
}

/// Visit every block in document order, or in exactly the reverse order.
/// The visitor returns `false` to stop.
pub fn for_each_block<'a>(doc: &'a Node, reverse: bool, mut visit: impl FnMut(NodeWithPos<'a>) -> bool) {
    if !reverse {
        walk_blocks(doc, &mut visit);
        return;
    }

    let mut blocks = Vec::new();
    walk_blocks(doc, &mut |block| {
        blocks.push(block);
        true
    });
    for block in blocks.into_iter().rev() {
        if !visit(block) {
            break;
        }
    }
}

fn walk_blocks<'a>(doc: &'a Node, visit: &mut dyn FnMut(NodeWithPos<'a>) -> bool) {
    doc.descendants(|node, pos| {
        if node.is_content() {
            return Visit::Skip;
        }
        if node.is_container()
            && !visit(NodeWithPos {
                node,
                pos_before: pos,
            })
        {
            return Visit::Stop;
        }
        Visit::Descend
    });
}
