//! Lookup of blocks by ID and by position.
//!
//! Everything returned here borrows the document it was computed from, so
//! the borrow checker keeps a [`BlockInfo`] from outliving the next edit.

use std::collections::HashSet;

use log::warn;

use crate::error::{EngineError, Result};
use crate::node::{Node, Visit};
use crate::schema::{BlockType, ChildrenType};

use super::transform::TextSelection;

/// A node together with the position right before it.
#[derive(Debug, Clone, Copy)]
pub struct NodeWithPos<'a> {
    pub node: &'a Node,
    pub pos_before: usize,
}

impl NodeWithPos<'_> {
    pub fn pos_after(&self) -> usize {
        self.pos_before + self.node.node_size()
    }
}

/// Boundaries of one node.
#[derive(Debug, Clone, Copy)]
pub struct SingleNodeInfo<'a> {
    pub node: &'a Node,
    pub before_pos: usize,
    pub after_pos: usize,
}

impl<'a> SingleNodeInfo<'a> {
    fn at(node: &'a Node, before_pos: usize) -> Self {
        Self {
            node,
            before_pos,
            after_pos: before_pos + node.node_size(),
        }
    }

    /// First position inside the node.
    pub fn start(&self) -> usize {
        self.before_pos + 1
    }

    /// Last position inside the node.
    pub fn end(&self) -> usize {
        self.after_pos - 1
    }
}

/// Derived boundaries of one block: container, content and optional group.
#[derive(Debug, Clone, Copy)]
pub struct BlockInfo<'a> {
    pub id: &'a str,
    pub block_type: BlockType,
    pub container: SingleNodeInfo<'a>,
    pub content: SingleNodeInfo<'a>,
    pub group: Option<SingleNodeInfo<'a>>,
}

/// Boundaries of a group and the container it belongs to, if any.
#[derive(Debug, Clone, Copy)]
pub struct GroupInfo<'a> {
    pub group: SingleNodeInfo<'a>,
    pub list_type: ChildrenType,
    pub list_level: usize,
    /// Owning container; `None` for the top-level group.
    pub parent: Option<SingleNodeInfo<'a>>,
}

/// Where a block sits inside its group.
#[derive(Debug, Clone, Copy)]
pub struct ParentGroupInfo<'a> {
    pub group: GroupInfo<'a>,
    pub index: usize,
}

impl ParentGroupInfo<'_> {
    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.group.group.node.child_count()
    }
}

/// Find the container with `id`. Fails with `BlockNotFound` when absent.
pub fn get_node_by_id<'a>(id: &str, doc: &'a Node) -> Result<NodeWithPos<'a>> {
    let mut found = None;
    doc.descendants(|node, pos| {
        if found.is_some() {
            return Visit::Stop;
        }
        if node.is_content() {
            return Visit::Skip;
        }
        if node.block_id() == Some(id) {
            found = Some(NodeWithPos {
                node,
                pos_before: pos,
            });
            return Visit::Stop;
        }
        Visit::Descend
    });
    found.ok_or_else(|| EngineError::not_found(id))
}

/// Every block ID in the document.
pub fn collect_ids(node: &Node) -> HashSet<String> {
    let mut ids = HashSet::new();
    if let Some(id) = node.block_id() {
        ids.insert(id.to_string());
    }
    node.descendants(|node, _| {
        if let Some(id) = node.block_id() {
            ids.insert(id.to_string());
        }
        if node.is_content() {
            Visit::Skip
        } else {
            Visit::Descend
        }
    });
    ids
}

/// The container right after `pos` or the nearest one enclosing it. A
/// position outside every block falls back to the first block after it,
/// or the last block of the document.
pub fn get_nearest_block_pos(doc: &Node, pos: usize) -> Result<NodeWithPos<'_>> {
    let rp = doc.resolve(pos)?;
    if let Some(node) = rp.node_after()
        && node.is_container()
    {
        return Ok(NodeWithPos {
            node,
            pos_before: pos,
        });
    }
    if let Some(depth) = rp.find_depth(Node::is_container)
        && let Some(pos_before) = rp.before(depth)
    {
        return Ok(NodeWithPos {
            node: rp.node(depth),
            pos_before,
        });
    }

    warn!("position {pos} is not within a block");
    let mut after = None;
    let mut last = None;
    doc.descendants(|node, node_pos| {
        if node.is_container() {
            let found = NodeWithPos {
                node,
                pos_before: node_pos,
            };
            if node_pos >= pos {
                after = Some(found);
                return Visit::Stop;
            }
            last = Some(found);
        }
        if node.is_content() {
            Visit::Skip
        } else {
            Visit::Descend
        }
    });
    after
        .or(last)
        .ok_or_else(|| EngineError::structure("document has no blocks"))
}

/// Block boundaries for a container already located at `pos_before`.
pub fn get_block_info_with_manual_offset(node: &Node, pos_before: usize) -> Result<BlockInfo<'_>> {
    let id = node
        .block_id()
        .ok_or_else(|| EngineError::structure(format!("no block at {pos_before}")))?;
    let container = SingleNodeInfo::at(node, pos_before);
    let content_node = node
        .content_node()
        .ok_or_else(|| EngineError::structure(format!("block {id} has no content node")))?;
    let content = SingleNodeInfo::at(content_node, container.start());
    let block_type = content_node
        .kind()
        .block_type()
        .ok_or_else(|| EngineError::structure(format!("block {id} has no type")))?;
    let group = node
        .group_node()
        .map(|group| SingleNodeInfo::at(group, content.after_pos));

    Ok(BlockInfo {
        id,
        block_type,
        container,
        content,
        group,
    })
}

pub fn get_block_info_from_pos(doc: &Node, pos: usize) -> Result<BlockInfo<'_>> {
    let found = get_nearest_block_pos(doc, pos)?;
    get_block_info_with_manual_offset(found.node, found.pos_before)
}

/// Block under the selection's anchor.
pub fn get_block_info_from_selection(doc: &Node, selection: TextSelection) -> Result<BlockInfo<'_>> {
    get_block_info_from_pos(doc, selection.anchor)
}

/// Block info for the block with `id`.
pub fn get_block_info_by_id<'a>(id: &str, doc: &'a Node) -> Result<BlockInfo<'a>> {
    let found = get_node_by_id(id, doc)?;
    get_block_info_with_manual_offset(found.node, found.pos_before)
}

/// Innermost group enclosing `pos`.
pub fn get_group_info_from_pos(doc: &Node, pos: usize) -> Result<GroupInfo<'_>> {
    let rp = doc.resolve(pos)?;
    let depth = rp
        .find_depth(Node::is_group)
        .ok_or_else(|| EngineError::structure(format!("position {pos} is outside every group")))?;
    let group_before = rp
        .before(depth)
        .ok_or_else(|| EngineError::structure("group at the document root"))?;
    let group = rp.node(depth);

    let parent = depth
        .checked_sub(1)
        .filter(|&d| rp.node(d).is_container())
        .and_then(|d| rp.before(d).map(|before| SingleNodeInfo::at(rp.node(d), before)));

    Ok(GroupInfo {
        group: SingleNodeInfo::at(group, group_before),
        list_type: group.list_type(),
        list_level: group.list_level(),
        parent,
    })
}

/// The group holding `block` and the block's index in it.
pub fn get_parent_group_info<'a>(doc: &'a Node, block: &BlockInfo<'_>) -> Result<ParentGroupInfo<'a>> {
    let rp = doc.resolve(block.container.before_pos)?;
    let depth = rp.depth();
    let index = rp.index(depth);
    let group = get_group_info_from_pos(doc, block.container.before_pos)?;
    Ok(ParentGroupInfo { group, index })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Attrs, ID_ATTR};
    use pretty_assertions::assert_eq;

    fn block(id: &str, text: &str, children: Vec<Node>) -> Node {
        let inline = if text.is_empty() {
            vec![]
        } else {
            vec![Node::text(text, vec![])]
        };
        Node::container(
            Attrs::from([(ID_ATTR.to_string(), id.to_string())]),
            Node::content(BlockType::Paragraph, Attrs::new(), inline),
            (!children.is_empty()).then(|| Node::group(ChildrenType::Unordered, 1, children)),
        )
    }

    // 0 <g> 1 <p> 2 <c>3 abc 6</c> 7 <g> 8 <child> 9 <c>10 x 11</c> 12 </child> 13 </g> 14 </p> 15
    // <q> 16 <c>17</c> 18 </q> 19 </g> 20
    fn doc() -> Node {
        Node::doc(Node::group(
            ChildrenType::Group,
            1,
            vec![
                block("p", "abc", vec![block("child", "x", vec![])]),
                block("q", "", vec![]),
            ],
        ))
    }

    #[test]
    fn test_get_node_by_id() {
        let doc = doc();
        let found = get_node_by_id("child", &doc).unwrap();
        assert_eq!(found.pos_before, 8);
        assert_eq!(found.pos_after(), 13);
        assert_eq!(get_node_by_id("q", &doc).unwrap().pos_before, 15);
    }

    #[test]
    fn test_get_node_by_id_missing() {
        let err = get_node_by_id("nope", &doc()).unwrap_err();
        assert!(matches!(err, EngineError::BlockNotFound(ids) if ids == vec!["nope"]));
    }

    #[test]
    fn test_block_info_boundaries() {
        let doc = doc();
        let info = get_block_info_from_pos(&doc, 4).unwrap();
        assert_eq!(info.id, "p");
        assert_eq!(info.block_type, BlockType::Paragraph);
        assert_eq!((info.container.before_pos, info.container.after_pos), (1, 15));
        assert_eq!((info.content.before_pos, info.content.after_pos), (2, 7));
        let group = info.group.unwrap();
        assert_eq!((group.before_pos, group.after_pos), (7, 14));
    }

    #[test]
    fn test_nearest_block_prefers_node_after() {
        let doc = doc();
        assert_eq!(get_nearest_block_pos(&doc, 8).unwrap().node.block_id(), Some("child"));
        assert_eq!(get_nearest_block_pos(&doc, 10).unwrap().node.block_id(), Some("child"));
        // between the parent's content and its group
        assert_eq!(get_nearest_block_pos(&doc, 7).unwrap().node.block_id(), Some("p"));
    }

    #[test]
    fn test_nearest_block_outside_blocks() {
        let doc = doc();
        assert_eq!(get_nearest_block_pos(&doc, 0).unwrap().pos_before, 1);
        assert_eq!(get_nearest_block_pos(&doc, 20).unwrap().node.block_id(), Some("q"));
    }

    #[test]
    fn test_group_info() {
        let doc = doc();
        let nested = get_group_info_from_pos(&doc, 10).unwrap();
        assert_eq!(nested.group.before_pos, 7);
        assert_eq!(nested.list_type, ChildrenType::Unordered);
        assert_eq!(nested.parent.unwrap().node.block_id(), Some("p"));

        let top = get_group_info_from_pos(&doc, 16).unwrap();
        assert_eq!(top.group.before_pos, 0);
        assert!(top.parent.is_none());
    }

    #[test]
    fn test_parent_group_info() {
        let doc = doc();
        let q = get_block_info_by_id("q", &doc).unwrap();
        let parent = get_parent_group_info(&doc, &q).unwrap();
        assert_eq!(parent.index, 1);
        assert!(parent.is_last());
        assert!(!parent.is_first());
    }

    #[test]
    fn test_collect_ids() {
        let ids = collect_ids(&doc());
        assert_eq!(ids.len(), 3);
        assert!(ids.contains("child"));
    }
}
