//! Commands that reshape the tree around the cursor block.

use crate::editing::convert::{container_attrs, stored_props};
use crate::editing::resolve::{
    collect_ids, get_block_info_from_pos, get_block_info_from_selection,
    get_block_info_with_manual_offset, get_parent_group_info,
};
use crate::editing::transform::{TextSelection, Transaction};
use crate::error::{EngineError, Result};
use crate::ids::IdAllocator;
use crate::model::PartialBlock;
use crate::node::{Attrs, LIST_LEVEL_ATTR, Node, NodeKind, normalize_inline, split_inline};
use crate::schema::{BlockType, CHILDREN_TYPE_PROP, ChildrenType, ContentPolicy};

use super::{CommandContext, update::update_block};

/// Whether the cursor block has a previous sibling to nest into.
pub fn can_nest_block(doc: &Node, selection: TextSelection) -> bool {
    get_block_info_from_selection(doc, selection)
        .and_then(|info| get_parent_group_info(doc, &info))
        .is_ok_and(|parent| parent.index > 0)
}

/// Whether the cursor block sits inside another block.
pub fn can_unnest_block(doc: &Node, selection: TextSelection) -> bool {
    get_block_info_from_selection(doc, selection)
        .and_then(|info| get_parent_group_info(doc, &info))
        .is_ok_and(|parent| parent.group.parent.is_some())
}

/// Move the cursor block to the end of its previous sibling's children.
/// A new child group takes the list type of the current group.
pub fn nest_block(tr: &mut Transaction, cx: &mut CommandContext<'_>) -> Result<Vec<String>> {
    let doc = tr.doc();
    let info = get_block_info_from_selection(doc, cx.selection)?;
    let parent = get_parent_group_info(doc, &info)?;
    if parent.index == 0 {
        return Ok(Vec::new());
    }
    let Some(prev_node) = parent.group.group.node.child(parent.index - 1) else {
        return Ok(Vec::new());
    };
    let prev = get_block_info_with_manual_offset(
        prev_node,
        info.container.before_pos - prev_node.node_size(),
    )?;

    let id = info.id.to_string();
    let moved = info.container.node.clone();
    let (cur_before, cur_after) = (info.container.before_pos, info.container.after_pos);
    let list_type = parent.group.list_type;
    let level = if list_type.is_list() {
        parent.group.list_level + 1
    } else {
        1
    };
    let prev_before = prev.container.before_pos;
    let prev_attrs = prev.container.node.attrs().clone();
    let prev_props = prev.content.node.attrs().clone();
    let target = prev.group.map(|group| group.after_pos - 1);
    let insert_at = prev.content.after_pos;

    // Everything we touch lies at or before the moved block, so deleting it
    // first leaves the insertion points where they are.
    tr.delete(cur_before, cur_after)?;
    let new_before = match target {
        Some(end_of_group) => {
            tr.insert(end_of_group, vec![moved])?;
            end_of_group
        }
        None => {
            tr.insert(insert_at, vec![Node::group(list_type, level, vec![moved])])?;
            tr.set_node_markup(prev_before, None, with_children_type(prev_attrs, list_type))?;
            tr.set_node_markup(prev_before + 1, None, with_children_type(prev_props, list_type))?;
            insert_at + 1
        }
    };

    tr.set_selection(move_selection(cx.selection, cur_before, cur_after, new_before));
    Ok(vec![id])
}

/// Lift the cursor block out of its parent. It becomes the parent's next
/// sibling and takes the siblings that followed it as trailing children.
pub fn unnest_block(tr: &mut Transaction, cx: &mut CommandContext<'_>) -> Result<Vec<String>> {
    let doc = tr.doc();
    let info = get_block_info_from_selection(doc, cx.selection)?;
    let parent = get_parent_group_info(doc, &info)?;
    let Some(owner) = parent.group.parent else {
        return Ok(Vec::new());
    };

    let group = parent.group;
    let following = group.group.node.children()[parent.index + 1..].to_vec();
    let cur = info.container.node;
    let content = info.content.node.clone();

    let lifted = match (info.group, following.is_empty()) {
        (None, true) => cur.clone(),
        (Some(own), true) => {
            let mut attrs = own.node.attrs().clone();
            let level = own.node.list_level().saturating_sub(1).max(1);
            attrs.insert(LIST_LEVEL_ATTR.to_string(), level.to_string());
            Node::container(
                cur.attrs().clone(),
                content,
                Some(own.node.with_markup(NodeKind::Group, attrs)),
            )
        }
        (own, false) => {
            let (list_type, mut children) = match own {
                Some(own) => (own.node.list_type(), own.node.children().to_vec()),
                None => (group.list_type, Vec::new()),
            };
            children.extend(following);
            let props = with_children_type(content.attrs().clone(), list_type);
            Node::container(
                with_children_type(cur.attrs().clone(), list_type),
                content.with_markup(content.kind(), props),
                Some(Node::group(list_type, group.list_level, children)),
            )
        }
    };

    let id = info.id.to_string();
    let cur_before = info.container.before_pos;
    let cur_after = info.container.after_pos;
    let owner_after = owner.after_pos;
    let (from, to) = if parent.index == 0 {
        (group.group.before_pos, group.group.after_pos)
    } else {
        (cur_before, group.group.end())
    };

    tr.insert(owner_after, vec![lifted])?;
    tr.delete(from, to)?;

    let new_before = owner_after - (to - from);
    tr.set_selection(move_selection(cx.selection, cur_before, cur_after, new_before));
    Ok(vec![id])
}

/// Container and content node both carry the `childrenType` prop.
fn with_children_type(mut attrs: Attrs, list_type: ChildrenType) -> Attrs {
    attrs.insert(CHILDREN_TYPE_PROP.to_string(), list_type.to_string());
    attrs
}

/// Split the block at `at` into itself (text before) and a new block of the
/// same type (text after). The block's children move to the new block.
pub fn split_block(tr: &mut Transaction, cx: &mut CommandContext<'_>, at: usize) -> Result<Vec<String>> {
    let doc = tr.doc();
    let info = get_block_info_from_pos(doc, at)?;
    let spec = cx.schema.spec(info.block_type)?;

    let offset = at.clamp(info.content.start(), info.content.end()) - info.content.start();
    let (head, tail) = split_inline(info.content.node.children(), offset);

    let (new_type, new_props, tail) = if spec.content == ContentPolicy::Empty {
        let paragraph = cx.schema.spec(BlockType::Paragraph)?;
        (BlockType::Paragraph, paragraph.defaults(), Vec::new())
    } else {
        (info.block_type, stored_props(info.container.node), tail)
    };

    let mut ids = IdAllocator::new(&mut *cx.ids, collect_ids(doc));
    let new_id = ids.claim(None)?;

    let current = Node::container(
        info.container.node.attrs().clone(),
        info.content.node.with_children(normalize_inline(head)),
        None,
    );
    let created = Node::container(
        container_attrs(&new_id, &new_props),
        Node::content(new_type, new_props.clone(), normalize_inline(tail)),
        info.group.map(|group| group.node.clone()),
    );

    let before = info.container.before_pos;
    let after = info.container.after_pos;
    let cursor = before + current.node_size() + 2;
    tr.replace(before, after, vec![current, created])?;
    tr.set_selection(TextSelection::cursor(cursor));
    Ok(vec![new_id])
}

/// Set the list type of block `id`'s children.
pub fn update_group(
    tr: &mut Transaction,
    cx: &mut CommandContext<'_>,
    id: &str,
    children_type: ChildrenType,
) -> Result<Vec<String>> {
    let update = PartialBlock::default().with_prop(CHILDREN_TYPE_PROP, children_type.to_string());
    update_block(tr, cx, id, &update, false)?;
    Ok(vec![id.to_string()])
}

/// Make sure the document ends with an empty paragraph and return its ID.
pub fn add_block_at_end(tr: &mut Transaction, cx: &mut CommandContext<'_>) -> Result<String> {
    let doc = tr.doc();
    let end = doc.content_size() - 1;
    let last = doc
        .first_child()
        .and_then(Node::last_child)
        .ok_or_else(|| EngineError::structure("document has no blocks"))?;
    let info = get_block_info_with_manual_offset(last, end - last.node_size())?;
    if info.block_type == BlockType::Paragraph
        && info.content.node.child_count() == 0
        && info.group.is_none()
    {
        return Ok(info.id.to_string());
    }

    let mut ids = IdAllocator::new(&mut *cx.ids, collect_ids(doc));
    let id = ids.claim(None)?;
    let props = cx.schema.spec(BlockType::Paragraph)?.defaults();
    let node = Node::container(
        container_attrs(&id, &props),
        Node::content(BlockType::Paragraph, props.clone(), Vec::new()),
        None,
    );
    tr.insert(end, vec![node])?;
    tr.set_selection(TextSelection::cursor(end + 2));
    Ok(id)
}

/// Shift selection ends that lay inside a moved block along with it.
fn move_selection(
    selection: TextSelection,
    old_before: usize,
    old_after: usize,
    new_before: usize,
) -> TextSelection {
    let map = |pos: usize| {
        if (old_before..old_after).contains(&pos) {
            pos - old_before + new_before
        } else {
            pos
        }
    };
    TextSelection::new(map(selection.anchor), map(selection.head))
}
