use std::collections::HashSet;

use crate::editing::convert::{
    block_to_node_in, container_attrs, content_node, content_node_to_inline_content,
    inline_content_to_nodes, stored_props,
};
use crate::editing::resolve::{collect_ids, get_block_info_by_id, get_parent_group_info};
use crate::editing::transform::Transaction;
use crate::error::Result;
use crate::ids::IdAllocator;
use crate::model::PartialBlock;
use crate::node::{LIST_TYPE_ATTR, Node, NodeKind};
use crate::schema::{CHILDREN_TYPE_PROP, ChildrenType, ContentPolicy};

use super::CommandContext;

enum ContentEdit {
    /// Keep the inline nodes, change only type and attributes.
    Keep,
    Replace(Node),
}

/// Update type, props, content and children of block `id`.
///
/// Omitted fields keep their current value. Content survives a type change
/// when both types hold the same kind of content; inline and plain text
/// convert into each other, and a content-less target type drops it.
/// A non-empty `children` list replaces the child group wholesale.
pub fn update_block(
    tr: &mut Transaction,
    cx: &mut CommandContext<'_>,
    id: &str,
    update: &PartialBlock,
    keep_selection: bool,
) -> Result<()> {
    let schema = cx.schema;
    let doc = tr.doc();
    let info = get_block_info_by_id(id, doc)?;
    let old_spec = schema.spec(info.block_type)?;
    let new_type = update.block_type.unwrap_or(info.block_type);
    let new_spec = schema.spec(new_type)?;
    let mut props = new_spec.resolve_props(&stored_props(info.container.node), &update.props)?;

    let list_type = match (update.props.get(CHILDREN_TYPE_PROP), info.group) {
        (Some(value), _) => value.parse().unwrap_or_default(),
        (None, Some(group)) => group.node.list_type(),
        (None, None) => props
            .get(CHILDREN_TYPE_PROP)
            .and_then(|value| value.parse().ok())
            .unwrap_or(ChildrenType::Group),
    };

    let children = match update.children.as_deref() {
        Some(children) if !children.is_empty() => {
            let released = info.group.map(|g| collect_ids(g.node)).unwrap_or_default();
            let taken: HashSet<String> = collect_ids(doc).difference(&released).cloned().collect();
            let parent = get_parent_group_info(doc, &info)?;
            let level = match info.group {
                Some(group) => group.node.list_level(),
                None if parent.group.list_type.is_list() => parent.group.list_level + 1,
                None => 1,
            };
            let inner_level = if list_type.is_list() { level } else { 0 };
            let mut ids = IdAllocator::new(&mut *cx.ids, taken).reserving(children);
            let nodes = children
                .iter()
                .map(|child| block_to_node_in(child, schema, &mut ids, inner_level))
                .collect::<Result<Vec<_>>>()?;
            props.insert(CHILDREN_TYPE_PROP.to_string(), list_type.to_string());
            Some((nodes, level))
        }
        _ => None,
    };

    let content = match &update.content {
        Some(content) => ContentEdit::Replace(content_node(new_spec, &props, content)),
        None => match (old_spec.content, new_spec.content) {
            (old, new) if old == new => ContentEdit::Keep,
            (ContentPolicy::Empty, _) => ContentEdit::Keep,
            (_, ContentPolicy::Empty) => ContentEdit::Replace(content_node(new_spec, &props, &[])),
            (_, policy) => {
                let inline = content_node_to_inline_content(info.content.node);
                ContentEdit::Replace(Node::content(
                    new_type,
                    props.clone(),
                    inline_content_to_nodes(&inline, policy),
                ))
            }
        },
    };

    let container_pos = info.container.before_pos;
    let content_range = (info.content.before_pos, info.content.after_pos);
    let group = info.group.map(|g| (g.before_pos, g.after_pos, g.node.attrs().clone()));

    // Children first: everything they touch lies after the content node.
    match (children, group) {
        (Some((nodes, _)), Some((before, after, mut attrs))) => {
            tr.replace(before + 1, after - 1, nodes)?;
            attrs.insert(LIST_TYPE_ATTR.to_string(), list_type.to_string());
            tr.set_node_markup(before, None, attrs)?;
        }
        (Some((nodes, level)), None) => {
            tr.insert(content_range.1, vec![Node::group(list_type, level, nodes)])?;
        }
        (None, Some((before, _, mut attrs))) if update.props.contains_key(CHILDREN_TYPE_PROP) => {
            attrs.insert(LIST_TYPE_ATTR.to_string(), list_type.to_string());
            tr.set_node_markup(before, None, attrs)?;
        }
        (None, _) => {}
    }

    match content {
        ContentEdit::Keep => {
            tr.set_node_markup(content_range.0, Some(NodeKind::Content(new_type)), props.clone())?;
        }
        ContentEdit::Replace(node) => {
            tr.replace(content_range.0, content_range.1, vec![node])?;
            if keep_selection {
                tr.set_selection(cx.selection);
            }
        }
    }

    tr.set_node_markup(container_pos, None, container_attrs(id, &props))?;
    Ok(())
}
