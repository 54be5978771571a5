use std::collections::{BTreeMap, HashSet};
use std::ops::Range;

use log::debug;

use crate::editing::convert::block_to_node_in;
use crate::editing::resolve::{
    GroupInfo, NodeWithPos, collect_ids, get_block_info_with_manual_offset, get_parent_group_info,
};
use crate::editing::transform::Transaction;
use crate::error::{EngineError, Result};
use crate::ids::IdAllocator;
use crate::model::PartialBlock;
use crate::node::{Node, Visit};
use crate::schema::BlockType;

use super::CommandContext;

/// Remove the blocks `ids` together with their descendants. Returns the
/// IDs of the removed blocks in document order.
pub fn remove_blocks(
    tr: &mut Transaction,
    cx: &mut CommandContext<'_>,
    ids: &[String],
) -> Result<Vec<String>> {
    let (_, removed) = remove_and_insert(tr, cx, ids, &[])?;
    Ok(removed)
}

/// Remove `ids` and put `blocks` where the first of them was. Returns the
/// inserted and the removed IDs.
pub fn replace_blocks(
    tr: &mut Transaction,
    cx: &mut CommandContext<'_>,
    ids: &[String],
    blocks: &[PartialBlock],
) -> Result<(Vec<String>, Vec<String>)> {
    remove_and_insert(tr, cx, ids, blocks)
}

struct Target<'a> {
    found: NodeWithPos<'a>,
    group: GroupInfo<'a>,
}

/// Find the requested containers in document order. Stops scanning once
/// every ID has been seen; descendants of a target count as found.
fn find_targets<'a>(doc: &'a Node, ids: &[String]) -> Result<(Vec<NodeWithPos<'a>>, HashSet<String>)> {
    let mut pending: HashSet<&str> = ids.iter().map(String::as_str).collect();
    let mut targets = Vec::new();
    let mut removed_ids = HashSet::new();

    doc.descendants(|node, pos| {
        if pending.is_empty() {
            return Visit::Stop;
        }
        if node.is_content() {
            return Visit::Skip;
        }
        match node.block_id() {
            Some(id) if pending.contains(id) => {
                for removed in collect_ids(node) {
                    pending.remove(removed.as_str());
                    removed_ids.insert(removed);
                }
                targets.push(NodeWithPos {
                    node,
                    pos_before: pos,
                });
                Visit::Skip
            }
            _ => Visit::Descend,
        }
    });

    if !pending.is_empty() {
        let mut missing = Vec::new();
        for id in ids {
            if pending.contains(id.as_str()) && !missing.contains(id) {
                missing.push(id.clone());
            }
        }
        return Err(EngineError::BlockNotFound(missing));
    }
    Ok((targets, removed_ids))
}

fn remove_and_insert(
    tr: &mut Transaction,
    cx: &mut CommandContext<'_>,
    ids: &[String],
    blocks: &[PartialBlock],
) -> Result<(Vec<String>, Vec<String>)> {
    if ids.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }

    let doc = tr.doc();
    let (found, removed_ids) = find_targets(doc, ids)?;
    let targets = found
        .into_iter()
        .map(|found| {
            let info = get_block_info_with_manual_offset(found.node, found.pos_before)?;
            let group = get_parent_group_info(doc, &info)?.group;
            Ok(Target { found, group })
        })
        .collect::<Result<Vec<_>>>()?;

    // Count removals per group, keyed by the group's position.
    let mut per_group: BTreeMap<usize, usize> = BTreeMap::new();
    for target in &targets {
        *per_group.entry(target.group.group.before_pos).or_default() += 1;
    }

    let anchor_group = targets[0].group.group.before_pos;
    let mut placeholder: Option<Vec<PartialBlock>> = None;
    let mut ranges: Vec<Range<usize>> = Vec::new();
    for target in &targets {
        let group = &target.group;
        let emptied = per_group[&group.group.before_pos] == group.group.node.child_count();
        let range = if !emptied {
            target.found.pos_before..target.found.pos_after()
        } else if group.parent.is_none() {
            // The top-level group may not become empty.
            if blocks.is_empty() {
                placeholder = Some(vec![PartialBlock::new(BlockType::Paragraph)]);
            }
            target.found.pos_before..target.found.pos_after()
        } else if group.group.before_pos == anchor_group && !blocks.is_empty() {
            target.found.pos_before..target.found.pos_after()
        } else {
            group.group.before_pos..group.group.after_pos
        };
        if ranges.last() != Some(&range) {
            ranges.push(range);
        }
    }
    ranges.sort_by_key(|range| range.start);

    let to_insert = match &placeholder {
        Some(placeholder) => placeholder.as_slice(),
        None => blocks,
    };
    let list_level = {
        let group = &targets[0].group;
        if group.list_type.is_list() {
            group.list_level
        } else {
            0
        }
    };
    let removed: Vec<String> = targets
        .iter()
        .filter_map(|target| target.found.node.block_id().map(str::to_string))
        .collect();

    let taken = collect_ids(doc)
        .difference(&removed_ids)
        .cloned()
        .collect();
    let mut allocator = IdAllocator::new(&mut *cx.ids, taken).reserving(to_insert);
    let nodes = to_insert
        .iter()
        .map(|block| block_to_node_in(block, cx.schema, &mut allocator, list_level))
        .collect::<Result<Vec<_>>>()?;
    let inserted: Vec<String> = if placeholder.is_some() {
        Vec::new()
    } else {
        nodes
            .iter()
            .filter_map(|node| node.block_id().map(str::to_string))
            .collect()
    };

    debug!(
        "removing {} block(s) in {} range(s), inserting {}",
        removed.len(),
        ranges.len(),
        nodes.len()
    );

    // Later ranges shift by everything already removed or inserted.
    let mut delta: isize = 0;
    let mut nodes = Some(nodes);
    for range in ranges {
        let from = shift(range.start, delta);
        let to = shift(range.end, delta);
        let old_size = (range.end - range.start) as isize;
        match nodes.take().filter(|nodes| !nodes.is_empty()) {
            Some(nodes) => {
                let new_size: usize = nodes.iter().map(Node::node_size).sum();
                tr.replace(from, to, nodes)?;
                delta += new_size as isize - old_size;
            }
            None => {
                tr.delete(from, to)?;
                delta -= old_size;
            }
        }
    }

    Ok((inserted, removed))
}

fn shift(pos: usize, delta: isize) -> usize {
    pos.saturating_add_signed(delta)
}
