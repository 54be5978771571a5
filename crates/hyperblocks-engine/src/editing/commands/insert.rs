use crate::editing::convert::block_to_node_in;
use crate::editing::resolve::{collect_ids, get_block_info_by_id, get_parent_group_info};
use crate::editing::transform::Transaction;
use crate::error::Result;
use crate::ids::IdAllocator;
use crate::model::PartialBlock;

use super::{CommandContext, Placement};

/// Insert `blocks` next to the block `reference_id` in one step. Blocks
/// without an ID get a fresh one. Returns the IDs of the inserted blocks.
pub fn insert_blocks(
    tr: &mut Transaction,
    cx: &mut CommandContext<'_>,
    blocks: &[PartialBlock],
    reference_id: &str,
    placement: Placement,
) -> Result<Vec<String>> {
    let (pos, list_level) = {
        let reference = get_block_info_by_id(reference_id, tr.doc())?;
        let parent = get_parent_group_info(tr.doc(), &reference)?;
        let pos = match placement {
            Placement::Before => reference.container.before_pos,
            Placement::After => reference.container.after_pos,
        };
        let list_level = if parent.group.list_type.is_list() {
            parent.group.list_level
        } else {
            0
        };
        (pos, list_level)
    };
    if blocks.is_empty() {
        return Ok(Vec::new());
    }

    let mut ids = IdAllocator::new(&mut *cx.ids, collect_ids(tr.doc())).reserving(blocks);
    let nodes = blocks
        .iter()
        .map(|block| block_to_node_in(block, cx.schema, &mut ids, list_level))
        .collect::<Result<Vec<_>>>()?;
    let inserted = nodes
        .iter()
        .filter_map(|node| node.block_id().map(str::to_string))
        .collect();

    tr.insert(pos, nodes)?;
    Ok(inserted)
}
