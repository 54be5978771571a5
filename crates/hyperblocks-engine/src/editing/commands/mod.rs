//! Block mutation commands.
//!
//! Each command inspects the working document of a [`Transaction`], fails
//! before touching it when a target cannot be resolved, and otherwise
//! appends the steps of one atomic edit. The editor dispatches the
//! transaction afterwards.

mod insert;
mod remove;
mod structure;
mod styles;
mod update;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ids::IdGenerator;
use crate::model::{PartialBlock, Styles};
use crate::schema::{BlockSchema, ChildrenType};

use super::transform::{TextSelection, Transaction};

pub use insert::insert_blocks;
pub use remove::{remove_blocks, replace_blocks};
pub use structure::{
    add_block_at_end, can_nest_block, can_unnest_block, nest_block, split_block, unnest_block,
    update_group,
};
pub use styles::{
    add_styles, create_link, get_active_styles, get_selected_link_url, get_selected_text,
    remove_styles, toggle_styles,
};
pub use update::update_block;

/// Side of the reference block new blocks are inserted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Before,
    After,
}

/// What a command needs besides the transaction.
pub struct CommandContext<'a> {
    pub schema: &'a BlockSchema,
    pub ids: &'a mut dyn IdGenerator,
    /// Selection at the time the command runs.
    pub selection: TextSelection,
}

/// Edit commands understood by [`crate::BlockEditor::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum Cmd {
    InsertBlocks {
        blocks: Vec<PartialBlock>,
        reference_id: String,
        placement: Placement,
    },
    UpdateBlock {
        id: String,
        update: PartialBlock,
        keep_selection: bool,
    },
    RemoveBlocks {
        ids: Vec<String>,
    },
    ReplaceBlocks {
        ids: Vec<String>,
        blocks: Vec<PartialBlock>,
    },
    /// Sink the cursor block into its previous sibling.
    NestBlock,
    /// Lift the cursor block out of its parent.
    UnnestBlock,
    SplitBlock {
        at: usize,
    },
    UpdateGroup {
        id: String,
        children_type: ChildrenType,
    },
    AddBlockAtEnd,
    AddStyles(Styles),
    RemoveStyles(Styles),
    ToggleStyles(Styles),
    CreateLink {
        url: String,
        text: Option<String>,
    },
}

impl Cmd {
    /// Append this command's steps to `tr`. Returns the IDs of the blocks
    /// the command inserted or changed.
    pub fn compile(self, tr: &mut Transaction, cx: &mut CommandContext<'_>) -> Result<Vec<String>> {
        match self {
            Cmd::InsertBlocks {
                blocks,
                reference_id,
                placement,
            } => insert_blocks(tr, cx, &blocks, &reference_id, placement),
            Cmd::UpdateBlock {
                id,
                update,
                keep_selection,
            } => update_block(tr, cx, &id, &update, keep_selection).map(|()| vec![id]),
            Cmd::RemoveBlocks { ids } => remove_blocks(tr, cx, &ids),
            Cmd::ReplaceBlocks { ids, blocks } => {
                replace_blocks(tr, cx, &ids, &blocks).map(|(inserted, _)| inserted)
            }
            Cmd::NestBlock => nest_block(tr, cx),
            Cmd::UnnestBlock => unnest_block(tr, cx),
            Cmd::SplitBlock { at } => split_block(tr, cx, at),
            Cmd::UpdateGroup { id, children_type } => update_group(tr, cx, &id, children_type),
            Cmd::AddBlockAtEnd => add_block_at_end(tr, cx).map(|id| vec![id]),
            Cmd::AddStyles(styles) => add_styles(tr, cx, &styles),
            Cmd::RemoveStyles(styles) => remove_styles(tr, cx, &styles),
            Cmd::ToggleStyles(styles) => toggle_styles(tr, cx, &styles),
            Cmd::CreateLink { url, text } => create_link(tr, cx, &url, text.as_deref()),
        }
    }
}
