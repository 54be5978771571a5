/*!
 * # Editing Core
 *
 * The document lives in one physical [`Node`](crate::node::Node) tree laid
 * out as `doc > group > container+ > (content, group?)`. Consumers never see
 * that tree directly; they work with logical [`Block`](crate::model::Block)s
 * that are derived from it on every read.
 *
 * ## Module Structure
 *
 * - **`convert`**: block ⇄ container conversion and the stamp-keyed read cache
 * - **`resolve`**: lookups by block ID and by position (`BlockInfo`)
 * - **`transform`**: steps, position maps and the `Transaction` working copy
 * - **`invariants`**: structural checks run before every commit
 * - **`commands`**: `Cmd` enum and the mutation commands compiling to steps
 * - **`navigation`**: document-order walks over blocks
 * - **`selection`**: cursor and selection views
 * - **`editor`**: `BlockEditor`, which owns the state and commits transactions
 * - **`patch`**: what a commit changed
 *
 * ## Usage Pattern
 *
 * ```rust
 * use hyperblocks_engine::editing::*;
 * use hyperblocks_engine::model::PartialBlock;
 *
 * let mut editor = BlockEditor::new(EditorOptions {
 *     initial_content: vec![PartialBlock::paragraph("first").with_id("p1")],
 *     ..Default::default()
 * })
 * .unwrap();
 *
 * editor
 *     .insert_blocks(vec![PartialBlock::paragraph("hello")], "p1", Placement::After)
 *     .unwrap();
 *
 * let blocks = editor.top_level_blocks().unwrap();
 * assert_eq!(blocks.len(), 2);
 * assert_eq!(blocks[1].text(), "hello");
 * ```
 */

pub mod commands;
pub mod convert;
pub mod editor;
pub mod invariants;
pub mod navigation;
pub mod patch;
pub mod resolve;
pub mod selection;
pub mod transform;

pub use commands::{Cmd, CommandContext, Placement};
pub use convert::{BlockCache, block_to_node, node_to_block};
pub use editor::{BlockEditor, EditorEvent, EditorOptions, IdStrategy};
pub use navigation::{find_next_block, find_previous_block, for_each_block};
pub use patch::Patch;
pub use resolve::{BlockInfo, NodeWithPos, get_block_info_by_id, get_block_info_from_pos, get_node_by_id};
pub use selection::{CursorPlacement, Selection, TextCursorPosition};
pub use transform::{Bias, Step, TextSelection, Transaction};
