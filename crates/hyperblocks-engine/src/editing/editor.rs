use std::collections::HashSet;
use std::ops::Range;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::ids::{IdAllocator, IdGenerator, MonotonicIdGenerator, RandomIdGenerator};
use crate::model::{Block, PartialBlock, Styles};
use crate::node::Node;
use crate::schema::{BlockSchema, BlockType, ChildrenType};

use super::commands::{
    self, CommandContext, Cmd, Placement, can_nest_block, can_unnest_block, get_active_styles,
    get_selected_link_url, get_selected_text,
};
use super::convert::{BlockCache, block_to_node, node_to_block};
use super::invariants;
use super::navigation::{find_next_block, find_previous_block, for_each_block};
use super::patch::Patch;
use super::resolve::{collect_ids, get_block_info_by_id, get_node_by_id, get_parent_group_info};
use super::selection::{
    CursorPlacement, Selection, TextCursorPosition, get_selection, get_text_cursor_position,
    normalize_selection, set_text_cursor_position,
};
use super::transform::{TextSelection, Transaction};

/// Where new block IDs come from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum IdStrategy {
    #[default]
    Random,
    Monotonic { prefix: String },
}

impl IdStrategy {
    /// Generator for a document starting out as `initial`. Monotonic IDs
    /// continue after the highest one already present.
    fn generator(&self, initial: &[PartialBlock]) -> Box<dyn IdGenerator> {
        match self {
            IdStrategy::Random => Box::new(RandomIdGenerator),
            IdStrategy::Monotonic { prefix } => {
                let mut existing = Vec::new();
                collect_explicit_ids(initial, &mut existing);
                Box::new(MonotonicIdGenerator::resume(
                    prefix.clone(),
                    existing.iter().map(String::as_str),
                ))
            }
        }
    }
}

fn collect_explicit_ids(blocks: &[PartialBlock], out: &mut Vec<String>) {
    for block in blocks {
        out.extend(block.id.clone());
        collect_explicit_ids(block.children.as_deref().unwrap_or_default(), out);
    }
}

#[derive(Debug, Clone, Default)]
pub struct EditorOptions {
    pub id_strategy: IdStrategy,
    /// Keep an empty paragraph at the end of the document.
    pub trailing_block: bool,
    /// Memoize block reads between edits.
    pub block_cache: bool,
    pub initial_content: Vec<PartialBlock>,
}

/// Notification sent to listeners after a dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    ContentChanged {
        version: u64,
        changed: Vec<Range<usize>>,
    },
    SelectionChanged {
        selection: TextSelection,
    },
}

type Listener = Box<dyn FnMut(&EditorEvent)>;

/// Owns one block document and the state around it.
///
/// All edits run as a single [`Transaction`] that is checked against the
/// document invariants before it replaces the current document. A failing
/// command leaves document, selection and version untouched.
pub struct BlockEditor {
    doc: Node,
    selection: TextSelection,
    version: u64,
    schema: BlockSchema,
    ids: Box<dyn IdGenerator>,
    cache: Option<BlockCache>,
    trailing_block: bool,
    content_listeners: Vec<Listener>,
    selection_listeners: Vec<Listener>,
}

impl BlockEditor {
    pub fn new(options: EditorOptions) -> Result<Self> {
        let ids = options.id_strategy.generator(&options.initial_content);
        Self::with_id_generator(options, ids)
    }

    /// Build an editor that draws new IDs from `ids` instead of the
    /// strategy named in `options`.
    pub fn with_id_generator(options: EditorOptions, mut ids: Box<dyn IdGenerator>) -> Result<Self> {
        let schema = BlockSchema::hypermedia();
        let group = top_group(&options.initial_content, &schema, ids.as_mut())?;
        let mut editor = Self {
            doc: Node::doc(group),
            selection: TextSelection::cursor(FIRST_CONTENT_POS),
            version: 0,
            schema,
            ids,
            cache: options.block_cache.then(BlockCache::new),
            trailing_block: options.trailing_block,
            content_listeners: Vec::new(),
            selection_listeners: Vec::new(),
        };

        if editor.trailing_block {
            let mut tr = Transaction::new(&editor.doc);
            ensure_trailing_block(&mut tr, &editor.schema, editor.ids.as_mut())?;
            editor.doc = tr.into_parts().0;
        }
        invariants::check(&editor.doc, &editor.schema)?;
        Ok(editor)
    }

    pub fn document(&self) -> &Node {
        &self.doc
    }

    pub fn selection(&self) -> TextSelection {
        self.selection
    }

    /// Number of committed content changes.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn schema(&self) -> &BlockSchema {
        &self.schema
    }

    fn read(&self, container: &Node) -> Result<Block> {
        node_to_block(container, &self.schema, self.cache.as_ref())
    }

    pub fn top_level_blocks(&self) -> Result<Vec<Block>> {
        match self.doc.first_child() {
            Some(group) => group.children().iter().map(|node| self.read(node)).collect(),
            None => Ok(Vec::new()),
        }
    }

    pub fn get_block(&self, id: &str) -> Result<Option<Block>> {
        match get_node_by_id(id, &self.doc) {
            Ok(found) => self.read(found.node).map(Some),
            Err(EngineError::BlockNotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// The block before `id` in document order.
    pub fn get_prev_block(&self, id: &str) -> Result<Option<Block>> {
        let Ok(found) = get_node_by_id(id, &self.doc) else {
            return Ok(None);
        };
        match find_previous_block(&self.doc, found.pos_before)? {
            Some(prev) => self.read(prev.node).map(Some),
            None => Ok(None),
        }
    }

    /// The block after `id` in document order.
    pub fn get_next_block(&self, id: &str) -> Result<Option<Block>> {
        let Ok(found) = get_node_by_id(id, &self.doc) else {
            return Ok(None);
        };
        match find_next_block(&self.doc, found.pos_before)? {
            Some(next) => self.read(next.node).map(Some),
            None => Ok(None),
        }
    }

    pub fn get_parent_block(&self, id: &str) -> Result<Option<Block>> {
        let Ok(info) = get_block_info_by_id(id, &self.doc) else {
            return Ok(None);
        };
        match get_parent_group_info(&self.doc, &info)?.group.parent {
            Some(parent) => self.read(parent.node).map(Some),
            None => Ok(None),
        }
    }

    /// Call `visit` for every block in document order (or its reverse)
    /// until it returns `false`.
    pub fn for_each_block(&self, reverse: bool, mut visit: impl FnMut(&Block) -> bool) -> Result<()> {
        let mut result = Ok(());
        for_each_block(&self.doc, reverse, |found| match self.read(found.node) {
            Ok(block) => visit(&block),
            Err(err) => {
                result = Err(err);
                false
            }
        });
        result
    }

    // ============ Commands ============

    /// Run `cmd` as one transaction and commit it.
    pub fn apply(&mut self, cmd: Cmd) -> Result<Patch> {
        self.run(|tr, cx| cmd.compile(tr, cx))
    }

    fn run(
        &mut self,
        command: impl FnOnce(&mut Transaction, &mut CommandContext<'_>) -> Result<Vec<String>>,
    ) -> Result<Patch> {
        let mut tr = Transaction::new(&self.doc);
        let mut cx = CommandContext {
            schema: &self.schema,
            ids: self.ids.as_mut(),
            selection: self.selection,
        };
        let blocks = command(&mut tr, &mut cx)?;
        self.commit(tr, blocks)
    }

    /// Commit a transaction built outside the command set.
    pub fn dispatch(&mut self, tr: Transaction) -> Result<Patch> {
        self.commit(tr, Vec::new())
    }

    fn commit(&mut self, mut tr: Transaction, blocks: Vec<String>) -> Result<Patch> {
        if self.trailing_block {
            ensure_trailing_block(&mut tr, &self.schema, self.ids.as_mut())?;
        }
        invariants::check(tr.doc(), &self.schema)?;

        let doc_changed = tr.doc_changed();
        let step_count = tr.steps().len();
        let selection = tr
            .selection()
            .unwrap_or_else(|| tr.map_selection(self.selection));
        let (doc, changed, _) = tr.into_parts();
        let selection = normalize_selection(&doc, selection);

        if doc_changed {
            self.doc = doc;
            self.version += 1;
            if let Some(cache) = &self.cache {
                cache.prune(&self.doc);
            }
            debug!(
                "committed version {} ({step_count} step(s), {} changed range(s))",
                self.version,
                changed.len()
            );
            let event = EditorEvent::ContentChanged {
                version: self.version,
                changed: changed.clone(),
            };
            for listener in &mut self.content_listeners {
                listener(&event);
            }
        }
        self.update_selection(selection);

        Ok(Patch {
            changed,
            new_selection: self.selection,
            version: self.version,
            blocks,
        })
    }

    fn update_selection(&mut self, selection: TextSelection) {
        if selection == self.selection {
            return;
        }
        self.selection = selection;
        let event = EditorEvent::SelectionChanged { selection };
        for listener in &mut self.selection_listeners {
            listener(&event);
        }
    }

    fn read_all(&self, ids: &[String]) -> Result<Vec<Block>> {
        ids.iter()
            .map(|id| self.read(get_node_by_id(id, &self.doc)?.node))
            .collect()
    }

    /// Insert `blocks` before or after `reference_id`; returns them as stored.
    pub fn insert_blocks(
        &mut self,
        blocks: Vec<PartialBlock>,
        reference_id: &str,
        placement: Placement,
    ) -> Result<Vec<Block>> {
        let patch = self.apply(Cmd::InsertBlocks {
            blocks,
            reference_id: reference_id.to_string(),
            placement,
        })?;
        self.read_all(&patch.blocks)
    }

    pub fn update_block(&mut self, id: &str, update: PartialBlock, keep_selection: bool) -> Result<Block> {
        self.apply(Cmd::UpdateBlock {
            id: id.to_string(),
            update,
            keep_selection,
        })?;
        self.read(get_node_by_id(id, &self.doc)?.node)
    }

    /// Remove `ids`; returns the removed blocks as they were.
    pub fn remove_blocks(&mut self, ids: &[String]) -> Result<Vec<Block>> {
        let old = self.doc.clone();
        let patch = self.apply(Cmd::RemoveBlocks { ids: ids.to_vec() })?;
        patch
            .blocks
            .iter()
            .map(|id| self.read(get_node_by_id(id, &old)?.node))
            .collect()
    }

    /// Replace `ids` with `blocks`; returns the inserted and the removed
    /// blocks.
    pub fn replace_blocks(
        &mut self,
        ids: &[String],
        blocks: Vec<PartialBlock>,
    ) -> Result<(Vec<Block>, Vec<Block>)> {
        let old = self.doc.clone();
        let mut removed_ids = Vec::new();
        let patch = self.run(|tr, cx| {
            let (inserted, removed) = commands::replace_blocks(tr, cx, ids, &blocks)?;
            removed_ids = removed;
            Ok(inserted)
        })?;
        let inserted = self.read_all(&patch.blocks)?;
        let removed = removed_ids
            .iter()
            .map(|id| self.read(get_node_by_id(id, &old)?.node))
            .collect::<Result<Vec<_>>>()?;
        Ok((inserted, removed))
    }

    /// Replace the whole document. The cursor moves to the first block.
    pub fn replace_all(&mut self, blocks: Vec<PartialBlock>) -> Result<Patch> {
        let mut tr = Transaction::new(&self.doc);
        let group = top_group(&blocks, &self.schema, self.ids.as_mut())?;
        let end = self.doc.content_size() - 1;
        tr.replace(1, end, group.children().to_vec())?;
        tr.set_selection(TextSelection::cursor(FIRST_CONTENT_POS));
        self.dispatch(tr)
    }

    pub fn can_nest_block(&self) -> bool {
        can_nest_block(&self.doc, self.selection)
    }

    pub fn can_unnest_block(&self) -> bool {
        can_unnest_block(&self.doc, self.selection)
    }

    pub fn nest_block(&mut self) -> Result<Patch> {
        self.apply(Cmd::NestBlock)
    }

    pub fn unnest_block(&mut self) -> Result<Patch> {
        self.apply(Cmd::UnnestBlock)
    }

    /// Split the cursor block at the cursor. Returns the ID of the new block.
    pub fn split_block(&mut self) -> Result<Option<String>> {
        let at = self.selection.head;
        let patch = self.apply(Cmd::SplitBlock { at })?;
        Ok(patch.blocks.into_iter().next())
    }

    pub fn update_group(&mut self, id: &str, children_type: ChildrenType) -> Result<Patch> {
        self.apply(Cmd::UpdateGroup {
            id: id.to_string(),
            children_type,
        })
    }

    /// ID of the empty paragraph at the end of the document, added if needed.
    pub fn add_block_at_end(&mut self) -> Result<String> {
        let patch = self.apply(Cmd::AddBlockAtEnd)?;
        patch
            .blocks
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::structure("no block at the end of the document"))
    }

    // ============ Styles ============

    pub fn get_active_styles(&self) -> Styles {
        get_active_styles(&self.doc, self.selection)
    }

    pub fn add_styles(&mut self, styles: Styles) -> Result<Patch> {
        self.apply(Cmd::AddStyles(styles))
    }

    pub fn remove_styles(&mut self, styles: Styles) -> Result<Patch> {
        self.apply(Cmd::RemoveStyles(styles))
    }

    pub fn toggle_styles(&mut self, styles: Styles) -> Result<Patch> {
        self.apply(Cmd::ToggleStyles(styles))
    }

    pub fn get_selected_text(&self) -> String {
        get_selected_text(&self.doc, self.selection)
    }

    pub fn get_selected_link_url(&self) -> Option<String> {
        get_selected_link_url(&self.doc, self.selection)
    }

    pub fn create_link(&mut self, url: &str, text: Option<&str>) -> Result<Patch> {
        self.apply(Cmd::CreateLink {
            url: url.to_string(),
            text: text.map(str::to_string),
        })
    }

    // ============ Selection ============

    pub fn get_text_cursor_position(&self) -> Result<TextCursorPosition> {
        get_text_cursor_position(&self.doc, &self.schema, self.cache.as_ref(), self.selection)
    }

    pub fn set_text_cursor_position(&mut self, id: &str, placement: CursorPlacement) -> Result<()> {
        let selection = set_text_cursor_position(&self.doc, id, placement)?;
        self.update_selection(selection);
        Ok(())
    }

    pub fn get_selection(&self) -> Result<Option<Selection>> {
        get_selection(&self.doc, &self.schema, self.cache.as_ref(), self.selection)
    }

    /// Move the selection; both ends are pulled into block content.
    pub fn set_selection(&mut self, selection: TextSelection) -> Result<()> {
        let size = self.doc.content_size();
        if selection.to() > size {
            return Err(EngineError::InvalidPosition {
                pos: selection.to(),
                size,
            });
        }
        self.update_selection(normalize_selection(&self.doc, selection));
        Ok(())
    }

    // ============ Hooks ============

    pub fn on_content_change(&mut self, listener: impl FnMut(&EditorEvent) + 'static) {
        self.content_listeners.push(Box::new(listener));
    }

    pub fn on_selection_change(&mut self, listener: impl FnMut(&EditorEvent) + 'static) {
        self.selection_listeners.push(Box::new(listener));
    }
}

/// Inside the content of the first block of any document.
const FIRST_CONTENT_POS: usize = 3;

/// Top-level group holding `blocks`, or a single empty paragraph.
fn top_group(blocks: &[PartialBlock], schema: &BlockSchema, ids: &mut dyn IdGenerator) -> Result<Node> {
    let placeholder = [PartialBlock::new(BlockType::Paragraph)];
    let blocks = if blocks.is_empty() { &placeholder[..] } else { blocks };
    let mut allocator = IdAllocator::new(ids, HashSet::new()).reserving(blocks);
    let nodes = blocks
        .iter()
        .map(|block| block_to_node(block, schema, &mut allocator))
        .collect::<Result<Vec<_>>>()?;
    Ok(Node::group(ChildrenType::Group, 1, nodes))
}

fn is_empty_paragraph(container: &Node) -> bool {
    container.group_node().is_none()
        && container.content_node().is_some_and(|content| {
            content.kind().block_type() == Some(BlockType::Paragraph) && content.child_count() == 0
        })
}

/// Append an empty paragraph unless the document already ends with one.
fn ensure_trailing_block(tr: &mut Transaction, schema: &BlockSchema, ids: &mut dyn IdGenerator) -> Result<()> {
    let doc = tr.doc();
    let Some(last) = doc.first_child().and_then(Node::last_child) else {
        return Ok(());
    };
    if is_empty_paragraph(last) {
        return Ok(());
    }
    let end = doc.content_size() - 1;
    let mut allocator = IdAllocator::new(ids, collect_ids(doc));
    let node = block_to_node(&PartialBlock::new(BlockType::Paragraph), schema, &mut allocator)?;
    tr.insert(end, vec![node])?;
    Ok(())
}
