use std::path::PathBuf;

use anyhow::Result;
use hyperblocks_config::{Config, IdStrategyName};
use hyperblocks_engine::editing::{CursorPlacement, TextSelection};
use hyperblocks_engine::{
    Block, BlockEditor, BlockType, ChildrenType, EditorOptions, IdStrategy, PartialBlock, Placement,
    Styles, io,
};
use log::info;

/// One line of the outline view.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: String,
    pub depth: usize,
    /// List bullet, number or quote bar from the parent's group.
    pub marker: String,
    pub label: String,
}

pub struct App {
    pub editor: BlockEditor,
    pub path: PathBuf,
    pub rows: Vec<Row>,
    pub selected: usize,
    pub status: String,
    saved_version: u64,
}

pub fn editor_options(config: &Config, initial_content: Vec<PartialBlock>) -> EditorOptions {
    let id_strategy = match config.editor.id_strategy {
        IdStrategyName::Random => IdStrategy::Random,
        IdStrategyName::Monotonic => IdStrategy::Monotonic {
            prefix: config.editor.id_prefix.clone(),
        },
    };
    EditorOptions {
        id_strategy,
        trailing_block: config.editor.trailing_block,
        block_cache: config.editor.block_cache,
        initial_content,
    }
}

impl App {
    /// Load `path`, or start an empty document when it does not exist yet.
    pub fn open(path: PathBuf, config: &Config) -> Result<Self> {
        let content = if path.exists() {
            io::read_document(&path)?
        } else {
            Vec::new()
        };
        info!("opening {} ({} top-level blocks)", path.display(), content.len());
        let editor = BlockEditor::new(editor_options(config, content))?;
        let mut app = Self {
            editor,
            path,
            rows: Vec::new(),
            selected: 0,
            status: String::new(),
            saved_version: 0,
        };
        app.refresh()?;
        Ok(app)
    }

    pub fn is_dirty(&self) -> bool {
        self.editor.version() != self.saved_version
    }

    pub fn selected_id(&self) -> Option<String> {
        self.rows.get(self.selected).map(|row| row.id.clone())
    }

    /// Rebuild the rows and follow the editor's cursor.
    fn refresh(&mut self) -> Result<()> {
        let mut rows = Vec::new();
        flatten(&self.editor.top_level_blocks()?, 0, ChildrenType::Group, &mut rows);
        self.rows = rows;
        let cursor = self.editor.get_text_cursor_position()?;
        self.selected = self
            .rows
            .iter()
            .position(|row| row.id == cursor.block.id)
            .unwrap_or(0);
        Ok(())
    }

    fn focus(&mut self, index: usize) -> Result<()> {
        if let Some(id) = self.rows.get(index).map(|row| row.id.clone()) {
            self.editor.set_text_cursor_position(&id, CursorPlacement::End)?;
            self.selected = index;
        }
        Ok(())
    }

    pub fn next(&mut self) -> Result<()> {
        if self.selected + 1 < self.rows.len() {
            self.focus(self.selected + 1)?;
        }
        Ok(())
    }

    pub fn previous(&mut self) -> Result<()> {
        if self.selected > 0 {
            self.focus(self.selected - 1)?;
        }
        Ok(())
    }

    /// Insert an empty paragraph after the selected block and select it.
    pub fn open_below(&mut self) -> Result<()> {
        let Some(id) = self.selected_id() else {
            return Ok(());
        };
        let inserted = self.editor.insert_blocks(
            vec![PartialBlock::new(BlockType::Paragraph)],
            &id,
            Placement::After,
        )?;
        if let Some(block) = inserted.first() {
            self.editor.set_text_cursor_position(&block.id, CursorPlacement::Start)?;
        }
        self.refresh()
    }

    pub fn remove(&mut self) -> Result<()> {
        if let Some(id) = self.selected_id() {
            self.editor.remove_blocks(&[id])?;
            self.refresh()?;
        }
        Ok(())
    }

    pub fn nest(&mut self) -> Result<()> {
        if !self.editor.can_nest_block() {
            self.status = "Nothing to nest under".to_string();
            return Ok(());
        }
        self.editor.nest_block()?;
        self.refresh()
    }

    pub fn unnest(&mut self) -> Result<()> {
        if !self.editor.can_unnest_block() {
            self.status = "Already at the top level".to_string();
            return Ok(());
        }
        self.editor.unnest_block()?;
        self.refresh()
    }

    pub fn split(&mut self) -> Result<()> {
        self.editor.split_block()?;
        self.refresh()
    }

    /// Switch the selected block between paragraph and heading.
    pub fn toggle_heading(&mut self) -> Result<()> {
        let Some(id) = self.selected_id() else {
            return Ok(());
        };
        let Some(block) = self.editor.get_block(&id)? else {
            return Ok(());
        };
        let update = match block.block_type {
            BlockType::Heading => PartialBlock::new(BlockType::Paragraph),
            _ => PartialBlock::new(BlockType::Heading).with_prop("level", "1"),
        };
        self.editor.update_block(&id, update, true)?;
        self.refresh()
    }

    /// Cycle the selected block's children through the group kinds.
    pub fn cycle_list(&mut self) -> Result<()> {
        let Some(id) = self.selected_id() else {
            return Ok(());
        };
        let Some(block) = self.editor.get_block(&id)? else {
            return Ok(());
        };
        let current = block
            .prop("childrenType")
            .and_then(|value| value.parse().ok())
            .unwrap_or_default();
        let next = match current {
            ChildrenType::Group => ChildrenType::Unordered,
            ChildrenType::Unordered => ChildrenType::Ordered,
            ChildrenType::Ordered => ChildrenType::Blockquote,
            ChildrenType::Blockquote => ChildrenType::Group,
        };
        self.editor.update_group(&id, next)?;
        self.status = format!("Children: {next}");
        self.refresh()
    }

    /// Toggle bold over the whole text of the selected block.
    pub fn toggle_bold(&mut self) -> Result<()> {
        let Some(id) = self.selected_id() else {
            return Ok(());
        };
        self.editor.set_text_cursor_position(&id, CursorPlacement::Start)?;
        let start = self.editor.selection().head;
        self.editor.set_text_cursor_position(&id, CursorPlacement::End)?;
        let end = self.editor.selection().head;
        if start == end {
            return Ok(());
        }
        self.editor.set_selection(TextSelection::new(start, end))?;
        self.editor.toggle_styles(Styles::bold())?;
        self.editor.set_text_cursor_position(&id, CursorPlacement::End)?;
        self.refresh()
    }

    pub fn save(&mut self) -> Result<()> {
        io::write_document(&self.path, &self.editor.top_level_blocks()?)?;
        self.saved_version = self.editor.version();
        self.status = format!("Saved {}", self.path.display());
        info!("saved {} at version {}", self.path.display(), self.saved_version);
        Ok(())
    }
}

fn flatten(blocks: &[Block], depth: usize, group: ChildrenType, rows: &mut Vec<Row>) {
    for (index, block) in blocks.iter().enumerate() {
        let marker = match group {
            ChildrenType::Group => String::new(),
            ChildrenType::Unordered => "•".to_string(),
            ChildrenType::Ordered => format!("{}.", index + 1),
            ChildrenType::Blockquote => "│".to_string(),
        };
        rows.push(Row {
            id: block.id.clone(),
            depth,
            marker,
            label: label(block),
        });
        let children_type = block
            .prop("childrenType")
            .and_then(|value| value.parse().ok())
            .unwrap_or_default();
        flatten(&block.children, depth + 1, children_type, rows);
    }
}

fn label(block: &Block) -> String {
    let url = block.prop("url").unwrap_or_default();
    match block.block_type {
        BlockType::Heading => {
            let level = block.prop("level").and_then(|l| l.parse::<usize>().ok()).unwrap_or(1);
            format!("{} {}", "#".repeat(level), block.text())
        }
        BlockType::Paragraph | BlockType::CodeBlock | BlockType::Math => block.text(),
        other => format!("[{other}] {url}"),
    }
}
