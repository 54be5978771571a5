//! Logical block model handed to consumers.
//!
//! Everything here is a snapshot freshly derived from the node tree; holding
//! a [`Block`] never keeps the document alive or tracks later edits.

use serde::{Deserialize, Serialize};

use crate::schema::{BlockType, Props};

/// One addressable block with its inline content and nested children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(default)]
    pub props: Props,
    #[serde(default)]
    pub content: Vec<InlineContent>,
    #[serde(default)]
    pub children: Vec<Block>,
}

impl Block {
    /// Plain text of the block's own inline content.
    pub fn text(&self) -> String {
        inline_text(&self.content)
    }

    pub fn prop(&self, name: &str) -> Option<&str> {
        self.props.get(name).map(String::as_str)
    }
}

/// Block description used for inserts and updates. Omitted fields fall back
/// to defaults on insert and to the existing values on update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub block_type: Option<BlockType>,
    #[serde(default, skip_serializing_if = "Props::is_empty")]
    pub props: Props,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<InlineContent>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<PartialBlock>>,
}

impl PartialBlock {
    pub fn new(block_type: BlockType) -> Self {
        Self {
            block_type: Some(block_type),
            ..Self::default()
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::new(BlockType::Paragraph).with_text(text)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_prop(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_content(vec![InlineContent::text(text)])
    }

    pub fn with_content(mut self, content: Vec<InlineContent>) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_children(mut self, children: Vec<PartialBlock>) -> Self {
        self.children = Some(children);
        self
    }
}

impl From<Block> for PartialBlock {
    fn from(block: Block) -> Self {
        Self {
            id: Some(block.id),
            block_type: Some(block.block_type),
            props: block.props,
            content: Some(block.content),
            children: Some(block.children.into_iter().map(PartialBlock::from).collect()),
        }
    }
}

/// Inline span inside a block's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InlineContent {
    Text(StyledText),
    Link {
        href: String,
        content: Vec<StyledText>,
    },
    InlineEmbed {
        link: String,
    },
}

impl InlineContent {
    pub fn text(text: impl Into<String>) -> Self {
        InlineContent::Text(StyledText::plain(text))
    }

    pub fn styled(text: impl Into<String>, styles: Styles) -> Self {
        InlineContent::Text(StyledText {
            text: text.into(),
            styles,
        })
    }

    pub fn link(href: impl Into<String>, text: impl Into<String>) -> Self {
        InlineContent::Link {
            href: href.into(),
            content: vec![StyledText::plain(text)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyledText {
    pub text: String,
    #[serde(default)]
    pub styles: Styles,
}

impl StyledText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            styles: Styles::default(),
        }
    }
}

/// Style set of a text run. Toggle styles are booleans, color styles carry
/// their value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Styles {
    #[serde(default, skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub underline: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub strike: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub code: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Styles {
    pub fn bold() -> Self {
        Self {
            bold: true,
            ..Self::default()
        }
    }

    pub fn italic() -> Self {
        Self {
            italic: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// True when every style set in `other` is also set here.
    pub fn contains(&self, other: &Styles) -> bool {
        (!other.bold || self.bold)
            && (!other.italic || self.italic)
            && (!other.underline || self.underline)
            && (!other.strike || self.strike)
            && (!other.code || self.code)
            && (other.text_color.is_none() || self.text_color == other.text_color)
            && (other.background_color.is_none() || self.background_color == other.background_color)
    }
}

/// Concatenated text of an inline sequence; embeds contribute nothing.
pub fn inline_text(content: &[InlineContent]) -> String {
    let mut text = String::new();
    for item in content {
        match item {
            InlineContent::Text(run) => text.push_str(&run.text),
            InlineContent::Link { content, .. } => {
                content.iter().for_each(|run| text.push_str(&run.text))
            }
            InlineContent::InlineEmbed { .. } => {}
        }
    }
    text
}
