//! Block-kind registry.
//!
//! Block types form a closed set. Each type maps to a [`BlockSpec`] that
//! declares its property schema and what its content node may hold. The
//! registry is built once per editor and consulted by the converter and the
//! commands instead of re-parsing type names on every call.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::error::{EngineError, Result};

/// Property map shared by the logical block and the physical nodes.
pub type Props = BTreeMap<String, String>;

/// Prop that mirrors the list kind of a block's child group.
pub const CHILDREN_TYPE_PROP: &str = "childrenType";

/// The block kinds the editor knows about.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum BlockType {
    Paragraph,
    Heading,
    CodeBlock,
    Math,
    Image,
    Video,
    File,
    Button,
    Embed,
    WebEmbed,
    Nostr,
    Query,
}

impl BlockType {
    /// Parse a type tag such as `"code-block"`.
    pub fn parse(tag: &str) -> Result<Self> {
        tag.parse()
            .map_err(|_| EngineError::UnknownBlockType(tag.to_string()))
    }
}

/// List kind carried by a group node.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum ChildrenType {
    #[default]
    Group,
    Ordered,
    Unordered,
    Blockquote,
}

impl ChildrenType {
    pub fn is_list(self) -> bool {
        matches!(self, ChildrenType::Ordered | ChildrenType::Unordered)
    }
}

/// What a content node of a given type may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentPolicy {
    /// Styled text runs, links and inline embeds.
    Inline,
    /// Unstyled text only.
    PlainText,
    /// Nothing: the block is carried entirely by its props.
    Empty,
}

/// Declared property with its default and optional value whitelist.
#[derive(Debug, Clone, PartialEq)]
pub struct PropSpec {
    pub name: &'static str,
    pub default: &'static str,
    pub values: Option<&'static [&'static str]>,
}

impl PropSpec {
    const fn new(name: &'static str, default: &'static str) -> Self {
        Self {
            name,
            default,
            values: None,
        }
    }

    const fn one_of(
        name: &'static str,
        default: &'static str,
        values: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            default,
            values: Some(values),
        }
    }

    fn accepts(&self, value: &str) -> bool {
        self.values.is_none_or(|values| values.contains(&value))
    }
}

const BOOLEAN: &[&str] = &["false", "true"];

const COMMON_PROPS: [PropSpec; 4] = [
    PropSpec::one_of(
        "textAlignment",
        "left",
        &["left", "center", "right", "justify"],
    ),
    PropSpec::new("textColor", "default"),
    PropSpec::new("backgroundColor", "default"),
    PropSpec::one_of(
        CHILDREN_TYPE_PROP,
        "Group",
        &["Group", "Ordered", "Unordered", "Blockquote"],
    ),
];

/// Schema entry for one block type.
#[derive(Debug, Clone)]
pub struct BlockSpec {
    pub block_type: BlockType,
    pub content: ContentPolicy,
    pub props: Vec<PropSpec>,
}

impl BlockSpec {
    pub fn new(block_type: BlockType, content: ContentPolicy, extra: Vec<PropSpec>) -> Self {
        let mut props = COMMON_PROPS.to_vec();
        props.extend(extra);
        Self {
            block_type,
            content,
            props,
        }
    }

    pub fn prop(&self, name: &str) -> Option<&PropSpec> {
        self.props.iter().find(|spec| spec.name == name)
    }

    /// Every declared prop at its default value.
    pub fn defaults(&self) -> Props {
        self.props
            .iter()
            .map(|spec| (spec.name.to_string(), spec.default.to_string()))
            .collect()
    }

    /// Check that every key is declared and every value allowed.
    pub fn validate(&self, props: &Props) -> Result<()> {
        for (name, value) in props {
            let Some(spec) = self.prop(name) else {
                return Err(EngineError::UnknownProp {
                    block_type: self.block_type.to_string(),
                    prop: name.clone(),
                });
            };
            if !spec.accepts(value) {
                return Err(EngineError::InvalidPropValue {
                    block_type: self.block_type.to_string(),
                    prop: name.clone(),
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    /// Resolve the full prop set: defaults, then the declared subset of
    /// `existing`, then the validated `update`.
    pub fn resolve_props(&self, existing: &Props, update: &Props) -> Result<Props> {
        self.validate(update)?;
        let mut props = self.defaults();
        for (name, value) in existing {
            if let Some(spec) = self.prop(name)
                && spec.accepts(value)
            {
                props.insert(name.clone(), value.clone());
            }
        }
        props.extend(update.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(props)
    }
}

/// Registry mapping block types to their specs.
#[derive(Debug, Clone)]
pub struct BlockSchema {
    specs: HashMap<BlockType, BlockSpec>,
}

impl BlockSchema {
    /// Build a registry from an explicit list of specs.
    pub fn new(specs: impl IntoIterator<Item = BlockSpec>) -> Self {
        Self {
            specs: specs
                .into_iter()
                .map(|spec| (spec.block_type, spec))
                .collect(),
        }
    }

    /// The hypermedia document schema: every [`BlockType`] registered.
    pub fn hypermedia() -> Self {
        Self::new(BlockType::iter().map(default_spec))
    }

    pub fn spec(&self, block_type: BlockType) -> Result<&BlockSpec> {
        self.specs
            .get(&block_type)
            .ok_or_else(|| EngineError::UnknownBlockType(block_type.to_string()))
    }

    pub fn contains(&self, block_type: BlockType) -> bool {
        self.specs.contains_key(&block_type)
    }
}

impl Default for BlockSchema {
    fn default() -> Self {
        Self::hypermedia()
    }
}

fn default_spec(block_type: BlockType) -> BlockSpec {
    use ContentPolicy::*;

    let (content, extra) = match block_type {
        BlockType::Paragraph => (Inline, vec![]),
        BlockType::Heading => (
            Inline,
            vec![PropSpec::one_of(
                "level",
                "1",
                &["1", "2", "3", "4", "5", "6"],
            )],
        ),
        BlockType::CodeBlock => (PlainText, vec![PropSpec::new("language", "")]),
        BlockType::Math => (PlainText, vec![]),
        BlockType::Image => (
            Inline,
            vec![
                PropSpec::new("url", ""),
                PropSpec::new("alt", ""),
                PropSpec::new("name", ""),
                PropSpec::new("width", ""),
                PropSpec::one_of("defaultOpen", "false", BOOLEAN),
            ],
        ),
        BlockType::Video => (
            Empty,
            vec![
                PropSpec::new("url", ""),
                PropSpec::new("src", ""),
                PropSpec::new("name", ""),
                PropSpec::new("width", ""),
                PropSpec::one_of("defaultOpen", "false", BOOLEAN),
            ],
        ),
        BlockType::File => (
            Empty,
            vec![
                PropSpec::new("url", ""),
                PropSpec::new("name", ""),
                PropSpec::new("size", ""),
                PropSpec::one_of("defaultOpen", "false", BOOLEAN),
            ],
        ),
        BlockType::Button => (
            Empty,
            vec![
                PropSpec::new("url", ""),
                PropSpec::new("name", ""),
                PropSpec::new("alignment", ""),
            ],
        ),
        BlockType::Embed => (
            Empty,
            vec![
                PropSpec::new("url", ""),
                PropSpec::one_of("view", "Content", &["Content", "Card"]),
                PropSpec::one_of("defaultOpen", "false", BOOLEAN),
            ],
        ),
        BlockType::WebEmbed => (
            Empty,
            vec![
                PropSpec::new("url", ""),
                PropSpec::one_of("defaultOpen", "false", BOOLEAN),
            ],
        ),
        BlockType::Nostr => (
            Empty,
            vec![
                PropSpec::new("name", ""),
                PropSpec::new("url", ""),
                PropSpec::new("text", ""),
                PropSpec::new("size", ""),
                PropSpec::one_of("defaultOpen", "true", BOOLEAN),
            ],
        ),
        BlockType::Query => (
            Empty,
            vec![
                PropSpec::one_of("style", "Card", &["Card", "List"]),
                PropSpec::new("columnCount", "3"),
                PropSpec::new("queryIncludes", "[]"),
                PropSpec::new("querySort", "{}"),
                PropSpec::one_of("banner", "false", BOOLEAN),
                PropSpec::new("queryLimit", ""),
            ],
        ),
    };

    BlockSpec::new(block_type, content, extra)
}
