//! Conversion between logical blocks and physical container subtrees.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use log::trace;

use crate::error::{EngineError, Result};
use crate::ids::IdAllocator;
use crate::model::{Block, InlineContent, PartialBlock, StyledText, Styles, inline_text};
use crate::node::{Attrs, ID_ATTR, LINK_ATTR, Mark, Node, NodeKind, NodeStamp, Visit, normalize_inline};
use crate::schema::{BlockSchema, BlockSpec, BlockType, CHILDREN_TYPE_PROP, ChildrenType, ContentPolicy, Props};

/// Memoized `node_to_block` results keyed by container stamp.
///
/// A stamp names one immutable version of a subtree, so an entry can never
/// go stale; it only becomes unreachable once its container is edited.
#[derive(Debug, Default)]
pub struct BlockCache {
    entries: RefCell<HashMap<NodeStamp, Block>>,
}

impl BlockCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, stamp: NodeStamp) -> Option<Block> {
        self.entries.borrow().get(&stamp).cloned()
    }

    fn insert(&self, stamp: NodeStamp, block: Block) {
        self.entries.borrow_mut().insert(stamp, block);
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries whose container no longer exists in `doc`.
    pub fn prune(&self, doc: &Node) {
        let mut live = HashSet::new();
        doc.descendants(|node, _| {
            if node.is_container() {
                live.insert(node.stamp());
            }
            if node.is_content() {
                Visit::Skip
            } else {
                Visit::Descend
            }
        });
        self.entries
            .borrow_mut()
            .retain(|stamp, _| live.contains(stamp));
    }
}

/// Build the container subtree for `block`, claiming IDs from `ids`.
pub fn block_to_node(
    block: &PartialBlock,
    schema: &BlockSchema,
    ids: &mut IdAllocator<'_>,
) -> Result<Node> {
    block_to_node_in(block, schema, ids, 0)
}

/// Like [`block_to_node`] for a block sitting in a list group of level
/// `parent_list_level` (0 outside lists).
pub(crate) fn block_to_node_in(
    block: &PartialBlock,
    schema: &BlockSchema,
    ids: &mut IdAllocator<'_>,
    parent_list_level: usize,
) -> Result<Node> {
    let block_type = block.block_type.unwrap_or(BlockType::Paragraph);
    let spec = schema.spec(block_type)?;
    let props = spec.resolve_props(&Props::new(), &block.props)?;
    let id = ids.claim(block.id.as_deref())?;

    let content = content_node(spec, &props, block.content.as_deref().unwrap_or_default());

    let group = match block.children.as_deref() {
        Some(children) if !children.is_empty() => {
            let list_type = children_type(&props);
            let level = parent_list_level + 1;
            let inner_level = if list_type.is_list() { level } else { 0 };
            let nodes = children
                .iter()
                .map(|child| block_to_node_in(child, schema, ids, inner_level))
                .collect::<Result<Vec<_>>>()?;
            Some(Node::group(list_type, level, nodes))
        }
        _ => None,
    };

    Ok(Node::container(container_attrs(&id, &props), content, group))
}

/// Content node of type `spec.block_type` holding `content` as allowed by
/// the type's content policy.
pub(crate) fn content_node(spec: &BlockSpec, props: &Props, content: &[InlineContent]) -> Node {
    Node::content(
        spec.block_type,
        props.clone(),
        inline_content_to_nodes(content, spec.content),
    )
}

pub(crate) fn container_attrs(id: &str, props: &Props) -> Attrs {
    let mut attrs = props.clone();
    attrs.insert(ID_ATTR.to_string(), id.to_string());
    attrs
}

/// Props stored on a container, without its ID.
pub(crate) fn stored_props(container: &Node) -> Props {
    let mut props = container.attrs().clone();
    props.remove(ID_ATTR);
    props
}

pub(crate) fn children_type(props: &Props) -> ChildrenType {
    props
        .get(CHILDREN_TYPE_PROP)
        .and_then(|value| value.parse().ok())
        .unwrap_or_default()
}

/// Read the block rooted at a container node.
pub fn node_to_block(
    container: &Node,
    schema: &BlockSchema,
    cache: Option<&BlockCache>,
) -> Result<Block> {
    if let Some(cache) = cache
        && let Some(block) = cache.get(container.stamp())
    {
        trace!("block cache hit for {:?}", container.stamp());
        return Ok(block);
    }

    let id = container
        .block_id()
        .ok_or_else(|| EngineError::structure(format!("{:?} is not a block", container.kind())))?;
    let block_type = container
        .content_node()
        .and_then(|content| content.kind().block_type())
        .ok_or_else(|| EngineError::structure(format!("block {id} has no content node")))?;
    let spec = schema.spec(block_type)?;
    let props = spec.resolve_props(&stored_props(container), &Props::new())?;

    let content = match (spec.content, container.content_node()) {
        (ContentPolicy::Empty, _) | (_, None) => Vec::new(),
        (_, Some(content)) => content_node_to_inline_content(content),
    };

    let children = match container.group_node() {
        Some(group) => group
            .children()
            .iter()
            .map(|child| node_to_block(child, schema, cache))
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    let block = Block {
        id: id.to_string(),
        block_type,
        props,
        content,
        children,
    };
    if let Some(cache) = cache {
        trace!("block cache miss for {id}");
        cache.insert(container.stamp(), block.clone());
    }
    Ok(block)
}

/// Flatten inline content into text and embed nodes for a content policy.
pub fn inline_content_to_nodes(content: &[InlineContent], policy: ContentPolicy) -> Vec<Node> {
    match policy {
        ContentPolicy::Empty => Vec::new(),
        ContentPolicy::PlainText => {
            let text = inline_text(content);
            if text.is_empty() {
                Vec::new()
            } else {
                vec![Node::text(text, Vec::new())]
            }
        }
        ContentPolicy::Inline => {
            let mut nodes = Vec::new();
            for item in content {
                match item {
                    InlineContent::Text(run) => {
                        nodes.push(Node::text(run.text.clone(), styles_to_marks(&run.styles)));
                    }
                    InlineContent::Link { href, content } => {
                        for run in content {
                            let mut marks = styles_to_marks(&run.styles);
                            marks.push(Mark::Link(href.clone()));
                            nodes.push(Node::text(run.text.clone(), marks));
                        }
                    }
                    InlineContent::InlineEmbed { link } => {
                        nodes.push(Node::inline_embed(link.clone()));
                    }
                }
            }
            normalize_inline(nodes)
        }
    }
}

/// Read a content node's children back into inline content. Link-marked
/// runs are regrouped into link spans.
pub fn content_node_to_inline_content(content: &Node) -> Vec<InlineContent> {
    let mut out: Vec<InlineContent> = Vec::new();
    for node in content.children() {
        match node.kind() {
            NodeKind::Text => {
                let run = StyledText {
                    text: node.text_str().to_string(),
                    styles: marks_to_styles(node.marks()),
                };
                match link_href(node.marks()) {
                    Some(href) => push_link_run(&mut out, href, run),
                    None => push_text_run(&mut out, run),
                }
            }
            NodeKind::InlineEmbed => out.push(InlineContent::InlineEmbed {
                link: node.attr(LINK_ATTR).unwrap_or_default().to_string(),
            }),
            _ => {}
        }
    }
    out
}

fn push_text_run(out: &mut Vec<InlineContent>, run: StyledText) {
    if let Some(InlineContent::Text(last)) = out.last_mut()
        && last.styles == run.styles
    {
        last.text.push_str(&run.text);
        return;
    }
    out.push(InlineContent::Text(run));
}

fn push_link_run(out: &mut Vec<InlineContent>, href: &str, run: StyledText) {
    if let Some(InlineContent::Link {
        href: last_href,
        content,
    }) = out.last_mut()
        && last_href == href
    {
        match content.last_mut() {
            Some(last) if last.styles == run.styles => last.text.push_str(&run.text),
            _ => content.push(run),
        }
        return;
    }
    out.push(InlineContent::Link {
        href: href.to_string(),
        content: vec![run],
    });
}

fn link_href(marks: &[Mark]) -> Option<&str> {
    marks.iter().find_map(|mark| match mark {
        Mark::Link(href) => Some(href.as_str()),
        _ => None,
    })
}

pub(crate) fn styles_to_marks(styles: &Styles) -> Vec<Mark> {
    let mut marks = Vec::new();
    if styles.bold {
        marks.push(Mark::Bold);
    }
    if styles.italic {
        marks.push(Mark::Italic);
    }
    if styles.underline {
        marks.push(Mark::Underline);
    }
    if styles.strike {
        marks.push(Mark::Strike);
    }
    if styles.code {
        marks.push(Mark::Code);
    }
    if let Some(color) = &styles.text_color {
        marks.push(Mark::TextColor(color.clone()));
    }
    if let Some(color) = &styles.background_color {
        marks.push(Mark::BackgroundColor(color.clone()));
    }
    marks
}

pub(crate) fn marks_to_styles(marks: &[Mark]) -> Styles {
    let mut styles = Styles::default();
    for mark in marks {
        match mark {
            Mark::Bold => styles.bold = true,
            Mark::Italic => styles.italic = true,
            Mark::Underline => styles.underline = true,
            Mark::Strike => styles.strike = true,
            Mark::Code => styles.code = true,
            Mark::TextColor(color) => styles.text_color = Some(color.clone()),
            Mark::BackgroundColor(color) => styles.background_color = Some(color.clone()),
            Mark::Link(_) => {}
        }
    }
    styles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::MonotonicIdGenerator;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn convert(block: &PartialBlock) -> Node {
        let mut generator = MonotonicIdGenerator::new("id");
        let mut ids = IdAllocator::new(&mut generator, HashSet::new());
        block_to_node(block, &BlockSchema::hypermedia(), &mut ids).unwrap()
    }

    fn read(node: &Node) -> Block {
        node_to_block(node, &BlockSchema::hypermedia(), None).unwrap()
    }

    fn full_block(block_type: BlockType, id: &str) -> Block {
        let schema = BlockSchema::hypermedia();
        Block {
            id: id.to_string(),
            block_type,
            props: schema.spec(block_type).unwrap().defaults(),
            content: vec![],
            children: vec![],
        }
    }

    #[test]
    fn test_paragraph_layout() {
        let node = convert(&PartialBlock::paragraph("hello").with_id("p1"));

        assert_eq!(node.block_id(), Some("p1"));
        let content = node.content_node().unwrap();
        assert_eq!(content.kind(), NodeKind::Content(BlockType::Paragraph));
        assert_eq!(content.text_content(), "hello");
        assert!(node.group_node().is_none());
        assert_eq!(node.attr("textAlignment"), Some("left"));
    }

    #[test]
    fn test_children_build_group_with_list_type() {
        let block = PartialBlock::paragraph("parent")
            .with_prop(CHILDREN_TYPE_PROP, "Ordered")
            .with_children(vec![
                PartialBlock::paragraph("one").with_children(vec![PartialBlock::paragraph(
                    "deep",
                )]),
                PartialBlock::paragraph("two"),
            ]);
        let node = convert(&block);

        let group = node.group_node().unwrap();
        assert_eq!(group.list_type(), ChildrenType::Ordered);
        assert_eq!(group.list_level(), 1);
        assert_eq!(group.child_count(), 2);
        let nested = group.children()[0].group_node().unwrap();
        assert_eq!(nested.list_level(), 2);
    }

    #[test]
    fn test_empty_children_build_no_group() {
        let node = convert(&PartialBlock::paragraph("x").with_children(vec![]));
        assert!(node.group_node().is_none());
    }

    #[test]
    fn test_generated_ids_for_nested_blocks() {
        let block = PartialBlock::paragraph("a").with_children(vec![PartialBlock::paragraph("b")]);
        let node = convert(&block);
        assert_eq!(node.block_id(), Some("id1"));
        assert_eq!(node.group_node().unwrap().children()[0].block_id(), Some("id2"));
    }

    #[test]
    fn test_unknown_prop_is_rejected() {
        let mut generator = MonotonicIdGenerator::new("id");
        let mut ids = IdAllocator::new(&mut generator, HashSet::new());
        let block = PartialBlock::paragraph("x").with_prop("level", "2");

        let err = block_to_node(&block, &BlockSchema::hypermedia(), &mut ids).unwrap_err();
        assert!(matches!(err, EngineError::UnknownProp { .. }));
    }

    #[test]
    fn test_round_trip_styled_content_and_children() {
        let mut parent = full_block(BlockType::Heading, "h1");
        parent.props.insert("level".into(), "2".into());
        parent.props.insert(CHILDREN_TYPE_PROP.into(), "Unordered".into());
        parent.content = vec![
            InlineContent::styled("Big ", Styles::bold()),
            InlineContent::Link {
                href: "https://example.com".into(),
                content: vec![
                    StyledText::plain("plain "),
                    StyledText {
                        text: "italic".into(),
                        styles: Styles::italic(),
                    },
                ],
            },
            InlineContent::InlineEmbed {
                link: "hm://doc".into(),
            },
            InlineContent::styled(
                " red",
                Styles {
                    text_color: Some("red".into()),
                    ..Styles::default()
                },
            ),
        ];
        let mut child = full_block(BlockType::Paragraph, "c1");
        child.content = vec![InlineContent::text("child")];
        parent.children = vec![child];

        let node = convert(&PartialBlock::from(parent.clone()));

        assert_eq!(read(&node), parent);
    }

    #[rstest]
    #[case(BlockType::Video)]
    #[case(BlockType::File)]
    #[case(BlockType::Embed)]
    #[case(BlockType::Query)]
    fn test_container_only_types_have_empty_content(#[case] block_type: BlockType) {
        let block = PartialBlock::new(block_type)
            .with_id("m")
            .with_text("ignored");
        let node = convert(&block);

        assert_eq!(node.content_node().unwrap().child_count(), 0);
        assert_eq!(read(&node).content, vec![]);
    }

    #[test]
    fn test_plain_text_policy_drops_styles() {
        let block = PartialBlock::new(BlockType::CodeBlock).with_content(vec![
            InlineContent::styled("let x", Styles::bold()),
            InlineContent::text(" = 1;"),
        ]);
        let node = convert(&block);
        let content = node.content_node().unwrap();

        assert_eq!(content.child_count(), 1);
        assert!(content.children()[0].marks().is_empty());
        assert_eq!(read(&node).content, vec![InlineContent::text("let x = 1;")]);
    }

    #[test]
    fn test_adjacent_equal_runs_merge() {
        let block = PartialBlock::paragraph("").with_content(vec![
            InlineContent::text("a"),
            InlineContent::text(""),
            InlineContent::text("b"),
        ]);
        assert_eq!(read(&convert(&block)).content, vec![InlineContent::text("ab")]);
    }

    #[test]
    fn test_cache_serves_unchanged_subtrees() {
        let schema = BlockSchema::hypermedia();
        let cache = BlockCache::new();
        let node = convert(&PartialBlock::paragraph("a").with_children(vec![PartialBlock::paragraph("b")]));
        let doc = Node::doc(Node::group(ChildrenType::Group, 1, vec![node.clone()]));

        let first = node_to_block(&node, &schema, Some(&cache)).unwrap();
        assert_eq!(cache.len(), 2);
        let second = node_to_block(&node, &schema, Some(&cache)).unwrap();
        assert_eq!(first, second);

        cache.prune(&doc);
        assert_eq!(cache.len(), 2);
        cache.prune(&Node::doc(Node::group(
            ChildrenType::Group,
            1,
            vec![convert(&PartialBlock::paragraph("other"))],
        )));
        assert!(cache.is_empty());
    }
}
