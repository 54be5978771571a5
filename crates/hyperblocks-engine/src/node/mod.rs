//! Physical node tree.
//!
//! The editing surface stores a document as one tree of generic nodes laid
//! out as `doc > group > container+ > (content, group?)`. Positions count
//! tokens: entering or leaving a non-leaf node costs 1, every text character
//! costs 1 and an inline embed costs 1. Position 0 sits before the top-level
//! group, so the first container starts at position 1.
//!
//! Every node carries a [`NodeStamp`]. Stamps come from a process-wide
//! counter and are replaced whenever a node or anything below it changes, so
//! a stamp identifies one immutable version of a subtree.

mod resolved;

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::schema::{BlockType, ChildrenType, Props};

pub use resolved::{Level, ResolvedPos};

/// Attribute map of a node.
pub type Attrs = Props;

pub const ID_ATTR: &str = "id";
pub const LIST_TYPE_ATTR: &str = "listType";
pub const LIST_LEVEL_ATTR: &str = "listLevel";
pub const LINK_ATTR: &str = "link";

static NEXT_STAMP: AtomicU64 = AtomicU64::new(1);

/// Version stamp of one subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeStamp(u64);

impl NodeStamp {
    pub fn fresh() -> Self {
        NodeStamp(NEXT_STAMP.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Doc,
    Group,
    Container,
    Content(BlockType),
    Text,
    InlineEmbed,
}

impl NodeKind {
    pub fn is_leaf(self) -> bool {
        matches!(self, NodeKind::Text | NodeKind::InlineEmbed)
    }

    pub fn block_type(self) -> Option<BlockType> {
        match self {
            NodeKind::Content(block_type) => Some(block_type),
            _ => None,
        }
    }
}

/// Inline mark on a text node. Kept sorted, at most one of each kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Mark {
    Bold,
    Italic,
    Underline,
    Strike,
    Code,
    TextColor(String),
    BackgroundColor(String),
    Link(String),
}

impl Mark {
    pub fn same_kind(&self, other: &Mark) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Add `mark` to a sorted mark set, replacing any mark of the same kind.
pub fn add_mark(marks: &mut Vec<Mark>, mark: Mark) {
    marks.retain(|existing| !existing.same_kind(&mark));
    marks.push(mark);
    marks.sort();
}

/// Remove every mark of the same kind as `mark`.
pub fn remove_mark(marks: &mut Vec<Mark>, mark: &Mark) {
    marks.retain(|existing| !existing.same_kind(mark));
}

/// What a [`Node::descendants`] visitor wants to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Descend,
    Skip,
    Stop,
}

#[derive(Debug, Clone)]
pub struct Node {
    kind: NodeKind,
    attrs: Attrs,
    children: Vec<Node>,
    text: String,
    marks: Vec<Mark>,
    stamp: NodeStamp,
}

impl Node {
    fn new(kind: NodeKind, attrs: Attrs, children: Vec<Node>) -> Self {
        Self {
            kind,
            attrs,
            children,
            text: String::new(),
            marks: Vec::new(),
            stamp: NodeStamp::fresh(),
        }
    }

    pub fn doc(group: Node) -> Self {
        Self::new(NodeKind::Doc, Attrs::new(), vec![group])
    }

    pub fn group(list_type: ChildrenType, list_level: usize, containers: Vec<Node>) -> Self {
        let attrs = Attrs::from([
            (LIST_TYPE_ATTR.to_string(), list_type.to_string()),
            (LIST_LEVEL_ATTR.to_string(), list_level.max(1).to_string()),
        ]);
        Self::new(NodeKind::Group, attrs, containers)
    }

    pub fn container(attrs: Attrs, content: Node, group: Option<Node>) -> Self {
        let mut children = vec![content];
        children.extend(group);
        Self::new(NodeKind::Container, attrs, children)
    }

    pub fn content(block_type: BlockType, attrs: Attrs, inline: Vec<Node>) -> Self {
        Self::new(NodeKind::Content(block_type), attrs, inline)
    }

    pub fn text(text: impl Into<String>, mut marks: Vec<Mark>) -> Self {
        marks.sort();
        marks.dedup_by(|a, b| a.same_kind(b));
        Self {
            kind: NodeKind::Text,
            attrs: Attrs::new(),
            children: Vec::new(),
            text: text.into(),
            marks,
            stamp: NodeStamp::fresh(),
        }
    }

    pub fn inline_embed(link: impl Into<String>) -> Self {
        let attrs = Attrs::from([(LINK_ATTR.to_string(), link.into())]);
        Self::new(NodeKind::InlineEmbed, attrs, Vec::new())
    }

    /// Same node with another kind and attribute set. Children are kept.
    pub fn with_markup(&self, kind: NodeKind, attrs: Attrs) -> Self {
        Self {
            kind,
            attrs,
            children: self.children.clone(),
            text: self.text.clone(),
            marks: self.marks.clone(),
            stamp: NodeStamp::fresh(),
        }
    }

    /// Same node with a different child list.
    pub fn with_children(&self, children: Vec<Node>) -> Self {
        Self::new(self.kind, self.attrs.clone(), children)
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.children.get(index)
    }

    pub fn first_child(&self) -> Option<&Node> {
        self.children.first()
    }

    pub fn last_child(&self) -> Option<&Node> {
        self.children.last()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn text_str(&self) -> &str {
        &self.text
    }

    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    pub fn stamp(&self) -> NodeStamp {
        self.stamp
    }

    pub fn is_text(&self) -> bool {
        self.kind == NodeKind::Text
    }

    pub fn is_leaf(&self) -> bool {
        self.kind.is_leaf()
    }

    pub fn is_container(&self) -> bool {
        self.kind == NodeKind::Container
    }

    pub fn is_group(&self) -> bool {
        self.kind == NodeKind::Group
    }

    pub fn is_content(&self) -> bool {
        matches!(self.kind, NodeKind::Content(_))
    }

    /// Container ID, if this is a container carrying one.
    pub fn block_id(&self) -> Option<&str> {
        if self.is_container() {
            self.attr(ID_ATTR)
        } else {
            None
        }
    }

    pub fn list_type(&self) -> ChildrenType {
        self.attr(LIST_TYPE_ATTR)
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    pub fn list_level(&self) -> usize {
        self.attr(LIST_LEVEL_ATTR)
            .and_then(|value| value.parse().ok())
            .unwrap_or(1)
    }

    /// Content node of a container.
    pub fn content_node(&self) -> Option<&Node> {
        self.first_child().filter(|child| child.is_content())
    }

    /// Child group of a container.
    pub fn group_node(&self) -> Option<&Node> {
        self.child(1).filter(|child| child.is_group())
    }

    /// Number of positions this node occupies in its parent.
    pub fn node_size(&self) -> usize {
        match self.kind {
            NodeKind::Text => self.text.chars().count(),
            NodeKind::InlineEmbed => 1,
            _ => 2 + self.content_size(),
        }
    }

    /// Number of positions inside this node.
    pub fn content_size(&self) -> usize {
        if self.is_leaf() {
            return 0;
        }
        self.children.iter().map(Node::node_size).sum()
    }

    /// Walk all descendants in document order. `pos` passed to the visitor is
    /// the position before the visited node, relative to the start of this
    /// node's content.
    pub fn descendants<'a>(&'a self, mut visit: impl FnMut(&'a Node, usize) -> Visit) {
        self.walk(0, &mut visit);
    }

    fn walk<'a>(&'a self, start: usize, visit: &mut impl FnMut(&'a Node, usize) -> Visit) -> bool {
        let mut pos = start;
        for child in &self.children {
            match visit(child, pos) {
                Visit::Stop => return false,
                Visit::Skip => {}
                Visit::Descend => {
                    if !child.is_leaf() && !child.walk(pos + 1, visit) {
                        return false;
                    }
                }
            }
            pos += child.node_size();
        }
        true
    }

    /// Visit every node overlapping `from..to`, like [`Node::descendants`]
    /// restricted to a range.
    pub fn nodes_between<'a>(
        &'a self,
        from: usize,
        to: usize,
        mut visit: impl FnMut(&'a Node, usize) -> Visit,
    ) {
        self.descendants(|node, pos| {
            let end = pos + node.node_size();
            if pos >= to && !(pos == to && from == to) {
                return Visit::Skip;
            }
            if end < from || (end == from && from != to) {
                return Visit::Skip;
            }
            visit(node, pos)
        });
    }

    /// Concatenated text of every text node below this one.
    pub fn text_content(&self) -> String {
        if self.is_text() {
            return self.text.clone();
        }
        let mut text = String::new();
        self.descendants(|node, _| {
            if node.is_text() {
                text.push_str(&node.text);
            }
            Visit::Descend
        });
        text
    }

    /// Text between two positions, with `separator` between content nodes.
    pub fn text_between(&self, from: usize, to: usize, separator: &str) -> String {
        let mut text = String::new();
        let mut first = true;
        self.nodes_between(from, to, |node, pos| {
            if node.is_content() {
                if !first {
                    text.push_str(separator);
                }
                first = false;
                return Visit::Descend;
            }
            if node.is_text() {
                let start = from.saturating_sub(pos);
                let end = (to - pos).min(node.node_size());
                text.extend(node.text.chars().skip(start).take(end.saturating_sub(start)));
            }
            Visit::Descend
        });
        text
    }

    /// Resolve a position inside this node's content.
    pub fn resolve(&self, pos: usize) -> crate::error::Result<ResolvedPos<'_>> {
        ResolvedPos::resolve(self, pos)
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<Node> {
        self.stamp = NodeStamp::fresh();
        &mut self.children
    }

    pub(crate) fn set_markup(&mut self, kind: NodeKind, attrs: Attrs) {
        self.kind = kind;
        self.attrs = attrs;
        self.stamp = NodeStamp::fresh();
    }

    /// Descend along child indices, restamping every node on the way.
    pub(crate) fn path_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        self.stamp = NodeStamp::fresh();
        match path.split_first() {
            None => Some(self),
            Some((&index, rest)) => self.children.get_mut(index)?.path_mut(rest),
        }
    }
}

/// Structural equality; stamps are ignored.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.attrs == other.attrs
            && self.text == other.text
            && self.marks == other.marks
            && self.children == other.children
    }
}

/// Split an inline sequence at a character offset.
pub fn split_inline(inline: &[Node], offset: usize) -> (Vec<Node>, Vec<Node>) {
    let mut before = Vec::new();
    let mut after = Vec::new();
    let mut pos = 0;
    for node in inline {
        let size = node.node_size();
        if pos + size <= offset {
            before.push(node.clone());
        } else if pos >= offset {
            after.push(node.clone());
        } else {
            let cut = offset - pos;
            let head: String = node.text.chars().take(cut).collect();
            let tail: String = node.text.chars().skip(cut).collect();
            before.push(Node::text(head, node.marks.clone()));
            after.push(Node::text(tail, node.marks.clone()));
        }
        pos += size;
    }
    (before, after)
}

/// Merge adjacent text nodes with equal marks and drop empty ones.
pub fn normalize_inline(inline: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(inline.len());
    for node in inline {
        if node.is_text() && node.text.is_empty() {
            continue;
        }
        if let Some(last) = out.last_mut()
            && last.is_text()
            && node.is_text()
            && last.marks == node.marks
        {
            let text = format!("{}{}", last.text, node.text);
            *last = Node::text(text, node.marks);
            continue;
        }
        out.push(node);
    }
    out
}

/// Apply `edit` to the marks of every text character in `from..to`
/// (offsets inside the inline sequence).
pub fn map_marks(
    inline: &[Node],
    from: usize,
    to: usize,
    mut edit: impl FnMut(&mut Vec<Mark>),
) -> Vec<Node> {
    let (head, rest) = split_inline(inline, from);
    let (middle, tail) = split_inline(&rest, to.saturating_sub(from));
    let middle = middle.into_iter().map(|node| {
        if node.is_text() {
            let mut marks = node.marks.clone();
            edit(&mut marks);
            Node::text(node.text.clone(), marks)
        } else {
            node
        }
    });
    normalize_inline(head.into_iter().chain(middle).chain(tail).collect())
}
