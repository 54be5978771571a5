//! Steps, position maps and transactions.
//!
//! A [`Transaction`] works on its own copy of the document. Commands append
//! steps to it; nothing reaches the editor until the transaction is
//! dispatched, so a command that fails halfway leaves the document alone.

use std::ops::Range;

use crate::error::{EngineError, Result};
use crate::node::{Attrs, Node, NodeKind};

/// Text selection as an anchor and a head position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextSelection {
    pub anchor: usize,
    pub head: usize,
}

impl TextSelection {
    pub fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    pub fn cursor(pos: usize) -> Self {
        Self::new(pos, pos)
    }

    pub fn from(&self) -> usize {
        self.anchor.min(self.head)
    }

    pub fn to(&self) -> usize {
        self.anchor.max(self.head)
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }

    pub fn range(&self) -> Range<usize> {
        self.from()..self.to()
    }
}

/// Side a position sticks to when content is inserted exactly at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Replace the children between two boundaries of the same parent.
    Replace {
        from: usize,
        to: usize,
        nodes: Vec<Node>,
    },
    /// Change the kind and attributes of the node right after `pos`.
    SetMarkup {
        pos: usize,
        kind: Option<NodeKind>,
        attrs: Attrs,
    },
}

/// How one step moved positions around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepMap {
    start: usize,
    old_size: usize,
    new_size: usize,
}

impl StepMap {
    pub fn identity() -> Self {
        Self {
            start: 0,
            old_size: 0,
            new_size: 0,
        }
    }

    pub fn map(&self, pos: usize, bias: Bias) -> usize {
        let end = self.start + self.old_size;
        if pos < self.start || (self.old_size == 0 && self.new_size == 0) {
            return pos;
        }
        if pos > end {
            return pos - self.old_size + self.new_size;
        }
        let side = if self.old_size == 0 {
            bias
        } else if pos == self.start {
            Bias::Left
        } else if pos == end {
            Bias::Right
        } else {
            bias
        };
        match side {
            Bias::Left => self.start,
            Bias::Right => self.start + self.new_size,
        }
    }
}

/// A batch of steps applied atomically on dispatch.
#[derive(Debug, Clone)]
pub struct Transaction {
    doc: Node,
    steps: Vec<Step>,
    maps: Vec<StepMap>,
    changed: Vec<Range<usize>>,
    selection: Option<TextSelection>,
}

impl Transaction {
    pub fn new(doc: &Node) -> Self {
        Self {
            doc: doc.clone(),
            steps: Vec::new(),
            maps: Vec::new(),
            changed: Vec::new(),
            selection: None,
        }
    }

    /// The working document with every step so far applied.
    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn doc_changed(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Ranges touched by the steps, in the coordinates of the working doc.
    pub fn changed(&self) -> &[Range<usize>] {
        &self.changed
    }

    pub fn selection(&self) -> Option<TextSelection> {
        self.selection
    }

    /// Set the selection the editor adopts on dispatch instead of mapping
    /// its current one.
    pub fn set_selection(&mut self, selection: TextSelection) -> &mut Self {
        self.selection = Some(selection);
        self
    }

    /// Map a position from the original document through every step.
    pub fn map(&self, pos: usize, bias: Bias) -> usize {
        self.maps.iter().fold(pos, |pos, map| map.map(pos, bias))
    }

    pub fn map_selection(&self, selection: TextSelection) -> TextSelection {
        TextSelection::new(
            self.map(selection.anchor, Bias::Right),
            self.map(selection.head, Bias::Right),
        )
    }

    pub fn replace(&mut self, from: usize, to: usize, nodes: Vec<Node>) -> Result<&mut Self> {
        if from > to {
            return Err(EngineError::structure(format!(
                "replace range {from}..{to} is reversed"
            )));
        }
        let new_size = nodes.iter().map(Node::node_size).sum();
        apply_replace(&mut self.doc, from, to, nodes.clone())?;
        self.push(
            Step::Replace { from, to, nodes },
            StepMap {
                start: from,
                old_size: to - from,
                new_size,
            },
            from..from + new_size,
        );
        Ok(self)
    }

    pub fn insert(&mut self, pos: usize, nodes: Vec<Node>) -> Result<&mut Self> {
        self.replace(pos, pos, nodes)
    }

    pub fn delete(&mut self, from: usize, to: usize) -> Result<&mut Self> {
        self.replace(from, to, Vec::new())
    }

    /// Change the node after `pos`, keeping its children. `kind: None`
    /// keeps the current kind.
    pub fn set_node_markup(
        &mut self,
        pos: usize,
        kind: Option<NodeKind>,
        attrs: Attrs,
    ) -> Result<&mut Self> {
        let size = apply_set_markup(&mut self.doc, pos, kind, attrs.clone())?;
        self.push(
            Step::SetMarkup { pos, kind, attrs },
            StepMap::identity(),
            pos..pos + size,
        );
        Ok(self)
    }

    fn push(&mut self, step: Step, map: StepMap, touched: Range<usize>) {
        for range in &mut self.changed {
            let start = map.map(range.start, Bias::Left);
            let end = map.map(range.end, Bias::Right).max(start);
            *range = start..end;
        }
        self.changed.push(touched);
        self.steps.push(step);
        self.maps.push(map);
    }

    pub(crate) fn into_parts(self) -> (Node, Vec<Range<usize>>, Option<TextSelection>) {
        (self.doc, self.changed, self.selection)
    }
}

fn apply_replace(doc: &mut Node, from: usize, to: usize, nodes: Vec<Node>) -> Result<()> {
    let (path, from_index, to_index) = {
        let start = doc.resolve(from)?;
        let end = doc.resolve(to)?;
        let depth = start.depth();
        if depth != end.depth() || start.start(depth) != end.start(depth) {
            return Err(EngineError::structure(format!(
                "replace {from}..{to} crosses node boundaries"
            )));
        }
        if start.text_offset() != 0 || end.text_offset() != 0 {
            return Err(EngineError::structure(format!(
                "replace {from}..{to} cuts through a text node"
            )));
        }
        let path: Vec<usize> = (0..depth).map(|d| start.index(d)).collect();
        (path, start.index(depth), end.index(depth))
    };

    let parent = doc
        .path_mut(&path)
        .ok_or_else(|| EngineError::structure(format!("no parent for replace at {from}")))?;
    parent.children_mut().splice(from_index..to_index, nodes);
    Ok(())
}

fn apply_set_markup(
    doc: &mut Node,
    pos: usize,
    kind: Option<NodeKind>,
    attrs: Attrs,
) -> Result<usize> {
    let path = {
        let rp = doc.resolve(pos)?;
        if rp.text_offset() != 0 {
            return Err(EngineError::structure(format!(
                "set markup at {pos} points into text"
            )));
        }
        match rp.node_after() {
            Some(node) if !node.is_leaf() => {}
            _ => {
                return Err(EngineError::structure(format!(
                    "no node to update at {pos}"
                )));
            }
        }
        let depth = rp.depth();
        let mut path: Vec<usize> = (0..depth).map(|d| rp.index(d)).collect();
        path.push(rp.index(depth));
        path
    };

    let node = doc
        .path_mut(&path)
        .ok_or_else(|| EngineError::structure(format!("no node to update at {pos}")))?;
    let kind = kind.unwrap_or(node.kind());
    node.set_markup(kind, attrs);
    Ok(node.node_size())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ID_ATTR;
    use crate::schema::{BlockType, ChildrenType};
    use pretty_assertions::assert_eq;

    fn paragraph(id: &str, text: &str) -> Node {
        Node::container(
            Attrs::from([(ID_ATTR.to_string(), id.to_string())]),
            Node::content(
                BlockType::Paragraph,
                Attrs::new(),
                vec![Node::text(text, vec![])],
            ),
            None,
        )
    }

    fn ids(doc: &Node) -> Vec<String> {
        doc.children()[0]
            .children()
            .iter()
            .filter_map(|n| n.block_id().map(str::to_string))
            .collect()
    }

    fn doc() -> Node {
        // a: 1..8, b: 8..15
        Node::doc(Node::group(
            ChildrenType::Group,
            1,
            vec![paragraph("a", "abc"), paragraph("b", "xyz")],
        ))
    }

    #[test]
    fn test_insert_between_containers() {
        let doc = doc();
        let mut tr = Transaction::new(&doc);
        tr.insert(8, vec![paragraph("n", "q")]).unwrap();

        assert_eq!(ids(tr.doc()), vec!["a", "n", "b"]);
        assert_eq!(tr.changed(), &[8..13]);
        // the original doc is untouched
        assert_eq!(ids(&doc), vec!["a", "b"]);
    }

    #[test]
    fn test_delete_maps_positions() {
        let doc = doc();
        let mut tr = Transaction::new(&doc);
        tr.delete(1, 8).unwrap();

        assert_eq!(ids(tr.doc()), vec!["b"]);
        assert_eq!(tr.map(10, Bias::Right), 3);
        assert_eq!(tr.map(4, Bias::Right), 1);
    }

    #[test]
    fn test_insert_bias() {
        let doc = doc();
        let mut tr = Transaction::new(&doc);
        tr.insert(8, vec![paragraph("n", "")]).unwrap();

        assert_eq!(tr.map(8, Bias::Left), 8);
        assert_eq!(tr.map(8, Bias::Right), 12);
    }

    #[test]
    fn test_replace_rejects_text_cut() {
        let doc = doc();
        let mut tr = Transaction::new(&doc);
        let err = tr.replace(4, 5, vec![]).unwrap_err();
        assert!(matches!(err, EngineError::StructureViolation(_)));
    }

    #[test]
    fn test_replace_rejects_crossing_parents() {
        let doc = doc();
        let mut tr = Transaction::new(&doc);
        // from inside a's paragraph to the group level
        let err = tr.replace(3, 8, vec![]).unwrap_err();
        assert!(matches!(err, EngineError::StructureViolation(_)));
    }

    #[test]
    fn test_set_markup_changes_kind_and_keeps_text() {
        let doc = doc();
        let mut tr = Transaction::new(&doc);
        let attrs = Attrs::from([("level".to_string(), "2".to_string())]);
        tr.set_node_markup(2, Some(NodeKind::Content(BlockType::Heading)), attrs)
            .unwrap();

        let content = &tr.doc().children()[0].children()[0].children()[0];
        assert_eq!(content.kind(), NodeKind::Content(BlockType::Heading));
        assert_eq!(content.attr("level"), Some("2"));
        assert_eq!(content.text_content(), "abc");
    }

    #[test]
    fn test_selection_helpers() {
        let selection = TextSelection::new(9, 4);
        assert_eq!(selection.from(), 4);
        assert_eq!(selection.to(), 9);
        assert!(!selection.is_empty());
        assert!(TextSelection::cursor(3).is_empty());
    }
}
