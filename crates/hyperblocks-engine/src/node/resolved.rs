use crate::error::{EngineError, Result};

use super::Node;

/// One level of a resolved position: the node, the index of the child the
/// position points at, and the absolute position before that child.
#[derive(Debug, Clone, Copy)]
pub struct Level<'a> {
    pub node: &'a Node,
    pub index: usize,
    pub offset: usize,
}

/// A position resolved against a document, with the path of ancestors that
/// contain it. Depth 0 is the root node.
#[derive(Debug, Clone)]
pub struct ResolvedPos<'a> {
    pos: usize,
    path: Vec<Level<'a>>,
    parent_offset: usize,
}

impl<'a> ResolvedPos<'a> {
    pub(crate) fn resolve(root: &'a Node, pos: usize) -> Result<Self> {
        let size = root.content_size();
        if pos > size {
            return Err(EngineError::InvalidPosition { pos, size });
        }

        let mut path = Vec::new();
        let mut node = root;
        let mut start = 0;
        let mut parent_offset = pos;
        loop {
            let (index, offset) = find_index(node, parent_offset);
            let rem = parent_offset - offset;
            path.push(Level {
                node,
                index,
                offset: start + offset,
            });
            if rem == 0 {
                break;
            }
            let Some(child) = node.child(index) else {
                break;
            };
            if child.is_leaf() {
                break;
            }
            node = child;
            parent_offset = rem - 1;
            start += offset + 1;
        }

        Ok(Self {
            pos,
            path,
            parent_offset,
        })
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn depth(&self) -> usize {
        self.path.len() - 1
    }

    /// Offset of the position inside its parent's content.
    pub fn parent_offset(&self) -> usize {
        self.parent_offset
    }

    pub fn parent(&self) -> &'a Node {
        self.path[self.depth()].node
    }

    pub fn node(&self, depth: usize) -> &'a Node {
        self.path[depth].node
    }

    pub fn index(&self, depth: usize) -> usize {
        self.path[depth].index
    }

    pub fn level(&self, depth: usize) -> Level<'a> {
        self.path[depth]
    }

    /// Position at the start of the content of the node at `depth`.
    pub fn start(&self, depth: usize) -> usize {
        if depth == 0 {
            0
        } else {
            self.path[depth - 1].offset + 1
        }
    }

    /// Position at the end of the content of the node at `depth`.
    pub fn end(&self, depth: usize) -> usize {
        self.start(depth) + self.node(depth).content_size()
    }

    /// Position before the node at `depth`. Depth 0 has no such position.
    pub fn before(&self, depth: usize) -> Option<usize> {
        (depth > 0).then(|| self.path[depth - 1].offset)
    }

    /// Position after the node at `depth`.
    pub fn after(&self, depth: usize) -> Option<usize> {
        self.before(depth)
            .map(|before| before + self.node(depth).node_size())
    }

    /// Offset into the text node the position points into, 0 at boundaries.
    pub fn text_offset(&self) -> usize {
        self.pos - self.path[self.depth()].offset
    }

    pub fn node_after(&self) -> Option<&'a Node> {
        self.parent().child(self.index(self.depth()))
    }

    pub fn node_before(&self) -> Option<&'a Node> {
        let index = self.index(self.depth());
        if self.text_offset() > 0 {
            return self.parent().child(index);
        }
        index.checked_sub(1).and_then(|i| self.parent().child(i))
    }

    /// Deepest depth whose node satisfies `predicate`.
    pub fn find_depth(&self, predicate: impl Fn(&Node) -> bool) -> Option<usize> {
        (0..=self.depth())
            .rev()
            .find(|&depth| predicate(self.node(depth)))
    }
}

/// Child index and its start offset for an offset inside `node`'s content.
fn find_index(node: &Node, offset: usize) -> (usize, usize) {
    if offset == 0 {
        return (0, 0);
    }
    let mut cur = 0;
    for (i, child) in node.children().iter().enumerate() {
        let end = cur + child.node_size();
        if end >= offset {
            if end == offset {
                return (i + 1, end);
            }
            return (i, cur);
        }
        cur = end;
    }
    (node.child_count(), cur)
}
