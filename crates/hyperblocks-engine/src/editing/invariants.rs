//! Structural checks run on every transaction before it is committed.

use std::collections::HashSet;

use crate::error::{EngineError, Result};
use crate::node::{Node, NodeKind};
use crate::schema::{BlockSchema, ContentPolicy};

/// Verify the document shape:
///
/// * the doc holds exactly one group;
/// * every group holds at least one container and nothing else;
/// * every container holds a content node first and at most one group after it;
/// * container IDs are present and unique;
/// * text and embeds appear only inside content nodes, and respect the
///   content policy of the block type.
pub fn check(doc: &Node, schema: &BlockSchema) -> Result<()> {
    if doc.kind() != NodeKind::Doc {
        return Err(EngineError::structure("root is not a doc node"));
    }
    match doc.children() {
        [group] if group.is_group() => {
            let mut ids = HashSet::new();
            check_group(group, schema, &mut ids)
        }
        _ => Err(EngineError::structure(
            "doc must contain exactly one group",
        )),
    }
}

fn check_group<'a>(group: &'a Node, schema: &BlockSchema, ids: &mut HashSet<&'a str>) -> Result<()> {
    if group.child_count() == 0 {
        return Err(EngineError::structure("empty group"));
    }
    for child in group.children() {
        if !child.is_container() {
            return Err(EngineError::structure(format!(
                "group holds a {:?} node",
                child.kind()
            )));
        }
        check_container(child, schema, ids)?;
    }
    Ok(())
}

fn check_container<'a>(
    container: &'a Node,
    schema: &BlockSchema,
    ids: &mut HashSet<&'a str>,
) -> Result<()> {
    let id = container
        .block_id()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| EngineError::structure("container without an id"))?;
    if !ids.insert(id) {
        return Err(EngineError::structure(format!("duplicate block id {id}")));
    }

    let (content, rest) = match container.children() {
        [content, rest @ ..] if content.is_content() => (content, rest),
        _ => {
            return Err(EngineError::structure(format!(
                "block {id} does not start with a content node"
            )));
        }
    };
    check_content(id, content, schema)?;

    match rest {
        [] => Ok(()),
        [group] if group.is_group() => check_group(group, schema, ids),
        _ => Err(EngineError::structure(format!(
            "block {id} has unexpected children after its content"
        ))),
    }
}

fn check_content(id: &str, content: &Node, schema: &BlockSchema) -> Result<()> {
    let Some(block_type) = content.kind().block_type() else {
        return Err(EngineError::structure(format!("block {id} has no type")));
    };
    let policy = schema.spec(block_type)?.content;

    for inline in content.children() {
        let allowed = match (policy, inline.kind()) {
            (ContentPolicy::Inline, NodeKind::Text | NodeKind::InlineEmbed) => true,
            (ContentPolicy::PlainText, NodeKind::Text) => inline.marks().is_empty(),
            _ => false,
        };
        if !allowed {
            return Err(EngineError::structure(format!(
                "block {id} of type {block_type} cannot hold a {:?} node",
                inline.kind()
            )));
        }
        if inline.is_text() && inline.text_str().is_empty() {
            return Err(EngineError::structure(format!(
                "block {id} holds an empty text node"
            )));
        }
    }
    Ok(())
}
