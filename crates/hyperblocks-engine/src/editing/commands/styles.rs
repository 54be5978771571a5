//! Inline style and link commands over the current selection.

use crate::editing::convert::{marks_to_styles, styles_to_marks};
use crate::editing::transform::{TextSelection, Transaction};
use crate::error::Result;
use crate::model::Styles;
use crate::node::{Mark, Node, Visit, add_mark, map_marks, normalize_inline, remove_mark, split_inline};
use crate::schema::{BlockSchema, ContentPolicy};

use super::CommandContext;

/// Styled stretch of one content node covered by the selection.
struct Span {
    block_id: String,
    /// Position right inside the content node.
    start: usize,
    content_size: usize,
    inline: Vec<Node>,
    from: usize,
    to: usize,
}

/// Inline content nodes overlapping `from..to`, with the overlap expressed
/// as offsets into each node.
fn selected_spans(doc: &Node, schema: &BlockSchema, from: usize, to: usize) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut block_id = String::new();
    doc.nodes_between(from, to, |node, pos| {
        if let Some(id) = node.block_id() {
            block_id = id.to_string();
        }
        let Some(block_type) = node.kind().block_type() else {
            return Visit::Descend;
        };
        let inline_policy = schema
            .spec(block_type)
            .is_ok_and(|spec| spec.content == ContentPolicy::Inline);
        let start = pos + 1;
        let size = node.content_size();
        let local_from = from.saturating_sub(start).min(size);
        let local_to = to.saturating_sub(start).min(size);
        if inline_policy && local_from < local_to {
            spans.push(Span {
                block_id: block_id.clone(),
                start,
                content_size: size,
                inline: node.children().to_vec(),
                from: local_from,
                to: local_to,
            });
        }
        Visit::Skip
    });
    spans
}

fn edit_marks(
    tr: &mut Transaction,
    cx: &mut CommandContext<'_>,
    edit: impl Fn(&mut Vec<Mark>),
) -> Result<Vec<String>> {
    let selection = cx.selection;
    if selection.is_empty() {
        return Ok(Vec::new());
    }
    let spans = selected_spans(tr.doc(), cx.schema, selection.from(), selection.to());
    let mut touched = Vec::new();
    for span in spans {
        let inline = map_marks(&span.inline, span.from, span.to, &edit);
        tr.replace(span.start, span.start + span.content_size, inline)?;
        if !touched.contains(&span.block_id) {
            touched.push(span.block_id);
        }
    }
    // Mark changes keep every size, so the old selection still fits.
    tr.set_selection(selection);
    Ok(touched)
}

pub fn add_styles(tr: &mut Transaction, cx: &mut CommandContext<'_>, styles: &Styles) -> Result<Vec<String>> {
    let marks = styles_to_marks(styles);
    edit_marks(tr, cx, |current| {
        for mark in &marks {
            add_mark(current, mark.clone());
        }
    })
}

pub fn remove_styles(tr: &mut Transaction, cx: &mut CommandContext<'_>, styles: &Styles) -> Result<Vec<String>> {
    let marks = styles_to_marks(styles);
    edit_marks(tr, cx, |current| {
        for mark in &marks {
            remove_mark(current, mark);
        }
    })
}

/// Remove `styles` when all of them are active, add them otherwise.
pub fn toggle_styles(tr: &mut Transaction, cx: &mut CommandContext<'_>, styles: &Styles) -> Result<Vec<String>> {
    if get_active_styles(tr.doc(), cx.selection).contains(styles) {
        remove_styles(tr, cx, styles)
    } else {
        add_styles(tr, cx, styles)
    }
}

/// Marks in effect at `pos`: those of the text right before it, or right
/// after it at the start of a content node.
fn marks_at(doc: &Node, pos: usize) -> Vec<Mark> {
    let Ok(rp) = doc.resolve(pos) else {
        return Vec::new();
    };
    if !rp.parent().is_content() {
        return Vec::new();
    }
    let node = if rp.text_offset() > 0 {
        rp.node_after()
    } else {
        rp.node_before().or_else(|| rp.node_after())
    };
    node.map(|node| node.marks().to_vec()).unwrap_or_default()
}

/// Styles active at the end of the selection.
pub fn get_active_styles(doc: &Node, selection: TextSelection) -> Styles {
    marks_to_styles(&marks_at(doc, selection.to()))
}

pub fn get_selected_text(doc: &Node, selection: TextSelection) -> String {
    doc.text_between(selection.from(), selection.to(), "\n")
}

/// Target of the first link touched by the selection.
pub fn get_selected_link_url(doc: &Node, selection: TextSelection) -> Option<String> {
    let href = |marks: &[Mark]| {
        marks.iter().find_map(|mark| match mark {
            Mark::Link(href) => Some(href.clone()),
            _ => None,
        })
    };
    if selection.is_empty() {
        return href(&marks_at(doc, selection.head));
    }
    let mut found = None;
    doc.nodes_between(selection.from(), selection.to(), |node, _| {
        if found.is_some() {
            return Visit::Stop;
        }
        if node.is_text() {
            found = href(node.marks());
        }
        Visit::Descend
    });
    found
}

/// Turn the selection into a link to `url`. With `text`, the selection is
/// replaced by that text carrying the link.
pub fn create_link(
    tr: &mut Transaction,
    cx: &mut CommandContext<'_>,
    url: &str,
    text: Option<&str>,
) -> Result<Vec<String>> {
    if url.is_empty() {
        return Ok(Vec::new());
    }
    let Some(text) = text.filter(|text| !text.is_empty()) else {
        let link = Mark::Link(url.to_string());
        return edit_marks(tr, cx, |marks| add_mark(marks, link.clone()));
    };

    let selection = cx.selection;
    let (start, content_size, inline, from, to, block_id) = {
        let doc = tr.doc();
        let rp = doc.resolve(selection.from())?;
        let parent = rp.parent();
        let inline_policy = parent
            .kind()
            .block_type()
            .and_then(|block_type| cx.schema.spec(block_type).ok())
            .is_some_and(|spec| spec.content == ContentPolicy::Inline);
        let depth = rp.depth();
        let start = rp.start(depth);
        let end = rp.end(depth);
        if !inline_policy || selection.to() > end {
            return Ok(Vec::new());
        }
        let block_id = rp
            .node(depth - 1)
            .block_id()
            .unwrap_or_default()
            .to_string();
        (
            start,
            parent.content_size(),
            parent.children().to_vec(),
            selection.from() - start,
            selection.to() - start,
            block_id,
        )
    };

    let (head, rest) = split_inline(&inline, from);
    let (_, tail) = split_inline(&rest, to - from);
    let mut marks = marks_at(tr.doc(), selection.from());
    remove_mark(&mut marks, &Mark::Link(String::new()));
    add_mark(&mut marks, Mark::Link(url.to_string()));
    let link = Node::text(text, marks);
    let cursor = start + from + link.node_size();

    let inline = normalize_inline(head.into_iter().chain([link]).chain(tail).collect());
    tr.replace(start, start + content_size, inline)?;
    tr.set_selection(TextSelection::cursor(cursor));
    Ok(vec![block_id])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::commands::test_support::Harness;
    use crate::editing::resolve::get_block_info_by_id;
    use crate::model::{InlineContent, PartialBlock, StyledText};
    use pretty_assertions::assert_eq;

    fn harness() -> Harness {
        Harness::new(vec![
            PartialBlock::paragraph("hello world").with_id("a"),
            PartialBlock::paragraph("second").with_id("b"),
        ])
    }

    fn select(h: &mut Harness, id: &str, from: usize, to: usize) {
        let start = get_block_info_by_id(id, &h.doc).unwrap().content.start();
        h.selection = TextSelection::new(start + from, start + to);
    }

    #[test]
    fn test_add_styles_to_part_of_block() {
        let mut h = harness();
        select(&mut h, "a", 0, 5);
        h.run(|tr, cx| add_styles(tr, cx, &Styles::bold())).unwrap();

        assert_eq!(
            h.block("a").content,
            vec![
                InlineContent::styled("hello", Styles::bold()),
                InlineContent::text(" world"),
            ]
        );
        assert_eq!(get_active_styles(&h.doc, h.selection), Styles::bold());
    }

    #[test]
    fn test_styles_across_blocks() {
        let mut h = harness();
        let a = get_block_info_by_id("a", &h.doc).unwrap().content.start();
        let b = get_block_info_by_id("b", &h.doc).unwrap().content.start();
        h.selection = TextSelection::new(a + 6, b + 3);

        let touched = h.run(|tr, cx| add_styles(tr, cx, &Styles::italic())).unwrap();

        assert_eq!(touched, vec!["a", "b"]);
        assert_eq!(
            h.block("b").content,
            vec![
                InlineContent::styled("sec", Styles::italic()),
                InlineContent::text("ond"),
            ]
        );
        assert_eq!(get_selected_text(&h.doc, h.selection), "world\nsec");
    }

    #[test]
    fn test_toggle_twice_restores_plain_text() {
        let mut h = harness();
        select(&mut h, "a", 0, 5);
        h.run(|tr, cx| toggle_styles(tr, cx, &Styles::bold())).unwrap();
        h.run(|tr, cx| toggle_styles(tr, cx, &Styles::bold())).unwrap();

        assert_eq!(h.block("a").content, vec![InlineContent::text("hello world")]);
    }

    #[test]
    fn test_collapsed_selection_is_a_no_op() {
        let mut h = harness();
        select(&mut h, "a", 2, 2);
        let touched = h.run(|tr, cx| add_styles(tr, cx, &Styles::bold())).unwrap();
        assert!(touched.is_empty());
    }

    #[test]
    fn test_create_link_on_selection() {
        let mut h = harness();
        select(&mut h, "a", 6, 11);
        h.run(|tr, cx| create_link(tr, cx, "https://example.com", None))
            .unwrap();

        assert_eq!(
            h.block("a").content,
            vec![
                InlineContent::text("hello "),
                InlineContent::link("https://example.com", "world"),
            ]
        );
        assert_eq!(
            get_selected_link_url(&h.doc, h.selection).as_deref(),
            Some("https://example.com")
        );
    }

    #[test]
    fn test_create_link_with_text_replaces_selection() {
        let mut h = harness();
        select(&mut h, "a", 0, 5);
        h.run(|tr, cx| create_link(tr, cx, "https://x.org", Some("bye")))
            .unwrap();

        assert_eq!(
            h.block("a").content,
            vec![
                InlineContent::Link {
                    href: "https://x.org".into(),
                    content: vec![StyledText::plain("bye")],
                },
                InlineContent::text(" world"),
            ]
        );
        let start = get_block_info_by_id("a", &h.doc).unwrap().content.start();
        assert_eq!(h.selection, TextSelection::cursor(start + 3));
    }

    #[test]
    fn test_styles_skip_plain_text_blocks() {
        let mut h = Harness::new(vec![
            PartialBlock::new(crate::schema::BlockType::CodeBlock)
                .with_id("code")
                .with_text("let x = 1;"),
        ]);
        select(&mut h, "code", 0, 3);
        let touched = h.run(|tr, cx| add_styles(tr, cx, &Styles::bold())).unwrap();
        assert!(touched.is_empty());
    }
}
