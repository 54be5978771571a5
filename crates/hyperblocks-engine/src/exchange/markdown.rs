//! Markdown import and export.
//!
//! Import walks pulldown-cmark events and builds [`PartialBlock`]s. Lists and
//! block quotes become child groups (`Ordered`, `Unordered`, `Blockquote`) of
//! the paragraph in front of them, and headings adopt every block up to the
//! next heading of the same or a higher level.
//!
//! Export writes one paragraph per block. Children of list and quote groups
//! are written as list items or quote lines; other children are un-nested.
//! Underline and colors have no Markdown form and are dropped.

use std::sync::OnceLock;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;

use crate::model::{Block, InlineContent, PartialBlock, StyledText, Styles};
use crate::schema::{BlockType, CHILDREN_TYPE_PROP, ChildrenType};

// ============ Import ============

/// Parse Markdown into blocks without IDs.
pub fn markdown_to_blocks(markdown: &str) -> Vec<PartialBlock> {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_MATH;
    let mut importer = MarkdownImporter::new();
    for event in Parser::new_ext(markdown, options) {
        importer.process_event(event);
    }
    nest_under_headings(importer.finish())
}

enum FrameKind {
    Root,
    List(ChildrenType),
    Item,
    Quote,
}

/// Blocks collected inside one open container element.
struct Frame {
    kind: FrameKind,
    blocks: Vec<PartialBlock>,
}

/// What a run of inline events is turning into.
enum Media {
    Image { url: String, title: String },
    File { url: String, title: String },
}

struct MarkdownImporter {
    frames: Vec<Frame>,
    inline: Vec<InlineContent>,
    link: Option<(String, Vec<StyledText>)>,
    media: Option<Media>,
    in_image: bool,
    /// Text of the image being read; it becomes the caption.
    image_alt: String,
    math: Option<String>,
    bold_depth: usize,
    italic_depth: usize,
    strike_depth: usize,
    heading_level: Option<usize>,
    code: Option<(String, String)>,
}

impl MarkdownImporter {
    fn new() -> Self {
        Self {
            frames: vec![Frame {
                kind: FrameKind::Root,
                blocks: Vec::new(),
            }],
            inline: Vec::new(),
            link: None,
            media: None,
            in_image: false,
            image_alt: String::new(),
            math: None,
            bold_depth: 0,
            italic_depth: 0,
            strike_depth: 0,
            heading_level: None,
            code: None,
        }
    }

    fn process_event(&mut self, event: Event) {
        match event {
            Event::Start(Tag::Paragraph) => self.flush_paragraph(),
            Event::End(TagEnd::Paragraph) => self.flush_paragraph(),

            Event::Start(Tag::Heading { level, .. }) => {
                self.flush_paragraph();
                self.heading_level = Some(level as usize);
            }
            Event::End(TagEnd::Heading(_)) => {
                let level = self.heading_level.take().unwrap_or(1);
                let content = std::mem::take(&mut self.inline);
                self.push_block(
                    PartialBlock::new(BlockType::Heading)
                        .with_prop("level", level.to_string())
                        .with_content(content),
                );
            }

            Event::Start(Tag::CodeBlock(kind)) => {
                self.flush_paragraph();
                let language = match kind {
                    CodeBlockKind::Fenced(lang) => lang.split_whitespace().next().unwrap_or_default().to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.code = Some((language, String::new()));
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((language, mut text)) = self.code.take() {
                    if text.ends_with('\n') {
                        text.pop();
                    }
                    let mut block = PartialBlock::new(BlockType::CodeBlock).with_text(text);
                    if !language.is_empty() {
                        block = block.with_prop("language", language);
                    }
                    self.push_block(block);
                }
            }

            Event::Start(Tag::List(first_item)) => {
                self.flush_paragraph();
                let list_type = if first_item.is_some() {
                    ChildrenType::Ordered
                } else {
                    ChildrenType::Unordered
                };
                self.open(FrameKind::List(list_type));
            }
            Event::End(TagEnd::List(_)) => {
                if let Some(Frame {
                    kind: FrameKind::List(list_type),
                    blocks,
                }) = self.close()
                {
                    self.attach_group(list_type, blocks);
                }
            }
            Event::Start(Tag::Item) => self.open(FrameKind::Item),
            Event::End(TagEnd::Item) => {
                self.flush_paragraph();
                if let Some(Frame { blocks, .. }) = self.close() {
                    let item = into_item(blocks);
                    self.push_block(item);
                }
            }
            Event::Start(Tag::BlockQuote(_)) => {
                self.flush_paragraph();
                self.open(FrameKind::Quote);
            }
            Event::End(TagEnd::BlockQuote(_)) => {
                self.flush_paragraph();
                if let Some(Frame { blocks, .. }) = self.close() {
                    self.attach_group(ChildrenType::Blockquote, blocks);
                }
            }

            Event::Start(Tag::Strong) => self.bold_depth += 1,
            Event::End(TagEnd::Strong) => self.bold_depth = self.bold_depth.saturating_sub(1),
            Event::Start(Tag::Emphasis) => self.italic_depth += 1,
            Event::End(TagEnd::Emphasis) => self.italic_depth = self.italic_depth.saturating_sub(1),
            Event::Start(Tag::Strikethrough) => self.strike_depth += 1,
            Event::End(TagEnd::Strikethrough) => {
                self.strike_depth = self.strike_depth.saturating_sub(1)
            }

            Event::Start(Tag::Link { dest_url, title, .. }) => {
                if let Some(size) = file_size(&title) {
                    self.media = Some(Media::File {
                        url: dest_url.to_string(),
                        title: size,
                    });
                }
                self.link = Some((dest_url.to_string(), Vec::new()));
            }
            Event::End(TagEnd::Link) => {
                if let Some((href, content)) = self.link.take() {
                    self.inline.push(InlineContent::Link { href, content });
                }
            }
            Event::Start(Tag::Image { dest_url, title, .. }) => {
                self.media = Some(Media::Image {
                    url: dest_url.to_string(),
                    title: title.to_string(),
                });
                self.in_image = true;
                self.image_alt.clear();
            }
            Event::End(TagEnd::Image) => self.in_image = false,

            Event::Text(text) => {
                if let Some((_, code)) = &mut self.code {
                    code.push_str(&text);
                } else if self.in_image {
                    self.image_alt.push_str(&text);
                } else {
                    self.push_text(&text, false);
                }
            }
            Event::Code(code) => self.push_text(&code, true),
            Event::DisplayMath(math) => self.math = Some(math.trim().to_string()),
            Event::InlineMath(math) => self.push_text(&format!("${math}$"), false),
            Event::SoftBreak => self.push_text(" ", false),
            Event::HardBreak => self.push_text("\n", false),
            _ => {}
        }
    }

    fn open(&mut self, kind: FrameKind) {
        self.frames.push(Frame {
            kind,
            blocks: Vec::new(),
        });
    }

    fn close(&mut self) -> Option<Frame> {
        if self.frames.len() > 1 {
            self.frames.pop()
        } else {
            None
        }
    }

    fn push_block(&mut self, block: PartialBlock) {
        if let Some(frame) = self.frames.last_mut() {
            frame.blocks.push(block);
        }
    }

    fn styles(&self, code: bool) -> Styles {
        Styles {
            bold: self.bold_depth > 0,
            italic: self.italic_depth > 0,
            strike: self.strike_depth > 0,
            code,
            ..Styles::default()
        }
    }

    fn push_text(&mut self, text: &str, code: bool) {
        let run = StyledText {
            text: text.to_string(),
            styles: self.styles(code),
        };
        let runs = match &mut self.link {
            Some((_, content)) => {
                push_run(content, run);
                return;
            }
            None => &mut self.inline,
        };
        match runs.last_mut() {
            Some(InlineContent::Text(last)) if last.styles == run.styles => last.text.push_str(&run.text),
            _ => runs.push(InlineContent::Text(run)),
        }
    }

    /// Turn pending inline content into a block.
    fn flush_paragraph(&mut self) {
        let content = std::mem::take(&mut self.inline);
        let media = self.media.take();
        let alt = std::mem::take(&mut self.image_alt);
        let math = self.math.take();
        let has_text = !content.is_empty();

        let block = match (media, math) {
            (_, Some(math)) if !has_text => PartialBlock::new(BlockType::Math).with_text(math),
            (Some(Media::Image { url, title }), _) if !has_text => image_block(url, &title, alt),
            (Some(Media::File { url, title }), _) if content.len() == 1 => {
                let name = content.first().map(inline_plain).unwrap_or_default();
                PartialBlock::new(BlockType::File)
                    .with_prop("url", url)
                    .with_prop("name", name)
                    .with_prop("size", title)
            }
            _ if has_text => PartialBlock::paragraph("").with_content(trim_content(content)),
            _ => return,
        };
        self.push_block(block);
    }

    fn attach_group(&mut self, list_type: ChildrenType, children: Vec<PartialBlock>) {
        if let Some(frame) = self.frames.last_mut() {
            attach_group(&mut frame.blocks, list_type, children);
        }
    }

    fn finish(mut self) -> Vec<PartialBlock> {
        self.flush_paragraph();
        while self.frames.len() > 1 {
            if let Some(frame) = self.frames.pop() {
                self.frames[0].blocks.extend(frame.blocks);
            }
        }
        self.frames.pop().map(|frame| frame.blocks).unwrap_or_default()
    }
}

/// Attach `children` as a group to the paragraph just before them, or
/// to a fresh empty paragraph when there is none to take them.
pub(super) fn attach_group(blocks: &mut Vec<PartialBlock>, list_type: ChildrenType, children: Vec<PartialBlock>) {
    if children.is_empty() {
        return;
    }
    let takes_children = |block: &PartialBlock| {
        block.block_type == Some(BlockType::Paragraph) && block.children.as_ref().is_none_or(Vec::is_empty)
    };
    match blocks.last_mut() {
        Some(parent) if takes_children(parent) => {
            parent.props.insert(CHILDREN_TYPE_PROP.to_string(), list_type.to_string());
            parent.children = Some(children);
        }
        _ => blocks.push(
            PartialBlock::new(BlockType::Paragraph)
                .with_prop(CHILDREN_TYPE_PROP, list_type.to_string())
                .with_children(children),
        ),
    }
}

pub(super) fn push_run(runs: &mut Vec<StyledText>, run: StyledText) {
    match runs.last_mut() {
        Some(last) if last.styles == run.styles => last.text.push_str(&run.text),
        _ => runs.push(run),
    }
}

fn inline_plain(item: &InlineContent) -> String {
    crate::model::inline_text(std::slice::from_ref(item))
}

/// The first block of a list item holds its text; later ones become its
/// children.
pub(super) fn into_item(mut blocks: Vec<PartialBlock>) -> PartialBlock {
    if blocks.is_empty() {
        return PartialBlock::new(BlockType::Paragraph);
    }
    let mut item = blocks.remove(0);
    if !blocks.is_empty() {
        item.children.get_or_insert_with(Vec::new).extend(blocks);
    }
    item
}

/// Drop leading and trailing whitespace of a paragraph.
pub(super) fn trim_content(mut content: Vec<InlineContent>) -> Vec<InlineContent> {
    if let Some(InlineContent::Text(first)) = content.first_mut() {
        first.text = first.text.trim_start().to_string();
    }
    if let Some(InlineContent::Text(last)) = content.last_mut() {
        last.text = last.text.trim_end().to_string();
    }
    content.retain(|item| !matches!(item, InlineContent::Text(run) if run.text.is_empty()));
    content
}

fn title_regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("Invalid title regex"))
}

/// `size=N` link titles mark file blocks.
fn file_size(title: &str) -> Option<String> {
    static SIZE_REGEX: OnceLock<Regex> = OnceLock::new();
    title_regex(&SIZE_REGEX, r"^size=(\d+)$")
        .captures(title)
        .map(|captures| captures[1].to_string())
}

/// `width=W` image titles mark video blocks; other images stay images.
fn image_block(url: String, title: &str, alt: String) -> PartialBlock {
    static WIDTH_REGEX: OnceLock<Regex> = OnceLock::new();
    match title_regex(&WIDTH_REGEX, r"^width=(\w*)$").captures(title) {
        Some(captures) => {
            let block = PartialBlock::new(BlockType::Video)
                .with_prop("url", url)
                .with_prop("name", alt);
            match captures.get(1).map(|width| width.as_str()) {
                Some(width) if !width.is_empty() && width != "undefined" => block.with_prop("width", width),
                _ => block,
            }
        }
        None => {
            let block = PartialBlock::new(BlockType::Image).with_prop("url", url);
            if alt.is_empty() { block } else { block.with_text(alt) }
        }
    }
}

fn heading_level(block: &PartialBlock) -> usize {
    if block.block_type != Some(BlockType::Heading) {
        return 0;
    }
    block
        .props
        .get("level")
        .and_then(|level| level.parse().ok())
        .unwrap_or(1)
}

/// Make every block after a heading a child of that heading, up to the next
/// heading of the same or a higher level.
pub(super) fn nest_under_headings(blocks: Vec<PartialBlock>) -> Vec<PartialBlock> {
    let mut out = Vec::new();
    let mut stack: Vec<(usize, PartialBlock)> = Vec::new();

    fn pop(stack: &mut Vec<(usize, PartialBlock)>, out: &mut Vec<PartialBlock>) {
        if let Some((_, block)) = stack.pop() {
            match stack.last_mut() {
                Some((_, parent)) => parent.children.get_or_insert_with(Vec::new).push(block),
                None => out.push(block),
            }
        }
    }

    for block in blocks {
        let level = heading_level(&block);
        if level > 0 {
            while stack.last().is_some_and(|(open, _)| *open >= level) {
                pop(&mut stack, &mut out);
            }
            stack.push((level, block));
            continue;
        }
        match stack.last_mut() {
            Some((_, parent)) => parent.children.get_or_insert_with(Vec::new).push(block),
            None => out.push(block),
        }
    }
    while !stack.is_empty() {
        pop(&mut stack, &mut out);
    }
    out
}

// ============ Export ============

/// Write blocks as Markdown.
pub fn blocks_to_markdown(blocks: &[Block]) -> String {
    let mut out = blocks
        .iter()
        .map(|block| render_block(block, ""))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

fn list_marker(block: &Block) -> Option<&'static str> {
    match block.prop(CHILDREN_TYPE_PROP).and_then(|value| value.parse().ok()) {
        Some(ChildrenType::Ordered) => Some("1. "),
        Some(ChildrenType::Unordered) => Some("- "),
        Some(ChildrenType::Blockquote) => Some("> "),
        _ => None,
    }
}

/// Markdown for `block`; lines after the first are prefixed with `indent`.
fn render_block(block: &Block, indent: &str) -> String {
    let mut out = block_body(block).replace('\n', &format!("\n{indent}"));
    match list_marker(block) {
        Some(marker) => {
            let child_indent = format!("{indent}{}", " ".repeat(marker.len()));
            for child in &block.children {
                if !out.is_empty() {
                    out.push('\n');
                    out.push_str(indent);
                }
                out.push_str(marker);
                out.push_str(&render_block(child, &child_indent));
            }
        }
        None => {
            for child in &block.children {
                let text = render_block(child, indent);
                if text.is_empty() {
                    continue;
                }
                if !out.is_empty() {
                    out.push_str("\n\n");
                    out.push_str(indent);
                }
                out.push_str(&text);
            }
        }
    }
    out
}

fn block_body(block: &Block) -> String {
    let prop = |name: &str| block.prop(name).unwrap_or_default();
    match block.block_type {
        BlockType::Paragraph => inline_markdown(&block.content),
        BlockType::Heading => {
            let level = prop("level").parse::<usize>().unwrap_or(1).clamp(1, 6);
            format!("{} {}", "#".repeat(level), inline_markdown(&block.content))
        }
        BlockType::CodeBlock => format!("```{}\n{}\n```", prop("language"), block.text()),
        BlockType::Math => format!("$${}$$", block.text()),
        BlockType::Image => format!("![{}]({})", escape(&block.text()), prop("url")),
        BlockType::Video => format!("![{}]({} \"width={}\")", escape(prop("name")), prop("url"), prop("width")),
        BlockType::File => format!("[{}]({} \"size={}\")", escape(prop("name")), prop("url"), prop("size")),
        BlockType::Button => format!("[{}]({})", escape(prop("name")), prop("url")),
        BlockType::Embed => format!("[Embed]({})", prop("url")),
        BlockType::WebEmbed => format!("[Web Embed]({})", prop("url")),
        BlockType::Nostr => format!("[Nostr: {}]({})", escape(prop("name")), prop("url")),
        BlockType::Query => String::new(),
    }
}

fn inline_markdown(content: &[InlineContent]) -> String {
    let mut out = String::new();
    for item in content {
        match item {
            InlineContent::Text(run) => out.push_str(&styled_markdown(run)),
            InlineContent::Link { href, content } => {
                let text: String = content.iter().map(styled_markdown).collect();
                out.push_str(&format!("[{text}]({href})"));
            }
            InlineContent::InlineEmbed { link } => out.push_str(&format!("[{link}]({link})")),
        }
    }
    out
}

fn escape(text: &str) -> String {
    static ESCAPE_REGEX: OnceLock<Regex> = OnceLock::new();
    ESCAPE_REGEX
        .get_or_init(|| Regex::new(r"([\\`*_\[\]<>~$])").expect("Invalid escape regex"))
        .replace_all(text, r"\$1")
        .into_owned()
}

/// Emphasis markers hug the text; surrounding whitespace stays outside.
fn styled_markdown(run: &StyledText) -> String {
    if run.styles.code {
        return format!("`{}`", run.text);
    }
    let core = run.text.trim();
    if core.is_empty() {
        return run.text.clone();
    }
    let start = run.text.len() - run.text.trim_start().len();
    let (lead, rest) = run.text.split_at(start);
    let trail = &rest[core.len()..];

    let mut text = escape(core);
    if run.styles.bold {
        text = format!("**{text}**");
    }
    if run.styles.italic {
        text = format!("*{text}*");
    }
    if run.styles.strike {
        text = format!("~~{text}~~");
    }
    format!("{lead}{text}{trail}")
}
