//! HTML import and export.
//!
//! Import reads any fragment with `scraper`: unknown containers are looked
//! through, loose inline content becomes paragraphs, and lists and quotes
//! become child groups the same way Markdown import makes them.

use std::sync::OnceLock;

use html_escape::{encode_double_quoted_attribute, encode_text};
use regex::Regex;
use scraper::{ElementRef, Html};

use crate::model::{Block, InlineContent, PartialBlock, StyledText, Styles};
use crate::schema::{BlockType, CHILDREN_TYPE_PROP, ChildrenType};

use super::markdown::{attach_group, into_item, nest_under_headings, push_run, trim_content};

// ============ Import ============

/// Parse an HTML fragment into blocks without IDs.
pub fn html_to_blocks(html: &str) -> Vec<PartialBlock> {
    let fragment = Html::parse_fragment(html);
    nest_under_headings(collect_blocks(fragment.root_element()))
}

const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "br", "cite", "code", "del", "em", "i", "kbd", "mark", "q", "s", "small",
    "span", "strike", "strong", "sub", "sup", "u",
];

/// Inline content of one paragraph-like element.
#[derive(Default)]
struct InlineBuilder {
    content: Vec<InlineContent>,
}

impl InlineBuilder {
    fn walk(&mut self, element: ElementRef<'_>, styles: &Styles, href: Option<&str>) {
        let mut styles = styles.clone();
        let mut href = href.map(str::to_string);
        match element.value().name() {
            "strong" | "b" => styles.bold = true,
            "em" | "i" => styles.italic = true,
            "u" => styles.underline = true,
            "s" | "del" | "strike" => styles.strike = true,
            "code" | "kbd" => styles.code = true,
            "a" => href = element.value().attr("href").map(str::to_string).or(href),
            "br" => {
                self.push("\n", &styles, href.as_deref());
                return;
            }
            _ => {}
        }
        for child in element.children() {
            if let Some(text) = child.value().as_text() {
                self.push(&collapse_whitespace(text), &styles, href.as_deref());
            } else if let Some(child) = ElementRef::wrap(child) {
                self.walk(child, &styles, href.as_deref());
            }
        }
    }

    fn push(&mut self, text: &str, styles: &Styles, href: Option<&str>) {
        if text.is_empty() {
            return;
        }
        let run = StyledText {
            text: text.to_string(),
            styles: styles.clone(),
        };
        match (href, self.content.last_mut()) {
            (Some(href), Some(InlineContent::Link { href: last, content })) if *last == href => {
                push_run(content, run)
            }
            (Some(href), _) => self.content.push(InlineContent::Link {
                href: href.to_string(),
                content: vec![run],
            }),
            (None, Some(InlineContent::Text(last))) if last.styles == run.styles => {
                last.text.push_str(&run.text)
            }
            (None, _) => self.content.push(InlineContent::Text(run)),
        }
    }

    fn finish(&mut self) -> Vec<InlineContent> {
        trim_content(std::mem::take(&mut self.content))
    }
}

fn collapse_whitespace(text: &str) -> String {
    static WHITESPACE_REGEX: OnceLock<Regex> = OnceLock::new();
    WHITESPACE_REGEX
        .get_or_init(|| Regex::new(r"\s+").expect("Invalid whitespace regex"))
        .replace_all(text, " ")
        .into_owned()
}

fn inline_of(element: ElementRef<'_>) -> Vec<InlineContent> {
    let mut inline = InlineBuilder::default();
    inline.walk(element, &Styles::default(), None);
    inline.finish()
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// Links standing on their own between blocks are file, button or embed
/// blocks; anywhere else they are inline links.
fn is_block_link(element: ElementRef<'_>) -> bool {
    let el = element.value();
    el.name() == "a"
        && (el.attr("download").is_some()
            || el.attr("role") == Some("button")
            || el.attr("href").is_some_and(|href| text_of(element).trim() == href))
}

/// Blocks among the children of `parent`.
fn collect_blocks(parent: ElementRef<'_>) -> Vec<PartialBlock> {
    let mut blocks = Vec::new();
    let mut pending = InlineBuilder::default();
    let plain = Styles::default();

    for child in parent.children() {
        if let Some(text) = child.value().as_text() {
            pending.push(&collapse_whitespace(text), &plain, None);
            continue;
        }
        let Some(element) = ElementRef::wrap(child) else {
            continue;
        };
        if INLINE_TAGS.contains(&element.value().name()) && !is_block_link(element) {
            pending.walk(element, &plain, None);
            continue;
        }
        push_paragraph(&mut blocks, pending.finish());
        push_element(&mut blocks, element);
    }
    push_paragraph(&mut blocks, pending.finish());
    blocks
}

fn push_paragraph(blocks: &mut Vec<PartialBlock>, content: Vec<InlineContent>) {
    if !content.is_empty() {
        blocks.push(PartialBlock::new(BlockType::Paragraph).with_content(content));
    }
}

fn push_element(blocks: &mut Vec<PartialBlock>, element: ElementRef<'_>) {
    let el = element.value();
    let url = |name: &str| el.attr(name).unwrap_or_default().to_string();
    match el.name() {
        "p" => {
            let content = inline_of(element);
            if content.is_empty() {
                // A paragraph around an image or video.
                blocks.extend(collect_blocks(element));
            } else {
                push_paragraph(blocks, content);
            }
        }
        name @ ("h1" | "h2" | "h3" | "h4" | "h5" | "h6") => blocks.push(
            PartialBlock::new(BlockType::Heading)
                .with_prop("level", &name[1..])
                .with_content(inline_of(element)),
        ),
        "pre" => {
            let language = element
                .children()
                .filter_map(ElementRef::wrap)
                .find(|code| code.value().name() == "code")
                .and_then(|code| {
                    code.value()
                        .classes()
                        .find_map(|class| class.strip_prefix("language-"))
                        .map(str::to_string)
                });
            let mut block = PartialBlock::new(BlockType::CodeBlock).with_text(text_of(element));
            if let Some(language) = language {
                block = block.with_prop("language", language);
            }
            blocks.push(block);
        }
        "div" if el.attr("data-type") == Some("math") => {
            blocks.push(PartialBlock::new(BlockType::Math).with_text(text_of(element)));
        }
        "img" => {
            let block = PartialBlock::new(BlockType::Image).with_prop("url", url("src"));
            blocks.push(match el.attr("alt").filter(|alt| !alt.is_empty()) {
                Some(alt) => block.with_text(alt),
                None => block,
            });
        }
        "video" => blocks.push(PartialBlock::new(BlockType::Video).with_prop("url", url("src"))),
        "a" => {
            let name = text_of(element).trim().to_string();
            let block = if el.attr("download").is_some() {
                PartialBlock::new(BlockType::File).with_prop("name", name)
            } else if el.attr("role") == Some("button") {
                PartialBlock::new(BlockType::Button).with_prop("name", name)
            } else {
                PartialBlock::new(BlockType::Embed)
            };
            blocks.push(block.with_prop("url", url("href")));
        }
        list @ ("ul" | "ol") => {
            let list_type = if list == "ol" {
                ChildrenType::Ordered
            } else {
                ChildrenType::Unordered
            };
            let items = element
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|item| item.value().name() == "li")
                .map(|item| into_item(collect_blocks(item)))
                .collect();
            attach_group(blocks, list_type, items);
        }
        "blockquote" => attach_group(blocks, ChildrenType::Blockquote, collect_blocks(element)),
        "head" | "script" | "style" | "template" | "title" | "hr" => {}
        _ => blocks.extend(collect_blocks(element)),
    }
}

// ============ Export ============

/// Render blocks as an HTML fragment. List groups become `<ol>`/`<ul>`,
/// quote groups `<blockquote>`; plain groups are written after their parent.
pub fn blocks_to_html(blocks: &[Block]) -> String {
    let mut out = String::new();
    for block in blocks {
        write_block(&mut out, block);
    }
    out
}

fn write_block(out: &mut String, block: &Block) {
    write_body(out, block);
    if block.children.is_empty() {
        return;
    }
    let children_type = block
        .prop(CHILDREN_TYPE_PROP)
        .and_then(|value| value.parse().ok())
        .unwrap_or_default();
    let (open, close, item) = match children_type {
        ChildrenType::Ordered => ("<ol>", "</ol>", true),
        ChildrenType::Unordered => ("<ul>", "</ul>", true),
        ChildrenType::Blockquote => ("<blockquote>", "</blockquote>", false),
        ChildrenType::Group => ("", "", false),
    };
    out.push_str(open);
    for child in &block.children {
        if item {
            out.push_str("<li>");
            write_block(out, child);
            out.push_str("</li>");
        } else {
            write_block(out, child);
        }
    }
    out.push_str(close);
}

fn write_body(out: &mut String, block: &Block) {
    let attr = |name: &str| encode_double_quoted_attribute(block.prop(name).unwrap_or_default()).into_owned();
    match block.block_type {
        BlockType::Paragraph => {
            out.push_str("<p>");
            write_inline(out, &block.content);
            out.push_str("</p>");
        }
        BlockType::Heading => {
            let level = block
                .prop("level")
                .and_then(|level| level.parse::<usize>().ok())
                .unwrap_or(1)
                .clamp(1, 6);
            out.push_str(&format!("<h{level}>"));
            write_inline(out, &block.content);
            out.push_str(&format!("</h{level}>"));
        }
        BlockType::CodeBlock => {
            match block.prop("language").filter(|lang| !lang.is_empty()) {
                Some(lang) => out.push_str(&format!(
                    "<pre><code class=\"language-{}\">",
                    encode_double_quoted_attribute(lang)
                )),
                None => out.push_str("<pre><code>"),
            }
            out.push_str(&encode_text(&block.text()));
            out.push_str("</code></pre>");
        }
        BlockType::Math => {
            out.push_str(&format!("<div data-type=\"math\">{}</div>", encode_text(&block.text())));
        }
        BlockType::Image => out.push_str(&format!(
            "<img src=\"{}\" alt=\"{}\">",
            attr("url"),
            encode_double_quoted_attribute(&block.text())
        )),
        BlockType::Video => out.push_str(&format!("<video src=\"{}\" controls></video>", attr("url"))),
        BlockType::File => out.push_str(&format!(
            "<a href=\"{}\" download>{}</a>",
            attr("url"),
            encode_text(block.prop("name").unwrap_or_default())
        )),
        BlockType::Button => out.push_str(&format!(
            "<a href=\"{}\" role=\"button\">{}</a>",
            attr("url"),
            encode_text(block.prop("name").unwrap_or_default())
        )),
        BlockType::Embed | BlockType::WebEmbed | BlockType::Nostr => {
            let url = attr("url");
            out.push_str(&format!("<a href=\"{url}\">{url}</a>"));
        }
        BlockType::Query => {}
    }
}

fn write_inline(out: &mut String, content: &[InlineContent]) {
    for item in content {
        match item {
            InlineContent::Text(run) => write_run(out, run),
            InlineContent::Link { href, content } => {
                out.push_str(&format!("<a href=\"{}\">", encode_double_quoted_attribute(href)));
                content.iter().for_each(|run| write_run(out, run));
                out.push_str("</a>");
            }
            InlineContent::InlineEmbed { link } => {
                let link = encode_double_quoted_attribute(link);
                out.push_str(&format!("<a href=\"{link}\">{link}</a>"));
            }
        }
    }
}

fn write_run(out: &mut String, run: &StyledText) {
    let styles = &run.styles;
    let tags: Vec<&str> = [
        (styles.bold, "strong"),
        (styles.italic, "em"),
        (styles.underline, "u"),
        (styles.strike, "s"),
        (styles.code, "code"),
    ]
    .into_iter()
    .filter_map(|(on, tag)| on.then_some(tag))
    .collect();

    tags.iter().for_each(|tag| out.push_str(&format!("<{tag}>")));
    out.push_str(&encode_text(&run.text));
    tags.iter().rev().for_each(|tag| out.push_str(&format!("</{tag}>")));
}
