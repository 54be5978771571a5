//! Conversion between blocks and external text formats.

pub mod html;
pub mod markdown;

pub use html::{blocks_to_html, html_to_blocks};
pub use markdown::{blocks_to_markdown, markdown_to_blocks};
