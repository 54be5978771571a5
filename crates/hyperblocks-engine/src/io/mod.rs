use std::fs;
use std::path::Path;

use log::debug;

use crate::error::{EngineError, Result};
use crate::exchange::{blocks_to_markdown, markdown_to_blocks};
use crate::model::{Block, PartialBlock};

/// On-disk layout, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Block list in the serde exchange layout.
    Json,
    Markdown,
}

impl DocumentFormat {
    /// `.json` files hold blocks; everything else is read as Markdown.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Markdown,
        }
    }
}

/// Read a document as blocks ready to hand to an editor.
pub fn read_document(path: &Path) -> Result<Vec<PartialBlock>> {
    let text = fs::read_to_string(path).map_err(|source| EngineError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let blocks = match DocumentFormat::from_path(path) {
        DocumentFormat::Json => serde_json::from_str(&text)?,
        DocumentFormat::Markdown => markdown_to_blocks(&text),
    };
    debug!("read {} top-level blocks from {}", blocks.len(), path.display());
    Ok(blocks)
}

/// Write blocks to `path`, creating missing parent directories.
pub fn write_document(path: &Path, blocks: &[Block]) -> Result<()> {
    let text = match DocumentFormat::from_path(path) {
        DocumentFormat::Json => serde_json::to_string_pretty(blocks)?,
        DocumentFormat::Markdown => blocks_to_markdown(blocks),
    };
    let write_error = |source| EngineError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_error)?;
    }
    fs::write(path, text).map_err(write_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InlineContent;
    use crate::schema::BlockType;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::TempDir;

    fn sample() -> Vec<Block> {
        vec![Block {
            id: "p1".to_string(),
            block_type: BlockType::Paragraph,
            props: Default::default(),
            content: vec![InlineContent::text("hello")],
            children: vec![],
        }]
    }

    #[rstest]
    #[case("doc.json", DocumentFormat::Json)]
    #[case("doc.JSON", DocumentFormat::Json)]
    #[case("doc.md", DocumentFormat::Markdown)]
    #[case("notes", DocumentFormat::Markdown)]
    fn test_format_from_extension(#[case] name: &str, #[case] expected: DocumentFormat) {
        assert_eq!(DocumentFormat::from_path(Path::new(name)), expected);
    }

    #[test]
    fn test_json_keeps_ids() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.json");

        write_document(&path, &sample()).expect("Should write document");
        let blocks = read_document(&path).expect("Should read document");

        assert_eq!(blocks, vec![PartialBlock::from(sample().remove(0))]);
    }

    #[test]
    fn test_markdown_drops_ids() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/dir/doc.md");

        write_document(&path, &sample()).expect("Should create parent directories");
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello\n");

        let blocks = read_document(&path).expect("Should read document");
        assert_eq!(blocks, vec![PartialBlock::paragraph("hello")]);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        let result = read_document(&dir.path().join("missing.md"));
        assert!(matches!(result, Err(EngineError::Read { .. })));
    }

    #[test]
    fn test_malformed_json_is_json_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();

        assert!(matches!(read_document(&path), Err(EngineError::Json(_))));
    }
}
