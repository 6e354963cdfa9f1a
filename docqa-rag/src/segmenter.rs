//! Document segmentation.
//!
//! A [`DocumentExtractor`] turns a file into markdown-like text, and
//! [`Segmenter::segment`] wraps the result in [`ContentBlocks`], a lazy
//! iterator that yields [`ContentBlock`]s in document order:
//!
//! - a run of `|` lines containing a delimiter row (`|---|`) is a table
//! - a markdown image line (`![alt](src)`) is a figure, together with a caption
//!   line directly below it
//! - everything else is prose, split at blank lines and headings

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::document::{BlockKind, BlockPosition, ContentBlock, Document};
use crate::error::{RagError, Result};

/// Extracts structured text from a source file.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Extract the document at `path`, steering extraction with `guidance`.
    ///
    /// Fails with [`RagError::DocumentParse`] if the file is unreadable or
    /// unsupported.
    async fn extract(&self, path: &Path, guidance: &str) -> Result<Document>;
}

/// Reads UTF-8 text or markdown files as-is.
///
/// Extraction guidance has no effect on local files.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

#[async_trait]
impl DocumentExtractor for PlainTextExtractor {
    async fn extract(&self, path: &Path, _guidance: &str) -> Result<Document> {
        let bytes = tokio::fs::read(path).await.map_err(|e| RagError::DocumentParse {
            path: path.display().to_string(),
            message: format!("failed to read file: {e}"),
        })?;
        let markdown = String::from_utf8(bytes).map_err(|_| RagError::DocumentParse {
            path: path.display().to_string(),
            message: "unsupported document: not UTF-8 text".to_string(),
        })?;
        Ok(Document { source: path.to_path_buf(), markdown })
    }
}

/// Converts a document file into a lazy sequence of content blocks.
#[derive(Clone)]
pub struct Segmenter {
    extractor: Arc<dyn DocumentExtractor>,
    guidance: String,
}

impl Segmenter {
    pub fn new(extractor: Arc<dyn DocumentExtractor>, guidance: impl Into<String>) -> Self {
        Self { extractor, guidance: guidance.into() }
    }

    /// Extract `path` and return its blocks. Extraction errors are not retried.
    pub async fn segment(&self, path: &Path) -> Result<ContentBlocks> {
        let document = self.extractor.extract(path, &self.guidance).await?;
        info!(
            path = %path.display(),
            chars = document.markdown.len(),
            "extracted document"
        );
        Ok(ContentBlocks::new(document))
    }
}

/// A finite, non-restartable iterator over the blocks of one [`Document`].
#[derive(Debug)]
pub struct ContentBlocks {
    document: Document,
    offset: usize,
    line: usize,
    index: usize,
    headings: Vec<String>,
}

impl ContentBlocks {
    pub fn new(document: Document) -> Self {
        Self { document, offset: 0, line: 1, index: 0, headings: Vec::new() }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }
}

impl Iterator for ContentBlocks {
    type Item = ContentBlock;

    fn next(&mut self) -> Option<ContentBlock> {
        let text = self.document.markdown.as_str();
        let mut cursor = self.offset;
        let mut line_no = self.line;

        // Skip blank lines and horizontal rules (page separators).
        let first = loop {
            let Some((line, len)) = line_at(text, cursor) else {
                self.offset = text.len();
                return None;
            };
            if is_blank_or_rule(line) {
                cursor += len;
                line_no += 1;
            } else {
                break line;
            }
        };

        let start_line = line_no;
        let kind;
        let mut lines: Vec<&str> = Vec::new();

        if is_table_line(first) {
            while let Some((line, len)) = line_at(text, cursor) {
                if !is_table_line(line) {
                    break;
                }
                lines.push(line);
                cursor += len;
                line_no += 1;
            }
            kind = if lines.iter().any(|l| is_delimiter_row(l)) {
                BlockKind::Table
            } else {
                BlockKind::Prose
            };
        } else if is_image_line(first) {
            let (_, len) = line_at(text, cursor)?;
            lines.push(first);
            cursor += len;
            line_no += 1;
            if let Some((caption, len)) = line_at(text, cursor) {
                if is_caption_line(caption) {
                    lines.push(caption);
                    cursor += len;
                    line_no += 1;
                }
            }
            kind = BlockKind::Figure;
        } else {
            while let Some((line, len)) = line_at(text, cursor) {
                let starts_block = !lines.is_empty()
                    && (heading_level(line).is_some()
                        || is_table_line(line)
                        || is_image_line(line));
                if line.trim().is_empty() || starts_block {
                    break;
                }
                if let Some(level) = heading_level(line) {
                    let title = line.trim_start()[level..].trim().to_string();
                    self.headings.truncate(level.saturating_sub(1));
                    self.headings.push(title);
                }
                lines.push(line);
                cursor += len;
                line_no += 1;
            }
            kind = BlockKind::Prose;
        }

        let block = ContentBlock {
            kind,
            markup: lines.join("\n"),
            position: BlockPosition { index: self.index, line: start_line },
            heading_path: self.headings.join(" > "),
        };
        debug!(block = self.index, kind = ?block.kind, line = start_line, "segmented block");

        self.offset = cursor;
        self.line = line_no;
        self.index += 1;
        Some(block)
    }
}

/// Return the line starting at `offset` (without its terminator) and the
/// number of bytes to advance past it.
fn line_at(text: &str, offset: usize) -> Option<(&str, usize)> {
    if offset >= text.len() {
        return None;
    }
    let rest = &text[offset..];
    let (line, len) = match rest.find('\n') {
        Some(pos) => (&rest[..pos], pos + 1),
        None => (rest, rest.len()),
    };
    Some((line.strip_suffix('\r').unwrap_or(line), len))
}

fn is_blank_or_rule(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || (trimmed.len() >= 3 && trimmed.chars().all(|c| c == '-'))
}

fn heading_level(line: &str) -> Option<usize> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    (level > 0 && level <= 6 && trimmed[level..].starts_with(' ')).then_some(level)
}

fn is_table_line(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

fn is_delimiter_row(line: &str) -> bool {
    let cells: Vec<&str> =
        line.trim().trim_matches('|').split('|').map(str::trim).collect();
    !cells.is_empty()
        && cells.iter().all(|cell| {
            cell.contains('-') && cell.chars().all(|c| c == '-' || c == ':')
        })
}

fn is_image_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with("![") && trimmed.contains("](") && trimmed.ends_with(')')
}

fn is_caption_line(line: &str) -> bool {
    let trimmed = line.trim();
    let lower = trimmed.to_lowercase();
    !trimmed.is_empty()
        && (trimmed.starts_with('*')
            || trimmed.starts_with('_')
            || lower.starts_with("figure")
            || lower.starts_with("fig."))
}
