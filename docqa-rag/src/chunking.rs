//! Prose chunking.
//!
//! [`RecursiveChunker`] splits a prose block hierarchically: paragraphs, then
//! sentences, then words, then raw characters. Chunks are prefixed with the
//! heading path of the block they came from so that a chunk deep inside a
//! section still matches queries about the section title.

use crate::document::{ContentBlock, Node};

/// A strategy for splitting a prose block into nodes.
pub trait Chunker: Send + Sync {
    /// Split a block into nodes. Returns an empty `Vec` for blank blocks.
    fn chunk(&self, block: &ContentBlock) -> Vec<Node>;
}

const SEPARATORS: [&str; 5] = ["\n\n", ". ", "! ", "? ", " "];

/// Splits text hierarchically: paragraphs → sentences → words.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(512, 100);
/// let nodes = chunker.chunk(&block);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of characters carried over between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }

    /// Split raw text into chunk strings.
    pub fn split(&self, text: &str) -> Vec<String> {
        split_and_merge(text.trim(), self.chunk_size, self.chunk_overlap, &SEPARATORS)
            .into_iter()
            .map(|chunk| chunk.trim().to_string())
            .filter(|chunk| !chunk.is_empty())
            .collect()
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, block: &ContentBlock) -> Vec<Node> {
        let prefix = if block.heading_path.is_empty() || block.markup.trim_start().starts_with('#')
        {
            None
        } else {
            Some(block.heading_path.as_str())
        };

        self.split(&block.markup)
            .into_iter()
            .map(|text| {
                let text = match prefix {
                    Some(path) => format!("{path}\n{text}"),
                    None => text,
                };
                Node::new(text, block.position)
            })
            .collect()
    }
}

/// Split text by a separator, then merge segments into chunks that respect
/// `chunk_size`. If a segment exceeds `chunk_size`, it is split further
/// using the next-level separator.
fn split_and_merge(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[&str],
) -> Vec<String> {
    if text.chars().count() <= chunk_size || separators.is_empty() {
        return split_by_size(text, chunk_size, chunk_overlap);
    }

    let separator = separators[0];
    let remaining_separators = &separators[1..];
    let segments = split_keeping_separator(text, separator);

    let mut chunks = Vec::new();
    let mut current = String::new();

    for segment in segments {
        if current.is_empty() {
            current = segment.to_string();
        } else if current.chars().count() + segment.chars().count() <= chunk_size {
            current.push_str(segment);
        } else {
            let tail = overlap_tail(&current, chunk_overlap);
            flush(&mut chunks, current, chunk_size, chunk_overlap, remaining_separators);
            current = if tail.chars().count() + segment.chars().count() <= chunk_size {
                format!("{tail}{segment}")
            } else {
                segment.to_string()
            };
        }
    }

    if !current.is_empty() {
        flush(&mut chunks, current, chunk_size, chunk_overlap, remaining_separators);
    }

    chunks
}

fn flush(
    chunks: &mut Vec<String>,
    current: String,
    chunk_size: usize,
    chunk_overlap: usize,
    remaining_separators: &[&str],
) {
    if current.chars().count() > chunk_size {
        chunks.extend(split_and_merge(&current, chunk_size, chunk_overlap, remaining_separators));
    } else {
        chunks.push(current);
    }
}

/// The last `overlap` characters of `text`, starting at a word boundary.
fn overlap_tail(text: &str, overlap: usize) -> String {
    if overlap == 0 {
        return String::new();
    }
    let count = text.chars().count();
    let tail: String = text.chars().skip(count.saturating_sub(overlap)).collect();
    if count <= overlap {
        return tail;
    }
    match tail.find(char::is_whitespace) {
        Some(pos) => tail[pos..].trim_start().to_string(),
        None => String::new(),
    }
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

/// Character-based splitting with overlap, safe on multi-byte text.
fn split_by_size(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let chunk_size = chunk_size.max(1);
    // An overlap that swallows the whole chunk degrades to no overlap.
    let step = match chunk_size.saturating_sub(chunk_overlap) {
        0 => chunk_size,
        step => step,
    };
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}
