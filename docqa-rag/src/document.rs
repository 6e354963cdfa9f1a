//! Data types for documents, content blocks, retrievable units and results.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A source document together with its extracted markdown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Path of the original file.
    pub source: PathBuf,
    /// The extracted, markdown-like text.
    pub markdown: String,
}

/// The kind of content a [`ContentBlock`] carries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Prose,
    Table,
    Figure,
}

impl BlockKind {
    /// Whether blocks of this kind need a synthesized summary.
    pub fn is_complex(self) -> bool {
        matches!(self, Self::Table | Self::Figure)
    }
}

/// Where a block sits in the extracted document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BlockPosition {
    /// 0-based index of the block in document order.
    pub index: usize,
    /// 1-based line of the block's first line in the extracted markdown.
    pub line: usize,
}

/// A segment of a [`Document`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentBlock {
    pub kind: BlockKind,
    /// The raw markup of the block.
    pub markup: String,
    pub position: BlockPosition,
    /// Markdown heading path enclosing the block (`"A > B"`), empty at top level.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub heading_path: String,
}

/// An atomic retrievable unit of prose.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: String,
    pub text: String,
    pub source: BlockPosition,
}

impl Node {
    pub fn new(text: impl Into<String>, source: BlockPosition) -> Self {
        Self { id: Uuid::new_v4().to_string(), text: text.into(), source }
    }
}

/// A retrievable stand-in for a complex block such as a table.
///
/// The summary is what gets embedded and matched; the original content is what
/// the generator sees.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Object {
    pub id: String,
    pub summary: String,
    pub content: String,
    pub kind: BlockKind,
    pub source: BlockPosition,
}

impl Object {
    pub fn new(
        summary: impl Into<String>,
        content: impl Into<String>,
        kind: BlockKind,
        source: BlockPosition,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            summary: summary.into(),
            content: content.into(),
            kind,
            source,
        }
    }
}

/// Anything that can be embedded, stored and retrieved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Retrievable {
    Node(Node),
    Object(Object),
}

impl Retrievable {
    /// Identifier of the stored vector record.
    pub fn id(&self) -> &str {
        match self {
            Self::Node(node) => &node.id,
            Self::Object(object) => &object.id,
        }
    }

    /// Text used for the embedding and for similarity matching.
    pub fn embedding_text(&self) -> &str {
        match self {
            Self::Node(node) => &node.text,
            Self::Object(object) => &object.summary,
        }
    }

    /// Text handed to the generator; objects contribute their original content.
    pub fn context_text(&self) -> &str {
        match self {
            Self::Node(node) => &node.text,
            Self::Object(object) => &object.content,
        }
    }

    pub fn source(&self) -> BlockPosition {
        match self {
            Self::Node(node) => node.source,
            Self::Object(object) => object.source,
        }
    }
}

impl From<Node> for Retrievable {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

impl From<Object> for Retrievable {
    fn from(object: Object) -> Self {
        Self::Object(object)
    }
}

/// A stored `(identifier, embedding, text)` triple.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    /// Serialized [`Retrievable`].
    pub text: String,
}

/// A retrieved [`Retrievable`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredRetrievable {
    pub item: Retrievable,
    /// Higher is more relevant.
    pub score: f32,
}

/// The answer to one query of a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryResult {
    pub query: String,
    pub answer: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position() -> BlockPosition {
        BlockPosition { index: 0, line: 1 }
    }

    #[test]
    fn object_matches_on_summary_and_answers_with_content() {
        let item: Retrievable =
            Object::new("Revenue by year", "| Revenue | $5M |", BlockKind::Table, position())
                .into();
        assert_eq!(item.embedding_text(), "Revenue by year");
        assert_eq!(item.context_text(), "| Revenue | $5M |");
    }

    #[test]
    fn retrievable_survives_record_text_encoding() {
        let item: Retrievable = Node::new("Company X was founded in 2010.", position()).into();
        let text = serde_json::to_string(&item).unwrap();
        assert!(text.contains("\"type\":\"node\""));
        let decoded: Retrievable = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded, item);
    }

    #[test]
    fn node_ids_are_unique() {
        let a = Node::new("a", position());
        let b = Node::new("a", position());
        assert_ne!(a.id, b.id);
    }
}
