//! Turning content blocks into retrievable nodes and objects.
//!
//! Prose blocks are chunked into [`Node`]s. Tables and figures become
//! [`Object`]s whose embedded text is a generated summary; the summaries are
//! requested with at most `num_workers` calls in flight and collected by block
//! index, so the output keeps document order. A block whose summary fails is
//! skipped and reported in [`NodeSet::skipped`].

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use crate::chunking::Chunker;
use crate::document::{BlockKind, BlockPosition, ContentBlock, Node, Object, Retrievable};
use crate::error::{RagError, Result};
use crate::generator::Generator;
use crate::prompt::{self, FIGURE_SUMMARY_QUERY, TABLE_SUMMARY_QUERY};

/// A complex block left out of the index because it could not be summarized.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SkippedBlock {
    pub position: BlockPosition,
    pub kind: BlockKind,
    pub error: String,
}

/// The output of [`NodeBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct NodeSet {
    /// Prose nodes, in document order.
    pub nodes: Vec<Node>,
    /// Summarized tables and figures, in document order.
    pub objects: Vec<Object>,
    pub skipped: Vec<SkippedBlock>,
}

impl NodeSet {
    /// Everything to be indexed: base nodes first, then objects.
    pub fn into_retrievables(self) -> Vec<Retrievable> {
        self.nodes
            .into_iter()
            .map(Retrievable::from)
            .chain(self.objects.into_iter().map(Retrievable::from))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len() + self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Splits and summarizes content blocks.
pub struct NodeBuilder {
    chunker: Arc<dyn Chunker>,
    generator: Arc<dyn Generator>,
    num_workers: usize,
}

impl NodeBuilder {
    pub fn new(
        chunker: Arc<dyn Chunker>,
        generator: Arc<dyn Generator>,
        num_workers: usize,
    ) -> Self {
        Self { chunker, generator, num_workers: num_workers.max(1) }
    }

    /// Build nodes and objects from `blocks`.
    pub async fn build(&self, blocks: impl IntoIterator<Item = ContentBlock>) -> NodeSet {
        let mut set = NodeSet::default();
        let mut complex = Vec::new();

        for block in blocks {
            if block.kind.is_complex() {
                complex.push(block);
            } else {
                set.nodes.extend(self.chunker.chunk(&block));
            }
        }

        let mut outcomes: Vec<Option<Result<String>>> = complex.iter().map(|_| None).collect();
        let summaries: Vec<_> = complex
            .iter()
            .enumerate()
            .map(|(slot, block)| async move { (slot, self.summarize(block).await) })
            .collect();
        let completed: Vec<(usize, Result<String>)> = stream::iter(summaries)
            .buffer_unordered(self.num_workers)
            .collect()
            .await;
        for (slot, outcome) in completed {
            outcomes[slot] = Some(outcome);
        }

        for (block, outcome) in complex.into_iter().zip(outcomes) {
            match outcome {
                Some(Ok(summary)) => {
                    let object = Object::new(summary, block.markup, block.kind, block.position);
                    set.objects.push(object);
                }
                Some(Err(e)) => {
                    warn!(
                        block = block.position.index,
                        line = block.position.line,
                        error = %e,
                        "skipping block that failed to summarize"
                    );
                    set.skipped.push(SkippedBlock {
                        position: block.position,
                        kind: block.kind,
                        error: e.to_string(),
                    });
                }
                None => {}
            }
        }

        info!(
            nodes = set.nodes.len(),
            objects = set.objects.len(),
            skipped = set.skipped.len(),
            "built retrievable nodes"
        );
        set
    }

    async fn summarize(&self, block: &ContentBlock) -> Result<String> {
        let query = match block.kind {
            BlockKind::Figure => FIGURE_SUMMARY_QUERY,
            _ => TABLE_SUMMARY_QUERY,
        };
        let context = if block.heading_path.is_empty() {
            block.markup.clone()
        } else {
            format!("Section: {}\n\n{}", block.heading_path, block.markup)
        };

        let summary = self.generator.complete(&context, query).await?;
        if summary.trim().is_empty() {
            return Err(RagError::Generation {
                provider: self.generator.name().to_string(),
                message: "empty summary".to_string(),
            });
        }

        Ok(match block.kind {
            BlockKind::Table => prompt::describe_table(&summary, &block.markup),
            _ => summary.trim().to_string(),
        })
    }
}
