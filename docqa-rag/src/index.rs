//! The per-document vector index.
//!
//! [`VectorIndex`] pairs a [`VectorStore`] with an [`EmbeddingProvider`] and
//! works on an explicitly scoped [`IndexHandle`]: every pipeline run creates
//! its own table, so concurrent runs never reset each other's data.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::document::{Retrievable, ScoredRetrievable, VectorRecord};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::{TableSchema, VectorStore};

/// The name of one index (vector store table).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexHandle(String);

impl IndexHandle {
    /// Use a caller-chosen name. Only ASCII letters, digits, `_` and `-` are allowed.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let valid = !name.is_empty()
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(RagError::Config(format!("invalid index name '{name}'")));
        }
        Ok(Self(name))
    }

    /// A fresh, run-scoped name: `{prefix}_{uuid}`.
    pub fn scoped(prefix: &str) -> Self {
        Self(format!("{prefix}_{}", Uuid::new_v4().simple()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IndexHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Embeds, stores and searches [`Retrievable`]s.
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl VectorIndex {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
    ) -> Self {
        Self { store, embedder, batch_size: batch_size.max(1) }
    }

    /// The fixed embedding dimension `D` of indexes built by this instance.
    pub fn dimensions(&self) -> usize {
        self.embedder.dimensions()
    }

    /// Ensure a fresh, empty table under `handle`, dropping any existing one.
    pub async fn reset(&self, handle: &IndexHandle) -> Result<()> {
        let name = handle.name();
        if self.store.list_tables().await?.iter().any(|t| t == name) {
            self.store.drop_table(name).await?;
            debug!(index = name, "dropped existing index");
        }
        self.store.create_table(name, TableSchema::l2(self.dimensions())).await?;
        info!(index = name, dimensions = self.dimensions(), "created empty index");
        Ok(())
    }

    /// Embed and insert every item. Returns the number of records stored.
    ///
    /// Batches already inserted stay in place if a later batch fails.
    pub async fn build(&self, handle: &IndexHandle, items: &[Retrievable]) -> Result<usize> {
        let dimensions = self.dimensions();
        let mut stored = 0;

        for batch in items.chunks(self.batch_size) {
            let texts: Vec<&str> = batch.iter().map(Retrievable::embedding_text).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(RagError::Embedding {
                    provider: self.embedder.name().to_string(),
                    message: format!(
                        "expected {} embeddings, got {}",
                        batch.len(),
                        embeddings.len()
                    ),
                });
            }

            let records = batch
                .iter()
                .zip(embeddings)
                .map(|(item, embedding)| {
                    check_dimensions(dimensions, &embedding)?;
                    let text = serde_json::to_string(item).map_err(|e| {
                        RagError::index(handle.name(), format!("failed to encode record: {e}"))
                    })?;
                    Ok(VectorRecord { id: item.id().to_string(), embedding, text })
                })
                .collect::<Result<Vec<VectorRecord>>>()?;

            self.store.insert(handle.name(), &records).await?;
            stored += records.len();
            debug!(index = %handle, batch = records.len(), stored, "inserted batch");
        }

        info!(index = %handle, records = stored, "built index");
        Ok(stored)
    }

    /// Embed a query string.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self.embedder.embed(text).await?;
        check_dimensions(self.dimensions(), &embedding)?;
        Ok(embedding)
    }

    /// The `k` records nearest to `embedding`, highest score first.
    ///
    /// The score is the negated L2 distance.
    pub async fn search(
        &self,
        handle: &IndexHandle,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredRetrievable>> {
        check_dimensions(self.dimensions(), embedding)?;
        let neighbors = self.store.search(handle.name(), embedding, k).await?;

        neighbors
            .into_iter()
            .map(|neighbor| {
                let item: Retrievable =
                    serde_json::from_str(&neighbor.record.text).map_err(|e| {
                        RagError::Schema(format!(
                            "record '{}' has malformed text: {e}",
                            neighbor.record.id
                        ))
                    })?;
                Ok(ScoredRetrievable { item, score: -neighbor.distance })
            })
            .collect()
    }

    /// Discard the table under `handle`.
    pub async fn discard(&self, handle: &IndexHandle) -> Result<()> {
        self.store.drop_table(handle.name()).await
    }
}

fn check_dimensions(expected: usize, embedding: &[f32]) -> Result<()> {
    if embedding.len() != expected {
        return Err(RagError::Schema(format!(
            "expected {expected}-dimensional embedding, got {}",
            embedding.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::document::{BlockKind, BlockPosition, Node, Object};
    use crate::inmemory::InMemoryVectorStore;

    /// Embeds text as `[len, vowels, 1.0]`; optionally one dimension too long.
    struct ShapeEmbedder {
        oversized: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for ShapeEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let vowels = text.chars().filter(|c| "aeiou".contains(*c)).count();
            let mut v = vec![text.len() as f32, vowels as f32, 1.0];
            if self.oversized {
                v.push(0.0);
            }
            Ok(v)
        }

        fn dimensions(&self) -> usize {
            3
        }

        fn name(&self) -> &str {
            "shape"
        }
    }

    /// Drops the last embedding of every batch.
    struct ShortEmbedder;

    #[async_trait]
    impl EmbeddingProvider for ShortEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.0; 3])
        }

        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![0.0; 3]; texts.len().saturating_sub(1)])
        }

        fn dimensions(&self) -> usize {
            3
        }

        fn name(&self) -> &str {
            "short"
        }
    }

    fn index(oversized: bool) -> (VectorIndex, Arc<InMemoryVectorStore>) {
        let store = Arc::new(InMemoryVectorStore::new());
        (VectorIndex::new(store.clone(), Arc::new(ShapeEmbedder { oversized }), 2), store)
    }

    fn position() -> BlockPosition {
        BlockPosition { index: 0, line: 1 }
    }

    #[test]
    fn handle_names_are_validated_and_scoped() {
        assert!(IndexHandle::new("docqa_run-1").is_ok());
        assert!(IndexHandle::new("bad name").is_err());
        assert!(IndexHandle::new("").is_err());
        let a = IndexHandle::scoped("docqa");
        let b = IndexHandle::scoped("docqa");
        assert!(a.name().starts_with("docqa_"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn reset_drops_previous_contents() {
        let (index, store) = index(false);
        let handle = IndexHandle::new("reset_me").unwrap();
        index.reset(&handle).await.unwrap();
        let items: Vec<Retrievable> = vec![Node::new("hello", position()).into()];
        index.build(&handle, &items).await.unwrap();
        assert_eq!(store.len("reset_me").await, Some(1));

        index.reset(&handle).await.unwrap();
        assert_eq!(store.len("reset_me").await, Some(0));
    }

    #[tokio::test]
    async fn search_returns_objects_with_original_content() {
        let (index, _) = index(false);
        let handle = IndexHandle::new("objects").unwrap();
        index.reset(&handle).await.unwrap();
        let items: Vec<Retrievable> = vec![
            Node::new("a much longer prose paragraph about nothing", position()).into(),
            Object::new("revenue", "| Revenue | $5M |", BlockKind::Table, position()).into(),
        ];
        assert_eq!(index.build(&handle, &items).await.unwrap(), 2);

        let query = index.embed_query("revenue").await.unwrap();
        let hits = index.search(&handle, &query, 1).await.unwrap();
        assert_eq!(hits[0].item.context_text(), "| Revenue | $5M |");
        assert_eq!(hits[0].score, 0.0);
    }

    #[tokio::test]
    async fn wrong_embedding_dimension_fails_build() {
        let (index, store) = index(true);
        let handle = IndexHandle::new("oversized").unwrap();
        index.reset(&handle).await.unwrap();
        let items: Vec<Retrievable> = vec![Node::new("hello", position()).into()];
        let err = index.build(&handle, &items).await.unwrap_err();
        assert!(matches!(err, RagError::Schema(_)));
        assert_eq!(store.len("oversized").await, Some(0));
    }

    #[tokio::test]
    async fn missing_embeddings_name_the_provider() {
        let index =
            VectorIndex::new(Arc::new(InMemoryVectorStore::new()), Arc::new(ShortEmbedder), 4);
        let handle = IndexHandle::new("short").unwrap();
        index.reset(&handle).await.unwrap();
        let items: Vec<Retrievable> =
            vec![Node::new("one", position()).into(), Node::new("two", position()).into()];
        let err = index.build(&handle, &items).await.unwrap_err();
        assert!(matches!(err, RagError::Embedding { ref provider, .. } if provider == "short"));
    }

    #[tokio::test]
    async fn search_on_missing_index_is_an_index_error() {
        let (index, _) = index(false);
        let handle = IndexHandle::new("never_created").unwrap();
        let err = index.search(&handle, &[0.0, 0.0, 0.0], 3).await.unwrap_err();
        assert!(matches!(err, RagError::IndexBuild { .. }));
    }
}
