//! Qdrant vector store backend.
//!
//! Provides [`QdrantVectorStore`] which implements [`VectorStore`] using
//! the [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC.
//! Tables map to collections with Euclidean distance; the record text is
//! stored in the `text` payload field.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::qdrant::QdrantVectorStore;
//!
//! let store = QdrantVectorStore::new("http://localhost:6334")?;
//! store.create_table("docs", TableSchema::l2(1536)).await?;
//! ```

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tracing::debug;

use crate::document::VectorRecord;
use crate::error::{RagError, Result};
use crate::vectorstore::{Neighbor, TableSchema, VectorStore};

/// A [`VectorStore`] backed by [Qdrant](https://qdrant.tech/).
pub struct QdrantVectorStore {
    client: Qdrant,
}

impl QdrantVectorStore {
    /// Create a new Qdrant vector store connecting to the given URL.
    pub fn new(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(|e| Self::map_err(url, e))?;
        Ok(Self { client })
    }

    /// Create a new Qdrant vector store from an existing client.
    pub fn from_client(client: Qdrant) -> Self {
        Self { client }
    }

    fn map_err(index: &str, e: qdrant_client::QdrantError) -> RagError {
        RagError::index(index, format!("qdrant: {e}"))
    }

    /// Extract a string from a Qdrant payload value.
    fn extract_string(value: &QdrantValue) -> Option<String> {
        match &value.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        }
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let response =
            self.client.list_collections().await.map_err(|e| Self::map_err("*", e))?;
        Ok(response.collections.into_iter().map(|c| c.name).collect())
    }

    async fn drop_table(&self, name: &str) -> Result<()> {
        self.client.delete_collection(name).await.map_err(|e| Self::map_err(name, e))?;
        debug!(table = name, "dropped qdrant collection");
        Ok(())
    }

    async fn create_table(&self, name: &str, schema: TableSchema) -> Result<()> {
        if schema.dimensions == 0 {
            return Err(RagError::Schema("embedding dimension must be positive".to_string()));
        }
        if self.list_tables().await?.iter().any(|t| t == name) {
            return Err(RagError::index(name, format!("table '{name}' already exists")));
        }

        self.client
            .create_collection(CreateCollectionBuilder::new(name).vectors_config(
                VectorParamsBuilder::new(schema.dimensions as u64, Distance::Euclid),
            ))
            .await
            .map_err(|e| Self::map_err(name, e))?;

        debug!(table = name, dimensions = schema.dimensions, "created qdrant collection");
        Ok(())
    }

    async fn insert(&self, table: &str, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let points = records
            .iter()
            .map(|record| {
                let payload = Payload::try_from(serde_json::json!({ "text": record.text }))
                    .map_err(|e| RagError::index(table, format!("invalid payload: {e}")))?;
                Ok(PointStruct::new(record.id.clone(), record.embedding.clone(), payload))
            })
            .collect::<Result<Vec<PointStruct>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(table, points).wait(true))
            .await
            .map_err(|e| Self::map_err(table, e))?;

        debug!(table, count = records.len(), "inserted records into qdrant");
        Ok(())
    }

    async fn search(&self, table: &str, embedding: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(table, embedding.to_vec(), k as u64).with_payload(true),
            )
            .await
            .map_err(|e| Self::map_err(table, e))?;

        // With Euclid distance the returned score is the distance itself.
        let neighbors = response
            .result
            .into_iter()
            .map(|scored| {
                let id = scored
                    .id
                    .as_ref()
                    .and_then(|pid| match &pid.point_id_options {
                        Some(PointIdOptions::Uuid(s)) => Some(s.clone()),
                        Some(PointIdOptions::Num(n)) => Some(n.to_string()),
                        None => None,
                    })
                    .unwrap_or_default();
                let text =
                    scored.payload.get("text").and_then(Self::extract_string).unwrap_or_default();

                Neighbor {
                    record: VectorRecord { id, embedding: Vec::new(), text },
                    distance: scored.score,
                }
            })
            .collect();

        Ok(neighbors)
    }
}
