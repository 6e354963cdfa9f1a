//! Vector store trait for storing and searching vector records.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::VectorRecord;
use crate::error::Result;

/// Distance metric of a table's embedding column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DistanceMetric {
    /// Euclidean distance; lower is closer.
    #[default]
    L2,
}

/// Schema of a vector table: `{id: bytes, text: bytes, embedding: vector[D]}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableSchema {
    /// Fixed embedding dimension `D`.
    pub dimensions: usize,
    pub metric: DistanceMetric,
}

impl TableSchema {
    pub fn l2(dimensions: usize) -> Self {
        Self { dimensions, metric: DistanceMetric::L2 }
    }
}

/// A record returned from a nearest-neighbor search.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub record: VectorRecord,
    /// Distance to the query under the table's metric.
    pub distance: f32,
}

/// A remote (or local) table service holding vector records.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{InMemoryVectorStore, TableSchema, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_table("docs", TableSchema::l2(1536)).await?;
/// store.insert("docs", &records).await?;
/// let neighbors = store.search("docs", &query_embedding, 15).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Names of the existing tables.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Drop a table and all its records.
    async fn drop_table(&self, name: &str) -> Result<()>;

    /// Create a table. Fails if a table of that name already exists.
    async fn create_table(&self, name: &str, schema: TableSchema) -> Result<()>;

    /// Insert records. Every embedding must match the table's dimension.
    async fn insert(&self, table: &str, records: &[VectorRecord]) -> Result<()>;

    /// The `k` nearest records to `embedding`, ordered by ascending distance.
    async fn search(&self, table: &str, embedding: &[f32], k: usize) -> Result<Vec<Neighbor>>;
}
