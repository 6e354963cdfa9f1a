//! In-memory vector store using exact L2 search.
//!
//! This module provides [`InMemoryVectorStore`], a vector store backed by a
//! `HashMap` protected by a `tokio::sync::RwLock`. Records keep insertion
//! order, and search uses a stable sort, so equal distances resolve to the
//! earlier insert.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::VectorRecord;
use crate::error::{RagError, Result};
use crate::vectorstore::{Neighbor, TableSchema, VectorStore};

#[derive(Debug)]
struct Table {
    schema: TableSchema,
    records: Vec<VectorRecord>,
    ids: HashSet<String>,
}

/// An in-memory vector store.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{InMemoryVectorStore, TableSchema, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_table("docs", TableSchema::l2(384)).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in `table`, if it exists.
    pub async fn len(&self, table: &str) -> Option<usize> {
        self.tables.read().await.get(table).map(|t| t.records.len())
    }
}

/// Euclidean distance between two vectors of equal length.
pub(crate) fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
}

fn missing(table: &str) -> RagError {
    RagError::index(table, format!("table '{table}' does not exist"))
}

fn check_dimensions(table: &str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(RagError::Schema(format!(
            "table '{table}' expects {expected}-dimensional embeddings, got {actual}"
        )));
    }
    Ok(())
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.tables.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn drop_table(&self, name: &str) -> Result<()> {
        self.tables.write().await.remove(name).map(|_| ()).ok_or_else(|| missing(name))
    }

    async fn create_table(&self, name: &str, schema: TableSchema) -> Result<()> {
        if schema.dimensions == 0 {
            return Err(RagError::Schema("embedding dimension must be positive".to_string()));
        }
        let mut tables = self.tables.write().await;
        if tables.contains_key(name) {
            return Err(RagError::index(name, format!("table '{name}' already exists")));
        }
        tables.insert(
            name.to_string(),
            Table { schema, records: Vec::new(), ids: HashSet::new() },
        );
        Ok(())
    }

    async fn insert(&self, table: &str, records: &[VectorRecord]) -> Result<()> {
        let mut tables = self.tables.write().await;
        let store = tables.get_mut(table).ok_or_else(|| missing(table))?;

        // Validate the whole batch before touching the table.
        let mut batch_ids = HashSet::new();
        for record in records {
            check_dimensions(table, store.schema.dimensions, record.embedding.len())?;
            if store.ids.contains(&record.id) || !batch_ids.insert(record.id.as_str()) {
                return Err(RagError::index(table, format!("duplicate identifier '{}'", record.id)));
            }
        }

        for record in records {
            store.ids.insert(record.id.clone());
            store.records.push(record.clone());
        }
        Ok(())
    }

    async fn search(&self, table: &str, embedding: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let tables = self.tables.read().await;
        let store = tables.get(table).ok_or_else(|| missing(table))?;
        check_dimensions(table, store.schema.dimensions, embedding.len())?;

        let mut neighbors: Vec<Neighbor> = store
            .records
            .iter()
            .map(|record| Neighbor {
                distance: l2_distance(&record.embedding, embedding),
                record: record.clone(),
            })
            .collect();

        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        neighbors.truncate(k);
        Ok(neighbors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord { id: id.to_string(), embedding, text: format!("text of {id}") }
    }

    #[tokio::test]
    async fn search_orders_by_ascending_distance() {
        let store = InMemoryVectorStore::new();
        store.create_table("t", TableSchema::l2(2)).await.unwrap();
        let records = [
            record("far", vec![10.0, 0.0]),
            record("near", vec![1.0, 0.0]),
            record("mid", vec![3.0, 0.0]),
        ];
        store.insert("t", &records).await.unwrap();

        let hits = store.search("t", &[0.0, 0.0], 2).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|n| n.record.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!((hits[0].distance - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn ties_resolve_by_insertion_order() {
        let store = InMemoryVectorStore::new();
        store.create_table("t", TableSchema::l2(1)).await.unwrap();
        store
            .insert("t", &[record("first", vec![1.0]), record("second", vec![-1.0])])
            .await
            .unwrap();
        let hits = store.search("t", &[0.0], 2).await.unwrap();
        assert_eq!(hits[0].record.id, "first");
        assert_eq!(hits[1].record.id, "second");
    }

    #[tokio::test]
    async fn mismatched_dimension_is_a_schema_error_and_inserts_nothing() {
        let store = InMemoryVectorStore::new();
        store.create_table("t", TableSchema::l2(3)).await.unwrap();
        let err = store
            .insert("t", &[record("ok", vec![0.0; 3]), record("bad", vec![0.0; 4])])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Schema(_)));
        assert_eq!(store.len("t").await, Some(0));

        let err = store.search("t", &[0.0; 2], 1).await.unwrap_err();
        assert!(matches!(err, RagError::Schema(_)));
    }

    #[tokio::test]
    async fn duplicate_identifiers_are_rejected() {
        let store = InMemoryVectorStore::new();
        store.create_table("t", TableSchema::l2(1)).await.unwrap();
        store.insert("t", &[record("a", vec![0.0])]).await.unwrap();
        assert!(store.insert("t", &[record("a", vec![1.0])]).await.is_err());
        let duplicated = [record("b", vec![1.0]), record("b", vec![2.0])];
        assert!(store.insert("t", &duplicated).await.is_err());
        assert_eq!(store.len("t").await, Some(1));
    }

    #[tokio::test]
    async fn create_drop_and_list() {
        let store = InMemoryVectorStore::new();
        store.create_table("b", TableSchema::l2(2)).await.unwrap();
        store.create_table("a", TableSchema::l2(2)).await.unwrap();
        assert!(store.create_table("a", TableSchema::l2(2)).await.is_err());
        assert_eq!(store.list_tables().await.unwrap(), vec!["a", "b"]);

        store.drop_table("a").await.unwrap();
        assert!(store.drop_table("a").await.is_err());
        assert!(store.insert("a", &[]).await.is_err());
        assert_eq!(store.list_tables().await.unwrap(), vec!["b"]);
    }
}
