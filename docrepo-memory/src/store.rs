//! In-memory storage implementation for document stores.
//!
//! Documents are kept as BSON values in per-collection hash maps behind an
//! async-aware read-write lock. Each document remembers the order it was first
//! written in, so unsorted queries return documents in insertion order.

use std::{collections::HashMap, sync::Arc};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::Bson;

use docrepo_core::{
    query::{Expr, Query},
    error::DocumentStoreResult,
    backend::{StoreBackend, StoreBackendBuilder},
};

use crate::evaluator::{DocumentEvaluator, compare_documents};

#[derive(Debug)]
struct StoredDocument {
    sequence: u64,
    document: Bson,
}

#[derive(Debug, Default)]
struct CollectionMap {
    next_sequence: u64,
    documents: HashMap<String, StoredDocument>,
}

impl CollectionMap {
    /// Documents in insertion order.
    fn ordered(&self) -> Vec<&StoredDocument> {
        let mut documents = self.documents.values().collect::<Vec<_>>();
        documents.sort_by_key(|stored| stored.sequence);
        documents
    }
}

type StoreMap = HashMap<String, CollectionMap>;


/// Thread-safe in-memory document storage backend.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// # Performance
///
/// Queries scan all documents in a collection (no indexing). For small to medium
/// datasets this is typically acceptable. For larger datasets, consider a persistent
/// backend like MongoDB.
///
/// # Example
///
/// ```ignore
/// use docrepo_memory::InMemoryStore;
/// use docrepo::backend::StoreBackend;
/// use bson::{Bson, doc};
///
/// let store = InMemoryStore::new();
///
/// let doc = Bson::Document(doc! { "id": "1", "name": "Alice" });
/// store.upsert_documents(vec![("1".to_string(), doc)], "users").await?;
///
/// let docs = store.get_documents(vec!["1".to_string()], "users").await?;
/// assert_eq!(docs.len(), 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> (document key -> document)
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use docrepo_memory::InMemoryStore;
    ///
    /// let store = InMemoryStore::builder().build().await?;
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Returns the number of documents in a collection.
    pub async fn len(&self, collection: &str) -> usize {
        self.store
            .read()
            .await
            .get(collection)
            .map_or(0, |collection_map| collection_map.documents.len())
    }
}


#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn upsert_documents(&self, documents: Vec<(String, Bson)>, collection: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let collection_map = store
            .entry(collection.to_string())
            .or_default();

        for (key, document) in documents {
            match collection_map.documents.get_mut(&key) {
                Some(stored) => stored.document = document,
                None => {
                    let sequence = collection_map.next_sequence;
                    collection_map.next_sequence += 1;
                    collection_map
                        .documents
                        .insert(key, StoredDocument { sequence, document });
                }
            }
        }

        Ok(())
    }

    async fn delete_documents(&self, ids: Vec<String>, collection: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;

        if let Some(collection_map) = store.get_mut(collection) {
            for key in ids {
                collection_map.documents.remove(&key);
            }
        }

        Ok(())
    }

    async fn get_documents(&self, ids: Vec<String>, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let store = self.store.read().await;
        let collection_map = match store.get(collection) {
            Some(col) => col,
            None => return Ok(vec![]),
        };

        Ok(
            ids.iter()
                .filter_map(|key| collection_map.documents.get(key))
                .map(|stored| stored.document.clone())
                .collect()
        )
    }

    async fn query_documents(&self, query: Query, id_field: &str, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let store = self.store.read().await;
        let collection_map = match store.get(collection) {
            Some(col) => col,
            None => return Ok(vec![]),
        };

        let mut matched = Vec::new();
        for stored in collection_map.ordered() {
            if DocumentEvaluator::matches(&stored.document, query.filter.as_ref())? {
                matched.push(&stored.document);
            }
        }

        if !query.sort.is_empty() {
            // stable, so equal keys keep insertion order
            matched.sort_by(|a, b| compare_documents(a, b, &query.sort));
        }

        Ok(
            matched
                .into_iter()
                .skip(query.offset.unwrap_or(0))
                .take(query.limit.unwrap_or(usize::MAX))
                .map(|document| match &query.projection {
                    Some(fields) => project(document, fields, id_field),
                    None => document.clone(),
                })
                .collect()
        )
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<usize> {
        let store = self.store.read().await;
        let collection_map = match store.get(collection) {
            Some(col) => col,
            None => return Ok(0),
        };

        let mut count = 0;
        for stored in collection_map.documents.values() {
            if DocumentEvaluator::matches(&stored.document, filter.as_ref())? {
                count += 1;
            }
        }

        Ok(count)
    }
}

fn project(document: &Bson, fields: &[String], id_field: &str) -> Bson {
    let Some(source) = document.as_document() else {
        return document.clone();
    };

    Bson::Document(
        source
            .iter()
            .filter(|(key, _)| key.as_str() == id_field || fields.iter().any(|field| field == *key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    )
}


/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docrepo_memory::InMemoryStore;
/// use docrepo::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new [`InMemoryStore`] instance.
    ///
    /// This always succeeds and returns a freshly initialized store.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docrepo_core::query::{Filter, SortDirection};

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .upsert_documents(
                vec![
                    ("c".to_string(), Bson::Document(doc! { "id": "c", "score": 2, "name": "gamma" })),
                    ("a".to_string(), Bson::Document(doc! { "id": "a", "score": 3, "name": "alpha" })),
                    ("b".to_string(), Bson::Document(doc! { "id": "b", "score": 1, "name": "beta" })),
                ],
                "items",
            )
            .await
            .unwrap();
        store
    }

    fn ids(documents: &[Bson]) -> Vec<&str> {
        documents
            .iter()
            .map(|document| document.as_document().unwrap().get_str("id").unwrap())
            .collect()
    }

    #[tokio::test]
    async fn unsorted_queries_keep_insertion_order() {
        let store = seeded().await;

        let documents = store.query_documents(Query::new(), "id", "items").await.unwrap();

        assert_eq!(ids(&documents), vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn upsert_replaces_in_place() {
        let store = seeded().await;
        store
            .upsert_documents(
                vec![("c".to_string(), Bson::Document(doc! { "id": "c", "score": 9, "name": "gamma" }))],
                "items",
            )
            .await
            .unwrap();

        let documents = store.query_documents(Query::new(), "id", "items").await.unwrap();

        assert_eq!(ids(&documents), vec!["c", "a", "b"]);
        assert_eq!(documents[0].as_document().unwrap().get_i32("score").unwrap(), 9);
        assert_eq!(store.len("items").await, 3);
    }

    #[tokio::test]
    async fn filter_sort_then_page() {
        let store = seeded().await;
        let query = Query::builder()
            .filter(Filter::gte("score", 1))
            .sort("score", SortDirection::Asc)
            .offset(1)
            .limit(2)
            .build();

        let documents = store.query_documents(query, "id", "items").await.unwrap();

        assert_eq!(ids(&documents), vec!["c", "a"]);
    }

    #[tokio::test]
    async fn projection_keeps_identity() {
        let store = seeded().await;
        let query = Query::builder().project(["name"]).limit(1).build();

        let documents = store.query_documents(query, "id", "items").await.unwrap();

        assert_eq!(documents, vec![Bson::Document(doc! { "id": "c", "name": "gamma" })]);
    }

    #[tokio::test]
    async fn count_ignores_paging_inputs() {
        let store = seeded().await;

        assert_eq!(store.count_documents(None, "items").await.unwrap(), 3);
        assert_eq!(
            store.count_documents(Some(Filter::gt("score", 1)), "items").await.unwrap(),
            2
        );
        assert_eq!(store.count_documents(None, "missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn deleting_missing_keys_is_not_an_error() {
        let store = seeded().await;

        store
            .delete_documents(vec!["a".to_string(), "zzz".to_string()], "items")
            .await
            .unwrap();
        store.delete_documents(vec!["a".to_string()], "missing").await.unwrap();

        assert_eq!(store.len("items").await, 2);
        assert!(store.get_documents(vec!["a".to_string()], "items").await.unwrap().is_empty());
    }
}
