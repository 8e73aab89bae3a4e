//! Document store handle and unit-of-work sessions.
//!
//! A [`DocumentStore`] wraps a type-erased backend and hands out [`DocumentSession`]s.
//! A session reads straight through to the backend and queues writes until
//! [`save_changes`](DocumentSession::save_changes), which flushes them in order.
//!
//! # Example
//!
//! ```ignore
//! use docrepo::session::DocumentStore;
//! use docrepo::memory::InMemoryStore;
//!
//! let store = DocumentStore::new(InMemoryStore::new());
//! let mut session = store.open_session();
//!
//! session.store(&article)?;
//! session.save_changes().await?;
//!
//! let loaded = session.load::<Article>("1").await?;
//! ```

use bson::{Bson, Document};
use std::{fmt, mem, sync::Arc};
use tracing::debug;

use crate::{
    backend::{DynStoreBackend, StoreBackend},
    document::{Entity, EntityExt},
    error::{DocumentStoreError, DocumentStoreResult},
    source::QuerySource,
};

/// A shareable handle to a document backend.
#[derive(Clone)]
pub struct DocumentStore {
    backend: Arc<dyn DynStoreBackend>,
}

impl DocumentStore {
    /// Creates a store over the given backend.
    pub fn new<B: StoreBackend + 'static>(backend: B) -> Self {
        Self { backend: Arc::new(backend) }
    }

    pub fn from_dyn(backend: Arc<dyn DynStoreBackend>) -> Self {
        Self { backend }
    }

    /// Opens a new session with an empty change queue.
    pub fn open_session(&self) -> DocumentSession {
        DocumentSession::new(self.backend.clone())
    }

    /// Returns the backend as its concrete type, if it is a `B`.
    pub fn backend_as<B: StoreBackend + 'static>(&self) -> Option<&B> {
        self.backend.as_any().downcast_ref::<B>()
    }
}

impl fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore")
            .field("backend", &self.backend)
            .finish()
    }
}

#[derive(Debug)]
enum PendingChange {
    Store {
        collection: &'static str,
        key: String,
        document: Bson,
    },
    Delete {
        collection: &'static str,
        key: String,
    },
}

enum Batch {
    Upsert(&'static str, Vec<(String, Bson)>),
    Delete(&'static str, Vec<String>),
}

/// A unit of work over one backend.
///
/// Mutating methods take `&mut self`, so a session serves one operation at a time.
pub struct DocumentSession {
    backend: Arc<dyn DynStoreBackend>,
    pending: Vec<PendingChange>,
}

impl DocumentSession {
    pub fn new(backend: Arc<dyn DynStoreBackend>) -> Self {
        Self { backend, pending: Vec::new() }
    }

    /// Starts a lazy query over the collection of `E`.
    pub fn query<E: Entity>(&self) -> QuerySource<E> {
        QuerySource::new()
    }

    /// Loads one entity by the string form of its identity.
    ///
    /// Returns `Ok(None)` when no document has that key.
    pub async fn load<E: Entity>(&self, id: &str) -> DocumentStoreResult<Option<E>> {
        self.backend
            .get_documents(vec![id.to_string()], E::collection_name())
            .await?
            .into_iter()
            .next()
            .map(E::from_bson)
            .transpose()
    }

    /// Loads every entity whose key is in `ids`. Missing keys are omitted.
    pub async fn load_many<E: Entity>(&self, ids: &[String]) -> DocumentStoreResult<Vec<E>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        self.backend
            .get_documents(ids.to_vec(), E::collection_name())
            .await?
            .into_iter()
            .map(E::from_bson)
            .collect()
    }

    /// Queues an insert-or-replace of `entity`.
    pub fn store<E: Entity>(&mut self, entity: &E) -> DocumentStoreResult<()> {
        let document = entity.to_bson()?;
        self.pending.push(PendingChange::Store {
            collection: E::collection_name(),
            key: entity.document_key(),
            document,
        });
        Ok(())
    }

    /// Queues an insert-or-replace of a raw document.
    pub fn store_document(&mut self, collection: &'static str, key: String, document: Document) {
        self.pending.push(PendingChange::Store {
            collection,
            key,
            document: Bson::Document(document),
        });
    }

    /// Queues deletion of the entity with the given identity.
    pub fn delete<E: Entity>(&mut self, id: &E::Id) {
        self.pending.push(PendingChange::Delete {
            collection: E::collection_name(),
            key: id.to_string(),
        });
    }

    /// Number of queued writes.
    pub fn pending_changes(&self) -> usize {
        self.pending.len()
    }

    /// Flushes queued writes in order.
    ///
    /// Consecutive writes of the same kind to the same collection go to the backend
    /// as one batch. The queue is empty afterwards even if a batch fails.
    pub async fn save_changes(&mut self) -> DocumentStoreResult<()> {
        let changes = mem::take(&mut self.pending);
        if changes.is_empty() {
            return Ok(());
        }

        debug!(changes = changes.len(), "saving changes");

        for batch in batch_changes(changes) {
            match batch {
                Batch::Upsert(collection, documents) => {
                    self.backend
                        .upsert_documents(documents, collection)
                        .await?
                }
                Batch::Delete(collection, keys) => {
                    self.backend
                        .delete_documents(keys, collection)
                        .await?
                }
            }
        }

        Ok(())
    }

    /// Counts the documents matching the source's filter, ignoring paging.
    pub async fn count<E: Entity>(&self, source: &QuerySource<E>) -> DocumentStoreResult<usize> {
        self.backend
            .count_documents(source.query().filter.clone(), E::collection_name())
            .await
    }

    /// Executes the source and materializes the results.
    ///
    /// Projected results take unselected fields from `E::default()`.
    pub async fn fetch<E: Entity>(&self, source: &QuerySource<E>) -> DocumentStoreResult<Vec<E>> {
        let projected = source.query().projection.is_some();
        let documents = self
            .backend
            .query_documents(source.query().clone(), E::id_field(), E::collection_name())
            .await?;

        debug!(
            collection = E::collection_name(),
            results = documents.len(),
            "fetched documents"
        );

        documents
            .into_iter()
            .map(|document| match document {
                Bson::Document(document) if projected => E::from_projection(document),
                Bson::Document(document) => E::from_bson(Bson::Document(document)),
                other => Err(DocumentStoreError::InvalidDocument(format!(
                    "expected a document in {}, found {:?}",
                    E::collection_name(),
                    other.element_type(),
                ))),
            })
            .collect()
    }
}

fn batch_changes(changes: Vec<PendingChange>) -> Vec<Batch> {
    let mut batches: Vec<Batch> = Vec::new();

    for change in changes {
        match change {
            PendingChange::Store { collection, key, document } => {
                if let Some(Batch::Upsert(current, documents)) = batches.last_mut() {
                    if *current == collection {
                        documents.push((key, document));
                        continue;
                    }
                }
                batches.push(Batch::Upsert(collection, vec![(key, document)]));
            }
            PendingChange::Delete { collection, key } => {
                if let Some(Batch::Delete(current, keys)) = batches.last_mut() {
                    if *current == collection {
                        keys.push(key);
                        continue;
                    }
                }
                batches.push(Batch::Delete(collection, vec![key]));
            }
        }
    }

    batches
}

impl fmt::Debug for DocumentSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentSession")
            .field("backend", &self.backend)
            .field("pending", &self.pending)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(collection: &'static str, key: &str) -> PendingChange {
        PendingChange::Store {
            collection,
            key: key.to_string(),
            document: Bson::Null,
        }
    }

    fn delete(collection: &'static str, key: &str) -> PendingChange {
        PendingChange::Delete { collection, key: key.to_string() }
    }

    #[test]
    fn consecutive_writes_share_a_batch() {
        let batches = batch_changes(vec![
            store("a", "1"),
            store("a", "2"),
            delete("a", "3"),
            store("b", "4"),
            store("a", "5"),
        ]);

        let shape: Vec<(&str, &str, usize)> = batches
            .iter()
            .map(|batch| match batch {
                Batch::Upsert(collection, documents) => ("upsert", *collection, documents.len()),
                Batch::Delete(collection, keys) => ("delete", *collection, keys.len()),
            })
            .collect();

        assert_eq!(
            shape,
            vec![
                ("upsert", "a", 2),
                ("delete", "a", 1),
                ("upsert", "b", 1),
                ("upsert", "a", 1),
            ]
        );
    }
}
