//! Storage backend abstraction for the repository layer.
//!
//! This module defines the traits that abstract over concrete document stores,
//! allowing sessions and repositories to work with any backend (in-memory,
//! MongoDB, ...).
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`DynStoreBackend`]: Object-safe counterpart used behind `Arc<dyn _>`
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! Documents are addressed by the string form of their entity's identity.
//!
//! # Examples
//!
//! ```ignore
//! use docrepo::backend::StoreBackend;
//! use bson::{Bson, doc};
//!
//! let backend = MyBackendImpl::new();
//!
//! let doc = Bson::Document(doc! { "id": "1", "name": "Alice" });
//! backend.upsert_documents(vec![("1".to_string(), doc)], "users").await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::Bson;
use std::{any::Any, fmt::Debug};

use crate::{
    error::DocumentStoreResult,
    query::{Expr, Query},
};

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks. The concurrency model is implementation-specific.
///
/// # Error Handling
///
/// Connectivity failures and rejected operations are reported as
/// [`DocumentStoreError::StoreUnavailable`](crate::error::DocumentStoreError::StoreUnavailable).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts or replaces documents in a collection.
    ///
    /// The collection is created on first write. An existing document with the same
    /// key is replaced entirely.
    ///
    /// # Arguments
    ///
    /// * `documents` - (key, BSON document) pairs to write
    /// * `collection` - The name of the collection to write into
    async fn upsert_documents(
        &self,
        documents: Vec<(String, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<()>;

    /// Deletes documents from a collection by key.
    ///
    /// Keys that do not exist are silently skipped.
    async fn delete_documents(&self, ids: Vec<String>, collection: &str) -> DocumentStoreResult<()>;

    /// Retrieves documents from a collection by key.
    ///
    /// Missing keys are omitted from the result.
    async fn get_documents(
        &self,
        ids: Vec<String>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;

    /// Queries documents in a collection.
    ///
    /// The query is applied as filter, sort, offset/limit, then projection.
    /// Projected documents always keep the key field named by `id_field`.
    async fn query_documents(
        &self,
        query: Query,
        id_field: &str,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;

    /// Counts the documents in a collection matching an optional filter.
    async fn count_documents(
        &self,
        filter: Option<Expr>,
        collection: &str,
    ) -> DocumentStoreResult<usize>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn upsert_documents(
        &self,
        documents: Vec<(String, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<()> {
        (*self)
            .upsert_documents(documents, collection)
            .await
    }

    async fn delete_documents(&self, ids: Vec<String>, collection: &str) -> DocumentStoreResult<()> {
        (*self)
            .delete_documents(ids, collection)
            .await
    }

    async fn get_documents(
        &self,
        ids: Vec<String>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>> {
        (*self)
            .get_documents(ids, collection)
            .await
    }

    async fn query_documents(
        &self,
        query: Query,
        id_field: &str,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>> {
        (*self)
            .query_documents(query, id_field, collection)
            .await
    }

    async fn count_documents(
        &self,
        filter: Option<Expr>,
        collection: &str,
    ) -> DocumentStoreResult<usize> {
        (*self)
            .count_documents(filter, collection)
            .await
    }
}

/// Object-safe form of [`StoreBackend`], implemented for every backend.
///
/// Sessions hold backends as `Arc<dyn DynStoreBackend>` so repositories do not
/// carry a backend type parameter.
#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn upsert_documents(
        &self,
        documents: Vec<(String, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<()>;
    async fn delete_documents(&self, ids: Vec<String>, collection: &str) -> DocumentStoreResult<()>;
    async fn get_documents(
        &self,
        ids: Vec<String>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;
    async fn query_documents(
        &self,
        query: Query,
        id_field: &str,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;
    async fn count_documents(
        &self,
        filter: Option<Expr>,
        collection: &str,
    ) -> DocumentStoreResult<usize>;
    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()>;

    fn as_any(&self) -> &dyn Any;
}

#[async_trait]
impl<B: StoreBackend + Send + Sync + 'static> DynStoreBackend for B {
    async fn upsert_documents(
        &self,
        documents: Vec<(String, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<()> {
        StoreBackend::upsert_documents(self, documents, collection)
            .await
    }

    async fn delete_documents(&self, ids: Vec<String>, collection: &str) -> DocumentStoreResult<()> {
        StoreBackend::delete_documents(self, ids, collection)
            .await
    }

    async fn get_documents(
        &self,
        ids: Vec<String>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>> {
        StoreBackend::get_documents(self, ids, collection)
            .await
    }

    async fn query_documents(
        &self,
        query: Query,
        id_field: &str,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>> {
        StoreBackend::query_documents(self, query, id_field, collection)
            .await
    }

    async fn count_documents(
        &self,
        filter: Option<Expr>,
        collection: &str,
    ) -> DocumentStoreResult<usize> {
        StoreBackend::count_documents(self, filter, collection)
            .await
    }

    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()> {
        (*self).shutdown().await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Factory for backend instances, typically carrying connection settings.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
