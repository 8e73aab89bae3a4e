use async_trait::async_trait;
use futures::{stream::iter, StreamExt, TryStreamExt};
use bson::{Document, Bson, doc};
use mongodb::{
    Client, Collection as MongoCollection,
    options::{ClientOptions, FindOptions},
};
use tracing::debug;
use docrepo_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Query},
};

use crate::{sanitizer::FieldNames, query::MongoQueryTranslator};


/// MongoDB-backed [`StoreBackend`].
///
/// Each document is stored with its key as a string `_id`; the `_id` field is
/// stripped again when documents are read back. Reserved characters in field names
/// are escaped, values are stored as given.
#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

fn unavailable(err: mongodb::error::Error) -> DocumentStoreError {
    DocumentStoreError::StoreUnavailable(err.to_string())
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(&FieldNames::escape(collection_name))
    }

    fn prepare_document(&self, key: &str, document: &Bson) -> DocumentStoreResult<Document> {
        let mut prepared = document
            .as_document()
            .map(FieldNames::escape_document)
            .ok_or_else(|| DocumentStoreError::InvalidDocument(format!("document {key} is not a document")))?;

        prepared.insert("_id", key);
        Ok(prepared)
    }

    fn restore_document(&self, mut document: Document) -> Bson {
        document.remove("_id");
        Bson::Document(FieldNames::restore_document(&document))
    }

    async fn collect(&self, cursor: mongodb::Cursor<Document>) -> DocumentStoreResult<Vec<Bson>> {
        Ok(
            cursor
                .try_collect::<Vec<Document>>()
                .await
                .map_err(unavailable)?
                .into_iter()
                .map(|doc| self.restore_document(doc))
                .collect()
        )
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn upsert_documents(&self, documents: Vec<(String, Bson)>, collection: &str) -> DocumentStoreResult<()> {
        debug!(collection, documents = documents.len(), "upserting documents");

        iter(documents)
            .then(async |(key, document)| self.get_collection(collection)
                .replace_one(
                    doc! { "_id": key.as_str() },
                    self.prepare_document(&key, &document)?,
                )
                .upsert(true)
                .await
                .map_err(unavailable)
            )
            .try_collect::<Vec<_>>()
            .await?;

        Ok(())
    }

    async fn delete_documents(&self, ids: Vec<String>, collection: &str) -> DocumentStoreResult<()> {
        self.get_collection(collection)
            .delete_many(doc! { "_id": { "$in": ids } })
            .await
            .map_err(unavailable)?;

        Ok(())
    }

    async fn get_documents(&self, ids: Vec<String>, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let cursor = self.get_collection(collection)
            .find(doc! { "_id": { "$in": ids } })
            .await
            .map_err(unavailable)?;

        self.collect(cursor).await
    }

    async fn query_documents(&self, query: Query, id_field: &str, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let options = find_options(&query, id_field);
        let filter = MongoQueryTranslator::filter(query.filter.as_ref())?;
        debug!(collection, %filter, "querying documents");

        // a zero limit means "no limit" to the driver
        if query.limit == Some(0) {
            return Ok(vec![]);
        }

        let cursor = self.get_collection(collection)
            .find(filter)
            .with_options(options)
            .await
            .map_err(unavailable)?;

        self.collect(cursor).await
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<usize> {
        Ok(
            self.get_collection(collection)
                .count_documents(MongoQueryTranslator::filter(filter.as_ref())?)
                .await
                .map_err(unavailable)? as usize
        )
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.shutdown().await
    }
}

/// Driver options for a query's window, ordering and projection.
///
/// Windows wider than the driver's signed range are clamped to it.
fn find_options(query: &Query, id_field: &str) -> FindOptions {
    let mut options = FindOptions::default();

    if let Some(limit) = query.limit {
        options.limit = Some(i64::try_from(limit).unwrap_or(i64::MAX));
    }
    if let Some(skip) = query.offset {
        options.skip = Some(u64::try_from(skip).unwrap_or(u64::MAX));
    }
    if !query.sort.is_empty() {
        options.sort = Some(MongoQueryTranslator::sort(&query.sort));
    }
    if let Some(fields) = &query.projection {
        options.projection = Some(MongoQueryTranslator::projection(fields, id_field));
    }

    options
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(MongoDbStore::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            )
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrepo_core::query::SortDirection;

    #[test]
    fn oversized_limit_is_clamped_instead_of_wrapping() {
        let query = Query::builder().offset(2).limit(usize::MAX).build();

        let options = find_options(&query, "id");

        assert_eq!(options.limit, Some(i64::MAX));
        assert_eq!(options.skip, Some(2));
    }

    #[test]
    fn options_carry_sort_and_projection() {
        let query = Query::builder()
            .sort("score", SortDirection::Desc)
            .project(["name"])
            .build();

        let options = find_options(&query, "id");

        assert_eq!(options.limit, None);
        assert_eq!(options.sort, Some(doc! { "score": -1 }));
        assert_eq!(options.projection, Some(doc! { "id": 1, "name": 1 }));
    }
}
