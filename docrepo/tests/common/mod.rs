#![allow(dead_code)]

use async_trait::async_trait;
use bson::Bson;
use docrepo::{memory::InMemoryStore, prelude::*};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Entity)]
#[entity(collection = "players")]
pub struct Player {
    pub id: i64,
    pub name: String,
    pub score: i64,
    pub captain_id: Option<String>,
}

impl Player {
    pub fn new(id: i64, name: &str, score: i64) -> Self {
        Self { id, name: name.to_string(), score, captain_id: None }
    }
}

/// In-memory backend that counts write calls.
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: InMemoryStore,
    writes: AtomicUsize,
}

impl RecordingStore {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreBackend for RecordingStore {
    async fn upsert_documents(&self, documents: Vec<(String, Bson)>, collection: &str) -> DocumentStoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        StoreBackend::upsert_documents(&self.inner, documents, collection).await
    }

    async fn delete_documents(&self, ids: Vec<String>, collection: &str) -> DocumentStoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        StoreBackend::delete_documents(&self.inner, ids, collection).await
    }

    async fn get_documents(&self, ids: Vec<String>, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        StoreBackend::get_documents(&self.inner, ids, collection).await
    }

    async fn query_documents(&self, query: Query, id_field: &str, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        StoreBackend::query_documents(&self.inner, query, id_field, collection).await
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<usize> {
        StoreBackend::count_documents(&self.inner, filter, collection).await
    }
}

/// Backend whose every operation fails as if the server were unreachable.
#[derive(Debug, Default)]
pub struct UnreachableStore;

fn unreachable_error() -> DocumentStoreError {
    DocumentStoreError::StoreUnavailable("connection refused".to_string())
}

#[async_trait]
impl StoreBackend for UnreachableStore {
    async fn upsert_documents(&self, _documents: Vec<(String, Bson)>, _collection: &str) -> DocumentStoreResult<()> {
        Err(unreachable_error())
    }

    async fn delete_documents(&self, _ids: Vec<String>, _collection: &str) -> DocumentStoreResult<()> {
        Err(unreachable_error())
    }

    async fn get_documents(&self, _ids: Vec<String>, _collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        Err(unreachable_error())
    }

    async fn query_documents(&self, _query: Query, _id_field: &str, _collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        Err(unreachable_error())
    }

    async fn count_documents(&self, _filter: Option<Expr>, _collection: &str) -> DocumentStoreResult<usize> {
        Err(unreachable_error())
    }
}

pub async fn seeded_players(store: &DocumentStore, players: &[Player]) {
    let mut repository = DocumentRepository::<Player>::new(store.open_session());
    for player in players {
        repository.create(player.clone()).await.unwrap();
    }
}
