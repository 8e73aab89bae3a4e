//! In-memory document storage backend for docrepo.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is ideal for development,
//! testing, and small-scale deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Type-erased storage** - Stores documents as BSON for flexibility
//! - **Full query support** - Filtering, multi-key sorting, paging and projection
//! - **Stable ordering** - Unsorted results come back in insertion order
//!
//! # Quick Start
//!
//! ```ignore
//! use docrepo::prelude::*;
//! use docrepo::memory::InMemoryStore;
//!
//! let backend = InMemoryStore::builder().build().await?;
//! let store = DocumentStore::new(backend);
//! let mut users = DocumentRepository::<User>::new(store.open_session());
//!
//! users.create(User { id: "u-1".into(), name: "Alice".into() }).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docrepo_memory;

pub mod store;
pub mod evaluator;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
