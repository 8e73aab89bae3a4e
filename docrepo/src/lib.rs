//! Main docrepo crate: a generic repository layer over JSON document stores.
//!
//! A resource API parses each request into query intent (filters, sort keys, a sparse
//! fieldset, includes, a page) and, for updates, a set of field values. docrepo turns
//! that intent into document store operations for any entity type, so each resource
//! does not need its own data-access code.
//!
//! This crate re-exports the core types and functionality from the sub-crates and
//! provides access to the storage backends.
//!
//! # Quick Start
//!
//! ```ignore
//! use docrepo::{prelude::*, memory::InMemoryStore};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize, Entity)]
//! #[entity(collection = "users")]
//! pub struct User {
//!     pub id: String,
//!     pub name: String,
//!     pub age: i32,
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!
//!     let query_set = QuerySet::new()
//!         .with_filter(FilterQuery::new("age", "ge", "18"))
//!         .with_sort(SortQuery::asc("name"))
//!         .with_fields(["name"]);
//!
//!     let mut users = DocumentRepository::<User>::new(store.open_session())
//!         .with_context(RequestContext::new().with_query_set(query_set));
//!
//!     users.create(User { id: "u-1".into(), name: "Alice".into(), age: 30 }).await?;
//!
//!     let source = users.query()?;
//!     let page = users.fetch_page(source, PageDescriptor::new(0, 20)).await?;
//!     println!("{} of {} users", page.items.len(), page.count);
//!
//!     let patch = UpdateSet::<User>::new().attribute("age", 31)?;
//!     users.update(&"u-1".to_string(), &patch).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Relationships
//!
//! Relationships are embedded in the parent document as identity strings and updated
//! through handlers registered per related type:
//!
//! ```ignore
//! let registry = Arc::new(RelationshipRegistry::new().with_entity::<Tag>());
//! let mut articles = DocumentRepository::<Article>::new(store.open_session())
//!     .with_relationships(registry);
//!
//! let tags = RelationshipAttribute::has_many::<Tag>("tags", "tag_ids");
//! articles.update_relationships(&article, &tags, &["t-1".into()]).await?;
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - `mongodb` - Persistent MongoDB backend (requires `mongodb` feature)

#[allow(unused_extern_crates)]
extern crate self as docrepo;

pub mod prelude;

pub use docrepo_core::{
    accessor, backend, config, context, document, error, page, query, relationship, repository,
    session, source, translate,
};

pub use docrepo_macros::Entity;

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docrepo_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docrepo_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
