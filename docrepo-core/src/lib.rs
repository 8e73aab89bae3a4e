//! A generic repository layer that maps resource-style query intent onto document stores.
//!
//! This crate is the core of the docrepo project and provides:
//!
//! - **Entity traits** ([`document`]) - The [`Entity`](document::Entity) contract and BSON conversions
//! - **Expression compiler** ([`accessor`]) - Runtime field-name binding with memoized accessors
//! - **Query translation** ([`translate`], [`source`]) - Filters, sort keys and sparse fieldsets on lazy sources
//! - **Repository** ([`repository`]) - The uniform data-access contract and its session-backed implementation
//! - **Relationships** ([`relationship`]) - Handler registry keyed by related type
//! - **Sessions** ([`session`]) - Unit-of-work over a storage backend
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing storage backends
//! - **Query AST** ([`query`]) - Backend-neutral filter expressions and queries
//! - **Request context** ([`context`]) - Parsed query parameters and pending updates
//! - **Paging** ([`page`]) - Page descriptors and page results
//! - **Configuration** ([`config`]) - Repository settings
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use docrepo::prelude::*;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize, Entity)]
//! #[entity(collection = "users")]
//! pub struct User {
//!     pub id: String,
//!     pub name: String,
//! }
//!
//! let store = DocumentStore::new(InMemoryStore::new());
//! let mut users = DocumentRepository::<User>::new(store.open_session());
//!
//! users.create(User { id: "u-1".into(), name: "Ada".into() }).await?;
//! let ada = users.get_by_id(&"u-1".to_string()).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docrepo_core;

pub mod accessor;
pub mod backend;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod page;
pub mod query;
pub mod relationship;
pub mod repository;
pub mod session;
pub mod source;
pub mod translate;
