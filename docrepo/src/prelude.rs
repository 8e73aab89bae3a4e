//! Convenient re-exports of commonly used types from docrepo.
//!
//! ```ignore
//! use docrepo::prelude::*;
//! ```
//!
//! This provides access to:
//! - Entity traits and the `Entity` derive
//! - Repositories, sessions and stores
//! - Query intent, query sources and the query AST
//! - Relationship handlers, paging, configuration and error types

pub use docrepo_core::{
    accessor::{FieldAccessor, FieldKind, compile},
    backend::{StoreBackend, StoreBackendBuilder},
    config::{DeleteBehavior, RepositoryConfig},
    context::{QuerySet, RequestContext, UpdateSet},
    document::{Entity, EntityExt},
    error::{DocumentStoreError, DocumentStoreResult},
    page::{Page, PageDescriptor},
    query::{Query, QueryVisitor, Expr, Sort, SortDirection, FieldOp, QueryBuilder, Filter},
    relationship::{
        EntityRelationshipHandler, ParentDocument, RelationshipAttribute, RelationshipHandler,
        RelationshipKind, RelationshipRegistry,
    },
    repository::{DocumentRepository, EntityRepository},
    session::{DocumentSession, DocumentStore},
    source::QuerySource,
    translate::{FilterQuery, SortQuery},
};

pub use docrepo_macros::Entity;
