//! Relationship updates dispatched by related type.
//!
//! Relationships live inside the parent document as embedded identities: a to-many
//! relationship is an array of id strings, a to-one relationship is a single id
//! string or null. Updating a relationship is delegated to the
//! [`RelationshipHandler`] registered for the related type in a
//! [`RelationshipRegistry`].
//!
//! # Example
//!
//! ```ignore
//! use docrepo::relationship::{RelationshipAttribute, RelationshipRegistry};
//!
//! let registry = RelationshipRegistry::new().with_entity::<Tag>();
//! let tags = RelationshipAttribute::has_many::<Tag>("tags", "tag_ids");
//!
//! repository
//!     .update_relationships(&article, &tags, &["t-1".into(), "t-2".into()])
//!     .await?;
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use std::{
    any::{TypeId, type_name},
    collections::{HashMap, HashSet},
    fmt,
    marker::PhantomData,
    sync::Arc,
};
use tracing::{debug, warn};

use crate::{
    document::{Entity, EntityExt},
    error::{DocumentStoreError, DocumentStoreResult},
    session::DocumentSession,
};

/// Cardinality of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    HasOne,
    HasMany,
}

/// Describes one relationship of a parent entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipAttribute {
    public_name: String,
    internal_name: String,
    kind: RelationshipKind,
    target: TypeId,
    target_name: &'static str,
}

impl RelationshipAttribute {
    /// A to-one relationship to `T`, stored in the parent field `internal_name`.
    pub fn has_one<T: Entity>(public_name: impl Into<String>, internal_name: impl Into<String>) -> Self {
        Self::new::<T>(public_name.into(), internal_name.into(), RelationshipKind::HasOne)
    }

    /// A to-many relationship to `T`, stored in the parent field `internal_name`.
    pub fn has_many<T: Entity>(public_name: impl Into<String>, internal_name: impl Into<String>) -> Self {
        Self::new::<T>(public_name.into(), internal_name.into(), RelationshipKind::HasMany)
    }

    fn new<T: Entity>(public_name: String, internal_name: String, kind: RelationshipKind) -> Self {
        Self {
            public_name,
            internal_name,
            kind,
            target: TypeId::of::<T>(),
            target_name: type_name::<T>(),
        }
    }

    /// The name the API exposes.
    pub fn public_name(&self) -> &str {
        &self.public_name
    }

    /// The parent document field holding the embedded identities.
    pub fn internal_name(&self) -> &str {
        &self.internal_name
    }

    pub fn kind(&self) -> RelationshipKind {
        self.kind
    }

    pub fn target(&self) -> TypeId {
        self.target
    }

    pub fn target_name(&self) -> &'static str {
        self.target_name
    }
}

/// The serialized parent of a relationship update.
///
/// Remembers the parent's type so patched documents can be checked before they are
/// stored.
#[derive(Clone)]
pub struct ParentDocument {
    pub collection: &'static str,
    pub key: String,
    pub document: Document,
    validate: fn(Document) -> DocumentStoreResult<()>,
}

fn validate_as<E: Entity>(document: Document) -> DocumentStoreResult<()> {
    E::from_bson(Bson::Document(document)).map(drop)
}

impl ParentDocument {
    pub fn of<E: Entity>(entity: &E) -> DocumentStoreResult<Self> {
        Ok(Self {
            collection: E::collection_name(),
            key: entity.document_key(),
            document: entity.to_document()?,
            validate: validate_as::<E>,
        })
    }

    /// Writes `value` into the relationship field `field`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if the parent type cannot hold
    /// `value` in that field; the document is left unchanged.
    pub fn set_relationship(&mut self, field: &str, value: Bson) -> DocumentStoreResult<()> {
        let mut patched = self.document.clone();
        patched.insert(field, value);

        (self.validate)(patched.clone()).map_err(|err| {
            DocumentStoreError::InvalidDocument(format!(
                "{}/{}: relationship {field} rejected: {err}",
                self.collection, self.key,
            ))
        })?;

        self.document = patched;
        Ok(())
    }
}

impl fmt::Debug for ParentDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParentDocument")
            .field("collection", &self.collection)
            .field("key", &self.key)
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}

/// Links a parent to related entities of one type.
#[async_trait]
pub trait RelationshipHandler: Send + Sync {
    /// Replaces the parent's relationship with `related_ids` and persists the parent.
    async fn update_relationships(
        &self,
        session: &mut DocumentSession,
        parent: ParentDocument,
        relationship: &RelationshipAttribute,
        related_ids: &[String],
    ) -> DocumentStoreResult<()>;
}

/// Stock handler storing relationships as embedded identities of `T`.
///
/// Ids with no stored `T` are skipped (with a warning); the remaining ids keep their
/// request order. A to-one relationship takes the first remaining id, or null.
/// Identities are embedded in the form `T` stores its own identity field in, so a
/// numeric key stays numeric.
pub struct EntityRelationshipHandler<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> EntityRelationshipHandler<T> {
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }
}

impl<T: Entity> Default for EntityRelationshipHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Entity> RelationshipHandler for EntityRelationshipHandler<T> {
    async fn update_relationships(
        &self,
        session: &mut DocumentSession,
        mut parent: ParentDocument,
        relationship: &RelationshipAttribute,
        related_ids: &[String],
    ) -> DocumentStoreResult<()> {
        let mut existing = HashMap::new();
        for related in session.load_many::<T>(related_ids).await? {
            let identity = related
                .to_document()?
                .remove(T::id_field())
                .ok_or_else(|| DocumentStoreError::InvalidDocument(format!(
                    "{} has no identity field {}",
                    T::collection_name(),
                    T::id_field(),
                )))?;
            existing.insert(related.document_key(), identity);
        }

        let mut seen = HashSet::new();
        let mut linked = Vec::with_capacity(related_ids.len());
        for id in related_ids {
            match existing.get(id) {
                Some(identity) => {
                    if seen.insert(id) {
                        linked.push(identity.clone());
                    }
                }
                None => warn!(
                    relationship = relationship.public_name(),
                    target = T::collection_name(),
                    id = %id,
                    "skipping unknown related id"
                ),
            }
        }

        let value = match relationship.kind() {
            RelationshipKind::HasMany => Bson::Array(linked),
            RelationshipKind::HasOne => linked.into_iter().next().unwrap_or(Bson::Null),
        };

        debug!(
            collection = parent.collection,
            key = %parent.key,
            relationship = relationship.public_name(),
            "updating relationship"
        );

        parent.set_relationship(relationship.internal_name(), value)?;
        session.store_document(parent.collection, parent.key, parent.document);
        session.save_changes().await
    }
}

/// Relationship handlers keyed by related type.
#[derive(Clone, Default)]
pub struct RelationshipRegistry {
    handlers: HashMap<TypeId, Arc<dyn RelationshipHandler>>,
}

impl RelationshipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for relationships targeting `T`, replacing any previous one.
    pub fn register<T: Entity>(&mut self, handler: impl RelationshipHandler + 'static) -> &mut Self {
        self.handlers.insert(TypeId::of::<T>(), Arc::new(handler));
        self
    }

    /// Registers the stock [`EntityRelationshipHandler`] for `T`.
    pub fn register_entity<T: Entity>(&mut self) -> &mut Self {
        self.register::<T>(EntityRelationshipHandler::<T>::new())
    }

    pub fn with_handler<T: Entity>(mut self, handler: impl RelationshipHandler + 'static) -> Self {
        self.register::<T>(handler);
        self
    }

    pub fn with_entity<T: Entity>(mut self) -> Self {
        self.register_entity::<T>();
        self
    }

    /// Returns the handler for the relationship's target type.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::HandlerNotFound`] if nothing is registered for it.
    pub fn resolve(
        &self,
        relationship: &RelationshipAttribute,
    ) -> DocumentStoreResult<Arc<dyn RelationshipHandler>> {
        self.handlers
            .get(&relationship.target())
            .cloned()
            .ok_or_else(|| DocumentStoreError::HandlerNotFound(relationship.target_name().to_string()))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for RelationshipRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationshipRegistry")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
