//! The generic entity repository.
//!
//! [`EntityRepository`] is the uniform data-access contract a resource API talks to:
//! it turns declarative query intent (filters, sort, sparse fieldsets, paging,
//! partial updates, relationship updates) into document session operations for any
//! [`Entity`]. [`DocumentRepository`] implements it over a [`DocumentSession`].
//!
//! Reads compose a [`QuerySource`] and run it with one of the terminal operations
//! ([`count`](EntityRepository::count), [`to_list`](EntityRepository::to_list),
//! [`first_or_default`](EntityRepository::first_or_default),
//! [`page`](EntityRepository::page)). Writes commit before returning.
//!
//! # Example
//!
//! ```ignore
//! use docrepo::prelude::*;
//!
//! let store = DocumentStore::new(InMemoryStore::new());
//! let mut articles = DocumentRepository::<Article>::new(store.open_session())
//!     .with_context(RequestContext::new().with_query_set(query_set));
//!
//! let source = articles.query()?;
//! let page = articles.fetch_page(source, PageDescriptor::new(0, 20)).await?;
//! ```

use async_trait::async_trait;
use std::{marker::PhantomData, sync::Arc};
use tracing::debug;

use crate::{
    accessor::compile,
    config::{DeleteBehavior, RepositoryConfig},
    context::{RequestContext, UpdateSet},
    document::Entity,
    error::DocumentStoreResult,
    page::{Page, PageDescriptor},
    relationship::{ParentDocument, RelationshipAttribute, RelationshipRegistry},
    session::DocumentSession,
    source::QuerySource,
    translate::{FilterQuery, SortQuery},
};

/// Data-access contract for one entity type.
///
/// # Errors
///
/// Every operation that touches the store fails with
/// [`DocumentStoreError::StoreUnavailable`](crate::error::DocumentStoreError::StoreUnavailable)
/// when the backend is unreachable or rejects the operation. Absence is reported as
/// `None`, never as an error.
#[async_trait]
pub trait EntityRepository<E: Entity>: Send + Sync {
    /// Counts the documents matching the source's filter, independent of paging.
    async fn count(&self, source: &QuerySource<E>) -> DocumentStoreResult<usize>;

    /// Stores `entity` and commits immediately.
    async fn create(&mut self, entity: E) -> DocumentStoreResult<E>;

    /// Deletes the entity with the given identity and commits.
    ///
    /// With [`DeleteBehavior::Unconditional`] this returns `true` whether or not the
    /// entity existed. With [`DeleteBehavior::ExistenceChecked`] a missing entity
    /// yields `false` and nothing is written.
    async fn delete(&mut self, id: &E::Id) -> DocumentStoreResult<bool>;

    /// The whole collection, narrowed to the request's sparse fieldset if any.
    fn get_all(&self) -> DocumentStoreResult<QuerySource<E>>;

    async fn get_by_id(&self, id: &E::Id) -> DocumentStoreResult<Option<E>>;

    /// Same as [`get_by_id`](EntityRepository::get_by_id).
    ///
    /// Relationships are embedded identities; the relationship name is not used to
    /// load related entities.
    async fn get_by_id_with_relationship(
        &self,
        id: &E::Id,
        relationship: &str,
    ) -> DocumentStoreResult<Option<E>>;

    /// The first entity of the source, or `None` if it is empty.
    async fn first_or_default(&self, source: QuerySource<E>) -> DocumentStoreResult<Option<E>>;

    /// The zero-based page `page_number` of `page_size` entities.
    async fn page(
        &self,
        source: QuerySource<E>,
        page_size: usize,
        page_number: usize,
    ) -> DocumentStoreResult<Vec<E>>;

    async fn to_list(&self, source: QuerySource<E>) -> DocumentStoreResult<Vec<E>>;

    /// Applies `patch` to a freshly loaded entity and commits it.
    ///
    /// Attributes are written before relationships. Returns `None` without writing
    /// when no entity has the given identity. Concurrent updates of the same entity
    /// are last-write-wins.
    async fn update(&mut self, id: &E::Id, patch: &UpdateSet<E>) -> DocumentStoreResult<Option<E>>;

    /// Replaces the related identities of `parent` through the handler registered
    /// for the relationship's target type.
    async fn update_relationships(
        &mut self,
        parent: &E,
        relationship: &RelationshipAttribute,
        related_ids: &[String],
    ) -> DocumentStoreResult<()>;

    fn filter(&self, source: QuerySource<E>, filter: &FilterQuery) -> DocumentStoreResult<QuerySource<E>> {
        source.filter(filter)
    }

    fn sort(&self, source: QuerySource<E>, sort: &[SortQuery]) -> DocumentStoreResult<QuerySource<E>> {
        source.sort(sort)
    }

    fn include(&self, source: QuerySource<E>, relationship: &str) -> QuerySource<E> {
        source.include(relationship)
    }
}

/// [`EntityRepository`] over a [`DocumentSession`].
#[derive(Debug)]
pub struct DocumentRepository<E> {
    session: DocumentSession,
    context: RequestContext,
    relationships: Arc<RelationshipRegistry>,
    config: RepositoryConfig,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Entity> DocumentRepository<E> {
    pub fn new(session: DocumentSession) -> Self {
        Self {
            session,
            context: RequestContext::default(),
            relationships: Arc::new(RelationshipRegistry::default()),
            config: RepositoryConfig::default(),
            _marker: PhantomData,
        }
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_relationships(mut self, relationships: Arc<RelationshipRegistry>) -> Self {
        self.relationships = relationships;
        self
    }

    pub fn with_config(mut self, config: RepositoryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn session(&self) -> &DocumentSession {
        &self.session
    }

    pub fn into_session(self) -> DocumentSession {
        self.session
    }

    /// [`get_all`](EntityRepository::get_all) narrowed by the request's filters and
    /// ordered by its sort keys.
    pub fn query(&self) -> DocumentStoreResult<QuerySource<E>> {
        let mut source = self.get_all()?;

        if let Some(query_set) = self.context.query_set() {
            for filter in &query_set.filters {
                source = source.filter(filter)?;
            }
            source = source.sort(&query_set.sort)?;
            for relationship in &query_set.include {
                source = source.include(relationship);
            }
        }

        Ok(source)
    }

    /// One page of the source together with the total count and page navigation.
    ///
    /// A page size of zero falls back to the configured default.
    pub async fn fetch_page(
        &self,
        source: QuerySource<E>,
        page: PageDescriptor,
    ) -> DocumentStoreResult<Page<E>> {
        let page = match page.size {
            0 => PageDescriptor::new(page.number, self.config.default_page_size),
            _ => page,
        };

        let total = self.session.count(&source).await?;
        let items = self.session.fetch(&source.paged(page)).await?;

        Ok(page.to_page(items, total))
    }

    /// [`fetch_page`](Self::fetch_page) at the page the request asked for.
    ///
    /// Without a requested page this is the first page at the configured default size.
    pub async fn fetch_requested_page(&self, source: QuerySource<E>) -> DocumentStoreResult<Page<E>> {
        let page = self.context.page().unwrap_or(PageDescriptor::new(0, 0));

        self.fetch_page(source, page).await
    }
}

#[async_trait]
impl<E: Entity> EntityRepository<E> for DocumentRepository<E> {
    async fn count(&self, source: &QuerySource<E>) -> DocumentStoreResult<usize> {
        self.session.count(source).await
    }

    async fn create(&mut self, entity: E) -> DocumentStoreResult<E> {
        self.session.store(&entity)?;
        self.session.save_changes().await?;

        debug!(collection = E::collection_name(), id = %entity.id(), "created entity");
        Ok(entity)
    }

    async fn delete(&mut self, id: &E::Id) -> DocumentStoreResult<bool> {
        if self.config.delete_behavior == DeleteBehavior::ExistenceChecked
            && self.session.load::<E>(&id.to_string()).await?.is_none()
        {
            debug!(collection = E::collection_name(), %id, "nothing to delete");
            return Ok(false);
        }

        self.session.delete::<E>(id);
        self.session.save_changes().await?;

        debug!(collection = E::collection_name(), %id, "deleted entity");
        Ok(true)
    }

    fn get_all(&self) -> DocumentStoreResult<QuerySource<E>> {
        let source = self.session.query::<E>();

        match self.context.fields() {
            Some(fields) => source.select_fields(fields),
            None => Ok(source),
        }
    }

    async fn get_by_id(&self, id: &E::Id) -> DocumentStoreResult<Option<E>> {
        self.session.load::<E>(&id.to_string()).await
    }

    async fn get_by_id_with_relationship(
        &self,
        id: &E::Id,
        relationship: &str,
    ) -> DocumentStoreResult<Option<E>> {
        debug!(collection = E::collection_name(), %id, relationship, "loading without related entities");
        self.get_by_id(id).await
    }

    async fn first_or_default(&self, source: QuerySource<E>) -> DocumentStoreResult<Option<E>> {
        Ok(self
            .session
            .fetch(&source.first())
            .await?
            .into_iter()
            .next())
    }

    async fn page(
        &self,
        source: QuerySource<E>,
        page_size: usize,
        page_number: usize,
    ) -> DocumentStoreResult<Vec<E>> {
        self.session
            .fetch(&source.paged(PageDescriptor::new(page_number, page_size)))
            .await
    }

    async fn to_list(&self, source: QuerySource<E>) -> DocumentStoreResult<Vec<E>> {
        self.session.fetch(&source).await
    }

    async fn update(&mut self, id: &E::Id, patch: &UpdateSet<E>) -> DocumentStoreResult<Option<E>> {
        let Some(mut entity) = self.session.load::<E>(&id.to_string()).await? else {
            debug!(collection = E::collection_name(), %id, "nothing to update");
            return Ok(None);
        };

        patch.apply(&mut entity)?;

        self.session.store(&entity)?;
        self.session.save_changes().await?;

        debug!(
            collection = E::collection_name(),
            %id,
            attributes = patch.attributes().len(),
            relationships = patch.relationships().len(),
            "updated entity"
        );
        Ok(Some(entity))
    }

    async fn update_relationships(
        &mut self,
        parent: &E,
        relationship: &RelationshipAttribute,
        related_ids: &[String],
    ) -> DocumentStoreResult<()> {
        compile::<E>(relationship.internal_name())?;

        let handler = self.relationships.resolve(relationship)?;
        let parent = ParentDocument::of(parent)?;

        handler
            .update_relationships(&mut self.session, parent, relationship, related_ids)
            .await
    }
}
