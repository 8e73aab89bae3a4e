//! Composable, lazily executed views of a collection.
//!
//! A [`QuerySource`] records filter, sort, projection and paging on a [`Query`] and
//! executes nothing until a session runs it. Composition order does not matter for
//! filter, sort and field selection: backends always execute filter, then sort, then
//! offset/limit, then projection. Paging should be applied last.
//!
//! # Example
//!
//! ```ignore
//! use docrepo::{source::QuerySource, translate::{FilterQuery, SortQuery}};
//!
//! let source = session
//!     .query::<Article>()
//!     .filter(&FilterQuery::new("title", "like", "rust"))?
//!     .sort(&[SortQuery::desc("published")])?
//!     .paged(PageDescriptor::new(0, 20));
//!
//! let articles = session.fetch(&source).await?;
//! ```

use std::{any::type_name, fmt, marker::PhantomData};
use tracing::trace;

use crate::{
    accessor::compile,
    document::Entity,
    error::DocumentStoreResult,
    page::PageDescriptor,
    query::{Expr, Query},
    translate::{FilterQuery, SortQuery, translate_filter, translate_sort},
};

/// A lazily executed query over the collection of `E`.
pub struct QuerySource<E> {
    query: Query,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Entity> QuerySource<E> {
    /// Creates a source over the whole collection.
    pub fn new() -> Self {
        Self::from_query(Query::new())
    }

    /// Wraps an already built query.
    pub fn from_query(query: Query) -> Self {
        Self { query, _marker: PhantomData }
    }

    /// Returns the query this source will execute.
    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn into_query(self) -> Query {
        self.query
    }

    /// Narrows the source by one filter predicate, ANDed with any existing filter.
    ///
    /// # Errors
    ///
    /// Propagates translation errors from [`translate_filter`].
    pub fn filter(self, filter: &FilterQuery) -> DocumentStoreResult<Self> {
        let expr = translate_filter::<E>(filter)?;
        trace!(collection = E::collection_name(), ?expr, "translated filter");

        Ok(self.where_expr(expr))
    }

    /// ANDs a prebuilt expression with any existing filter.
    pub fn where_expr(mut self, expr: Expr) -> Self {
        self.query.filter = Some(match self.query.filter.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    /// Orders the source by the given keys, primary first.
    ///
    /// An empty slice returns the source unchanged. A non-empty slice replaces any
    /// previous ordering.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::FieldNotFound`](crate::error::DocumentStoreError::FieldNotFound)
    /// for an unknown attribute.
    pub fn sort(mut self, sort: &[SortQuery]) -> DocumentStoreResult<Self> {
        if sort.is_empty() {
            return Ok(self);
        }

        self.query.sort = translate_sort::<E>(sort)?;
        trace!(collection = E::collection_name(), sort = ?self.query.sort, "translated sort");

        Ok(self)
    }

    /// Restricts the attributes materialized for each result.
    ///
    /// An empty selection returns the source unchanged. The identity field is always
    /// materialized.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::FieldNotFound`](crate::error::DocumentStoreError::FieldNotFound)
    /// for an unknown attribute.
    pub fn select_fields<S: AsRef<str>>(mut self, fields: &[S]) -> DocumentStoreResult<Self> {
        if fields.is_empty() {
            return Ok(self);
        }

        let mut projection = Vec::with_capacity(fields.len());
        for field in fields {
            let accessor = compile::<E>(field.as_ref())?;
            if !projection.iter().any(|existing: &String| existing == accessor.field()) {
                projection.push(accessor.field().to_string());
            }
        }

        self.query.projection = Some(projection);
        Ok(self)
    }

    /// Returns the source unchanged.
    ///
    /// Relationships are stored as embedded identities, so there is nothing to join.
    pub fn include(self, relationship: &str) -> Self {
        trace!(
            collection = E::collection_name(),
            relationship,
            "include is a pass-through"
        );
        self
    }

    /// Selects the half-open range `[n * s, n * s + s)` of the filtered, sorted results.
    pub fn paged(mut self, page: PageDescriptor) -> Self {
        self.query.offset = Some(page.offset());
        self.query.limit = Some(page.limit());
        self
    }

    /// Limits the source to at most one result.
    pub fn first(mut self) -> Self {
        self.query.limit = Some(self.query.limit.map_or(1, |limit| limit.min(1)));
        self
    }
}

impl<E: Entity> Default for QuerySource<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for QuerySource<E> {
    fn clone(&self) -> Self {
        Self { query: self.query.clone(), _marker: PhantomData }
    }
}

impl<E> PartialEq for QuerySource<E> {
    fn eq(&self, other: &Self) -> bool {
        self.query == other.query
    }
}

impl<E> fmt::Debug for QuerySource<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySource")
            .field("entity", &type_name::<E>())
            .field("query", &self.query)
            .finish()
    }
}
