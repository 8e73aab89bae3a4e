//! Request-scoped query intent and pending updates.
//!
//! A resource API parses each request into a [`QuerySet`] (filters, sort, sparse
//! fieldset, includes, page) and, for updates, an [`UpdateSet`] of field values.
//! Repositories read the query set from their [`RequestContext`]; update sets are
//! handed to [`update`](crate::repository::EntityRepository::update) directly.

use bson::Bson;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    accessor::{FieldAccessor, compile},
    document::Entity,
    error::DocumentStoreResult,
    page::PageDescriptor,
    translate::{FilterQuery, SortQuery},
};

/// Parsed query parameters of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySet {
    pub filters: Vec<FilterQuery>,
    pub sort: Vec<SortQuery>,
    /// Sparse fieldset. Empty means every field.
    pub fields: Vec<String>,
    pub include: Vec<String>,
    pub page: Option<PageDescriptor>,
}

impl QuerySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: FilterQuery) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_sort(mut self, sort: SortQuery) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_include(mut self, relationship: impl Into<String>) -> Self {
        self.include.push(relationship.into());
        self
    }

    pub fn with_page(mut self, page: PageDescriptor) -> Self {
        self.page = Some(page);
        self
    }
}

/// The query intent a repository serves. Absent for internal callers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    query_set: Option<QuerySet>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query_set(mut self, query_set: QuerySet) -> Self {
        self.query_set = Some(query_set);
        self
    }

    pub fn query_set(&self) -> Option<&QuerySet> {
        self.query_set.as_ref()
    }

    /// Returns the requested sparse fieldset, if the request asked for one.
    pub fn fields(&self) -> Option<&[String]> {
        self.query_set
            .as_ref()
            .map(|query_set| query_set.fields.as_slice())
            .filter(|fields| !fields.is_empty())
    }

    /// Returns the requested page, if the request asked for one.
    pub fn page(&self) -> Option<PageDescriptor> {
        self.query_set.as_ref().and_then(|query_set| query_set.page)
    }
}

/// Pending changes for one update: attribute values, then relationship values.
///
/// Setting the same field twice keeps the later value.
///
/// # Example
///
/// ```ignore
/// let patch = UpdateSet::<Article>::new()
///     .attribute("title", "Renamed")?
///     .relationship("tag_ids", vec!["t-1", "t-2"])?;
///
/// repository.update(&article_id, &patch).await?;
/// ```
pub struct UpdateSet<E> {
    attributes: Vec<(FieldAccessor<E>, Bson)>,
    relationships: Vec<(FieldAccessor<E>, Bson)>,
}

impl<E: Entity> UpdateSet<E> {
    pub fn new() -> Self {
        Self { attributes: Vec::new(), relationships: Vec::new() }
    }

    /// Records an attribute value.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::FieldNotFound`](crate::error::DocumentStoreError::FieldNotFound)
    /// if `E` has no such field.
    pub fn attribute(mut self, field: &str, value: impl Into<Bson>) -> DocumentStoreResult<Self> {
        upsert(&mut self.attributes, compile::<E>(field)?, value.into());
        Ok(self)
    }

    /// Records a relationship value (embedded identity or identities).
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::FieldNotFound`](crate::error::DocumentStoreError::FieldNotFound)
    /// if `E` has no such field.
    pub fn relationship(mut self, field: &str, value: impl Into<Bson>) -> DocumentStoreResult<Self> {
        upsert(&mut self.relationships, compile::<E>(field)?, value.into());
        Ok(self)
    }

    pub fn attributes(&self) -> &[(FieldAccessor<E>, Bson)] {
        &self.attributes
    }

    pub fn relationships(&self) -> &[(FieldAccessor<E>, Bson)] {
        &self.relationships
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.relationships.is_empty()
    }

    /// Writes every attribute, then every relationship, into `entity`.
    ///
    /// Stops at the first value that does not fit; `entity` keeps the values
    /// written before it.
    pub fn apply(&self, entity: &mut E) -> DocumentStoreResult<()> {
        for (accessor, value) in self.attributes.iter().chain(&self.relationships) {
            accessor.set(entity, value.clone())?;
        }

        Ok(())
    }
}

fn upsert<E: Entity>(entries: &mut Vec<(FieldAccessor<E>, Bson)>, accessor: FieldAccessor<E>, value: Bson) {
    match entries.iter_mut().find(|(existing, _)| existing.field() == accessor.field()) {
        Some((_, slot)) => *slot = value,
        None => entries.push((accessor, value)),
    }
}

impl<E: Entity> Default for UpdateSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for UpdateSet<E> {
    fn clone(&self) -> Self {
        Self {
            attributes: self.attributes.clone(),
            relationships: self.relationships.clone(),
        }
    }
}

impl<E> fmt::Debug for UpdateSet<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateSet")
            .field("attributes", &self.attributes)
            .field("relationships", &self.relationships)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DocumentStoreError;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Post {
        id: String,
        title: String,
        likes: i64,
        tag_ids: Vec<String>,
    }

    impl Entity for Post {
        type Id = String;

        fn id(&self) -> &String {
            &self.id
        }

        fn collection_name() -> &'static str {
            "posts"
        }

        fn field_names() -> &'static [&'static str] {
            &["id", "title", "likes", "tag_ids"]
        }
    }

    #[test]
    fn context_without_fields_reports_no_selection() {
        let context = RequestContext::new().with_query_set(QuerySet::new().with_include("tags"));

        assert_eq!(context.fields(), None);
        assert_eq!(RequestContext::new().fields(), None);
    }

    #[test]
    fn context_exposes_requested_fields() {
        let context = RequestContext::new().with_query_set(QuerySet::new().with_fields(["title"]));

        assert_eq!(context.fields(), Some(&["title".to_string()][..]));
    }

    #[test]
    fn query_set_deserializes_with_missing_sections() {
        let query_set: QuerySet = serde_json::from_str(
            r#"{ "filters": [{ "attribute": "likes", "operation": "gt", "value": "3" }] }"#,
        )
        .unwrap();

        assert_eq!(query_set.filters, vec![FilterQuery::new("likes", "gt", "3")]);
        assert!(query_set.sort.is_empty());
        assert_eq!(query_set.page, None);
    }

    #[test]
    fn later_value_for_same_field_wins() {
        let patch = UpdateSet::<Post>::new()
            .attribute("title", "draft")
            .unwrap()
            .attribute("title", "final")
            .unwrap();

        assert_eq!(patch.attributes().len(), 1);
        assert_eq!(patch.attributes()[0].1, Bson::String("final".into()));
    }

    #[test]
    fn unknown_field_is_rejected_when_recorded() {
        assert!(matches!(
            UpdateSet::<Post>::new().attribute("body", "text"),
            Err(DocumentStoreError::FieldNotFound(..))
        ));
    }

    #[test]
    fn apply_writes_attributes_and_relationships() {
        let mut post = Post { id: "p-1".into(), ..Default::default() };
        let patch = UpdateSet::<Post>::new()
            .attribute("likes", 4_i64)
            .unwrap()
            .relationship("tag_ids", vec!["t-1", "t-2"])
            .unwrap();

        patch.apply(&mut post).unwrap();

        assert_eq!(post.likes, 4);
        assert_eq!(post.tag_ids, vec!["t-1".to_string(), "t-2".to_string()]);
    }
}
