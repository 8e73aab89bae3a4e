//! Core traits for entities stored in a document store.
//!
//! This module provides the [`Entity`] trait every repository-managed type implements,
//! and [`EntityExt`] for converting entities to and from BSON documents.

use bson::{Bson, Document, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt::{Debug, Display};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Core trait that all entities managed by a repository must implement.
///
/// An entity is an opaque serde record identified by a single identity attribute.
/// The identity type only needs a stable string form, which is the key documents
/// are addressed by in the store.
///
/// `Default` is required because sparse projections materialize an entity from a
/// subset of its fields, and because the expression compiler inspects the default
/// value to learn each field's BSON kind.
///
/// Most types derive this trait with `#[derive(Entity)]` from the `docrepo` crate.
///
/// # Example
///
/// ```ignore
/// use docrepo::document::Entity;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// pub struct Article {
///     pub id: i64,
///     pub title: String,
/// }
///
/// impl Entity for Article {
///     type Id = i64;
///
///     fn id(&self) -> &i64 {
///         &self.id
///     }
///
///     fn collection_name() -> &'static str {
///         "articles"
///     }
///
///     fn field_names() -> &'static [&'static str] {
///         &["id", "title"]
///     }
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + Default + Send + Sync + Clone + 'static {
    /// The identity type. Its `Display` form is the document key.
    type Id: Display + Debug + Clone + PartialEq + Send + Sync + 'static;

    /// Returns a reference to this entity's identity.
    fn id(&self) -> &Self::Id;

    /// Returns the name of the collection this entity is stored in.
    fn collection_name() -> &'static str;

    /// Returns the serialized names of every field of the entity, identity included.
    fn field_names() -> &'static [&'static str];

    /// Returns the serialized name of the identity field.
    fn id_field() -> &'static str {
        "id"
    }
}

/// Extension trait providing document conversions for entities.
///
/// Automatically implemented for all types that implement [`Entity`].
pub trait EntityExt: Entity {
    /// Returns the string key this entity is addressed by in the store.
    fn document_key(&self) -> String;

    /// Converts this entity to a BSON value.
    fn to_bson(&self) -> DocumentStoreResult<Bson>;

    /// Converts this entity to a BSON document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if the entity does not serialize
    /// to a document (for example a newtype around a scalar).
    fn to_document(&self) -> DocumentStoreResult<Document>;

    /// Creates an entity from a BSON value.
    fn from_bson(bson: Bson) -> DocumentStoreResult<Self>;

    /// Creates an entity from a projected document holding only some of its fields.
    ///
    /// Missing fields take their values from `Self::default()`.
    fn from_projection(projected: Document) -> DocumentStoreResult<Self>;
}

impl<E: Entity> EntityExt for E {
    fn document_key(&self) -> String {
        self.id().to_string()
    }

    fn to_bson(&self) -> DocumentStoreResult<Bson> {
        Ok(serialize_to_bson(self)?)
    }

    fn to_document(&self) -> DocumentStoreResult<Document> {
        match self.to_bson()? {
            Bson::Document(document) => Ok(document),
            other => Err(DocumentStoreError::InvalidDocument(format!(
                "{} serialized to {:?}, expected a document",
                std::any::type_name::<E>(),
                other.element_type(),
            ))),
        }
    }

    fn from_bson(bson: Bson) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_bson(bson)?)
    }

    fn from_projection(projected: Document) -> DocumentStoreResult<Self> {
        let mut document = E::default().to_document()?;

        for (field, value) in projected {
            document.insert(field, value);
        }

        E::from_bson(Bson::Document(document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde::Deserialize;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Widget {
        id: i64,
        name: String,
        weight: f64,
    }

    impl Entity for Widget {
        type Id = i64;

        fn id(&self) -> &i64 {
            &self.id
        }

        fn collection_name() -> &'static str {
            "widgets"
        }

        fn field_names() -> &'static [&'static str] {
            &["id", "name", "weight"]
        }
    }

    #[test]
    fn document_key_uses_display_form_of_identity() {
        let widget = Widget { id: 42, ..Default::default() };

        assert_eq!(widget.document_key(), "42");
    }

    #[test]
    fn projection_fills_missing_fields_with_defaults() {
        let widget = Widget::from_projection(doc! { "id": 7_i64, "name": "gear" }).unwrap();

        assert_eq!(
            widget,
            Widget { id: 7, name: "gear".to_string(), weight: 0.0 }
        );
    }

    #[test]
    fn round_trips_through_document() {
        let widget = Widget { id: 1, name: "bolt".to_string(), weight: 2.5 };
        let document = widget.to_document().unwrap();

        assert_eq!(document.get_str("name").unwrap(), "bolt");
        assert_eq!(Widget::from_bson(Bson::Document(document)).unwrap(), widget);
    }
}
