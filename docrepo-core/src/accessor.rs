//! Runtime field binding for entities.
//!
//! Query intent names fields as strings known only at runtime. [`compile`] turns an
//! `(entity type, field name)` pair into a [`FieldAccessor`]: a reusable getter and
//! setter bound to that field, plus the field's BSON kind for value coercion.
//!
//! Accessors operate on the entity's serde representation, so they see exactly the
//! field names the store sees. Compiled accessors are memoized process-wide; the
//! cache is a concurrent map, so concurrent requests for the same binding are safe.
//!
//! # Example
//!
//! ```ignore
//! use docrepo::accessor::compile;
//!
//! let title = compile::<Article>("title")?;
//! assert_eq!(title.get(&article)?, bson::Bson::String("Hello".into()));
//! ```

use bson::Bson;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::{
    any::{Any, TypeId, type_name},
    fmt,
    sync::Arc,
};

use crate::{
    document::{Entity, EntityExt},
    error::{DocumentStoreError, DocumentStoreResult},
};

type Getter<E> = dyn Fn(&E) -> DocumentStoreResult<Bson> + Send + Sync;
type Setter<E> = dyn Fn(&mut E, Bson) -> DocumentStoreResult<()> + Send + Sync;

static ACCESSORS: Lazy<DashMap<(TypeId, String), Arc<dyn Any + Send + Sync>>> =
    Lazy::new(DashMap::new);

/// The BSON kind of a field, inferred from the entity's default value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Double,
    Boolean,
    Array,
    Document,
    /// The default value carries no type information (e.g. `None`).
    Unknown,
}

impl FieldKind {
    fn of(value: Option<&Bson>) -> Self {
        match value {
            Some(Bson::String(_)) => FieldKind::String,
            Some(Bson::Int32(_)) | Some(Bson::Int64(_)) => FieldKind::Integer,
            Some(Bson::Double(_)) => FieldKind::Double,
            Some(Bson::Boolean(_)) => FieldKind::Boolean,
            Some(Bson::Array(_)) => FieldKind::Array,
            Some(Bson::Document(_)) => FieldKind::Document,
            _ => FieldKind::Unknown,
        }
    }
}

/// A compiled getter/setter pair bound to one field of `E`.
///
/// Cloning is cheap; clones share the compiled closures.
pub struct FieldAccessor<E> {
    field: Arc<str>,
    kind: FieldKind,
    getter: Arc<Getter<E>>,
    setter: Arc<Setter<E>>,
}

impl<E: Entity> FieldAccessor<E> {
    fn build(field: &str) -> DocumentStoreResult<Self> {
        if !E::field_names().contains(&field) {
            return Err(DocumentStoreError::FieldNotFound(
                field.to_string(),
                type_name::<E>().to_string(),
            ));
        }

        let kind = FieldKind::of(E::default().to_document()?.get(field));
        let name: Arc<str> = Arc::from(field);

        let getter_field = name.clone();
        let getter: Arc<Getter<E>> = Arc::new(move |entity: &E| {
            Ok(entity
                .to_document()?
                .get(&*getter_field)
                .cloned()
                .unwrap_or(Bson::Null))
        });

        let setter_field = name.clone();
        let setter: Arc<Setter<E>> = Arc::new(move |entity: &mut E, value: Bson| {
            if &*setter_field == E::id_field() {
                return Err(DocumentStoreError::InvalidDocument(format!(
                    "identity field {} of {} is immutable",
                    setter_field,
                    type_name::<E>(),
                )));
            }

            let mut document = entity.to_document()?;
            document.insert(setter_field.to_string(), value);

            *entity = E::from_bson(Bson::Document(document)).map_err(|err| {
                DocumentStoreError::InvalidDocument(format!(
                    "cannot set {} on {}: {}",
                    setter_field,
                    type_name::<E>(),
                    err,
                ))
            })?;

            Ok(())
        });

        Ok(Self { field: name, kind, getter, setter })
    }

    /// Returns the serialized name of the bound field.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns the BSON kind of the bound field.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Reads the field's current value. Absent optional values read as `Bson::Null`.
    pub fn get(&self, entity: &E) -> DocumentStoreResult<Bson> {
        (self.getter)(entity)
    }

    /// Writes a value into the field.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if the value does not fit the
    /// field's type or if the field is the entity's identity.
    pub fn set(&self, entity: &mut E, value: Bson) -> DocumentStoreResult<()> {
        (self.setter)(entity, value)
    }

    /// Converts a raw query value into a BSON value of the field's kind.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidFilterValue`] if the value cannot be parsed
    /// as the field's kind.
    pub fn coerce(&self, raw: &str) -> DocumentStoreResult<Bson> {
        let invalid = || DocumentStoreError::InvalidFilterValue(self.field.to_string(), raw.to_string());

        match self.kind {
            FieldKind::String => Ok(Bson::String(raw.to_string())),
            FieldKind::Integer => raw
                .parse::<i64>()
                .map(Bson::Int64)
                .map_err(|_| invalid()),
            FieldKind::Double => raw
                .parse::<f64>()
                .map(Bson::Double)
                .map_err(|_| invalid()),
            FieldKind::Boolean => raw
                .parse::<bool>()
                .map(Bson::Boolean)
                .map_err(|_| invalid()),
            FieldKind::Array | FieldKind::Document | FieldKind::Unknown => Ok(guess_value(raw)),
        }
    }
}

fn guess_value(raw: &str) -> Bson {
    if raw == "null" {
        Bson::Null
    } else if let Ok(value) = raw.parse::<bool>() {
        Bson::Boolean(value)
    } else if let Ok(value) = raw.parse::<i64>() {
        Bson::Int64(value)
    } else if let Ok(value) = raw.parse::<f64>() {
        Bson::Double(value)
    } else {
        Bson::String(raw.to_string())
    }
}

impl<E> Clone for FieldAccessor<E> {
    fn clone(&self) -> Self {
        Self {
            field: self.field.clone(),
            kind: self.kind,
            getter: self.getter.clone(),
            setter: self.setter.clone(),
        }
    }
}

impl<E> fmt::Debug for FieldAccessor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAccessor")
            .field("entity", &type_name::<E>())
            .field("field", &self.field)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Compiles (or fetches from cache) the accessor for `field` on `E`.
///
/// # Errors
///
/// Returns [`DocumentStoreError::FieldNotFound`] if `E` has no field with that name.
pub fn compile<E: Entity>(field: &str) -> DocumentStoreResult<FieldAccessor<E>> {
    let key = (TypeId::of::<E>(), field.to_string());

    if let Some(cached) = ACCESSORS.get(&key) {
        if let Some(accessor) = cached.value().downcast_ref::<FieldAccessor<E>>() {
            return Ok(accessor.clone());
        }
    }

    let accessor = FieldAccessor::<E>::build(field)?;

    Ok(ACCESSORS
        .entry(key)
        .or_insert_with(|| Arc::new(accessor.clone()))
        .value()
        .downcast_ref::<FieldAccessor<E>>()
        .cloned()
        .unwrap_or(accessor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Probe {
        id: String,
        label: String,
        count: i32,
        ratio: f64,
        enabled: bool,
        note: Option<String>,
    }

    impl Entity for Probe {
        type Id = String;

        fn id(&self) -> &String {
            &self.id
        }

        fn collection_name() -> &'static str {
            "probes"
        }

        fn field_names() -> &'static [&'static str] {
            &["id", "label", "count", "ratio", "enabled", "note"]
        }
    }

    fn probe() -> Probe {
        Probe {
            id: "p-1".to_string(),
            label: "north".to_string(),
            count: 3,
            ratio: 0.5,
            enabled: true,
            note: None,
        }
    }

    #[test]
    fn getter_reads_current_field_value() {
        let mut entity = probe();
        let label = compile::<Probe>("label").unwrap();

        assert_eq!(label.get(&entity).unwrap(), Bson::String("north".into()));

        entity.label = "south".to_string();
        assert_eq!(label.get(&entity).unwrap(), Bson::String("south".into()));
    }

    #[test]
    fn absent_option_reads_as_null() {
        let note = compile::<Probe>("note").unwrap();

        assert_eq!(note.get(&probe()).unwrap(), Bson::Null);
        assert_eq!(note.kind(), FieldKind::Unknown);
    }

    #[test]
    fn unknown_field_is_rejected() {
        match compile::<Probe>("colour") {
            Err(DocumentStoreError::FieldNotFound(field, _)) => assert_eq!(field, "colour"),
            other => panic!("expected FieldNotFound, got {other:?}"),
        }
    }

    #[test]
    fn repeated_compiles_share_the_cached_binding() {
        let first = compile::<Probe>("count").unwrap();
        let second = compile::<Probe>("count").unwrap();

        assert!(Arc::ptr_eq(&first.getter, &second.getter));
        assert!(Arc::ptr_eq(&first.setter, &second.setter));
    }

    #[test]
    fn setter_writes_typed_value() {
        let mut entity = probe();
        let count = compile::<Probe>("count").unwrap();

        count.set(&mut entity, Bson::Int32(9)).unwrap();

        assert_eq!(entity.count, 9);
    }

    #[test]
    fn setter_rejects_identity_field() {
        let mut entity = probe();
        let id = compile::<Probe>("id").unwrap();

        assert!(matches!(
            id.set(&mut entity, Bson::String("p-2".into())),
            Err(DocumentStoreError::InvalidDocument(_))
        ));
        assert_eq!(entity.id, "p-1");
    }

    #[test]
    fn setter_rejects_mismatched_type_and_leaves_entity_untouched() {
        let mut entity = probe();
        let enabled = compile::<Probe>("enabled").unwrap();

        assert!(matches!(
            enabled.set(&mut entity, Bson::String("yes".into())),
            Err(DocumentStoreError::InvalidDocument(_))
        ));
        assert_eq!(entity, probe());
    }

    #[test]
    fn coerce_follows_field_kind() {
        assert_eq!(compile::<Probe>("count").unwrap().coerce("12").unwrap(), Bson::Int64(12));
        assert_eq!(compile::<Probe>("ratio").unwrap().coerce("1.5").unwrap(), Bson::Double(1.5));
        assert_eq!(compile::<Probe>("enabled").unwrap().coerce("false").unwrap(), Bson::Boolean(false));
        assert_eq!(
            compile::<Probe>("label").unwrap().coerce("42").unwrap(),
            Bson::String("42".into())
        );
    }

    #[test]
    fn coerce_rejects_unparsable_values() {
        assert!(matches!(
            compile::<Probe>("count").unwrap().coerce("many"),
            Err(DocumentStoreError::InvalidFilterValue(field, raw)) if field == "count" && raw == "many"
        ));
    }
}
