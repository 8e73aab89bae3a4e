//! Translation of request-level query intent into store queries.
//!
//! A resource API hands the repository parsed but untyped intent: attribute names,
//! operation tokens and raw values. This module binds those names through the
//! expression compiler and turns them into [`Expr`] predicates and [`Sort`] keys.
//!
//! Supported filter operations:
//!
//! | token       | meaning                                  |
//! |-------------|------------------------------------------|
//! | `eq`, ``    | equal                                    |
//! | `ne`        | not equal                                |
//! | `lt`, `le`  | less than, less than or equal            |
//! | `gt`, `ge`  | greater than, greater than or equal      |
//! | `like`      | substring (exact element, for arrays)    |
//! | `in`, `nin` | member / not a member of a comma list    |
//! | `isnull`    | field is null or missing                 |
//! | `isnotnull` | field is present and not null            |

use bson::Bson;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{
    accessor::{FieldAccessor, FieldKind, compile},
    document::Entity,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Filter, Sort, SortDirection},
};

/// A single filter predicate as supplied by the query intent provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterQuery {
    /// The attribute (serialized field name) to filter on.
    pub attribute: String,
    /// The raw comparison value.
    pub value: String,
    /// The operation token, e.g. `eq` or `like`.
    pub operation: String,
}

impl FilterQuery {
    pub fn new(
        attribute: impl Into<String>,
        operation: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
            operation: operation.into(),
        }
    }
}

/// A single sort key as supplied by the query intent provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortQuery {
    pub attribute: String,
    pub direction: SortDirection,
}

impl SortQuery {
    pub fn new(attribute: impl Into<String>, direction: SortDirection) -> Self {
        Self { attribute: attribute.into(), direction }
    }

    pub fn asc(attribute: impl Into<String>) -> Self {
        Self::new(attribute, SortDirection::Asc)
    }

    pub fn desc(attribute: impl Into<String>) -> Self {
        Self::new(attribute, SortDirection::Desc)
    }
}

/// Filter operations understood by the translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperation {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    In,
    Nin,
    IsNull,
    IsNotNull,
}

impl FromStr for FilterOperation {
    type Err = DocumentStoreError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token.to_ascii_lowercase().as_str() {
            "" | "eq" => Ok(FilterOperation::Eq),
            "ne" => Ok(FilterOperation::Ne),
            "lt" => Ok(FilterOperation::Lt),
            "le" => Ok(FilterOperation::Le),
            "gt" => Ok(FilterOperation::Gt),
            "ge" => Ok(FilterOperation::Ge),
            "like" => Ok(FilterOperation::Like),
            "in" => Ok(FilterOperation::In),
            "nin" => Ok(FilterOperation::Nin),
            "isnull" => Ok(FilterOperation::IsNull),
            "isnotnull" => Ok(FilterOperation::IsNotNull),
            _ => Err(DocumentStoreError::UnsupportedFilterOperator(token.to_string())),
        }
    }
}

/// Builds the predicate for one filter on `E`.
///
/// # Errors
///
/// - [`DocumentStoreError::FieldNotFound`] for an unknown attribute
/// - [`DocumentStoreError::UnsupportedFilterOperator`] for an unknown operation
/// - [`DocumentStoreError::InvalidFilterValue`] when the value does not parse as the field's kind
pub fn translate_filter<E: Entity>(filter: &FilterQuery) -> DocumentStoreResult<Expr> {
    let accessor = compile::<E>(&filter.attribute)?;
    let operation = filter.operation.parse::<FilterOperation>()?;
    let field = accessor.field().to_string();
    let raw = filter.value.as_str();

    Ok(match operation {
        FilterOperation::Eq => Filter::eq(field, accessor.coerce(raw)?),
        FilterOperation::Ne => Filter::ne(field, accessor.coerce(raw)?),
        FilterOperation::Lt => Filter::lt(field, accessor.coerce(raw)?),
        FilterOperation::Le => Filter::lte(field, accessor.coerce(raw)?),
        FilterOperation::Gt => Filter::gt(field, accessor.coerce(raw)?),
        FilterOperation::Ge => Filter::gte(field, accessor.coerce(raw)?),
        FilterOperation::Like => match accessor.kind() {
            FieldKind::Array => Filter::any_of(field, Bson::Array(vec![accessor.coerce(raw)?])),
            _ => Filter::contains(field, raw),
        },
        FilterOperation::In => Filter::any_of(field, coerce_list(&accessor, raw)?),
        FilterOperation::Nin => Filter::none_of(field, coerce_list(&accessor, raw)?),
        FilterOperation::IsNull => Filter::or([
            Filter::not_exists(field.clone()),
            Filter::eq(field, Bson::Null),
        ]),
        FilterOperation::IsNotNull => Filter::and([
            Filter::exists(field.clone()),
            Filter::ne(field, Bson::Null),
        ]),
    })
}

fn coerce_list<E: Entity>(accessor: &FieldAccessor<E>, raw: &str) -> DocumentStoreResult<Bson> {
    Ok(Bson::Array(
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| accessor.coerce(item))
            .collect::<DocumentStoreResult<Vec<_>>>()?,
    ))
}

/// Builds the ordered sort keys for `E`, primary key first.
///
/// # Errors
///
/// Returns [`DocumentStoreError::FieldNotFound`] for an unknown attribute.
pub fn translate_sort<E: Entity>(sort: &[SortQuery]) -> DocumentStoreResult<Vec<Sort>> {
    sort.iter()
        .map(|key| {
            compile::<E>(&key.attribute).map(|accessor| Sort {
                field: accessor.field().to_string(),
                direction: key.direction,
            })
        })
        .collect()
}
