//! Query expression evaluation for in-memory document filtering and sorting.
//!
//! A missing field evaluates as null, so `ne` and `nin` match
//! documents that lack the field and ordered comparisons do not.

use std::{collections::HashMap, cmp::Ordering};
use bson::{Bson, datetime::DateTime};

use docrepo_core::{
    query::{QueryVisitor, Expr, FieldOp, Sort, SortDirection},
    error::{DocumentStoreError, DocumentStoreResult},
};


/// Type-erased, comparable representation of BSON values.
///
/// Integers and floats are normalized to f64.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Null,
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl<'a> Comparable<'a> {
    /// Total order used for sorting: null first, incomparable values tie.
    fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Ordering::Equal,
            (Comparable::Null, _) => Ordering::Less,
            (_, Comparable::Null) => Ordering::Greater,
            _ => self.partial_cmp(other).unwrap_or(Ordering::Equal),
        }
    }
}


fn as_document(document: &Bson) -> DocumentStoreResult<&bson::Document> {
    document
        .as_document()
        .ok_or_else(|| DocumentStoreError::InvalidDocument(format!(
            "expected a document, found {:?}",
            document.element_type(),
        )))
}

fn field_of<'a>(document: &'a Bson, name: &str) -> Option<&'a Bson> {
    document.as_document().and_then(|doc| doc.get(name))
}

/// Orders two documents by the given sort keys, primary key first.
pub(crate) fn compare_documents(left: &Bson, right: &Bson, sort: &[Sort]) -> Ordering {
    let null = Bson::Null;

    for key in sort {
        let left = field_of(left, &key.field).unwrap_or(&null);
        let right = field_of(right, &key.field).unwrap_or(&null);

        let ordering = Comparable::from(left).sort_cmp(&Comparable::from(right));
        let ordering = match key.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}


pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Bson,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Bson) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    /// Evaluates an optional filter; no filter matches every document.
    pub fn matches(document: &'a Bson, filter: Option<&Expr>) -> DocumentStoreResult<bool> {
        match filter {
            Some(expr) => DocumentEvaluator::new(document).evaluate(expr),
            None => Ok(true),
        }
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(as_document(self.document)?.get(field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let null = Bson::Null;
        let field_value = Comparable::from(as_document(self.document)?.get(field).unwrap_or(&null));
        let value = Comparable::from(value);

        Ok(match op {
            FieldOp::Eq => field_value == value,
            FieldOp::Ne => field_value != value,
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                match field_value.partial_cmp(&value) {
                    Some(ordering) => match op {
                        FieldOp::Gt => ordering == Ordering::Greater,
                        FieldOp::Gte => ordering != Ordering::Less,
                        FieldOp::Lt => ordering == Ordering::Less,
                        _ => ordering != Ordering::Greater,
                    },
                    None => false,
                }
            },
            FieldOp::Contains => contains(&field_value, &value),
            FieldOp::AnyOf => any_of(&field_value, &value),
            FieldOp::NoneOf => !any_of(&field_value, &value),
        })
    }
}

fn contains(field_value: &Comparable<'_>, value: &Comparable<'_>) -> bool {
    match (field_value, value) {
        (Comparable::Array(array), Comparable::String(right)) => array
            .iter()
            .any(|item| matches!(item, Comparable::String(left) if left.contains(*right))),
        (Comparable::Array(array), value) => array.iter().any(|item| item == value),
        (Comparable::String(left), Comparable::String(right)) => left.contains(*right),
        _ => false,
    }
}

fn any_of(field_value: &Comparable<'_>, value: &Comparable<'_>) -> bool {
    match (field_value, value) {
        (Comparable::Array(array), Comparable::Array(values)) => {
            values.iter().any(|val| array.iter().any(|item| item == val))
        },
        (Comparable::Array(array), single_value) => array.iter().any(|item| item == single_value),
        (single_value, Comparable::Array(values)) => values.iter().any(|val| val == single_value),
        (single_value, other) => single_value == other,
    }
}
