//! Query translation from the docrepo AST to MongoDB query syntax.
//!
//! Field names pass through [`FieldNames`] so they match the escaped keys documents
//! are stored under. Values are used verbatim. String matching is case-sensitive,
//! like the in-memory backend.

use bson::{Document, Bson, doc};

use docrepo_core::{
    query::{QueryVisitor, Expr, FieldOp, Sort, SortDirection},
    error::DocumentStoreError,
};

use crate::sanitizer::FieldNames;


/// Translates docrepo query expressions into MongoDB query documents.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// Translates an optional filter; no filter matches every document.
    pub(crate) fn filter(filter: Option<&Expr>) -> Result<Document, DocumentStoreError> {
        match filter {
            Some(expr) => MongoQueryTranslator.visit_expr(expr),
            None => Ok(doc! {}),
        }
    }

    /// Builds a sort document, primary key first.
    pub(crate) fn sort(sort: &[Sort]) -> Document {
        sort.iter()
            .map(|key| {
                (
                    FieldNames::escape(&key.field).into_owned(),
                    Bson::Int32(match key.direction {
                        SortDirection::Asc => 1,
                        SortDirection::Desc => -1,
                    }),
                )
            })
            .collect()
    }

    /// Builds a projection document that always includes `id_field`.
    pub(crate) fn projection(fields: &[String], id_field: &str) -> Document {
        std::iter::once(id_field)
            .chain(fields.iter().map(String::as_str))
            .map(|field| (FieldNames::escape(field).into_owned(), Bson::Int32(1)))
            .collect()
    }
}

fn escape_regex(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if "\\^$.|?*+()[]{}".contains(ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        let field = FieldNames::escape(field).into_owned();

        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let value = value.clone();
        let field = FieldNames::escape(field).into_owned();

        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                // a regex on an array field matches any element containing the substring
                FieldOp::Contains => match value {
                    Bson::String(s) => doc! { "$regex": escape_regex(&s) },
                    other => doc! { "$elemMatch": { "$eq": other } },
                },
                FieldOp::AnyOf => match value {
                    Bson::Array(arr) => doc! { "$in": arr },
                    other => doc! { "$in": [other] },
                },
                FieldOp::NoneOf => match value {
                    Bson::Array(arr) => doc! { "$nin": arr },
                    other => doc! { "$nin": [other] },
                },
            }
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use docrepo_core::query::Filter;

    #[test]
    fn translates_conjunction_of_comparisons() {
        let expr = Filter::gte("score", 2_i64).and(Filter::ne("name", "x"));

        assert_eq!(
            MongoQueryTranslator::filter(Some(&expr)).unwrap(),
            doc! {
                "$and": [
                    { "score": { "$gte": 2_i64 } },
                    { "name": { "$ne": "x" } },
                ]
            }
        );
    }

    #[test]
    fn contains_escapes_regex_metacharacters() {
        let expr = Filter::contains("title", "v1+");

        assert_eq!(
            MongoQueryTranslator::filter(Some(&expr)).unwrap(),
            doc! { "title": { "$regex": "v1\\+" } }
        );
    }

    #[test]
    fn keys_are_escaped_and_values_kept_verbatim() {
        let expr = Filter::lt("host.name", "example.com");

        assert_eq!(
            MongoQueryTranslator::filter(Some(&expr)).unwrap(),
            doc! { "host__dot__name": { "$lt": "example.com" } }
        );
    }

    #[test]
    fn missing_filter_matches_everything() {
        assert_eq!(MongoQueryTranslator::filter(None).unwrap(), doc! {});
    }

    #[test]
    fn sort_document_keeps_key_order() {
        let sort = vec![
            Sort { field: "score".into(), direction: SortDirection::Desc },
            Sort { field: "name".into(), direction: SortDirection::Asc },
        ];

        let document = MongoQueryTranslator::sort(&sort);

        assert_eq!(document, doc! { "score": -1, "name": 1 });
        assert_eq!(document.keys().collect::<Vec<_>>(), vec!["score", "name"]);
    }

    #[test]
    fn projection_always_includes_identity() {
        assert_eq!(
            MongoQueryTranslator::projection(&["name".to_string()], "id"),
            doc! { "id": 1, "name": 1 }
        );
    }

    #[test]
    fn array_membership_wraps_single_values() {
        let single = Filter::any_of("tags", Bson::Array(vec![Bson::String("b".into())]));

        assert_eq!(
            MongoQueryTranslator::filter(Some(&single)).unwrap(),
            doc! { "tags": { "$in": ["b"] } }
        );
        assert_eq!(
            MongoQueryTranslator::filter(Some(&Filter::none_of("rank", 3))).unwrap(),
            doc! { "rank": { "$nin": [3] } }
        );
    }

    #[test]
    fn contains_with_non_string_matches_elements() {
        assert_eq!(
            MongoQueryTranslator::filter(Some(&Filter::contains("ranks", 20_i64))).unwrap(),
            doc! { "ranks": { "$elemMatch": { "$eq": 20_i64 } } }
        );
    }
}
