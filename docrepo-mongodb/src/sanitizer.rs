//! Field-name escaping for MongoDB.
//!
//! MongoDB reserves `.` for path access and `$` for operators, and keys cannot hold
//! NUL. Entity field names containing them are escaped on write and unescaped on
//! read. Values are stored verbatim so filters compare and order them exactly like
//! the in-memory backend does.

use bson::{Bson, Document};
use std::borrow::Cow;

const ESCAPES: [(char, &str); 3] = [
    ('.', "__dot__"),
    ('$', "__dollar__"),
    ('\0', "__null__"),
];

/// Escapes and restores document keys, recursing into nested documents and arrays.
pub(crate) struct FieldNames;

impl FieldNames {
    /// Escapes a single field name. Names without reserved characters are borrowed.
    pub(crate) fn escape(name: &str) -> Cow<'_, str> {
        if !name.contains(|ch: char| ESCAPES.iter().any(|(reserved, _)| *reserved == ch)) {
            return Cow::Borrowed(name);
        }

        let mut escaped = String::with_capacity(name.len() + 8);
        for ch in name.chars() {
            match ESCAPES.iter().find(|(reserved, _)| *reserved == ch) {
                Some((_, replacement)) => escaped.push_str(replacement),
                None => escaped.push(ch),
            }
        }
        Cow::Owned(escaped)
    }

    pub(crate) fn restore(name: &str) -> Cow<'_, str> {
        if !name.contains("__") {
            return Cow::Borrowed(name);
        }

        let mut restored = name.to_string();
        for (reserved, replacement) in ESCAPES.iter().rev() {
            restored = restored.replace(replacement, &reserved.to_string());
        }
        Cow::Owned(restored)
    }

    pub(crate) fn escape_document(document: &Document) -> Document {
        Self::map_keys(document, Self::escape)
    }

    pub(crate) fn restore_document(document: &Document) -> Document {
        Self::map_keys(document, Self::restore)
    }

    fn map_keys(document: &Document, rename: fn(&str) -> Cow<'_, str>) -> Document {
        document
            .iter()
            .map(|(key, value)| (rename(key).into_owned(), Self::map_value(value, rename)))
            .collect()
    }

    fn map_value(value: &Bson, rename: fn(&str) -> Cow<'_, str>) -> Bson {
        match value {
            Bson::Document(nested) => Bson::Document(Self::map_keys(nested, rename)),
            Bson::Array(items) => Bson::Array(items.iter().map(|item| Self::map_value(item, rename)).collect()),
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn escapes_keys_but_not_values() {
        let document = doc! { "a.b": "$1.00", "n": 3, "list": [{ "k$": "v.w" }] };

        assert_eq!(
            FieldNames::escape_document(&document),
            doc! { "a__dot__b": "$1.00", "n": 3, "list": [{ "k__dollar__": "v.w" }] }
        );
    }

    #[test]
    fn plain_names_are_borrowed() {
        assert!(matches!(FieldNames::escape("title"), Cow::Borrowed("title")));
        assert!(matches!(FieldNames::restore("title"), Cow::Borrowed("title")));
    }

    #[test]
    fn restore_reverts_escape() {
        let document = doc! { "host.name": ["x.y", "$z"], "nested": { "k$": "v" } };

        assert_eq!(
            FieldNames::restore_document(&FieldNames::escape_document(&document)),
            document
        );
    }
}
