//! Error types and result types for repository and document store operations.
//!
//! Every fallible operation in this crate returns [`DocumentStoreResult<T>`].
//! Errors propagate unchanged to the caller: nothing here retries or recovers
//! locally, and a missing document on a single-entity lookup is reported as
//! `Ok(None)` rather than an error.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors raised by the repository layer and its backends.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between entities and documents.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during backend initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The document has an invalid structure, or a write would violate an entity invariant.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// A filter, sort or field selection referenced a field the entity does not have.
    /// The first argument is the field name, the second is the entity type.
    #[error("Field {0} not found on {1}")]
    FieldNotFound(String, String),
    /// The filter operation is not implemented by the query translator.
    #[error("Unsupported filter operator: {0}")]
    UnsupportedFilterOperator(String),
    /// A filter value could not be coerced into the field's type.
    /// The first argument is the field name, the second is the raw value.
    #[error("Invalid value for field {0}: {1}")]
    InvalidFilterValue(String, String),
    /// The underlying store is unreachable or rejected the operation.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    /// No relationship handler is registered for the target type.
    #[error("No relationship handler registered for {0}")]
    HandlerNotFound(String),
}

/// A specialized `Result` type for repository and document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
