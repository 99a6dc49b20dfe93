//! Error types and result types for document store operations.
//!
//! Query evaluation distinguishes two kinds of failure. A structurally broken
//! query (an unknown operator, an argument of the wrong shape) is reported as
//! [`DocumentStoreError::UnknownOperator`] or [`DocumentStoreError::MalformedQuery`]
//! and aborts the whole scan. A well-formed query that meets a document of an
//! unexpected shape is never an error: the clause simply does not match.
//!
//! Use [`DocumentStoreResult<T>`] as the return type for fallible operations.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// An operator key that does not start with `$` or is not registered.
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),
    /// A registered operator received an argument of the wrong shape.
    #[error("Malformed query: {operator} expects {expected}")]
    MalformedQuery {
        /// The operator (or logical keyword) whose argument was rejected.
        operator: String,
        /// Human readable description of the accepted argument shape.
        expected: String,
    },
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// The requested collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// A collection with the given name already exists.
    #[error("Collection already exists: {0}")]
    CollectionAlreadyExists(String),
    /// The collection name cannot be used by the backend.
    #[error("Invalid collection name: {0}")]
    InvalidCollectionName(String),
    /// The document violates structural requirements (for example a missing `_id`).
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl DocumentStoreError {
    /// Builds a [`DocumentStoreError::MalformedQuery`] for `operator`.
    pub fn malformed(operator: impl Into<String>, expected: impl Into<String>) -> Self {
        DocumentStoreError::MalformedQuery {
            operator: operator.into(),
            expected: expected.into(),
        }
    }

    /// Returns `true` for errors caused by the shape of the query itself.
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            DocumentStoreError::UnknownOperator(_) | DocumentStoreError::MalformedQuery { .. }
        )
    }
}

/// A specialized `Result` type for document store operations.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_message_names_operator_and_shape() {
        let err = DocumentStoreError::malformed("$mod", "an array of [divisor, remainder]");

        assert_eq!(
            err.to_string(),
            "Malformed query: $mod expects an array of [divisor, remainder]"
        );
        assert!(err.is_query_error());
    }

    #[test]
    fn test_unknown_operator_message() {
        let err = DocumentStoreError::UnknownOperator("$foo".to_string());

        assert_eq!(err.to_string(), "Unknown operator: $foo");
        assert!(err.is_query_error());
        assert!(!DocumentStoreError::Backend("io".into()).is_query_error());
    }
}
