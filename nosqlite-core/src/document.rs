//! Document identity and serialization helpers.
//!
//! Documents are plain [`bson::Document`] values. Every document read back from a
//! store carries a synthetic `_id` field holding its [`DocumentId`]. The identifier
//! lives in the backend's key, never inside the persisted body: [`encode`] strips it
//! before serialization and [`decode`] injects it again after deserialization.

use bson::{
    Bson, Document,
    de::{deserialize_from_document, deserialize_from_slice},
    ser::{serialize_to_document, serialize_to_vec},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Identifier assigned to a stored document, unique within its collection.
pub type DocumentId = i64;

/// Name of the synthetic identifier field.
pub const ID_FIELD: &str = "_id";

/// Extension methods for working with the `_id` field of a [`Document`].
pub trait DocumentExt {
    /// Returns the document identifier, if one has been assigned.
    ///
    /// Both 32 and 64 bit integers are accepted; any other `_id` value is ignored.
    fn id(&self) -> Option<DocumentId>;

    /// Returns the document with its `_id` set to `id`.
    fn with_id(self, id: DocumentId) -> Self;

    /// Returns a copy of the document without its `_id` field.
    fn without_id(&self) -> Document;

    /// Converts the document to a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn to_json(&self) -> DocumentStoreResult<Value>;
}

impl DocumentExt for Document {
    fn id(&self) -> Option<DocumentId> {
        match self.get(ID_FIELD) {
            Some(Bson::Int64(id)) => Some(*id),
            Some(Bson::Int32(id)) => Some(i64::from(*id)),
            _ => None,
        }
    }

    fn with_id(mut self, id: DocumentId) -> Self {
        self.insert(ID_FIELD, Bson::Int64(id));
        self
    }

    fn without_id(&self) -> Document {
        self.iter()
            .filter(|(key, _)| key.as_str() != ID_FIELD)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn to_json(&self) -> DocumentStoreResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Serializes a document body into a BSON blob, leaving out its `_id`.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(document: &Document) -> DocumentStoreResult<Vec<u8>> {
    Ok(serialize_to_vec(&document.without_id())?)
}

/// Deserializes a BSON blob and injects `id` as the document's `_id`.
///
/// # Errors
///
/// Returns an error if the blob is not a valid BSON document.
pub fn decode(id: DocumentId, blob: &[u8]) -> DocumentStoreResult<Document> {
    let document: Document = deserialize_from_slice(blob)?;

    Ok(document.with_id(id))
}

/// Creates a document from a JSON object.
///
/// # Errors
///
/// Returns an error if `value` is not a JSON object.
pub fn from_json(value: Value) -> DocumentStoreResult<Document> {
    match value {
        Value::Object(_) => Ok(serde_json::from_value(value)?),
        other => Err(DocumentStoreError::InvalidDocument(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Converts any serializable value into a [`Document`].
///
/// # Errors
///
/// Returns an error if the value does not serialize to a document.
pub fn to_document<T: Serialize>(value: &T) -> DocumentStoreResult<Document> {
    Ok(serialize_to_document(value)?)
}

/// Converts a [`Document`] into a typed value.
///
/// # Errors
///
/// Returns an error if the document does not match the shape of `T`.
pub fn from_document<T: DeserializeOwned>(document: Document) -> DocumentStoreResult<T> {
    Ok(deserialize_from_document(document)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde::Deserialize;

    #[test]
    fn test_encode_strips_id_and_decode_injects_it() {
        let document = doc! { "_id": 7_i64, "name": "Alice", "tags": ["a", "b"] };

        let blob = encode(&document).unwrap();
        let stored: Document = deserialize_from_slice(&blob).unwrap();
        assert!(!stored.contains_key(ID_FIELD));

        let restored = decode(7, &blob).unwrap();
        assert_eq!(restored.id(), Some(7));
        assert_eq!(restored.get_str("name").unwrap(), "Alice");
    }

    #[test]
    fn test_id_accepts_both_integer_widths() {
        assert_eq!(doc! { "_id": 3_i32 }.id(), Some(3));
        assert_eq!(doc! { "_id": 3_i64 }.id(), Some(3));
        assert_eq!(doc! { "_id": "3" }.id(), None);
        assert_eq!(doc! {}.id(), None);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode(1, b"not bson"),
            Err(DocumentStoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_json_conversion() {
        let document = from_json(serde_json::json!({ "foo": "☃", "n": 1 })).unwrap();
        assert_eq!(document.get_str("foo").unwrap(), "☃");

        let json = document.to_json().unwrap();
        assert_eq!(json["foo"], "☃");

        assert!(from_json(serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn test_typed_conversion() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct User {
            name: String,
            age: i32,
        }

        let user = User { name: "Bob".into(), age: 41 };
        let document = to_document(&user).unwrap();
        assert_eq!(document, doc! { "name": "Bob", "age": 41 });

        let back: User = from_document(document).unwrap();
        assert_eq!(back, user);
    }
}
