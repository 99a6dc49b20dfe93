//! Storage backend abstraction for the document store.
//!
//! A backend persists document bodies per collection and hands them back as a full
//! scan. It knows nothing about queries: filtering happens in the
//! [`evaluator`](crate::evaluator) over whatever the scan produced.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use nosqlite::backend::StoreBackend;
//! use bson::doc;
//!
//! let id = backend.insert_document("users", doc! { "name": "Alice" }).await?;
//! for (id, document) in backend.scan_documents("users").await? {
//!     println!("{id}: {document}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::Document;
use std::fmt::Debug;

use crate::{document::DocumentId, error::DocumentStoreResult};

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks. The concurrency model (read-write lock, single connection mutex, ...)
/// is implementation-specific.
///
/// # Identifiers
///
/// Backends assign a [`DocumentId`] on insertion. Identifiers are unique within a
/// collection and never reused, so a scan in ascending id order is a scan in insertion
/// order.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Returns every document of a collection in ascending id order.
    ///
    /// Each document carries its identifier in `_id`. A missing collection scans as
    /// empty.
    async fn scan_documents(&self, collection: &str) -> DocumentStoreResult<Vec<(DocumentId, Document)>>;

    /// Stores a new document and returns its freshly assigned id.
    ///
    /// The collection is created if it does not exist. Any `_id` field in `document`
    /// is ignored and never persisted.
    async fn insert_document(&self, collection: &str, document: Document) -> DocumentStoreResult<DocumentId>;

    /// Replaces the body stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentNotFound`](crate::error::DocumentStoreError::DocumentNotFound)
    /// if the collection or the id does not exist.
    async fn update_document(
        &self,
        collection: &str,
        id: DocumentId,
        document: Document,
    ) -> DocumentStoreResult<()>;

    /// Deletes the document stored under `id`. Deleting a missing document is a no-op.
    async fn delete_document(&self, collection: &str, id: DocumentId) -> DocumentStoreResult<()>;

    /// Creates an empty collection if it does not exist yet.
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Drops a collection and all its documents, if it exists.
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Returns `true` if the collection exists.
    async fn collection_exists(&self, name: &str) -> DocumentStoreResult<bool>;

    /// Lists the names of all collections in the store.
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// Renames a collection, keeping its documents and their ids.
    ///
    /// # Errors
    ///
    /// - [`CollectionNotFound`](crate::error::DocumentStoreError::CollectionNotFound)
    ///   if `name` does not exist.
    /// - [`CollectionAlreadyExists`](crate::error::DocumentStoreError::CollectionAlreadyExists)
    ///   if `new_name` is taken.
    async fn rename_collection(&self, name: &str, new_name: &str) -> DocumentStoreResult<()>;

    /// Removes every document of a collection while keeping the collection itself.
    async fn clear_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op; backends holding connections override it.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn scan_documents(&self, collection: &str) -> DocumentStoreResult<Vec<(DocumentId, Document)>> {
        (*self).scan_documents(collection).await
    }

    async fn insert_document(&self, collection: &str, document: Document) -> DocumentStoreResult<DocumentId> {
        (*self)
            .insert_document(collection, document)
            .await
    }

    async fn update_document(
        &self,
        collection: &str,
        id: DocumentId,
        document: Document,
    ) -> DocumentStoreResult<()> {
        (*self)
            .update_document(collection, id, document)
            .await
    }

    async fn delete_document(&self, collection: &str, id: DocumentId) -> DocumentStoreResult<()> {
        (*self).delete_document(collection, id).await
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        (*self).create_collection(name).await
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        (*self).drop_collection(name).await
    }

    async fn collection_exists(&self, name: &str) -> DocumentStoreResult<bool> {
        (*self).collection_exists(name).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        (*self).list_collections().await
    }

    async fn rename_collection(&self, name: &str, new_name: &str) -> DocumentStoreResult<()> {
        (*self)
            .rename_collection(name, new_name)
            .await
    }

    async fn clear_collection(&self, name: &str) -> DocumentStoreResult<()> {
        (*self).clear_collection(name).await
    }
}

/// Factory for backend instances, carrying the backend's configuration.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
