//! Main document store interface.
//!
//! # Example
//!
//! ```ignore
//! use nosqlite::store::DocumentStore;
//!
//! let store = DocumentStore::new(backend);
//! let users = store.collection("users");
//! ```

use tracing::info;

use crate::{
    backend::StoreBackend,
    collection::Collection,
    error::DocumentStoreResult,
};

/// A document store bound to a specific backend implementation.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Gets a handle on the collection with the given name.
    ///
    /// The collection does not need to exist; it is created on first insert.
    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a, B> {
        Collection::new(name, &self.backend)
    }

    /// Creates a new, empty collection if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not usable by the backend or creation fails.
    pub async fn create_collection(&self, name: &str) -> DocumentStoreResult<Collection<'_, B>> {
        self.backend
            .create_collection(name)
            .await?;

        Ok(self.collection(name))
    }

    /// Drops a collection and its documents, if it exists.
    pub async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.backend.drop_collection(name).await
    }

    /// Lists all collections in the store.
    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.backend.list_collections().await
    }

    /// Returns a reference to the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Shuts down the store, releasing all backend resources.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        info!("shutting down document store");

        self.backend.shutdown().await
    }
}
