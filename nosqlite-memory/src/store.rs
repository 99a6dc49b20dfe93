//! In-memory storage implementation for document stores.
//!
//! Documents live in ordered maps keyed by their id, behind an async-safe read-write
//! lock, so a scan naturally comes back in insertion order. Collections are keyed by
//! their lowercased name and remember the spelling they were created with.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use bson::Document;
use mea::rwlock::RwLock;
use tracing::debug;

use nosqlite_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    collection::validate_name,
    document::{DocumentExt, DocumentId},
    error::{DocumentStoreError, DocumentStoreResult},
};

type StoreMap = BTreeMap<String, MemoryCollection>;

/// The documents of one collection plus its id counter.
#[derive(Debug, Clone)]
struct MemoryCollection {
    name: String,
    last_id: DocumentId,
    documents: BTreeMap<DocumentId, Document>,
}

impl MemoryCollection {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            last_id: 0,
            documents: BTreeMap::new(),
        }
    }

    fn next_id(&mut self) -> DocumentId {
        self.last_id += 1;
        self.last_id
    }
}

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// Ids are assigned per collection starting at 1 and are never reused, even after
/// a delete or a clear.
///
/// # Example
///
/// ```ignore
/// use nosqlite_memory::InMemoryStore;
/// use nosqlite::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// let id = store.insert_document("users", doc! { "name": "Alice" }).await?;
/// assert_eq!(id, 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> (document id -> document body)
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore` with custom options.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}

/// Validates `name` and returns the key it is stored under.
fn key(name: &str) -> DocumentStoreResult<String> {
    validate_name(name)?;

    Ok(name.to_ascii_lowercase())
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn scan_documents(&self, collection: &str) -> DocumentStoreResult<Vec<(DocumentId, Document)>> {
        let key = key(collection)?;
        let store = self.store.read().await;
        let Some(collection_map) = store.get(&key) else {
            return Ok(vec![]);
        };

        Ok(
            collection_map
                .documents
                .iter()
                .map(|(id, body)| (*id, body.clone().with_id(*id)))
                .collect()
        )
    }

    async fn insert_document(&self, collection: &str, document: Document) -> DocumentStoreResult<DocumentId> {
        let key = key(collection)?;
        let mut store = self.store.write().await;
        let collection_map = store
            .entry(key)
            .or_insert_with(|| MemoryCollection::new(collection));

        let id = collection_map.next_id();
        collection_map
            .documents
            .insert(id, document.without_id());

        Ok(id)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: DocumentId,
        document: Document,
    ) -> DocumentStoreResult<()> {
        let key = key(collection)?;
        let mut store = self.store.write().await;
        let not_found = || DocumentStoreError::DocumentNotFound(id.to_string(), collection.to_string());

        let body = store
            .get_mut(&key)
            .and_then(|collection_map| collection_map.documents.get_mut(&id))
            .ok_or_else(not_found)?;
        *body = document.without_id();

        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: DocumentId) -> DocumentStoreResult<()> {
        let key = key(collection)?;
        let mut store = self.store.write().await;

        if let Some(collection_map) = store.get_mut(&key) {
            collection_map.documents.remove(&id);
        }

        Ok(())
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        let key = key(name)?;

        self.store
            .write()
            .await
            .entry(key)
            .or_insert_with(|| MemoryCollection::new(name));

        debug!(collection = name, "created collection");

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        let key = key(name)?;

        if self.store.write().await.remove(&key).is_some() {
            debug!(collection = name, "dropped collection");
        }

        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> DocumentStoreResult<bool> {
        let key = key(name)?;

        Ok(self.store.read().await.contains_key(&key))
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        let mut names = self
            .store
            .read()
            .await
            .values()
            .map(|collection_map| collection_map.name.clone())
            .collect::<Vec<_>>();
        names.sort();

        Ok(names)
    }

    async fn rename_collection(&self, name: &str, new_name: &str) -> DocumentStoreResult<()> {
        let old_key = key(name)?;
        let new_key = key(new_name)?;
        let mut store = self.store.write().await;

        if !store.contains_key(&old_key) {
            return Err(DocumentStoreError::CollectionNotFound(name.to_string()));
        }
        if store.contains_key(&new_key) {
            return Err(DocumentStoreError::CollectionAlreadyExists(new_name.to_string()));
        }

        if let Some(mut collection_map) = store.remove(&old_key) {
            collection_map.name = new_name.to_string();
            store.insert(new_key, collection_map);
        }
        debug!(from = name, to = new_name, "renamed collection");

        Ok(())
    }

    async fn clear_collection(&self, name: &str) -> DocumentStoreResult<()> {
        let key = key(name)?;

        if let Some(collection_map) = self.store.write().await.get_mut(&key) {
            collection_map.documents.clear();
        }

        Ok(())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use nosqlite_memory::InMemoryStore;
/// use nosqlite::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder()
///     .collection("users")
///     .build()
///     .await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder {
    collections: Vec<String>,
}

impl InMemoryStoreBuilder {
    /// Creates the named collection up front.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collections.push(name.into());
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let store = InMemoryStore::new();

        for name in &self.collections {
            store.create_collection(name).await?;
        }

        Ok(store)
    }
}
