//! Named collection handles.
//!
//! A [`Collection`] borrows a backend and adds the document-store verbs on top of
//! the backend's raw scan and write primitives. Every read is a full scan filtered
//! through the [`evaluator`](crate::evaluator); there are no indexes.
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//!
//! # async fn example(store: &nosqlite::store::DocumentStore<impl nosqlite::backend::StoreBackend>) -> nosqlite::error::DocumentStoreResult<()> {
//! let users = store.collection("users");
//! let alice = users.insert(doc! { "name": "Alice", "age": 30 }).await?;
//!
//! let adults = users.find(doc! { "age": { "$gte": 18 } }).await?;
//! assert_eq!(adults, vec![alice]);
//! # Ok(()) }
//! ```

use bson::{Bson, Document};
use tracing::{debug, warn};

use crate::{
    backend::StoreBackend,
    document::{DocumentExt, DocumentId, ID_FIELD},
    error::{DocumentStoreError, DocumentStoreResult},
    evaluator::{Comparable, DocumentEvaluator},
    query::Query,
};

const RESERVED_PREFIX: &str = "sqlite_";

/// Checks that `name` can be used as a collection name.
///
/// A valid name starts with an ASCII letter or `_`, continues with ASCII letters,
/// digits or `_`, and does not start with `sqlite_` in any case. Backends match
/// names case-insensitively, so `Users` and `users` are the same collection.
///
/// # Errors
///
/// Returns [`DocumentStoreError::InvalidCollectionName`] naming the broken rule.
pub fn validate_name(name: &str) -> DocumentStoreResult<()> {
    let invalid = |reason: &str| DocumentStoreError::InvalidCollectionName(format!("{name:?} {reason}"));

    let mut chars = name.chars();
    match chars.next() {
        None => return Err(invalid("is empty")),
        Some(first) if !(first.is_ascii_alphabetic() || first == '_') => {
            return Err(invalid("must start with a letter or an underscore"));
        },
        Some(_) => {},
    }

    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid("may only contain letters, digits and underscores"));
    }

    if name
        .get(..RESERVED_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(RESERVED_PREFIX))
    {
        return Err(invalid("uses the reserved sqlite_ prefix"));
    }

    Ok(())
}

/// A collection with a reference to a storage backend.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the backend reference
/// * `B` - The storage backend type
#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend> {
    name: String,
    backend: &'a B,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    /// Creates a new collection handle. The collection itself is created lazily.
    pub fn new(name: impl Into<String>, backend: &'a B) -> Self {
        Self {
            name: name.into(),
            backend,
        }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the documents matching `query`, in storage order.
    ///
    /// Accepts a bare filter [`Document`] or a [`Query`] carrying a limit.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnknownOperator`] or
    /// [`DocumentStoreError::MalformedQuery`] for a broken filter, or a backend error
    /// if the scan fails.
    pub async fn find(&self, query: impl Into<Query>) -> DocumentStoreResult<Vec<Document>> {
        let query = query.into();
        let documents = self
            .backend
            .scan_documents(&self.name)
            .await?;

        debug!(
            collection = %self.name,
            scanned = documents.len(),
            limit = ?query.effective_limit(),
            "scanning collection"
        );

        DocumentEvaluator::filter_documents(
            documents.into_iter().map(|(_, document)| document),
            &query.filter,
            query.effective_limit(),
        )
        .inspect_err(|err| {
            if err.is_query_error() {
                warn!(collection = %self.name, error = %err, "rejected filter");
            }
        })
    }

    /// Returns the first document matching `filter`, if any.
    ///
    /// A collection that does not exist yields `None`.
    pub async fn find_one(&self, filter: Document) -> DocumentStoreResult<Option<Document>> {
        let query = Query::builder()
            .filter(filter)
            .limit(1)
            .build();

        Ok(self
            .find(query)
            .await?
            .into_iter()
            .next())
    }

    /// Counts the documents matching `filter`.
    pub async fn count(&self, filter: Document) -> DocumentStoreResult<usize> {
        Ok(self.find(filter).await?.len())
    }

    /// Returns the distinct values of `field` in first-seen order.
    ///
    /// Documents without the field are skipped. Values are compared with query
    /// equality, so `1` and `1.0` collapse into the first one seen.
    pub async fn distinct(&self, field: &str) -> DocumentStoreResult<Vec<Bson>> {
        let documents = self
            .backend
            .scan_documents(&self.name)
            .await?;

        let mut values: Vec<Bson> = Vec::new();
        for (_, document) in &documents {
            let Some(value) = document.get(field) else {
                continue;
            };

            let candidate = Comparable::from(value);
            if !values.iter().any(|seen| Comparable::from(seen) == candidate) {
                values.push(value.clone());
            }
        }

        Ok(values)
    }

    /// Stores a document and returns it with its `_id` set.
    ///
    /// A document that already carries an `_id` is updated in place instead.
    pub async fn insert(&self, document: Document) -> DocumentStoreResult<Document> {
        self.update(document).await
    }

    /// Replaces the stored body of a document identified by its `_id`.
    ///
    /// A document without an `_id` is inserted instead.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DocumentNotFound`] if the `_id` is not stored in
    /// this collection.
    pub async fn update(&self, document: Document) -> DocumentStoreResult<Document> {
        match document.id() {
            Some(id) => self.replace(id, document).await,
            None => self.insert_new(document).await,
        }
    }

    /// Alias of [`Collection::update`].
    pub async fn save(&self, document: Document) -> DocumentStoreResult<Document> {
        self.update(document).await
    }

    /// Removes a stored document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if the document has no `_id`.
    pub async fn remove(&self, document: &Document) -> DocumentStoreResult<()> {
        let id = document.id().ok_or_else(|| {
            DocumentStoreError::InvalidDocument(format!(
                "cannot remove a document without {ID_FIELD} from {}",
                self.name
            ))
        })?;

        debug!(collection = %self.name, id, "removing document");

        self.backend
            .delete_document(&self.name, id)
            .await
    }

    /// Alias of [`Collection::remove`].
    pub async fn delete(&self, document: &Document) -> DocumentStoreResult<()> {
        self.remove(document).await
    }

    /// Merges the fields of `update` into every document matching `filter`.
    ///
    /// Each modified document is saved and returned. An `_id` inside `update` is
    /// ignored.
    pub async fn find_and_modify(
        &self,
        filter: Document,
        update: Document,
    ) -> DocumentStoreResult<Vec<Document>> {
        if update.contains_key(ID_FIELD) {
            warn!(collection = %self.name, "ignoring {ID_FIELD} in find_and_modify update");
        }

        let changes = update.without_id();
        let mut modified = Vec::new();

        for mut document in self.find(filter).await? {
            for (key, value) in &changes {
                document.insert(key.clone(), value.clone());
            }

            modified.push(self.save(document).await?);
        }

        Ok(modified)
    }

    /// Returns `true` if the collection exists in the backend.
    pub async fn exists(&self) -> DocumentStoreResult<bool> {
        self.backend
            .collection_exists(&self.name)
            .await
    }

    /// Creates the collection if it does not exist.
    pub async fn create(&self) -> DocumentStoreResult<()> {
        self.backend
            .create_collection(&self.name)
            .await
    }

    /// Drops the collection and all its documents.
    pub async fn drop(&self) -> DocumentStoreResult<()> {
        self.backend
            .drop_collection(&self.name)
            .await
    }

    /// Removes every document while keeping the collection.
    pub async fn clear(&self) -> DocumentStoreResult<()> {
        self.backend
            .clear_collection(&self.name)
            .await
    }

    /// Renames the collection and points this handle at the new name.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::CollectionAlreadyExists`] if `new_name` is taken
    /// and [`DocumentStoreError::CollectionNotFound`] if this collection does not exist.
    pub async fn rename(&mut self, new_name: &str) -> DocumentStoreResult<()> {
        self.backend
            .rename_collection(&self.name, new_name)
            .await?;

        debug!(from = %self.name, to = new_name, "renamed collection");
        self.name = new_name.to_string();

        Ok(())
    }

    async fn insert_new(&self, document: Document) -> DocumentStoreResult<Document> {
        let id = self
            .backend
            .insert_document(&self.name, document.without_id())
            .await?;

        debug!(collection = %self.name, id, "inserted document");

        Ok(document.with_id(id))
    }

    async fn replace(&self, id: DocumentId, document: Document) -> DocumentStoreResult<Document> {
        self.backend
            .update_document(&self.name, id, document.without_id())
            .await?;

        debug!(collection = %self.name, id, "updated document");

        Ok(document)
    }
}
