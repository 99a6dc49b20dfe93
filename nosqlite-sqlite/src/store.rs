use std::{fmt, path::PathBuf, time::Duration};

use async_trait::async_trait;
use bson::Document;
use mea::mutex::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use tracing::{debug, info, warn};

use nosqlite_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    collection::validate_name,
    document::{DocumentId, decode, encode},
    error::{DocumentStoreError, DocumentStoreResult},
};

use crate::sanitizer::NameSanitizer;

/// Default time a statement waits on a locked database before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn backend_error(err: rusqlite::Error) -> DocumentStoreError {
    DocumentStoreError::Backend(err.to_string())
}

/// SQLite-backed document storage.
///
/// Each collection is a table `(id integer primary key autoincrement, data blob not null)`
/// holding BSON-encoded document bodies. `autoincrement` keeps ids from being reused
/// after deletes.
///
/// The single connection is guarded by an async mutex; statements run synchronously
/// while the lock is held.
pub struct SqliteStore {
    connection: Mutex<Connection>,
    location: String,
}

impl SqliteStore {
    pub fn new(connection: Connection, location: impl Into<String>) -> Self {
        Self {
            connection: Mutex::new(connection),
            location: location.into(),
        }
    }

    /// Creates a builder opening the database file at `path`.
    pub fn builder(path: impl Into<PathBuf>) -> SqliteStoreBuilder {
        SqliteStoreBuilder::new(path)
    }

    /// Creates a builder for a private in-memory database.
    pub fn in_memory() -> SqliteStoreBuilder {
        SqliteStoreBuilder::in_memory()
    }

    /// Where the database lives: a file path or `:memory:`.
    pub fn location(&self) -> &str {
        &self.location
    }
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStore")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

fn table_exists(conn: &Connection, name: &str) -> DocumentStoreResult<bool> {
    let count: i64 = conn
        .query_row(
            "select count(1) from sqlite_master where type = 'table' and name = ?1 collate nocase",
            params![name],
            |row| row.get(0),
        )
        .map_err(backend_error)?;

    Ok(count > 0)
}

fn create_table(conn: &Connection, table: &str) -> DocumentStoreResult<()> {
    conn.execute(
        &format!("create table if not exists {table} (id integer primary key autoincrement, data blob not null)"),
        [],
    )
    .map_err(backend_error)?;

    Ok(())
}

fn scan(conn: &Connection, name: &str) -> DocumentStoreResult<Vec<(DocumentId, Document)>> {
    let table = NameSanitizer::quote(name)?;

    if !table_exists(conn, name)? {
        return Ok(vec![]);
    }

    let mut statement = conn
        .prepare(&format!("select id, data from {table} order by id"))
        .map_err(backend_error)?;

    let rows = statement
        .query_map([], |row| Ok((row.get::<_, DocumentId>(0)?, row.get::<_, Vec<u8>>(1)?)))
        .map_err(backend_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(backend_error)?;

    rows.into_iter()
        .map(|(id, blob)| decode(id, &blob).map(|document| (id, document)))
        .collect()
}

fn insert(conn: &Connection, name: &str, document: &Document) -> DocumentStoreResult<DocumentId> {
    let table = NameSanitizer::quote(name)?;
    let blob = encode(document)?;

    create_table(conn, &table)?;
    conn.execute(&format!("insert into {table} (data) values (?1)"), params![blob])
        .map_err(backend_error)?;

    Ok(conn.last_insert_rowid())
}

fn update(conn: &Connection, name: &str, id: DocumentId, document: &Document) -> DocumentStoreResult<()> {
    let table = NameSanitizer::quote(name)?;
    let not_found = || DocumentStoreError::DocumentNotFound(id.to_string(), name.to_string());

    if !table_exists(conn, name)? {
        return Err(not_found());
    }

    let blob = encode(document)?;
    let changed = conn
        .execute(&format!("update {table} set data = ?1 where id = ?2"), params![blob, id])
        .map_err(backend_error)?;

    if changed == 0 {
        return Err(not_found());
    }

    Ok(())
}

fn delete(conn: &Connection, name: &str, id: DocumentId) -> DocumentStoreResult<()> {
    let table = NameSanitizer::quote(name)?;

    if table_exists(conn, name)? {
        conn.execute(&format!("delete from {table} where id = ?1"), params![id])
            .map_err(backend_error)?;
    }

    Ok(())
}

fn list(conn: &Connection) -> DocumentStoreResult<Vec<String>> {
    let mut statement = conn
        .prepare(
            "select name from sqlite_master where type = 'table' and substr(name, 1, 7) <> 'sqlite_' order by name",
        )
        .map_err(backend_error)?;

    statement
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(backend_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(backend_error)
}

fn rename(conn: &Connection, name: &str, new_name: &str) -> DocumentStoreResult<()> {
    let table = NameSanitizer::quote(name)?;
    let new_table = NameSanitizer::quote(new_name)?;

    if !table_exists(conn, name)? {
        return Err(DocumentStoreError::CollectionNotFound(name.to_string()));
    }
    if table_exists(conn, new_name)? {
        return Err(DocumentStoreError::CollectionAlreadyExists(new_name.to_string()));
    }

    conn.execute(&format!("alter table {table} rename to {new_table}"), [])
        .map_err(backend_error)?;

    Ok(())
}

#[async_trait]
impl StoreBackend for SqliteStore {
    async fn scan_documents(&self, collection: &str) -> DocumentStoreResult<Vec<(DocumentId, Document)>> {
        let conn = self.connection.lock().await;

        scan(&conn, collection)
    }

    async fn insert_document(&self, collection: &str, document: Document) -> DocumentStoreResult<DocumentId> {
        let conn = self.connection.lock().await;

        insert(&conn, collection, &document)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: DocumentId,
        document: Document,
    ) -> DocumentStoreResult<()> {
        let conn = self.connection.lock().await;

        update(&conn, collection, id, &document)
    }

    async fn delete_document(&self, collection: &str, id: DocumentId) -> DocumentStoreResult<()> {
        let conn = self.connection.lock().await;

        delete(&conn, collection, id)
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        let table = NameSanitizer::quote(name)?;
        let conn = self.connection.lock().await;

        create_table(&conn, &table)?;
        debug!(collection = name, "created collection");

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        let table = NameSanitizer::quote(name)?;
        let conn = self.connection.lock().await;

        conn.execute(&format!("drop table if exists {table}"), [])
            .map_err(backend_error)?;
        debug!(collection = name, "dropped collection");

        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> DocumentStoreResult<bool> {
        validate_name(name)?;
        let conn = self.connection.lock().await;

        table_exists(&conn, name)
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        let conn = self.connection.lock().await;

        list(&conn)
    }

    async fn rename_collection(&self, name: &str, new_name: &str) -> DocumentStoreResult<()> {
        let conn = self.connection.lock().await;

        rename(&conn, name, new_name)?;
        debug!(from = name, to = new_name, "renamed collection");

        Ok(())
    }

    async fn clear_collection(&self, name: &str) -> DocumentStoreResult<()> {
        let table = NameSanitizer::quote(name)?;
        let conn = self.connection.lock().await;

        if table_exists(&conn, name)? {
            conn.execute(&format!("delete from {table}"), [])
                .map_err(backend_error)?;
        }

        Ok(())
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        info!(location = %self.location(), "closing sqlite store");

        self.connection
            .into_inner()
            .close()
            .map_err(|(_, err)| backend_error(err))
    }
}

/// Builder for [`SqliteStore`] instances.
///
/// ```ignore
/// use nosqlite::sqlite::SqliteStore;
/// use nosqlite::backend::StoreBackendBuilder;
///
/// let store = SqliteStore::builder("data.db")
///     .busy_timeout(std::time::Duration::from_secs(1))
///     .build()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct SqliteStoreBuilder {
    path: Option<PathBuf>,
    read_only: bool,
    busy_timeout: Duration,
}

impl SqliteStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            read_only: false,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            read_only: false,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Opens the database without write access. The file must already exist.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    fn open(&self) -> rusqlite::Result<(Connection, String)> {
        let Some(path) = &self.path else {
            if self.read_only {
                warn!("ignoring read_only for an in-memory sqlite store");
            }

            return Ok((Connection::open_in_memory()?, ":memory:".to_string()));
        };

        let connection = if self.read_only {
            Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX)?
        } else {
            Connection::open(path)?
        };

        Ok((connection, path.display().to_string()))
    }
}

#[async_trait]
impl StoreBackendBuilder for SqliteStoreBuilder {
    type Backend = SqliteStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let (connection, location) = self
            .open()
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        connection
            .busy_timeout(self.busy_timeout)
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        let journal_mode: Option<String> = connection
            .query_row("pragma journal_mode", [], |row| row.get(0))
            .optional()
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        info!(
            location = %location,
            read_only = self.read_only,
            journal_mode = journal_mode.as_deref().unwrap_or("unknown"),
            "opened sqlite store"
        );

        Ok(SqliteStore::new(connection, location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use nosqlite_core::document::DocumentExt;

    async fn memory_store() -> SqliteStore {
        SqliteStore::in_memory().build().await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_scan() {
        let store = memory_store().await;

        let first = store.insert_document("foo", doc! { "foo": "bar", "baz": "qux" }).await.unwrap();
        let second = store.insert_document("foo", doc! { "foo": "bar" }).await.unwrap();
        let third = store.insert_document("foo", doc! { "foo": "baz" }).await.unwrap();
        assert_eq!((first, second, third), (1, 2, 3));

        let scanned = store.scan_documents("foo").await.unwrap();
        let ids = scanned.iter().map(|(id, document)| (*id, document.id())).collect::<Vec<_>>();
        assert_eq!(ids, vec![(1, Some(1)), (2, Some(2)), (3, Some(3))]);
        assert_eq!(scanned[1].1, doc! { "foo": "bar", "_id": 2_i64 });
    }

    #[tokio::test]
    async fn test_in_memory_location() {
        assert_eq!(memory_store().await.location(), ":memory:");
    }

    #[tokio::test]
    async fn test_id_is_not_persisted_in_blob() {
        let store = memory_store().await;
        let id = store.insert_document("foo", doc! { "_id": 40_i64, "x": 1 }).await.unwrap();

        let conn = store.connection.lock().await;
        let blob: Vec<u8> = conn
            .query_row("select data from \"foo\" where id = ?1", params![id], |row| row.get(0))
            .unwrap();
        let stored: Document = bson::de::deserialize_from_slice(&blob).unwrap();

        assert_eq!(stored, doc! { "x": 1 });
    }

    #[tokio::test]
    async fn test_missing_collection_behaviour() {
        let store = memory_store().await;

        assert!(store.scan_documents("missing").await.unwrap().is_empty());
        assert!(!store.collection_exists("missing").await.unwrap());
        store.delete_document("missing", 1).await.unwrap();
        store.clear_collection("missing").await.unwrap();
        store.drop_collection("missing").await.unwrap();
        assert!(matches!(
            store.update_document("missing", 1, doc! {}).await,
            Err(DocumentStoreError::DocumentNotFound(_, _))
        ));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = memory_store().await;
        let id = store.insert_document("c", doc! { "n": 1 }).await.unwrap();

        store.update_document("c", id, doc! { "n": 2 }).await.unwrap();
        assert_eq!(store.scan_documents("c").await.unwrap()[0].1.get_i32("n").unwrap(), 2);

        assert!(matches!(
            store.update_document("c", id + 1, doc! { "n": 3 }).await,
            Err(DocumentStoreError::DocumentNotFound(_, _))
        ));

        store.delete_document("c", id).await.unwrap();
        store.delete_document("c", id).await.unwrap();
        assert!(store.scan_documents("c").await.unwrap().is_empty());

        let next = store.insert_document("c", doc! {}).await.unwrap();
        assert!(next > id);
    }

    #[tokio::test]
    async fn test_collection_management() {
        let store = memory_store().await;

        store.create_collection("b").await.unwrap();
        store.create_collection("b").await.unwrap();
        store.insert_document("a", doc! { "n": 1 }).await.unwrap();
        assert_eq!(store.list_collections().await.unwrap(), vec!["a", "b"]);

        assert!(matches!(
            store.rename_collection("a", "b").await,
            Err(DocumentStoreError::CollectionAlreadyExists(_))
        ));
        assert!(matches!(
            store.rename_collection("missing", "z").await,
            Err(DocumentStoreError::CollectionNotFound(_))
        ));

        store.rename_collection("a", "c").await.unwrap();
        assert_eq!(store.scan_documents("c").await.unwrap().len(), 1);
        assert!(store.collection_exists("c").await.unwrap());
        assert!(!store.collection_exists("a").await.unwrap());

        store.clear_collection("c").await.unwrap();
        assert!(store.collection_exists("c").await.unwrap());
        assert!(store.scan_documents("c").await.unwrap().is_empty());

        store.drop_collection("c").await.unwrap();
        assert_eq!(store.list_collections().await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_rejects_invalid_collection_names() {
        let store = memory_store().await;

        for name in ["", "a b", "x\"; drop table y; --", "sqlite_master"] {
            assert!(matches!(
                store.insert_document(name, doc! {}).await,
                Err(DocumentStoreError::InvalidCollectionName(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_reopen_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        let store = SqliteStore::builder(&path).build().await.unwrap();
        assert_eq!(store.location(), path.display().to_string());
        store.insert_document("users", doc! { "name": "Alice" }).await.unwrap();
        store.shutdown().await.unwrap();

        let store = SqliteStore::builder(&path)
            .read_only(true)
            .busy_timeout(Duration::from_millis(100))
            .build()
            .await
            .unwrap();
        let scanned = store.scan_documents("users").await.unwrap();
        assert_eq!(scanned, vec![(1, doc! { "name": "Alice", "_id": 1_i64 })]);

        assert!(matches!(
            store.insert_document("users", doc! { "name": "Bob" }).await,
            Err(DocumentStoreError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn test_read_only_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            SqliteStore::builder(dir.path().join("missing.db"))
                .read_only(true)
                .build()
                .await,
            Err(DocumentStoreError::Initialization(_))
        ));
    }
}
