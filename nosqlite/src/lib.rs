//! Schemaless document-store features on top of SQLite.
//!
//! This crate is the primary entry point for users of nosqlite. It re-exports the core
//! types and functionality from the sub-crates and provides access to the storage
//! backends.
//!
//! Documents are plain [`bson::Document`] values. Filters are documents too, written in
//! the familiar NoSQL style, and are matched in memory against a full scan of the
//! collection.
//!
//! # Quick Start
//!
//! ```ignore
//! use nosqlite::prelude::*;
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = nosqlite::connect("app.db").await?;
//!     let users = store.collection("users");
//!
//!     users.insert(doc! { "name": "Alice", "age": 30, "tags": ["admin"] }).await?;
//!     users.insert(doc! { "name": "Bob", "age": 17 }).await?;
//!
//!     let adults = users
//!         .find(doc! {
//!             "age": { "$gte": 18 },
//!             "$or": [ { "tags": { "$all": ["admin"] } }, { "name": "Carol" } ],
//!         })
//!         .await?;
//!     println!("{adults:?}");
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-process storage for development and testing
//! - [`sqlite`] - Persistent SQLite storage (requires the `sqlite` feature, on by default)

pub mod prelude;

pub use nosqlite_core::{backend, collection, document, error, evaluator, operator, query, store};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use nosqlite_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// SQLite storage backend implementations.
///
/// This module is only available when the `sqlite` feature is enabled.
#[cfg(feature = "sqlite")]
pub mod sqlite {
    pub use nosqlite_sqlite::{DEFAULT_BUSY_TIMEOUT, SqliteStore, SqliteStoreBuilder};
}

/// Opens (or creates) the SQLite database at `path` with default options.
///
/// # Errors
///
/// Returns [`DocumentStoreError::Initialization`](error::DocumentStoreError::Initialization)
/// if the database cannot be opened.
#[cfg(feature = "sqlite")]
pub async fn connect(
    path: impl Into<std::path::PathBuf>,
) -> error::DocumentStoreResult<store::DocumentStore<sqlite::SqliteStore>> {
    use crate::backend::StoreBackendBuilder;

    let backend = sqlite::SqliteStore::builder(path).build().await?;

    Ok(store::DocumentStore::new(backend))
}
