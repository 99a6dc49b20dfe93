//! SQLite backend implementation for nosqlite.
//!
//! This crate provides a `rusqlite`-based implementation of the `StoreBackend` trait.
//! Each collection is one table holding BSON-encoded document bodies keyed by an
//! auto-incrementing integer id; all querying happens in memory after a full scan.
//!
//! It is enabled in the facade crate by the `sqlite` feature, which is on by default:
//!
//! ```toml
//! [dependencies]
//! nosqlite = { version = "x.y.z" }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use nosqlite::{backend::StoreBackendBuilder, sqlite::SqliteStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SqliteStore::builder("app.db")
//!         .busy_timeout(std::time::Duration::from_secs(2))
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as nosqlite_sqlite;

mod sanitizer;
pub mod store;

pub use store::{DEFAULT_BUSY_TIMEOUT, SqliteStore, SqliteStoreBuilder};
