//! In-memory document storage backend for nosqlite.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is ideal for development,
//! testing, and short-lived data.
//!
//! # Quick Start
//!
//! ```ignore
//! use nosqlite::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!     let users = store.collection("users");
//!
//!     users.insert(doc! { "name": "Alice" }).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as nosqlite_memory;

pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
