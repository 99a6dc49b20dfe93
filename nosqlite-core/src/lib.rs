//! Schemaless document-store features on top of pluggable storage backends.
//!
//! This crate is the core of the nosqlite project and provides:
//!
//! - **Error handling** ([`error`]) - The error taxonomy and result alias
//! - **Document helpers** ([`document`]) - Identifiers and blob/JSON/typed conversions
//! - **Query model** ([`query`]) - Filters, limits and the clause visitor
//! - **Operators** ([`operator`]) - The `$`-prefixed field operators
//! - **Evaluator** ([`evaluator`]) - Matching a filter against one document
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing storage backends
//! - **Collections interface** ([`collection`]) - The document-store verbs
//! - **Document store** ([`store`]) - Entry point owning a backend
//!
//! # Example
//!
//! ```ignore
//! use nosqlite_core::evaluator::evaluate;
//! use bson::doc;
//!
//! let query = doc! { "age": { "$gte": 21 }, "$or": [ { "role": "admin" }, { "role": "ops" } ] };
//! let document = doc! { "age": 30, "role": "ops" };
//!
//! assert!(evaluate(&query, &document)?);
//! ```

#[allow(unused_extern_crates)]
extern crate self as nosqlite_core;

pub mod backend;
pub mod collection;
pub mod document;
pub mod error;
pub mod evaluator;
pub mod operator;
pub mod query;
pub mod store;
