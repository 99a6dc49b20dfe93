//! Convenient re-exports of commonly used types from nosqlite.
//!
//! ```ignore
//! use nosqlite::prelude::*;
//! ```

pub use nosqlite_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    collection::Collection,
    document::{DocumentExt, DocumentId, ID_FIELD},
    error::{DocumentStoreError, DocumentStoreResult},
    evaluator::{DocumentEvaluator, evaluate},
    operator::Operator,
    query::{Filter, Query, QueryBuilder, QueryVisitor},
    store::DocumentStore,
};
