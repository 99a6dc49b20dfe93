//! Collection names as SQLite table names.
//!
//! Every collection maps to a table of the same name. Table names cannot be bound as
//! statement parameters, so they are validated and quoted before being spliced into
//! SQL text.

use nosqlite_core::{collection::validate_name, error::DocumentStoreResult};

/// Quotes collection names used as table names.
///
/// Only names accepted by [`validate_name`] are quoted, which keeps quotes and other
/// SQL syntax out of the identifier.
pub(crate) struct NameSanitizer;

impl NameSanitizer {
    /// Validates `name` and returns it as a quoted SQL identifier.
    pub(crate) fn quote(name: &str) -> DocumentStoreResult<String> {
        validate_name(name)?;

        Ok(format!("\"{name}\""))
    }
}
