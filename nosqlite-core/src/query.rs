//! Query construction and the clause model used to evaluate filters.
//!
//! A filter is an ordinary [`bson::Document`] written in the familiar NoSQL style:
//!
//! ```ignore
//! use bson::doc;
//!
//! let filter = doc! {
//!     "status": "active",
//!     "age": { "$gte": 21, "$lt": 65 },
//!     "$or": [ { "role": "admin" }, { "tags": { "$all": ["ops"] } } ],
//! };
//! ```
//!
//! Each top-level entry of a filter is a [`Clause`]. Clauses are classified lazily,
//! one entry at a time, while a document is being evaluated: a malformed entry is
//! only reported when the evaluator reaches it.
//!
//! # Filter Helper API
//!
//! The [`Filter`] struct builds filter documents programmatically:
//!
//! - Comparison: `eq`, `ne`, `gt`, `gte`, `lt`, `lte`
//! - Membership: `is_in`, `not_in`, `all`
//! - Arithmetic: `modulo`
//! - Existence: `exists`, `not_exists`
//! - Logical: `and`, `or`, `nor`, `not`

use bson::{Bson, Document, doc};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Logical conjunction keyword.
pub const AND: &str = "$and";
/// Logical disjunction keyword.
pub const OR: &str = "$or";
/// Logical "neither" keyword.
pub const NOR: &str = "$nor";
/// Logical negation keyword.
pub const NOT: &str = "$not";

/// A filter plus the options that shape a `find`.
///
/// A bare [`Document`] converts into a `Query` without a limit, so collection
/// methods accept either.
///
/// # Example
///
/// ```ignore
/// use nosqlite::query::Query;
/// use bson::doc;
///
/// let query = Query::builder()
///     .filter(doc! { "foo": "bar" })
///     .limit(1)
///     .build();
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// The filter every returned document must match. Empty matches everything.
    pub filter: Document,
    /// Maximum number of documents to return. `None` and `Some(0)` are unbounded.
    pub limit: Option<usize>,
}

impl Query {
    /// Creates a query matching every document.
    pub fn new() -> Self {
        Query {
            filter: Document::new(),
            limit: None,
        }
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Returns the effective limit, treating zero as unbounded.
    pub fn effective_limit(&self) -> Option<usize> {
        self.limit.filter(|limit| *limit > 0)
    }
}

impl From<Document> for Query {
    fn from(filter: Document) -> Self {
        Query { filter, limit: None }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Sets the filter document for this query.
    pub fn filter(mut self, filter: Document) -> Self {
        self.query.filter = filter;
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> Query {
        self.query
    }
}

/// Helper struct for constructing filter documents.
///
/// Every method returns a [`Document`] that can be used directly as a filter or
/// nested inside the logical helpers.
///
/// ```ignore
/// use nosqlite::query::Filter;
///
/// let filter = Filter::and([
///     Filter::eq("status", "active"),
///     Filter::gt("age", 18),
/// ]);
/// ```
pub struct Filter;

impl Filter {
    /// Matches documents where the field equals the value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        Self::operator(field, "$eq", value)
    }

    /// Matches documents where the field does not equal the value.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        Self::operator(field, "$ne", value)
    }

    /// Matches documents where the field is greater than the value.
    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        Self::operator(field, "$gt", value)
    }

    /// Matches documents where the field is greater than or equal to the value.
    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        Self::operator(field, "$gte", value)
    }

    /// Matches documents where the field is less than the value.
    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        Self::operator(field, "$lt", value)
    }

    /// Matches documents where the field is less than or equal to the value.
    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        Self::operator(field, "$lte", value)
    }

    /// Matches documents where the field equals one of the values.
    pub fn is_in<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Document {
        Self::operator(field, "$in", Self::array(values))
    }

    /// Matches documents where the field equals none of the values.
    pub fn not_in<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Document {
        Self::operator(field, "$nin", Self::array(values))
    }

    /// Matches documents whose array field contains every one of the values.
    pub fn all<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Document {
        Self::operator(field, "$all", Self::array(values))
    }

    /// Matches documents where `field % divisor == remainder`.
    pub fn modulo(field: impl Into<String>, divisor: i64, remainder: i64) -> Document {
        Self::operator(field, "$mod", vec![Bson::Int64(divisor), Bson::Int64(remainder)])
    }

    /// Matches documents that contain the field.
    pub fn exists(field: impl Into<String>) -> Document {
        Self::operator(field, "$exists", true)
    }

    /// Matches documents that do not contain the field.
    pub fn not_exists(field: impl Into<String>) -> Document {
        Self::operator(field, "$exists", false)
    }

    /// Combines filters so that all must match.
    pub fn and(filters: impl IntoIterator<Item = Document>) -> Document {
        doc! { AND: Self::sub_queries(filters) }
    }

    /// Combines filters so that at least one must match.
    pub fn or(filters: impl IntoIterator<Item = Document>) -> Document {
        doc! { OR: Self::sub_queries(filters) }
    }

    /// Combines filters so that none may match.
    pub fn nor(filters: impl IntoIterator<Item = Document>) -> Document {
        doc! { NOR: Self::sub_queries(filters) }
    }

    /// Negates a filter.
    pub fn not(filter: Document) -> Document {
        doc! { NOT: filter }
    }

    fn operator(field: impl Into<String>, operator: &str, value: impl Into<Bson>) -> Document {
        let field: String = field.into();
        let value: Bson = value.into();

        doc! { field: { operator: value } }
    }

    fn array<V: Into<Bson>>(values: impl IntoIterator<Item = V>) -> Bson {
        Bson::Array(values.into_iter().map(Into::into).collect())
    }

    fn sub_queries(filters: impl IntoIterator<Item = Document>) -> Bson {
        Bson::Array(filters.into_iter().map(Bson::Document).collect())
    }
}

/// One top-level entry of a filter, classified by its key and value.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause<'q> {
    /// `$and`: every sub-query must match.
    And(Vec<&'q Document>),
    /// `$or`: at least one sub-query must match.
    Or(Vec<&'q Document>),
    /// `$nor`: no sub-query may match.
    Nor(Vec<&'q Document>),
    /// `$not`: the sub-query must not match.
    Not(&'q Document),
    /// A field compared through an operator mapping such as `{"$gt": 1, "$lt": 5}`.
    Operators {
        /// The field name the operators apply to.
        field: &'q str,
        /// The operator mapping, evaluated in key order.
        operators: &'q Document,
    },
    /// A field compared for equality against a literal, with dotted-path fallback.
    Equals {
        /// The field name or dotted path.
        field: &'q str,
        /// The literal value.
        value: &'q Bson,
    },
}

impl<'q> Clause<'q> {
    /// Classifies a single filter entry.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::MalformedQuery`] if a logical keyword carries an
    ///   argument of the wrong shape.
    /// - [`DocumentStoreError::UnknownOperator`] for any other `$`-prefixed key.
    pub fn parse(key: &'q str, value: &'q Bson) -> DocumentStoreResult<Self> {
        match key {
            AND => Ok(Clause::And(sub_queries(AND, value)?)),
            OR => Ok(Clause::Or(sub_queries(OR, value)?)),
            NOR => Ok(Clause::Nor(sub_queries(NOR, value)?)),
            NOT => match value {
                Bson::Document(query) => Ok(Clause::Not(query)),
                _ => Err(DocumentStoreError::malformed(NOT, "a query document")),
            },
            _ if key.starts_with('$') => Err(DocumentStoreError::UnknownOperator(key.to_string())),
            _ => match value {
                Bson::Document(operators) => Ok(Clause::Operators { field: key, operators }),
                _ => Ok(Clause::Equals { field: key, value }),
            },
        }
    }
}

fn sub_queries<'q>(keyword: &str, value: &'q Bson) -> DocumentStoreResult<Vec<&'q Document>> {
    let malformed = || DocumentStoreError::malformed(keyword, "an array of query documents");

    match value {
        Bson::Array(items) => items
            .iter()
            .map(|item| item.as_document().ok_or_else(malformed))
            .collect(),
        _ => Err(malformed()),
    }
}

/// Walks a filter clause by clause.
///
/// Implementors decide how clause results combine in [`QueryVisitor::visit_query`];
/// [`QueryVisitor::visit_clause`] dispatches a classified clause to the matching
/// `visit_*` method.
pub trait QueryVisitor {
    type Output;
    type Error: From<DocumentStoreError>;

    fn visit_query(&mut self, query: &Document) -> Result<Self::Output, Self::Error>;
    fn visit_and(&mut self, queries: &[&Document]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, queries: &[&Document]) -> Result<Self::Output, Self::Error>;
    fn visit_nor(&mut self, queries: &[&Document]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, query: &Document) -> Result<Self::Output, Self::Error>;
    fn visit_operators(
        &mut self,
        field: &str,
        operators: &Document,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_equals(&mut self, field: &str, value: &Bson) -> Result<Self::Output, Self::Error>;

    fn visit_entry(&mut self, key: &str, value: &Bson) -> Result<Self::Output, Self::Error> {
        let clause = Clause::parse(key, value)?;
        self.visit_clause(&clause)
    }

    fn visit_clause(&mut self, clause: &Clause<'_>) -> Result<Self::Output, Self::Error> {
        match clause {
            Clause::And(queries) => self.visit_and(queries),
            Clause::Or(queries) => self.visit_or(queries),
            Clause::Nor(queries) => self.visit_nor(queries),
            Clause::Not(query) => self.visit_not(query),
            Clause::Operators { field, operators } => self.visit_operators(field, operators),
            Clause::Equals { field, value } => self.visit_equals(field, value),
        }
    }
}
