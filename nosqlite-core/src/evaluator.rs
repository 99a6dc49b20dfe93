//! Query evaluation against in-memory documents.
//!
//! [`DocumentEvaluator`] walks a filter document clause by clause and decides whether
//! a single document matches. Evaluation is a pure function of the filter and the
//! document: no state survives between documents and nothing is written anywhere.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, DateTime, Document};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    operator::Operator,
    query::QueryVisitor,
};

/// Separator between the segments of a dotted path.
pub const PATH_SEPARATOR: char = '.';

/// Type-erased, comparable representation of BSON values.
///
/// Integers compare exactly with each other and with doubles. Documents
/// compare by content regardless of key order. Values of different kinds are never
/// equal and never ordered.
#[derive(Debug, Clone)]
pub enum Comparable<'a> {
    /// Null, also used for absent fields
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Any other BSON value; equal only to an identical value
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Int(i64::from(*value)),
            Bson::Int64(value) => Comparable::Int(*value),
            Bson::Double(value) => Comparable::Float(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            other => Comparable::Other(other),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Int(a), Comparable::Int(b)) => a == b,
            (Comparable::Float(a), Comparable::Float(b)) => a == b,
            (Comparable::Int(a), Comparable::Float(b)) => cmp_int_float(*a, *b) == Some(Ordering::Equal),
            (Comparable::Float(a), Comparable::Int(b)) => cmp_int_float(*b, *a) == Some(Ordering::Equal),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

/// Only booleans, numbers, datetimes, strings and arrays are ordered. Null and
/// documents are never ordered, not even against an equal value.
impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Int(a), Comparable::Int(b)) => a.partial_cmp(b),
            (Comparable::Float(a), Comparable::Float(b)) => a.partial_cmp(b),
            (Comparable::Int(a), Comparable::Float(b)) => cmp_int_float(*a, *b),
            (Comparable::Float(a), Comparable::Int(b)) => cmp_int_float(*b, *a).map(Ordering::reverse),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::Array(a), Comparable::Array(b)) => {
                for (left, right) in a.iter().zip(b) {
                    if left == right {
                        continue;
                    }
                    return left.partial_cmp(right);
                }
                Some(a.len().cmp(&b.len()))
            },
            _ => None,
        }
    }
}

/// Compares an integer with a double without rounding the integer.
fn cmp_int_float(int: i64, float: f64) -> Option<Ordering> {
    // 2^63, the first double past i64::MAX
    const BOUND: f64 = 9_223_372_036_854_775_808.0;

    if float.is_nan() {
        return None;
    }
    if float >= BOUND {
        return Some(Ordering::Less);
    }
    if float < -BOUND {
        return Some(Ordering::Greater);
    }

    let whole = float.trunc();
    match int.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0_f64.partial_cmp(&(float - whole)),
        ordering => Some(ordering),
    }
}

/// Looks up a top-level field, treating an absent field as null.
pub fn field_value<'a>(document: &'a Document, field: &str) -> Comparable<'a> {
    document
        .get(field)
        .map(Comparable::from)
        .unwrap_or(Comparable::Null)
}

/// Resolves every segment of a dotted path but the last.
///
/// Returns the document holding the final segment together with that segment, or
/// `None` when an intermediate segment is missing or is not a document.
pub fn resolve_parent<'a, 'p>(document: &'a Document, path: &'p str) -> Option<(&'a Document, &'p str)> {
    let Some((parents, last)) = path.rsplit_once(PATH_SEPARATOR) else {
        return Some((document, path));
    };

    let mut current = document;
    for segment in parents.split(PATH_SEPARATOR) {
        current = current.get(segment)?.as_document()?;
    }

    Some((current, last))
}

/// Evaluates `query` against `document`.
///
/// # Errors
///
/// Returns [`DocumentStoreError::UnknownOperator`] or
/// [`DocumentStoreError::MalformedQuery`] if the evaluator reaches a structurally
/// invalid part of the query.
pub fn evaluate(query: &Document, document: &Document) -> DocumentStoreResult<bool> {
    DocumentEvaluator::new(document).evaluate(query)
}

/// Decides whether one document matches a filter.
#[derive(Debug, Clone, Copy)]
pub struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, query: &Document) -> DocumentStoreResult<bool> {
        self.visit_query(query)
    }

    /// Keeps the documents matching `query`, in input order.
    ///
    /// Stops as soon as `limit` documents matched (`None` or `Some(0)` is unbounded).
    /// The first evaluation error aborts the whole pass.
    pub fn filter_documents(
        documents: impl IntoIterator<Item = Document>,
        query: &Document,
        limit: Option<usize>,
    ) -> DocumentStoreResult<Vec<Document>> {
        let limit = limit.filter(|limit| *limit > 0).unwrap_or(usize::MAX);
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(&document).evaluate(query)? {
                matched.push(document);

                if matched.len() >= limit {
                    break;
                }
            }
        }

        Ok(matched)
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_query(&mut self, query: &Document) -> Result<Self::Output, Self::Error> {
        for (key, value) in query {
            if !self.visit_entry(key, value)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_and(&mut self, queries: &[&Document]) -> Result<Self::Output, Self::Error> {
        for query in queries {
            if !self.visit_query(query)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, queries: &[&Document]) -> Result<Self::Output, Self::Error> {
        for query in queries {
            if self.visit_query(query)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_nor(&mut self, queries: &[&Document]) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_or(queries)?)
    }

    fn visit_not(&mut self, query: &Document) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_query(query)?)
    }

    fn visit_operators(
        &mut self,
        field: &str,
        operators: &Document,
    ) -> Result<Self::Output, Self::Error> {
        for (name, argument) in operators {
            if !Operator::resolve(name)?.apply(field, argument, self.document)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_equals(&mut self, field: &str, value: &Bson) -> Result<Self::Output, Self::Error> {
        let expected = Comparable::from(value);

        if field_value(self.document, field) == expected {
            return Ok(true);
        }

        if !field.contains(PATH_SEPARATOR) {
            return Ok(false);
        }

        Ok(
            resolve_parent(self.document, field)
                .is_some_and(|(parent, key)| field_value(parent, key) == expected)
        )
    }
}
