//! The operator registry.
//!
//! Every field operator is a plain function `(field, argument, document) -> Result<bool>`
//! registered under its `$`-prefixed name. Operators raise
//! [`DocumentStoreError::MalformedQuery`] when *their argument* has the wrong shape
//! and quietly return `false` when *the document* does not cooperate (a string where
//! a number was expected, a scalar where an array was expected, ...).

use std::{cmp::Ordering, fmt, str::FromStr};

use bson::{Bson, Document};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    evaluator::{Comparable, field_value},
};

/// Prefix shared by every operator name.
pub const SIGIL: char = '$';

/// Signature shared by all registered operators.
pub type Predicate = fn(&str, &Bson, &Document) -> DocumentStoreResult<bool>;

/// Field operators understood inside an operator mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `$eq`: equal to.
    Eq,
    /// `$ne`: not equal to.
    Ne,
    /// `$gt`: greater than.
    Gt,
    /// `$gte`: greater than or equal to.
    Gte,
    /// `$lt`: less than.
    Lt,
    /// `$lte`: less than or equal to.
    Lte,
    /// `$in`: equal to one of the values of an array.
    In,
    /// `$nin`: equal to none of the values of an array.
    Nin,
    /// `$all`: an array field containing every value of an array.
    All,
    /// `$mod`: `[divisor, remainder]` modulo test.
    Mod,
    /// `$exists`: key presence test.
    Exists,
}

impl Operator {
    /// Every registered operator.
    pub const ALL: [Operator; 11] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::In,
        Operator::Nin,
        Operator::All,
        Operator::Mod,
        Operator::Exists,
    ];

    /// Looks an operator up by name.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnknownOperator`] if `name` does not start with `$`
    /// or is not registered.
    pub fn resolve(name: &str) -> DocumentStoreResult<Self> {
        let operator = match name {
            "$eq" => Operator::Eq,
            "$ne" => Operator::Ne,
            "$gt" => Operator::Gt,
            "$gte" => Operator::Gte,
            "$lt" => Operator::Lt,
            "$lte" => Operator::Lte,
            "$in" => Operator::In,
            "$nin" => Operator::Nin,
            "$all" => Operator::All,
            "$mod" => Operator::Mod,
            "$exists" => Operator::Exists,
            _ => return Err(DocumentStoreError::UnknownOperator(name.to_string())),
        };

        Ok(operator)
    }

    /// The operator's name, including the sigil.
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Eq => "$eq",
            Operator::Ne => "$ne",
            Operator::Gt => "$gt",
            Operator::Gte => "$gte",
            Operator::Lt => "$lt",
            Operator::Lte => "$lte",
            Operator::In => "$in",
            Operator::Nin => "$nin",
            Operator::All => "$all",
            Operator::Mod => "$mod",
            Operator::Exists => "$exists",
        }
    }

    /// The predicate registered for this operator.
    pub fn predicate(&self) -> Predicate {
        match self {
            Operator::Eq => eq,
            Operator::Ne => ne,
            Operator::Gt => gt,
            Operator::Gte => gte,
            Operator::Lt => lt,
            Operator::Lte => lte,
            Operator::In => is_in,
            Operator::Nin => not_in,
            Operator::All => all,
            Operator::Mod => modulo,
            Operator::Exists => exists,
        }
    }

    /// Applies the operator to `field` of `document`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::MalformedQuery`] if `argument` has the wrong shape.
    pub fn apply(&self, field: &str, argument: &Bson, document: &Document) -> DocumentStoreResult<bool> {
        (self.predicate())(field, argument, document)
    }
}

impl FromStr for Operator {
    type Err = DocumentStoreError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Operator::resolve(name)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn eq(field: &str, argument: &Bson, document: &Document) -> DocumentStoreResult<bool> {
    Ok(field_value(document, field) == Comparable::from(argument))
}

fn ne(field: &str, argument: &Bson, document: &Document) -> DocumentStoreResult<bool> {
    Ok(field_value(document, field) != Comparable::from(argument))
}

fn gt(field: &str, argument: &Bson, document: &Document) -> DocumentStoreResult<bool> {
    Ok(compare(field, argument, document) == Some(Ordering::Greater))
}

fn gte(field: &str, argument: &Bson, document: &Document) -> DocumentStoreResult<bool> {
    Ok(matches!(
        compare(field, argument, document),
        Some(Ordering::Greater | Ordering::Equal)
    ))
}

fn lt(field: &str, argument: &Bson, document: &Document) -> DocumentStoreResult<bool> {
    Ok(compare(field, argument, document) == Some(Ordering::Less))
}

fn lte(field: &str, argument: &Bson, document: &Document) -> DocumentStoreResult<bool> {
    Ok(matches!(
        compare(field, argument, document),
        Some(Ordering::Less | Ordering::Equal)
    ))
}

fn is_in(field: &str, argument: &Bson, document: &Document) -> DocumentStoreResult<bool> {
    let values = array_argument(Operator::In, argument)?;
    let value = field_value(document, field);

    Ok(values.iter().any(|candidate| Comparable::from(candidate) == value))
}

fn not_in(field: &str, argument: &Bson, document: &Document) -> DocumentStoreResult<bool> {
    let values = array_argument(Operator::Nin, argument)?;
    let value = field_value(document, field);

    Ok(!values.iter().any(|candidate| Comparable::from(candidate) == value))
}

fn all(field: &str, argument: &Bson, document: &Document) -> DocumentStoreResult<bool> {
    let required = array_argument(Operator::All, argument)?;

    let Some(Bson::Array(values)) = document.get(field) else {
        return Ok(false);
    };
    let present = values.iter().map(Comparable::from).collect::<Vec<_>>();

    Ok(required.iter().all(|item| {
        let item = Comparable::from(item);
        present.iter().any(|value| *value == item)
    }))
}

fn modulo(field: &str, argument: &Bson, document: &Document) -> DocumentStoreResult<bool> {
    let (divisor, remainder) = mod_argument(argument)?;

    match document.get(field).and_then(as_integer) {
        Some(value) => Ok(floor_mod(value, divisor) == remainder),
        None => Ok(false),
    }
}

fn exists(field: &str, argument: &Bson, document: &Document) -> DocumentStoreResult<bool> {
    match argument {
        Bson::Boolean(should_exist) => Ok(document.contains_key(field) == *should_exist),
        _ => Err(DocumentStoreError::malformed(Operator::Exists.name(), "a boolean")),
    }
}

fn compare(field: &str, argument: &Bson, document: &Document) -> Option<Ordering> {
    field_value(document, field).partial_cmp(&Comparable::from(argument))
}

fn array_argument(operator: Operator, argument: &Bson) -> DocumentStoreResult<&[Bson]> {
    match argument {
        Bson::Array(values) => Ok(values),
        _ => Err(DocumentStoreError::malformed(operator.name(), "an array of values")),
    }
}

fn mod_argument(argument: &Bson) -> DocumentStoreResult<(i64, i64)> {
    let malformed = || {
        DocumentStoreError::malformed(
            Operator::Mod.name(),
            "an array of two integers [divisor, remainder] with a non-zero divisor",
        )
    };

    let Bson::Array(values) = argument else {
        return Err(malformed());
    };

    match values.as_slice() {
        [divisor, remainder] => match (as_integer(divisor), as_integer(remainder)) {
            (Some(divisor), Some(remainder)) if divisor != 0 => Ok((divisor, remainder)),
            _ => Err(malformed()),
        },
        _ => Err(malformed()),
    }
}

/// Integer view of a numeric value; doubles are truncated toward zero.
fn as_integer(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(value) => Some(i64::from(*value)),
        Bson::Int64(value) => Some(*value),
        Bson::Double(value) if value.is_finite() && value.abs() < i64::MAX as f64 => {
            Some(value.trunc() as i64)
        }
        _ => None,
    }
}

/// Modulo whose result takes the sign of the divisor.
fn floor_mod(value: i64, divisor: i64) -> i64 {
    let remainder = value.checked_rem(divisor).unwrap_or(0);

    if remainder != 0 && (remainder < 0) != (divisor < 0) {
        remainder + divisor
    } else {
        remainder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn apply(name: &str, argument: Bson, document: &Document) -> DocumentStoreResult<bool> {
        Operator::resolve(name)?.apply("a", &argument, document)
    }

    #[test]
    fn test_resolve_known_operators() {
        for operator in Operator::ALL {
            assert_eq!(Operator::resolve(operator.name()).unwrap(), operator);
            assert_eq!(operator.to_string().parse::<Operator>().unwrap(), operator);
        }
    }

    #[test]
    fn test_resolve_rejects_unknown_names() {
        for name in ["foo", "$foo", "in", "", "$"] {
            assert!(matches!(
                Operator::resolve(name),
                Err(DocumentStoreError::UnknownOperator(op)) if op == name
            ));
        }
    }

    #[test]
    fn test_equality_operators() {
        let document = doc! { "a": 5 };

        assert!(apply("$eq", 5.into(), &document).unwrap());
        assert!(apply("$eq", 5.0.into(), &document).unwrap());
        assert!(!apply("$eq", 4.into(), &document).unwrap());
        assert!(!apply("$eq", "bar".into(), &document).unwrap());

        assert!(apply("$ne", 1.into(), &document).unwrap());
        assert!(apply("$ne", "bar".into(), &document).unwrap());
        assert!(!apply("$ne", 5.into(), &document).unwrap());
    }

    #[test]
    fn test_ordering_operators() {
        let document = doc! { "a": 5 };

        assert!(apply("$gt", 4.into(), &document).unwrap());
        assert!(!apply("$gt", 5.into(), &document).unwrap());
        assert!(apply("$gte", 5.into(), &document).unwrap());
        assert!(apply("$lt", 10.into(), &document).unwrap());
        assert!(!apply("$lt", 5.into(), &document).unwrap());
        assert!(apply("$lte", 5.5.into(), &document).unwrap());
    }

    #[test]
    fn test_ordering_degrades_to_false_for_incomparable_values() {
        let document = doc! { "a": "foo", "b": { "c": 1 } };

        assert!(!apply("$gt", 5.into(), &document).unwrap());
        assert!(!apply("$lte", 5.into(), &document).unwrap());
        assert!(!apply("$lt", 5.into(), &doc! {}).unwrap());
        assert!(!Operator::Gt.apply("b", &doc! { "c": 0 }.into(), &document).unwrap());
    }

    #[test]
    fn test_null_and_documents_are_never_ordered() {
        for document in [doc! {}, doc! { "a": Bson::Null }] {
            assert!(apply("$eq", Bson::Null, &document).unwrap());
            assert!(!apply("$gte", Bson::Null, &document).unwrap());
            assert!(!apply("$lte", Bson::Null, &document).unwrap());
        }

        let document = doc! { "a": { "x": 1 } };
        let argument = Bson::Document(doc! { "x": 1 });

        assert!(apply("$eq", argument.clone(), &document).unwrap());
        assert!(!apply("$gte", argument.clone(), &document).unwrap());
        assert!(!apply("$lte", argument, &document).unwrap());
    }

    #[test]
    fn test_in_and_nin() {
        let values = Bson::Array(vec![1.into(), 2.into(), 3.into()]);

        assert!(apply("$in", values.clone(), &doc! { "a": 1 }).unwrap());
        assert!(!apply("$in", values.clone(), &doc! { "a": 4 }).unwrap());
        assert!(!apply("$in", values.clone(), &doc! { "a": "bar" }).unwrap());

        assert!(apply("$nin", values.clone(), &doc! { "a": 4 }).unwrap());
        assert!(apply("$nin", values.clone(), &doc! { "a": "bar" }).unwrap());
        assert!(!apply("$nin", values, &doc! { "a": 1 }).unwrap());
    }

    #[test]
    fn test_in_and_nin_require_an_array() {
        for name in ["$in", "$nin"] {
            let err = apply(name, 5.into(), &doc! { "a": 1 }).unwrap_err();
            assert!(matches!(
                err,
                DocumentStoreError::MalformedQuery { ref operator, .. } if operator == name
            ));
        }
    }

    #[test]
    fn test_all() {
        let required = Bson::Array(vec![1.into(), 2.into(), 3.into()]);
        let values: Vec<i32> = (0..10).collect();
        let range = doc! { "a": values };

        assert!(apply("$all", required.clone(), &range).unwrap());
        assert!(!apply("$all", required.clone(), &doc! { "a": ["bar", "baz"] }).unwrap());
        assert!(!apply("$all", required.clone(), &doc! { "a": 3 }).unwrap());
        assert!(!apply("$all", required, &doc! {}).unwrap());
    }

    #[test]
    fn test_all_requires_an_array_argument_before_looking_at_the_document() {
        assert!(matches!(
            apply("$all", 3.into(), &doc! { "a": "bar" }),
            Err(DocumentStoreError::MalformedQuery { .. })
        ));
    }

    #[test]
    fn test_mod() {
        let even = Bson::Array(vec![2.into(), 0.into()]);

        assert!(apply("$mod", even.clone(), &doc! { "a": 4 }).unwrap());
        assert!(apply("$mod", even.clone(), &doc! { "a": 4.9 }).unwrap());
        assert!(!apply("$mod", even.clone(), &doc! { "a": 3 }).unwrap());
        assert!(!apply("$mod", even.clone(), &doc! { "a": "bar" }).unwrap());
        assert!(!apply("$mod", even.clone(), &doc! { "a": true }).unwrap());
        assert!(!apply("$mod", even.clone(), &doc! { "a": "8" }).unwrap());
        assert!(!apply("$mod", even, &doc! {}).unwrap());
    }

    #[test]
    fn test_mod_follows_the_sign_of_the_divisor() {
        assert_eq!(floor_mod(-7, 4), 1);
        assert_eq!(floor_mod(7, -4), -1);
        assert_eq!(floor_mod(7, 4), 3);
        assert_eq!(floor_mod(i64::MIN, -1), 0);

        let odd = Bson::Array(vec![2.into(), 1.into()]);
        assert!(apply("$mod", odd, &doc! { "a": -3 }).unwrap());
    }

    #[test]
    fn test_mod_rejects_malformed_arguments() {
        let arguments: Vec<Bson> = vec![
            2.into(),
            Bson::Array(vec![2.into()]),
            Bson::Array(vec![2.into(), 0.into(), 1.into()]),
            Bson::Array(vec!["2".into(), 0.into()]),
            Bson::Array(vec![0.into(), 0.into()]),
        ];

        for argument in arguments {
            assert!(matches!(
                apply("$mod", argument, &doc! { "a": 5 }),
                Err(DocumentStoreError::MalformedQuery { .. })
            ));
        }
    }

    #[test]
    fn test_exists() {
        assert!(apply("$exists", true.into(), &doc! { "a": "bar" }).unwrap());
        assert!(apply("$exists", true.into(), &doc! { "a": Bson::Null }).unwrap());
        assert!(!apply("$exists", true.into(), &doc! { "b": "bar" }).unwrap());
        assert!(apply("$exists", false.into(), &doc! { "b": "baz" }).unwrap());
        assert!(!apply("$exists", false.into(), &doc! { "a": "bar" }).unwrap());
    }

    #[test]
    fn test_exists_requires_a_boolean() {
        for argument in [Bson::from("foo"), Bson::from(1), Bson::Null] {
            assert!(matches!(
                apply("$exists", argument, &doc! {}),
                Err(DocumentStoreError::MalformedQuery { .. })
            ));
        }
    }
}
