//! Predicate evaluation for in-memory document filtering.
//!
//! Field paths are dotted (`"details.currency"`) and resolve through nested maps.
//! A document lacking the field never matches a predicate on it, whatever the operator.

use bson::{Bson, Document, datetime::DateTime};
use std::{cmp::Ordering, collections::HashMap};

use docgate_core::{
    error::{GatewayError, GatewayResult},
    query::{FieldOp, Predicate, QueryVisitor},
};

/// Type-erased, comparable representation of BSON values.
///
/// Integers and floats are normalized to `f64` so that `1` and `1.0` compare equal.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Types without an ordering here (ObjectId, Binary, Decimal128, ...); equal only to
    /// the identical BSON value.
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
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

impl<'a> Comparable<'a> {
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Bool(_) => 1,
            Comparable::Number(_) => 2,
            Comparable::DateTime(_) => 3,
            Comparable::String(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::Map(_) => 6,
            Comparable::Other(_) => 7,
        }
    }

    fn is_null(&self) -> bool {
        matches!(self, Comparable::Null)
    }

    /// Ordering used for sorting: values of different types order by type
    /// (null, booleans, numbers, timestamps, strings, arrays, maps, everything else).
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        match self.rank().cmp(&other.rank()) {
            Ordering::Equal => self
                .partial_cmp(other)
                .unwrap_or(Ordering::Equal),
            unequal => unequal,
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a dotted field path inside a document.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

fn list_operand<'a>(op: &FieldOp, value: &'a Bson) -> GatewayResult<Vec<Comparable<'a>>> {
    match value {
        Bson::Array(values) => Ok(values.iter().map(Comparable::from).collect()),
        _ => Err(GatewayError::InvalidQuery(format!("operator {op} requires an array operand"))),
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, predicates: &[Predicate]) -> GatewayResult<bool> {
        self.visit_all(predicates)
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = GatewayError;

    fn visit_all(&mut self, predicates: &[Predicate]) -> Result<Self::Output, Self::Error> {
        for predicate in predicates {
            if !self.visit_predicate(&predicate.field, &predicate.op, &predicate.value)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_predicate(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let Some(field_value) = lookup(self.document, field) else {
            return Ok(false);
        };

        let left = Comparable::from(field_value);

        match op {
            FieldOp::Eq => Ok(left == Comparable::from(value)),
            FieldOp::Ne => Ok(!left.is_null() && left != Comparable::from(value)),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                Ok(match left.partial_cmp(&Comparable::from(value)) {
                    Some(ordering) => match op {
                        FieldOp::Gt => ordering == Ordering::Greater,
                        FieldOp::Gte => ordering != Ordering::Less,
                        FieldOp::Lt => ordering == Ordering::Less,
                        _ => ordering != Ordering::Greater,
                    },
                    None => false,
                })
            }
            FieldOp::ArrayContains => match left {
                Comparable::Array(items) => {
                    let needle = Comparable::from(value);
                    Ok(items.iter().any(|item| item == &needle))
                }
                _ => Ok(false),
            },
            FieldOp::ArrayContainsAny => {
                let candidates = list_operand(op, value)?;

                match left {
                    Comparable::Array(items) => Ok(
                        items
                            .iter()
                            .any(|item| candidates.contains(item))
                    ),
                    _ => Ok(false),
                }
            }
            FieldOp::In => Ok(list_operand(op, value)?.contains(&left)),
            FieldOp::NotIn => Ok(!left.is_null() && !list_operand(op, value)?.contains(&left)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{bson, doc};
    use docgate_core::query::Filter;

    fn matches(document: &Document, predicate: Predicate) -> bool {
        DocumentEvaluator::new(document)
            .evaluate(&[predicate])
            .unwrap()
    }

    #[test]
    fn test_numbers_compare_across_widths() {
        let income = doc! { "amount": 100_i64 };

        assert!(matches(&income, Filter::eq("amount", 100.0)));
        assert!(matches(&income, Filter::gte("amount", 100)));
        assert!(!matches(&income, Filter::gt("amount", 100)));
        assert!(!matches(&income, Filter::lt("amount", "200")));
    }

    #[test]
    fn test_dotted_paths() {
        let income = doc! { "details": { "currency": "EUR" } };

        assert!(matches(&income, Filter::eq("details.currency", "EUR")));
        assert!(!matches(&income, Filter::eq("details.missing", "EUR")));
        assert!(!matches(&income, Filter::eq("details.currency.code", "EUR")));
    }

    #[test]
    fn test_missing_and_null_fields_never_match_exclusions() {
        let without = doc! { "amount": 1 };
        let null = doc! { "tag": null };

        assert!(!matches(&without, Filter::ne("tag", "a")));
        assert!(!matches(&null, Filter::ne("tag", "a")));
        assert!(!matches(&without, Filter::not_in("tag", vec!["a"])));
        assert!(matches(&doc! { "tag": "b" }, Filter::not_in("tag", vec!["a"])));
    }

    #[test]
    fn test_array_operators() {
        let income = doc! { "tags": ["salary", "monthly"], "source": "employer" };

        assert!(matches(&income, Filter::array_contains("tags", "monthly")));
        assert!(!matches(&income, Filter::array_contains("source", "employer")));
        assert!(matches(&income, Filter::array_contains_any("tags", vec!["bonus", "salary"])));
        assert!(matches(&income, Filter::is_in("source", vec!["employer", "client"])));
        assert!(!matches(&income, Filter::is_in("source", vec!["client"])));
    }

    #[test]
    fn test_list_operator_requires_array() {
        let income = doc! { "source": "employer" };
        let result = DocumentEvaluator::new(&income)
            .evaluate(&[Predicate::new("source", FieldOp::In, "employer")]);

        assert!(matches!(result, Err(GatewayError::InvalidQuery(_))));
    }

    #[test]
    fn test_unordered_types_compare_by_value() {
        let id = bson::oid::ObjectId::new();
        let owner = doc! { "owner": id };

        assert!(!matches(&owner, Filter::eq("owner", Bson::Null)));
        assert!(matches(&owner, Filter::eq("owner", id)));
        assert!(!matches(&owner, Filter::eq("owner", bson::oid::ObjectId::new())));
        assert!(matches(&owner, Filter::ne("owner", bson::oid::ObjectId::new())));
        assert!(!matches(&owner, Filter::gt("owner", Bson::Null)));
    }

    #[test]
    fn test_sort_order_across_types() {
        let values = [bson!("a"), bson!(2), bson!(null), bson!(true)];
        let mut sorted = values.iter().map(Comparable::from).collect::<Vec<_>>();
        sorted.sort_by(|a, b| a.sort_cmp(b));

        assert_eq!(
            sorted,
            vec![
                Comparable::Null,
                Comparable::Bool(true),
                Comparable::Number(2.0),
                Comparable::String("a"),
            ]
        );
    }
}
