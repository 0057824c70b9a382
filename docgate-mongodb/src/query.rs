//! Query translation from gateway predicates to MongoDB filter documents.
//!
//! Exclusion operators (`!=`, `not-in`) also exclude documents where the field is missing
//! or null, and the array operators only match array fields.

use bson::{Bson, Document, doc};

use docgate_core::{
    error::GatewayError,
    query::{FieldOp, Predicate, Query, QueryVisitor},
};

use crate::sanitizer::ValueSanitizer;

pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// Builds the filter for a query. With an order, documents lacking the sort field are
    /// filtered out rather than sorted first.
    pub(crate) fn translate(query: &Query) -> Result<Document, GatewayError> {
        let mut clauses = query
            .predicates
            .iter()
            .map(|predicate| {
                MongoQueryTranslator.visit_predicate(&predicate.field, &predicate.op, &predicate.value)
            })
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(order_by) = &query.order_by {
            let field = ValueSanitizer::sanitize_path(&order_by.field);
            clauses.push(doc! { field: { "$exists": true } });
        }

        Ok(Self::combine(clauses))
    }

    fn combine(mut clauses: Vec<Document>) -> Document {
        match clauses.len() {
            0 => doc! {},
            1 => clauses.remove(0),
            _ => doc! { "$and": clauses },
        }
    }
}

fn with_null(values: &Bson) -> Bson {
    match values {
        Bson::Array(items) => Bson::Array(
            items
                .iter()
                .cloned()
                .chain([Bson::Null])
                .collect(),
        ),
        single => Bson::Array(vec![single.clone(), Bson::Null]),
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = GatewayError;

    fn visit_all(&mut self, predicates: &[Predicate]) -> Result<Self::Output, Self::Error> {
        Ok(Self::combine(
            predicates
                .iter()
                .map(|predicate| self.visit_predicate(&predicate.field, &predicate.op, &predicate.value))
                .collect::<Result<Vec<_>, _>>()?,
        ))
    }

    fn visit_predicate(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        if op.takes_list() && !matches!(value, Bson::Array(_)) {
            return Err(GatewayError::InvalidQuery(format!("operator {op} requires an array operand")));
        }

        let field = ValueSanitizer::sanitize_path(field);
        let value = ValueSanitizer::sanitize_value(value);

        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$nin": with_null(&value) },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::ArrayContains => doc! { "$elemMatch": { "$eq": value } },
                FieldOp::ArrayContainsAny => doc! { "$elemMatch": { "$in": value } },
                FieldOp::In => doc! { "$in": value },
                FieldOp::NotIn => doc! { "$nin": with_null(&value) },
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgate_core::query::{Filter, OrderBy};

    #[test]
    fn test_single_predicate_is_not_wrapped() {
        let query = Query::builder()
            .filter(Filter::gte("amount", 100))
            .build();

        assert_eq!(
            MongoQueryTranslator::translate(&query).unwrap(),
            doc! { "amount": { "$gte": 100 } }
        );
        assert_eq!(MongoQueryTranslator::translate(&Query::new()).unwrap(), doc! {});
    }

    #[test]
    fn test_order_requires_sort_field() {
        let query = Query::builder()
            .filter(Filter::ne("currency", "EUR"))
            .order_by(OrderBy::desc("details.date"))
            .build();

        assert_eq!(
            MongoQueryTranslator::translate(&query).unwrap(),
            doc! {
                "$and": [
                    { "currency": { "$nin": ["EUR", null] } },
                    { "details.date": { "$exists": true } },
                ]
            }
        );
    }

    #[test]
    fn test_array_operators_match_arrays_only() {
        let mut translator = MongoQueryTranslator;

        assert_eq!(
            translator
                .visit_predicate("tags", &FieldOp::ArrayContains, &Bson::from("salary"))
                .unwrap(),
            doc! { "tags": { "$elemMatch": { "$eq": "salary" } } }
        );
        assert_eq!(
            translator
                .visit_all(&[Filter::not_in("source", vec!["a", "b"])])
                .unwrap(),
            doc! { "source": { "$nin": ["a", "b", null] } }
        );
    }

    #[test]
    fn test_values_and_paths_are_sanitized() {
        let mut translator = MongoQueryTranslator;

        assert_eq!(
            translator
                .visit_predicate("rate.$eur", &FieldOp::Eq, &Bson::from("1.08"))
                .unwrap(),
            doc! { "rate.__dollar__eur": { "$eq": "1__dot__08" } }
        );
        assert!(matches!(
            translator.visit_predicate("source", &FieldOp::In, &Bson::from("a")),
            Err(GatewayError::InvalidQuery(_))
        ));
    }
}
