//! Filter and sort composition for collection queries.
//!
//! A query is a conjunction of [`Predicate`]s, an optional [`OrderBy`] and an optional
//! limit. Callers usually pass a [`Where`] (one predicate or a list) and an order, and the
//! gateway assembles the [`Query`]; backends translate it through a [`QueryVisitor`].
//!
//! # Example
//!
//! ```ignore
//! use docgate::query::{Filter, OrderBy, Query};
//!
//! let query = Query::builder()
//!     .filter(Filter::gte("amount", 100))
//!     .filter(Filter::eq("currency", "EUR"))
//!     .order_by(OrderBy::desc("amount"))
//!     .limit(10)
//!     .build();
//! ```
//!
//! # Operators
//!
//! The [`Filter`] helpers mirror the operators of managed document stores:
//!
//! - Comparison: `eq`, `ne`, `gt`, `gte`, `lt`, `lte`
//! - Membership: `is_in`, `not_in`
//! - Array: `array_contains`, `array_contains_any`
//!
//! Operators can also be parsed from their wire spelling (`"=="`, `"array-contains"`, ...)
//! with [`Predicate::parse`].

use bson::Bson;
use std::{fmt, str::FromStr};

use crate::error::{GatewayError, GatewayResult};

/// Largest value list accepted by `in`, `not-in` and `array-contains-any`.
pub const MAX_DISJUNCTION_VALUES: usize = 30;

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    #[default]
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl FromStr for SortDirection {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Asc),
            "desc" | "descending" => Ok(SortDirection::Desc),
            other => Err(GatewayError::InvalidQuery(format!("unknown sort direction {other}"))),
        }
    }
}

/// Sort specification: a field path and a direction.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    /// The field path to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl OrderBy {
    /// Creates a sort specification, ascending unless a direction is given.
    pub fn new(field: impl Into<String>, direction: Option<SortDirection>) -> Self {
        Self { field: field.into(), direction: direction.unwrap_or_default() }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, Some(SortDirection::Asc))
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, Some(SortDirection::Desc))
    }
}

impl From<&str> for OrderBy {
    fn from(field: &str) -> Self {
        OrderBy::asc(field)
    }
}

impl From<(&str, SortDirection)> for OrderBy {
    fn from((field, direction): (&str, SortDirection)) -> Self {
        OrderBy::new(field, Some(direction))
    }
}

/// Field comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// `==`
    Eq,
    /// `!=`; documents missing the field never match.
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `array-contains`: the array field holds the value.
    ArrayContains,
    /// `array-contains-any`: the array field holds at least one of the values.
    ArrayContainsAny,
    /// `in`: the field equals one of the values.
    In,
    /// `not-in`: the field is present and equals none of the values.
    NotIn,
}

impl FieldOp {
    /// Returns the wire spelling of the operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldOp::Eq => "==",
            FieldOp::Ne => "!=",
            FieldOp::Gt => ">",
            FieldOp::Gte => ">=",
            FieldOp::Lt => "<",
            FieldOp::Lte => "<=",
            FieldOp::ArrayContains => "array-contains",
            FieldOp::ArrayContainsAny => "array-contains-any",
            FieldOp::In => "in",
            FieldOp::NotIn => "not-in",
        }
    }

    /// Whether the operator compares against a list of values.
    pub fn takes_list(&self) -> bool {
        matches!(self, FieldOp::ArrayContainsAny | FieldOp::In | FieldOp::NotIn)
    }
}

impl fmt::Display for FieldOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldOp {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "==" => FieldOp::Eq,
            "!=" => FieldOp::Ne,
            ">" => FieldOp::Gt,
            ">=" => FieldOp::Gte,
            "<" => FieldOp::Lt,
            "<=" => FieldOp::Lte,
            "array-contains" => FieldOp::ArrayContains,
            "array-contains-any" => FieldOp::ArrayContainsAny,
            "in" => FieldOp::In,
            "not-in" => FieldOp::NotIn,
            other => return Err(GatewayError::InvalidQuery(format!("unknown operator {other}"))),
        })
    }
}

/// A single `(field path, operator, value)` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Field path; dots address nested fields.
    pub field: String,
    /// The comparison operator.
    pub op: FieldOp,
    /// The value to compare against.
    pub value: Bson,
}

impl Predicate {
    pub fn new(field: impl Into<String>, op: FieldOp, value: impl Into<Bson>) -> Self {
        Self { field: field.into(), op, value: value.into() }
    }

    /// Creates a predicate from the wire spelling of its operator.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidQuery`] for an unknown operator.
    pub fn parse(field: impl Into<String>, op: &str, value: impl Into<Bson>) -> GatewayResult<Self> {
        Ok(Self::new(field, op.parse()?, value))
    }

    /// Checks the operator/value combination.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidQuery`] for an empty field path, or for list
    /// operators given something other than a non-empty array of at most
    /// [`MAX_DISJUNCTION_VALUES`] values.
    pub fn validate(&self) -> GatewayResult<()> {
        if self.field.is_empty() || self.field.split('.').any(str::is_empty) {
            return Err(GatewayError::InvalidQuery(format!("invalid field path '{}'", self.field)));
        }

        if self.op.takes_list() {
            match &self.value {
                Bson::Array(values) if values.is_empty() => {
                    return Err(GatewayError::InvalidQuery(format!(
                        "'{}' on {} requires at least one value",
                        self.op, self.field
                    )));
                }
                Bson::Array(values) if values.len() > MAX_DISJUNCTION_VALUES => {
                    return Err(GatewayError::InvalidQuery(format!(
                        "'{}' on {} accepts at most {} values, got {}",
                        self.op,
                        self.field,
                        MAX_DISJUNCTION_VALUES,
                        values.len()
                    )));
                }
                Bson::Array(_) => {}
                _ => {
                    return Err(GatewayError::InvalidQuery(format!(
                        "'{}' on {} requires an array value",
                        self.op, self.field
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Filter argument of `get` and `delete`: one predicate or a list, all AND-combined.
#[derive(Debug, Clone, PartialEq)]
pub enum Where {
    One(Predicate),
    All(Vec<Predicate>),
}

impl Where {
    pub fn into_predicates(self) -> Vec<Predicate> {
        match self {
            Where::One(predicate) => vec![predicate],
            Where::All(predicates) => predicates,
        }
    }
}

impl From<Predicate> for Where {
    fn from(predicate: Predicate) -> Self {
        Where::One(predicate)
    }
}

impl From<Vec<Predicate>> for Where {
    fn from(predicates: Vec<Predicate>) -> Self {
        Where::All(predicates)
    }
}

/// Helper struct for constructing predicates.
///
/// ```ignore
/// use docgate::query::Filter;
///
/// let filter = vec![Filter::gte("amount", 100), Filter::is_in("currency", vec!["EUR", "USD"])];
/// ```
pub struct Filter;

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Predicate {
        Predicate::new(field, FieldOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Predicate {
        Predicate::new(field, FieldOp::Ne, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Predicate {
        Predicate::new(field, FieldOp::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Predicate {
        Predicate::new(field, FieldOp::Gte, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Predicate {
        Predicate::new(field, FieldOp::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Predicate {
        Predicate::new(field, FieldOp::Lte, value)
    }

    /// Matches documents whose array field holds `value`.
    pub fn array_contains(field: impl Into<String>, value: impl Into<Bson>) -> Predicate {
        Predicate::new(field, FieldOp::ArrayContains, value)
    }

    /// Matches documents whose array field holds any of `values`.
    pub fn array_contains_any(field: impl Into<String>, values: impl Into<Bson>) -> Predicate {
        Predicate::new(field, FieldOp::ArrayContainsAny, values)
    }

    /// Matches documents whose field equals one of `values`.
    pub fn is_in(field: impl Into<String>, values: impl Into<Bson>) -> Predicate {
        Predicate::new(field, FieldOp::In, values)
    }

    /// Matches documents whose field is present and equals none of `values`.
    pub fn not_in(field: impl Into<String>, values: impl Into<Bson>) -> Predicate {
        Predicate::new(field, FieldOp::NotIn, values)
    }
}

/// A structured query: AND-combined predicates, an optional order and an optional limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Conditions every returned document satisfies. Empty matches everything.
    pub predicates: Vec<Predicate>,
    /// Sort specification for results.
    pub order_by: Option<OrderBy>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the query a `get`/`delete` call describes.
    pub fn from_parts(filter: Option<Where>, order_by: Option<OrderBy>) -> Self {
        Query {
            predicates: filter.map(Where::into_predicates).unwrap_or_default(),
            order_by,
            limit: None,
        }
    }

    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Validates every predicate and the sort field.
    pub fn validate(&self) -> GatewayResult<()> {
        for predicate in &self.predicates {
            predicate.validate()?;
        }

        if let Some(order_by) = &self.order_by {
            if order_by.field.is_empty() || order_by.field.split('.').any(str::is_empty) {
                return Err(GatewayError::InvalidQuery(format!(
                    "invalid sort field '{}'",
                    order_by.field
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Adds a predicate; predicates accumulate and are AND-combined.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.query.predicates.push(predicate);
        self
    }

    /// Adds every predicate of a [`Where`].
    pub fn filters(mut self, filter: impl Into<Where>) -> Self {
        self.query
            .predicates
            .extend(filter.into().into_predicates());
        self
    }

    /// Sets the sort specification.
    pub fn order_by(mut self, order_by: impl Into<OrderBy>) -> Self {
        self.query.order_by = Some(order_by.into());
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

/// Translates the predicates of a query into a backend representation.
pub trait QueryVisitor {
    type Output;
    type Error: Into<GatewayError>;

    fn visit_all(&mut self, predicates: &[Predicate]) -> Result<Self::Output, Self::Error>;
    fn visit_predicate(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_query(&mut self, query: &Query) -> Result<Self::Output, Self::Error> {
        self.visit_all(&query.predicates)
    }
}
