//! # Expression Algebra
//!
//! Backend-neutral expression tree used by every part of the engine. The variant set is
//! closed: columns, whole entities, literals, comparisons, membership, case-insensitive
//! pattern matches, null checks, conjunction, disjunction, negation, aggregates and casts.
//! Backends translate the tree (see [`crate::query_builder::render`] and
//! [`crate::backend::memory`]); nothing in the engine inspects backend-specific types.
//!
//! [`TypedExpr`] carries the Rust type the expression produces so that a selection's
//! setter is checked against its expression when it is registered, not when rows arrive.

use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

/// A raw value as exchanged with a storage backend
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Timestamp(NaiveDateTime),
    Json(serde_json::Value),
    Array(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// SQL comparison. `None` when either side is NULL or the types are not comparable.
    pub fn sql_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Array(a), Value::Array(b)) => {
                for (left, right) in a.iter().zip(b.iter()) {
                    match left.sql_cmp(right) {
                        Some(Ordering::Equal) => continue,
                        other => return other,
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        }
    }

    /// JSON form, as `to_jsonb` would produce it
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Timestamp(ts) => serde_json::to_value(ts).unwrap_or(serde_json::Value::Null),
            Value::Json(v) => v.clone(),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Text(s) => write!(f, "'{s}'"),
            Value::Timestamp(ts) => write!(f, "'{ts}'"),
            Value::Json(v) => write!(f, "{v}"),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Timestamp(value)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::Json(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::Array(values.into_iter().map(Into::into).collect())
    }
}

/// Column types a backend must be able to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Bool,
    Integer,
    BigInt,
    Text,
    Timestamp,
    Jsonb,
    BoolArray,
    IntegerArray,
    BigIntArray,
    TextArray,
}

impl SqlType {
    pub fn sql_name(&self) -> &'static str {
        match self {
            SqlType::Bool => "BOOLEAN",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Text => "TEXT",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Jsonb => "JSONB",
            SqlType::BoolArray => "BOOLEAN[]",
            SqlType::IntegerArray => "INTEGER[]",
            SqlType::BigIntArray => "BIGINT[]",
            SqlType::TextArray => "TEXT[]",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    pub fn to_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }

    pub fn holds(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::NotEq => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::LtEq => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::GtEq => ordering != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    ArrayAgg,
    Sum,
    Count,
}

impl AggregateFn {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFn::ArrayAgg => "array_agg",
            AggregateFn::Sum => "sum",
            AggregateFn::Count => "count",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `alias.column`
    Column { alias: String, column: String },
    /// The whole row behind a join alias, identified by its primary key
    Entity { alias: String, primary_key: String },
    Literal(Value),
    Comparison {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Membership { expr: Box<Expr>, values: Vec<Value> },
    /// Case-insensitive substring match; `needle` is matched literally
    PatternMatch { expr: Box<Expr>, needle: String },
    IsNull(Box<Expr>),
    Conjunction(Vec<Expr>),
    Disjunction(Vec<Expr>),
    Negation(Box<Expr>),
    /// Aggregate over the rows of a group. `filter` gates which rows contribute,
    /// `order_by` fixes element order for `array_agg`.
    Aggregate {
        func: AggregateFn,
        arg: Box<Expr>,
        filter: Option<Box<Expr>>,
        order_by: Vec<Expr>,
    },
    Cast { expr: Box<Expr>, to: SqlType },
}

impl Expr {
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Expr::Aggregate { .. })
    }

    /// True when an aggregate appears anywhere in the tree
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expr::Aggregate { .. } => true,
            Expr::Column { .. } | Expr::Entity { .. } | Expr::Literal(_) => false,
            Expr::Comparison { lhs, rhs, .. } => {
                lhs.contains_aggregate() || rhs.contains_aggregate()
            }
            Expr::Membership { expr, .. }
            | Expr::PatternMatch { expr, .. }
            | Expr::Cast { expr, .. } => expr.contains_aggregate(),
            Expr::IsNull(inner) | Expr::Negation(inner) => inner.contains_aggregate(),
            Expr::Conjunction(items) | Expr::Disjunction(items) => {
                items.iter().any(Expr::contains_aggregate)
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(items: &[Expr], sep: &str) -> String {
            items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(sep)
        }

        match self {
            Expr::Column { alias, column } => write!(f, "{alias}.{column}"),
            Expr::Entity { alias, .. } => write!(f, "{alias}.*"),
            Expr::Literal(value) => write!(f, "{value}"),
            Expr::Comparison { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.to_sql()),
            Expr::Membership { expr, values } => {
                let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "{expr} IN ({})", parts.join(", "))
            }
            Expr::PatternMatch { expr, needle } => write!(f, "lower({expr}) LIKE '%{needle}%'"),
            Expr::IsNull(inner) => write!(f, "{inner} IS NULL"),
            Expr::Conjunction(items) if items.is_empty() => write!(f, "TRUE"),
            Expr::Conjunction(items) => write!(f, "({})", join(items, " AND ")),
            Expr::Disjunction(items) if items.is_empty() => write!(f, "FALSE"),
            Expr::Disjunction(items) => write!(f, "({})", join(items, " OR ")),
            Expr::Negation(inner) => write!(f, "NOT {inner}"),
            Expr::Aggregate { func, arg, .. } => write!(f, "{}({arg})", func.name()),
            Expr::Cast { expr, to } => write!(f, "CAST({expr} AS {})", to.sql_name()),
        }
    }
}

/// Decoding of a non-null raw [`Value`] into a Rust type
pub trait FromValue: Sized {
    const SQL_TYPE: SqlType;

    fn from_value(value: Value) -> Result<Self, String>;

    /// Decode a value that may be NULL, as found inside arrays
    fn from_nullable(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Err("unexpected NULL".to_string()),
            value => Self::from_value(value),
        }
    }
}

/// Types that can appear as elements of an aggregated array
pub trait ArrayElement: FromValue {
    const ARRAY_TYPE: SqlType;
}

impl FromValue for bool {
    const SQL_TYPE: SqlType = SqlType::Bool;

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(format!("expected boolean, got {other}")),
        }
    }
}

impl FromValue for i64 {
    const SQL_TYPE: SqlType = SqlType::BigInt;

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(format!("expected bigint, got {other}")),
        }
    }
}

impl FromValue for i32 {
    const SQL_TYPE: SqlType = SqlType::Integer;

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Int(i) => i32::try_from(i).map_err(|e| format!("integer out of range: {e}")),
            other => Err(format!("expected integer, got {other}")),
        }
    }
}

impl FromValue for String {
    const SQL_TYPE: SqlType = SqlType::Text;

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(format!("expected text, got {other}")),
        }
    }
}

impl FromValue for NaiveDateTime {
    const SQL_TYPE: SqlType = SqlType::Timestamp;

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Timestamp(ts) => Ok(ts),
            other => Err(format!("expected timestamp, got {other}")),
        }
    }
}

impl FromValue for serde_json::Value {
    const SQL_TYPE: SqlType = SqlType::Jsonb;

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Json(v) => Ok(v),
            other => Err(format!("expected jsonb, got {other}")),
        }
    }
}

impl ArrayElement for bool {
    const ARRAY_TYPE: SqlType = SqlType::BoolArray;
}

impl ArrayElement for i32 {
    const ARRAY_TYPE: SqlType = SqlType::IntegerArray;
}

impl ArrayElement for i64 {
    const ARRAY_TYPE: SqlType = SqlType::BigIntArray;
}

impl ArrayElement for String {
    const ARRAY_TYPE: SqlType = SqlType::TextArray;
}

impl<T: FromValue> FromValue for Option<T> {
    const SQL_TYPE: SqlType = T::SQL_TYPE;

    fn from_value(value: Value) -> Result<Self, String> {
        Self::from_nullable(value)
    }

    fn from_nullable(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            value => T::from_value(value).map(Some),
        }
    }
}

impl<T: ArrayElement> ArrayElement for Option<T> {
    const ARRAY_TYPE: SqlType = T::ARRAY_TYPE;
}

impl<T: ArrayElement> FromValue for Vec<T> {
    const SQL_TYPE: SqlType = T::ARRAY_TYPE;

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| T::from_nullable(item).map_err(|e| format!("array element: {e}")))
                .collect(),
            other => Err(format!("expected array, got {other}")),
        }
    }
}

/// A whole entity decoded from its JSON row representation
#[derive(Debug, Clone, PartialEq)]
pub struct Json<T>(pub T);

impl<T: DeserializeOwned> FromValue for Json<T> {
    const SQL_TYPE: SqlType = SqlType::Jsonb;

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Json(v) => serde_json::from_value(v)
                .map(Json)
                .map_err(|e| format!("entity decode failed: {e}")),
            other => Err(format!("expected entity row, got {other}")),
        }
    }
}

/// An [`Expr`] tagged with the Rust type it evaluates to
pub struct TypedExpr<T> {
    expr: Expr,
    _marker: PhantomData<fn() -> T>,
}

/// A boolean expression
pub type Predicate = TypedExpr<bool>;

impl<T> Clone for TypedExpr<T> {
    fn clone(&self) -> Self {
        Self::unchecked(self.expr.clone())
    }
}

impl<T> fmt::Debug for TypedExpr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypedExpr").field(&self.expr).finish()
    }
}

impl<T> fmt::Display for TypedExpr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.expr.fmt(f)
    }
}

impl<T> TypedExpr<T> {
    /// Tag an untyped expression. The caller vouches for the type.
    pub fn unchecked(expr: Expr) -> Self {
        Self {
            expr,
            _marker: PhantomData,
        }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn into_expr(self) -> Expr {
        self.expr
    }

    pub fn is_null(&self) -> Predicate {
        Predicate::unchecked(Expr::IsNull(Box::new(self.expr.clone())))
    }

    pub fn is_not_null(&self) -> Predicate {
        self.is_null().negate()
    }

    /// Same expression, decoded with NULL allowed
    pub fn nullable(&self) -> TypedExpr<Option<T>> {
        TypedExpr::unchecked(self.expr.clone())
    }

    pub fn cast<U: FromValue>(&self) -> TypedExpr<U> {
        TypedExpr::unchecked(Expr::Cast {
            expr: Box::new(self.expr.clone()),
            to: U::SQL_TYPE,
        })
    }

    pub fn count(&self) -> TypedExpr<i64> {
        TypedExpr::unchecked(Expr::Aggregate {
            func: AggregateFn::Count,
            arg: Box::new(self.expr.clone()),
            filter: None,
            order_by: Vec::new(),
        })
    }
}

impl<T: Into<Value>> TypedExpr<T> {
    pub fn compare(&self, op: CompareOp, value: T) -> Predicate {
        Predicate::unchecked(Expr::Comparison {
            op,
            lhs: Box::new(self.expr.clone()),
            rhs: Box::new(Expr::Literal(value.into())),
        })
    }

    pub fn equal(&self, value: T) -> Predicate {
        self.compare(CompareOp::Eq, value)
    }

    /// Membership test. An empty value list is never satisfied.
    pub fn is_in<I: IntoIterator<Item = T>>(&self, values: I) -> Predicate {
        Predicate::unchecked(Expr::Membership {
            expr: Box::new(self.expr.clone()),
            values: values.into_iter().map(Into::into).collect(),
        })
    }
}

impl TypedExpr<String> {
    /// Case-insensitive "contains" match
    pub fn lower_like(&self, needle: &str) -> Predicate {
        Predicate::unchecked(Expr::PatternMatch {
            expr: Box::new(self.expr.clone()),
            needle: needle.to_lowercase(),
        })
    }
}

impl TypedExpr<bool> {
    pub fn negate(&self) -> Predicate {
        Predicate::unchecked(Expr::Negation(Box::new(self.expr.clone())))
    }
}

impl TypedExpr<i32> {
    pub fn sum(&self) -> TypedExpr<i64> {
        sum_of(&self.expr)
    }
}

impl TypedExpr<i64> {
    /// `sum(bigint)` is NUMERIC in PostgreSQL, so the result is cast back to BIGINT
    pub fn sum(&self) -> TypedExpr<i64> {
        TypedExpr::unchecked(Expr::Cast {
            expr: Box::new(sum_of(&self.expr).into_expr()),
            to: SqlType::BigInt,
        })
    }
}

fn sum_of(expr: &Expr) -> TypedExpr<i64> {
    TypedExpr::unchecked(Expr::Aggregate {
        func: AggregateFn::Sum,
        arg: Box::new(expr.clone()),
        filter: None,
        order_by: Vec::new(),
    })
}

pub fn literal<T: Into<Value>>(value: T) -> TypedExpr<T> {
    TypedExpr::unchecked(Expr::Literal(value.into()))
}

pub fn always_true() -> Predicate {
    Predicate::unchecked(Expr::Literal(Value::Bool(true)))
}

pub fn always_false() -> Predicate {
    Predicate::unchecked(Expr::Literal(Value::Bool(false)))
}

/// Conjunction; the empty conjunction is `TRUE`
pub fn and<I: IntoIterator<Item = Predicate>>(predicates: I) -> Predicate {
    let mut items: Vec<Expr> = predicates.into_iter().map(TypedExpr::into_expr).collect();
    match items.len() {
        0 => always_true(),
        1 => Predicate::unchecked(items.remove(0)),
        _ => Predicate::unchecked(Expr::Conjunction(items)),
    }
}

/// Disjunction; the empty disjunction is `FALSE`
pub fn or<I: IntoIterator<Item = Predicate>>(predicates: I) -> Predicate {
    let mut items: Vec<Expr> = predicates.into_iter().map(TypedExpr::into_expr).collect();
    match items.len() {
        0 => always_false(),
        1 => Predicate::unchecked(items.remove(0)),
        _ => Predicate::unchecked(Expr::Disjunction(items)),
    }
}
