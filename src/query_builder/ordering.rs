//! # Order Resolution
//!
//! Maps logical sort keys to one or more ORDER BY clauses. Every clause carries an
//! explicit null placement so that ordering does not depend on a backend's default.

use super::expression::{Expr, TypedExpr};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    pub fn is_descending(&self) -> bool {
        matches!(self, SortDirection::Desc)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullPlacement {
    First,
    Last,
}

impl NullPlacement {
    /// NULLs sort after values ascending and before values descending
    pub fn for_direction(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Asc => NullPlacement::Last,
            SortDirection::Desc => NullPlacement::First,
        }
    }

    pub fn to_sql(&self) -> &'static str {
        match self {
            NullPlacement::First => "NULLS FIRST",
            NullPlacement::Last => "NULLS LAST",
        }
    }
}

/// One ORDER BY item
#[derive(Debug, Clone, PartialEq)]
pub struct OrderClause {
    pub expr: Expr,
    pub direction: SortDirection,
    pub nulls: NullPlacement,
}

impl OrderClause {
    pub fn new<T>(expr: &TypedExpr<T>, direction: SortDirection) -> Self {
        Self::from_expr(expr.expr().clone(), direction)
    }

    pub(crate) fn from_expr(expr: Expr, direction: SortDirection) -> Self {
        Self {
            expr,
            direction,
            nulls: NullPlacement::for_direction(direction),
        }
    }

    pub fn with_nulls(mut self, nulls: NullPlacement) -> Self {
        self.nulls = nulls;
        self
    }
}

impl fmt::Display for OrderClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.expr, self.direction.to_sql(), self.nulls.to_sql())
    }
}

/// A requested sort field and direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Desc,
        }
    }

    /// Parse `field` or `field,asc|desc`
    pub fn parse(raw: &str) -> Option<Self> {
        let (field, direction) = match raw.split_once(',') {
            Some((field, direction)) => (field.trim(), SortDirection::parse(direction)?),
            None => (raw.trim(), SortDirection::Asc),
        };
        if field.is_empty() {
            return None;
        }
        Some(Self {
            field: field.to_string(),
            direction,
        })
    }
}

/// Ordered list of requested sort orders
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Sort {
    orders: Vec<SortOrder>,
}

impl Sort {
    pub fn unsorted() -> Self {
        Self::default()
    }

    pub fn by(orders: Vec<SortOrder>) -> Self {
        Self { orders }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SortOrder> {
        self.orders.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

type Resolver<'a> = Box<dyn Fn(SortDirection) -> Vec<OrderClause> + 'a>;

/// Sort key name to clause factory
#[derive(Default)]
pub struct OrderResolver<'a> {
    resolvers: HashMap<String, Resolver<'a>>,
}

impl<'a> OrderResolver<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F>(mut self, field: &str, resolver: F) -> Self
    where
        F: Fn(SortDirection) -> Vec<OrderClause> + 'a,
    {
        self.resolvers.insert(field.to_string(), Box::new(resolver));
        self
    }

    /// Clauses for a requested order, `None` when no resolver is registered for its field
    pub fn resolve(&self, order: &SortOrder) -> Option<Vec<OrderClause>> {
        self.resolvers
            .get(&order.field)
            .map(|resolver| resolver(order.direction))
    }
}

impl fmt::Debug for OrderResolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.resolvers.keys().collect();
        keys.sort();
        f.debug_struct("OrderResolver").field("keys", &keys).finish()
    }
}
