//! # Selection Registry
//!
//! Ordered `(expression, setter)` pairs. The expression list becomes the SELECT list,
//! and the setters fold each raw result row back into an output object by position.
//! The expression's type and the setter's argument type are tied together when a
//! selection is created; at population time only the raw value is decoded.

use super::expression::{Expr, FromValue, SqlType, TypedExpr, Value};
use crate::error::{QueryError, Result};
use std::fmt;
use std::sync::Arc;

type Assign<R> = Box<dyn Fn(&mut R, Value) -> std::result::Result<(), String> + Send + Sync>;

/// A type-erased selection
pub struct Selection<R> {
    expr: Expr,
    sql_type: SqlType,
    assign: Assign<R>,
}

impl<R: 'static> Selection<R> {
    /// Pair an expression with a setter taking the expression's type
    pub fn of<T, F>(expr: TypedExpr<T>, setter: F) -> Self
    where
        T: FromValue + 'static,
        F: Fn(&mut R, Option<T>) + Send + Sync + 'static,
    {
        Self {
            expr: expr.into_expr(),
            sql_type: T::SQL_TYPE,
            assign: Box::new(move |row, value| {
                let decoded = match value {
                    Value::Null => None,
                    value => Some(T::from_value(value)?),
                };
                setter(row, decoded);
                Ok(())
            }),
        }
    }
}

impl<R> Selection<R> {
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }
}

impl<R> fmt::Debug for Selection<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selection")
            .field("expr", &self.expr)
            .field("sql_type", &self.sql_type)
            .finish()
    }
}

/// A selection that keeps its value type, so its expression can be reused elsewhere
/// (for instance a flag predicate that also feeds a filter)
pub struct TypedSelection<R, T> {
    expr: TypedExpr<T>,
    setter: Arc<dyn Fn(&mut R, Option<T>) + Send + Sync>,
}

impl<R, T> Clone for TypedSelection<R, T> {
    fn clone(&self) -> Self {
        Self {
            expr: self.expr.clone(),
            setter: Arc::clone(&self.setter),
        }
    }
}

impl<R: 'static, T: FromValue + 'static> TypedSelection<R, T> {
    pub fn of<F>(expr: TypedExpr<T>, setter: F) -> Self
    where
        F: Fn(&mut R, Option<T>) + Send + Sync + 'static,
    {
        Self {
            expr,
            setter: Arc::new(setter),
        }
    }

    pub fn expr(&self) -> &TypedExpr<T> {
        &self.expr
    }

    /// Erase the value type so the selection can sit in a mixed list
    pub fn down_cast(self) -> Selection<R> {
        let setter = self.setter;
        Selection::of(self.expr, move |row: &mut R, value: Option<T>| setter(row, value))
    }
}

/// Ordered list of selections for one query
pub struct SelectionRegistry<R> {
    selections: Vec<Selection<R>>,
}

impl<R> Default for SelectionRegistry<R> {
    fn default() -> Self {
        Self {
            selections: Vec::new(),
        }
    }
}

impl<R> fmt::Debug for SelectionRegistry<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.selections.iter()).finish()
    }
}

impl<R: 'static> SelectionRegistry<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T, F>(&mut self, expr: TypedExpr<T>, setter: F) -> &mut Self
    where
        T: FromValue + 'static,
        F: Fn(&mut R, Option<T>) + Send + Sync + 'static,
    {
        self.selections.push(Selection::of(expr, setter));
        self
    }

    pub fn push(&mut self, selection: Selection<R>) -> &mut Self {
        self.selections.push(selection);
        self
    }
}

impl<R> SelectionRegistry<R> {
    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    /// Expressions in registration order
    pub fn project_all(&self) -> Vec<Expr> {
        self.selections.iter().map(|s| s.expr.clone()).collect()
    }

    pub fn column_types(&self) -> Vec<SqlType> {
        self.selections.iter().map(|s| s.sql_type).collect()
    }

    /// Apply every setter in registration order; `raw[i]` belongs to selection `i`
    pub fn populate(&self, row: &mut R, raw: Vec<Value>) -> Result<()> {
        if raw.len() != self.selections.len() {
            return Err(QueryError::ColumnCountMismatch {
                expected: self.selections.len(),
                actual: raw.len(),
            });
        }

        for (column, (selection, value)) in self.selections.iter().zip(raw).enumerate() {
            (selection.assign)(row, value)
                .map_err(|reason| QueryError::Decode { column, reason })?;
        }

        Ok(())
    }
}

impl<R> FromIterator<Selection<R>> for SelectionRegistry<R> {
    fn from_iter<I: IntoIterator<Item = Selection<R>>>(iter: I) -> Self {
        Self {
            selections: iter.into_iter().collect(),
        }
    }
}
