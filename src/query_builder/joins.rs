//! # Joins and Restrictions
//!
//! Static entity metadata ([`Entity`], [`Relation`], [`Attribute`]) plus the join
//! records produced while a query is being composed. A join's ON restriction is
//! computed from the new join handle when the join is created and is stored with the
//! join itself, so it can never drift into the WHERE clause and turn an outer join
//! into an inner one.

use super::expression::{Expr, Json, Predicate, TypedExpr};
use std::fmt;
use std::marker::PhantomData;

/// Typed column of an entity, the equivalent of a metamodel attribute
pub struct Attribute<T> {
    column: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Attribute<T> {
    pub const fn new(column: &'static str) -> Self {
        Self {
            column,
            _marker: PhantomData,
        }
    }

    pub fn column(&self) -> &'static str {
        self.column
    }
}

impl<T> Clone for Attribute<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Attribute<T> {}

impl<T> fmt::Debug for Attribute<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Attribute({})", self.column)
    }
}

/// Table metadata. `attributes` maps API attribute names to column names and drives
/// default sort resolution.
#[derive(Debug)]
pub struct Entity {
    pub name: &'static str,
    pub table: &'static str,
    pub primary_key: &'static str,
    pub attributes: &'static [(&'static str, &'static str)],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    ToOne,
    ToMany,
}

/// A foreign-key relationship: `target.child_column = parent.parent_column`
#[derive(Debug)]
pub struct Relation {
    pub name: &'static str,
    pub target: &'static Entity,
    pub parent_column: &'static str,
    pub child_column: &'static str,
    pub cardinality: Cardinality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

impl JoinType {
    pub fn to_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
        }
    }
}

/// A join as it appears in a composed query
#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
    pub join_type: JoinType,
    pub table: &'static str,
    pub alias: String,
    pub parent_alias: String,
    pub parent_column: &'static str,
    pub child_column: &'static str,
    /// Extra ON condition narrowing which child rows participate
    pub on_restriction: Option<Expr>,
}

impl JoinSpec {
    pub(crate) fn new(
        parent: &JoinHandle,
        relation: &Relation,
        join_type: JoinType,
        alias: String,
    ) -> Self {
        Self {
            join_type,
            table: relation.target.table,
            alias,
            parent_alias: parent.alias.clone(),
            parent_column: relation.parent_column,
            child_column: relation.child_column,
            on_restriction: None,
        }
    }

    pub(crate) fn restricted(mut self, restriction: Predicate) -> Self {
        self.on_restriction = Some(restriction.into_expr());
        self
    }

    /// Key equality part of the ON clause
    pub fn key_condition_sql(&self) -> String {
        format!(
            "{}.{} = {}.{}",
            self.alias, self.child_column, self.parent_alias, self.parent_column
        )
    }
}

/// Handle to a joined (or root) table inside one query
#[derive(Debug, Clone)]
pub struct JoinHandle {
    alias: String,
    entity: &'static Entity,
    /// Attribute path from the root through to-one joins; `None` once a to-many join is crossed
    path: Option<String>,
}

impl JoinHandle {
    pub(crate) fn root(entity: &'static Entity) -> Self {
        Self {
            alias: entity.name.to_string(),
            entity,
            path: Some(String::new()),
        }
    }

    pub(crate) fn child(parent: &JoinHandle, relation: &Relation, alias: String) -> Self {
        let path = match (&parent.path, relation.cardinality) {
            (Some(prefix), Cardinality::ToOne) if prefix.is_empty() => {
                Some(relation.name.to_string())
            }
            (Some(prefix), Cardinality::ToOne) => Some(format!("{prefix}.{}", relation.name)),
            _ => None,
        };
        Self {
            alias,
            entity: relation.target,
            path,
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn entity(&self) -> &'static Entity {
        self.entity
    }

    pub(crate) fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn get<T>(&self, attribute: Attribute<T>) -> TypedExpr<T> {
        TypedExpr::unchecked(self.column(attribute.column()))
    }

    pub(crate) fn column(&self, column: &str) -> Expr {
        Expr::Column {
            alias: self.alias.clone(),
            column: column.to_string(),
        }
    }

    /// The whole joined row, decoded as `T`
    pub fn row<T>(&self) -> TypedExpr<Json<T>> {
        TypedExpr::unchecked(Expr::Entity {
            alias: self.alias.clone(),
            primary_key: self.entity.primary_key.to_string(),
        })
    }
}
