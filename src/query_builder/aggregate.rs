//! # Array Aggregation
//!
//! Per-group array aggregates over child collections. [`ChildCollection`] owns one
//! collection join plus its nested join to the related entity, and produces aligned
//! array aggregates: every aggregate of the same collection shares one presence filter
//! (the related row's key is not NULL) and one ordering key (the collection row's key),
//! so element `i` of each array describes the same child row.
//!
//! A group without any participating child yields NULL rather than an array of NULLs.

use super::conditions::SearchMode;
use super::context::QueryContext;
use super::expression::{or, AggregateFn, ArrayElement, Expr, Predicate, TypedExpr};
use super::joins::{Attribute, JoinHandle, JoinType, Relation};

fn aggregate<T>(value: Expr, presence: Expr, order_key: Expr) -> TypedExpr<Vec<T>> {
    TypedExpr::unchecked(Expr::Aggregate {
        func: AggregateFn::ArrayAgg,
        arg: Box::new(value),
        filter: Some(Box::new(Expr::Negation(Box::new(Expr::IsNull(Box::new(
            presence,
        )))))),
        order_by: vec![order_key],
    })
}

/// `array_agg(value ORDER BY value) FILTER (WHERE value IS NOT NULL)`
pub fn array_agg<T: ArrayElement>(value: &TypedExpr<T>) -> TypedExpr<Vec<T>> {
    aggregate(value.expr().clone(), value.expr().clone(), value.expr().clone())
}

/// `array_agg(value ORDER BY order_key) FILTER (WHERE presence IS NOT NULL)`
pub fn array_agg_aligned<T: ArrayElement>(
    value: &TypedExpr<T>,
    presence: &Expr,
    order_key: &Expr,
) -> TypedExpr<Vec<T>> {
    aggregate(value.expr().clone(), presence.clone(), order_key.clone())
}

/// Name filter applied to the related entity of a child collection
#[derive(Debug, Clone, Copy)]
pub struct CollectionFilter<'a> {
    pub values: Option<&'a [String]>,
    pub column: Attribute<String>,
    pub mode: SearchMode,
    /// Marker value meaning "only groups without children"; never used as a match value
    pub empty_marker: &'a str,
}

impl CollectionFilter<'_> {
    fn needles(&self) -> Option<&[String]> {
        match self.values {
            Some(values) if !values.is_empty() && values[0] != self.empty_marker => Some(values),
            _ => None,
        }
    }

    /// True when the marker for "no children" was supplied
    pub fn wants_empty(&self) -> bool {
        self.values
            .and_then(|values| values.first())
            .is_some_and(|first| first == self.empty_marker)
    }
}

fn name_matches(
    related: &JoinHandle,
    column: Attribute<String>,
    needles: &[String],
) -> Vec<Predicate> {
    needles
        .iter()
        .map(|needle| related.get(column).lower_like(needle))
        .collect()
}

/// One aggregated child collection: `parent -> collection -> related`
#[derive(Debug, Clone)]
pub struct ChildCollection {
    collection: JoinHandle,
    related: JoinHandle,
    match_predicates: Vec<Predicate>,
    mode: SearchMode,
}

impl ChildCollection {
    /// Create both joins. With match values in exact mode the related join's ON clause
    /// keeps only matching rows, which removes non-matching children from every
    /// aggregate without dropping the parent. In free-text mode the match predicates are
    /// not applied here; they are exposed through [`ChildCollection::search_predicates`].
    pub fn join<R>(
        context: &mut QueryContext<R>,
        parent: &JoinHandle,
        collection: &Relation,
        related: &Relation,
        filter: CollectionFilter<'_>,
    ) -> Self {
        let collection_join = context.join(parent, collection, JoinType::Left);
        let needles = filter.needles();

        let related_join = match needles {
            Some(needles) if !filter.mode.is_free_text() => {
                context.join_on(&collection_join, related, JoinType::Left, |join| {
                    or(name_matches(join, filter.column, needles))
                })
            }
            _ => context.join(&collection_join, related, JoinType::Left),
        };

        let match_predicates = needles
            .map(|needles| name_matches(&related_join, filter.column, needles))
            .unwrap_or_default();

        Self {
            collection: collection_join,
            related: related_join,
            match_predicates,
            mode: filter.mode,
        }
    }

    pub fn collection(&self) -> &JoinHandle {
        &self.collection
    }

    pub fn related(&self) -> &JoinHandle {
        &self.related
    }

    fn presence(&self) -> Expr {
        self.related.column(self.related.entity().primary_key)
    }

    fn order_key(&self) -> Expr {
        self.collection.column(self.collection.entity().primary_key)
    }

    /// Aligned array aggregate of an expression over this collection
    pub fn aggregate<T: ArrayElement>(&self, value: &TypedExpr<T>) -> TypedExpr<Vec<T>> {
        array_agg_aligned(value, &self.presence(), &self.order_key())
    }

    /// Array of related keys
    pub fn keys(&self) -> TypedExpr<Vec<i64>> {
        let key: TypedExpr<i64> = TypedExpr::unchecked(self.presence());
        self.aggregate(&key)
    }

    /// The group has no participating children
    pub fn is_absent(&self) -> Predicate {
        self.keys().is_null()
    }

    /// Match predicates to OR into a free-text filter; `None` outside free-text mode
    pub fn search_predicates(&self) -> Option<&[Predicate]> {
        if self.mode.is_free_text() && !self.match_predicates.is_empty() {
            Some(&self.match_predicates)
        } else {
            None
        }
    }

    /// OR of the free-text match predicates of several collections
    pub fn free_text_predicate(collections: &[ChildCollection]) -> Option<Predicate> {
        let predicates: Vec<Predicate> = collections
            .iter()
            .filter_map(ChildCollection::search_predicates)
            .flat_map(|predicates| predicates.iter().cloned())
            .collect();
        if predicates.is_empty() {
            None
        } else {
            Some(or(predicates))
        }
    }
}
