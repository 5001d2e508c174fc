//! # Query Context
//!
//! Holds everything one query build accumulates: the root, joins, selections, the
//! WHERE predicate, grouping, HAVING, ordering and the page request. A context is
//! created per call, mutated during the build phase and consumed by
//! [`QueryContext::execute`], so it can neither be reused nor modified afterwards.
//!
//! ## Grouping rules
//!
//! As soon as a query groups (explicit GROUP BY, any aggregate among selections, order
//! clauses or HAVING), every column referenced outside an aggregate in SELECT, ORDER BY
//! or HAVING must be grouped. Grouping by a whole entity, or by its primary key, covers
//! every column of that entity. Violations are rejected by [`QueryContext::build`]
//! before anything reaches storage.

use super::aggregate;
use super::conditions::PredicateBuilder;
use super::expression::{and, ArrayElement, Expr, Predicate, SqlType, TypedExpr};
use super::joins::{Entity, JoinHandle, JoinSpec, JoinType, Relation};
use super::ordering::{OrderClause, OrderResolver, Sort, SortDirection};
use super::pagination::{Page, PageRequest};
use super::selections::SelectionRegistry;
use crate::backend::QueryBackend;
use crate::error::{QueryError, Result};
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, instrument};

/// Validated, backend-neutral description of one composed query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub root_table: &'static str,
    pub root_alias: String,
    pub joins: Vec<JoinSpec>,
    pub selections: Vec<Expr>,
    pub column_types: Vec<SqlType>,
    pub predicate: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderClause>,
    pub limit: Option<u32>,
    pub offset: u64,
}

impl QueryPlan {
    /// True when rows are folded into groups before projection
    pub fn is_grouped(&self) -> bool {
        !self.group_by.is_empty()
            || self.having.is_some()
            || self.selections.iter().any(Expr::contains_aggregate)
            || self.order_by.iter().any(|clause| clause.expr.contains_aggregate())
    }
}

/// Builder state for a single query returning rows of type `R`
pub struct QueryContext<R> {
    root: JoinHandle,
    joins: Vec<JoinSpec>,
    primary_keys: HashMap<String, &'static str>,
    attributes: HashMap<String, Expr>,
    selections: Option<SelectionRegistry<R>>,
    predicate: Option<Predicate>,
    group_by: Vec<Expr>,
    having: Option<Predicate>,
    order_by: Vec<OrderClause>,
    page: Option<PageRequest>,
}

impl<R> QueryContext<R> {
    pub fn new(root: &'static Entity) -> Self {
        let root = JoinHandle::root(root);
        let mut context = Self {
            root: root.clone(),
            joins: Vec::new(),
            primary_keys: HashMap::new(),
            attributes: HashMap::new(),
            selections: None,
            predicate: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            page: None,
        };
        context.register_handle(&root);
        context
    }

    pub fn root(&self) -> &JoinHandle {
        &self.root
    }

    pub fn joins(&self) -> &[JoinSpec] {
        &self.joins
    }

    pub fn predicate_builder(&self) -> PredicateBuilder {
        PredicateBuilder::new()
    }

    /// `array_agg` of a column, skipping NULLs
    pub fn array_agg<T: ArrayElement>(&self, value: &TypedExpr<T>) -> TypedExpr<Vec<T>> {
        aggregate::array_agg(value)
    }

    fn register_handle(&mut self, handle: &JoinHandle) {
        self.primary_keys
            .insert(handle.alias().to_string(), handle.entity().primary_key);

        let Some(path) = handle.path() else {
            return;
        };
        for (attribute, column) in handle.entity().attributes {
            let key = if path.is_empty() {
                (*attribute).to_string()
            } else {
                format!("{path}.{attribute}")
            };
            self.attributes
                .entry(key)
                .or_insert_with(|| handle.column(column));
        }
    }

    fn next_alias(&self, relation: &Relation) -> String {
        format!("{}_{}", relation.name, self.joins.len() + 1)
    }

    /// Join `relation` from `parent`
    pub fn join(
        &mut self,
        parent: &JoinHandle,
        relation: &Relation,
        join_type: JoinType,
    ) -> JoinHandle {
        let alias = self.next_alias(relation);
        let handle = JoinHandle::child(parent, relation, alias.clone());
        self.joins.push(JoinSpec::new(parent, relation, join_type, alias));
        self.register_handle(&handle);
        handle
    }

    /// Join `relation` from `parent` with an ON restriction computed from the new join
    pub fn join_on<F>(
        &mut self,
        parent: &JoinHandle,
        relation: &Relation,
        join_type: JoinType,
        restriction: F,
    ) -> JoinHandle
    where
        F: FnOnce(&JoinHandle) -> Predicate,
    {
        let alias = self.next_alias(relation);
        let handle = JoinHandle::child(parent, relation, alias.clone());
        let spec =
            JoinSpec::new(parent, relation, join_type, alias).restricted(restriction(&handle));
        self.joins.push(spec);
        self.register_handle(&handle);
        handle
    }

    /// Set the projection. A context accepts exactly one projection.
    pub fn set_selections(&mut self, selections: SelectionRegistry<R>) -> Result<&mut Self> {
        if self.selections.is_some() {
            return Err(QueryError::SelectionsAlreadySet);
        }
        self.selections = Some(selections);
        Ok(self)
    }

    pub fn set_predicate(&mut self, predicate: Predicate) -> &mut Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn group_by<I: IntoIterator<Item = Expr>>(&mut self, expressions: I) -> &mut Self {
        self.group_by = expressions.into_iter().collect();
        self
    }

    /// Post-aggregation filter from optional predicates; absent entries are skipped
    pub fn set_having(&mut self, predicates: Vec<Option<Predicate>>) -> &mut Self {
        let present: Vec<Predicate> = predicates.into_iter().flatten().collect();
        self.having = if present.is_empty() {
            None
        } else {
            Some(and(present))
        };
        self
    }

    pub fn set_page(&mut self, page: PageRequest) -> &mut Self {
        self.page = Some(page);
        self
    }

    pub fn order_by(&mut self, clauses: Vec<OrderClause>) -> &mut Self {
        self.order_by.extend(clauses);
        self
    }

    /// Resolve requested sort orders. Registered resolvers win; otherwise the field must
    /// name a root attribute (`locationName`) or a to-one joined attribute path
    /// (`company.name`).
    pub fn order_by_sort(
        &mut self,
        sort: &Sort,
        resolver: &OrderResolver<'_>,
    ) -> Result<&mut Self> {
        for order in sort.iter() {
            let clauses = match resolver.resolve(order) {
                Some(clauses) => clauses,
                None => {
                    let expr = self.attributes.get(&order.field).cloned().ok_or_else(|| {
                        QueryError::UnresolvedSortField {
                            field: order.field.clone(),
                        }
                    })?;
                    vec![OrderClause::from_expr(expr, order.direction)]
                }
            };
            self.order_by.extend(clauses);
        }
        Ok(self)
    }

    /// Validate and freeze the query
    pub fn build(self) -> Result<(QueryPlan, SelectionRegistry<R>)> {
        let selections = self.selections.ok_or(QueryError::NoSelections)?;
        if selections.is_empty() {
            return Err(QueryError::NoSelections);
        }

        let mut plan = QueryPlan {
            root_table: self.root.entity().table,
            root_alias: self.root.alias().to_string(),
            joins: self.joins,
            selections: selections.project_all(),
            column_types: selections.column_types(),
            predicate: self.predicate.map(TypedExpr::into_expr),
            group_by: self.group_by,
            having: self.having.map(TypedExpr::into_expr),
            order_by: self.order_by,
            limit: self.page.as_ref().map(PageRequest::limit),
            offset: self.page.as_ref().map_or(0, PageRequest::offset),
        };

        if let Some(predicate) = &plan.predicate {
            reject_aggregate("WHERE", predicate)?;
        }
        for join in &plan.joins {
            if let Some(restriction) = &join.on_restriction {
                reject_aggregate(&format!("ON {}", join.alias), restriction)?;
            }
        }

        let grouping = GroupingCheck::new(&plan.group_by, &self.primary_keys);
        let grouped = plan.is_grouped();

        // Stable pagination needs a total order; the root key is the tiebreaker.
        let root_key = self.root.column(self.root.entity().primary_key);
        if !plan.order_by.iter().any(|clause| clause.expr == root_key)
            && (!grouped || grouping.covers(&root_key))
        {
            plan.order_by
                .push(OrderClause::from_expr(root_key, SortDirection::Asc));
        }

        if grouped {
            for expr in &plan.selections {
                grouping.check("SELECT", expr)?;
            }
            for clause in &plan.order_by {
                grouping.check("ORDER BY", &clause.expr)?;
            }
            if let Some(having) = &plan.having {
                grouping.check("HAVING", having)?;
            }
        }

        Ok((plan, selections))
    }
}

impl<R: Default> QueryContext<R> {
    /// Build, run the single query against `backend` and fold rows into `R`
    #[instrument(skip_all, fields(root = %self.root.entity().table))]
    pub async fn execute(self, backend: &dyn QueryBackend) -> Result<Page<R>> {
        let started = Instant::now();
        let request = self.page.clone();
        let (plan, selections) = self.build()?;

        debug!(
            joins = plan.joins.len(),
            columns = plan.selections.len(),
            grouped = plan.is_grouped(),
            "Executing composed query"
        );

        let fetched = backend.fetch(&plan).await?;

        let mut items = Vec::with_capacity(fetched.rows.len());
        for raw in fetched.rows {
            let mut row = R::default();
            selections.populate(&mut row, raw)?;
            items.push(row);
        }

        debug!(
            rows = items.len(),
            total = fetched.total,
            duration_ms = started.elapsed().as_millis() as u64,
            "Composed query finished"
        );

        let request = request.unwrap_or_else(|| {
            PageRequest::new(0, u32::try_from(items.len()).unwrap_or(u32::MAX))
        });
        Ok(Page::new(items, fetched.total, &request))
    }
}

fn reject_aggregate(clause: &str, expr: &Expr) -> Result<()> {
    if expr.contains_aggregate() {
        return Err(QueryError::AggregateNotAllowed {
            clause: clause.to_string(),
            expression: expr.to_string(),
        });
    }
    Ok(())
}

/// Which expressions the GROUP BY list makes available outside aggregates
struct GroupingCheck<'a> {
    group_by: &'a [Expr],
    grouped_aliases: HashSet<String>,
}

impl<'a> GroupingCheck<'a> {
    fn new(group_by: &'a [Expr], primary_keys: &HashMap<String, &'static str>) -> Self {
        let grouped_aliases = group_by
            .iter()
            .filter_map(|expr| match expr {
                Expr::Entity { alias, .. } => Some(alias.clone()),
                Expr::Column { alias, column }
                    if primary_keys.get(alias).is_some_and(|pk| pk == column) =>
                {
                    Some(alias.clone())
                }
                _ => None,
            })
            .collect();
        Self {
            group_by,
            grouped_aliases,
        }
    }

    fn covers(&self, expr: &Expr) -> bool {
        let mut missing = Vec::new();
        self.collect_ungrouped(expr, &mut missing);
        missing.is_empty()
    }

    fn check(&self, clause: &str, expr: &Expr) -> Result<()> {
        let mut missing = Vec::new();
        self.collect_ungrouped(expr, &mut missing);
        match missing.into_iter().next() {
            Some(expression) => Err(QueryError::GroupingViolation {
                clause: clause.to_string(),
                expression,
            }),
            None => Ok(()),
        }
    }

    fn collect_ungrouped(&self, expr: &Expr, missing: &mut Vec<String>) {
        if self.group_by.contains(expr) {
            return;
        }
        match expr {
            Expr::Aggregate { .. } | Expr::Literal(_) => {}
            Expr::Column { alias, .. } | Expr::Entity { alias, .. } => {
                if !self.grouped_aliases.contains(alias) {
                    missing.push(expr.to_string());
                }
            }
            Expr::Comparison { lhs, rhs, .. } => {
                self.collect_ungrouped(lhs, missing);
                self.collect_ungrouped(rhs, missing);
            }
            Expr::Membership { expr, .. }
            | Expr::PatternMatch { expr, .. }
            | Expr::Cast { expr, .. } => self.collect_ungrouped(expr, missing),
            Expr::IsNull(inner) | Expr::Negation(inner) => self.collect_ungrouped(inner, missing),
            Expr::Conjunction(items) | Expr::Disjunction(items) => {
                for item in items {
                    self.collect_ungrouped(item, missing);
                }
            }
        }
    }
}
