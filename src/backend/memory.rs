//! # In-Memory Backend
//!
//! Evaluates a [`QueryPlan`] over tables held in memory, following SQL semantics:
//! three-valued logic, inner and left joins with ON restrictions, grouping, aggregates
//! with FILTER and ORDER BY, HAVING, explicit null placement and LIMIT/OFFSET.
//!
//! Entities are projected the way `to_jsonb(row)` would project them: a JSON object of
//! every column, or NULL when an outer join found no row.

use super::{FetchedRows, QueryBackend};
use crate::error::{QueryError, Result};
use crate::query_builder::context::QueryPlan;
use crate::query_builder::expression::{AggregateFn, Expr, SqlType, Value};
use crate::query_builder::joins::JoinType;
use crate::query_builder::ordering::{NullPlacement, SortDirection};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// One stored row, column name to value
pub type Record = BTreeMap<String, Value>;

/// Alias to the row bound to it; `None` for an unmatched outer join
type Scope<'a> = HashMap<&'a str, Option<&'a Record>>;

#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    tables: HashMap<String, Vec<Record>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row built from `(column, value)` pairs
    pub fn insert<I, K, V>(&mut self, table: &str, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let record: Record = columns
            .into_iter()
            .map(|(column, value)| (column.into(), value.into()))
            .collect();
        self.tables.entry(table.to_string()).or_default().push(record);
        self
    }

    pub fn table(&self, name: &str) -> &[Record] {
        self.tables.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Evaluate synchronously
    pub fn evaluate(&self, plan: &QueryPlan) -> Result<FetchedRows> {
        let rows = self.joined_rows(plan)?;

        let mut filtered = Vec::with_capacity(rows.len());
        for row in rows {
            let keep = match &plan.predicate {
                Some(predicate) => is_true(&eval(predicate, std::slice::from_ref(&row))?),
                None => true,
            };
            if keep {
                filtered.push(row);
            }
        }

        let mut groups = if plan.is_grouped() {
            group_rows(plan, filtered)?
        } else {
            filtered.into_iter().map(|row| vec![row]).collect()
        };

        if let Some(having) = &plan.having {
            let mut kept = Vec::with_capacity(groups.len());
            for group in groups {
                if is_true(&eval(having, &group)?) {
                    kept.push(group);
                }
            }
            groups = kept;
        }

        let mut keyed = Vec::with_capacity(groups.len());
        for group in groups {
            let keys = plan
                .order_by
                .iter()
                .map(|clause| eval(&clause.expr, &group))
                .collect::<Result<Vec<_>>>()?;
            keyed.push((keys, group));
        }
        keyed.sort_by(|(a, _), (b, _)| {
            plan.order_by
                .iter()
                .zip(a.iter().zip(b.iter()))
                .map(|(clause, (a, b))| compare_for_order(a, b, clause.direction, clause.nulls))
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        let total = keyed.len() as u64;
        let offset = usize::try_from(plan.offset).unwrap_or(usize::MAX);
        let limit = plan
            .limit
            .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));

        let rows = keyed
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, group)| {
                plan.selections
                    .iter()
                    .map(|expr| eval(expr, &group))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(FetchedRows { rows, total })
    }

    fn joined_rows<'a>(&'a self, plan: &'a QueryPlan) -> Result<Vec<Scope<'a>>> {
        let mut rows: Vec<Scope<'a>> = self
            .table(plan.root_table)
            .iter()
            .map(|record| {
                let mut scope = Scope::new();
                scope.insert(plan.root_alias.as_str(), Some(record));
                scope
            })
            .collect();

        for join in &plan.joins {
            let children = self.table(join.table);
            let mut next = Vec::with_capacity(rows.len());

            for row in rows {
                let parent_key = row
                    .get(join.parent_alias.as_str())
                    .copied()
                    .flatten()
                    .and_then(|parent| parent.get(join.parent_column))
                    .filter(|key| !key.is_null());

                let mut matched = false;
                if let Some(key) = parent_key {
                    for child in children {
                        let same_key = child
                            .get(join.child_column)
                            .and_then(|value| value.sql_cmp(key))
                            == Some(Ordering::Equal);
                        if !same_key {
                            continue;
                        }

                        let mut candidate = row.clone();
                        candidate.insert(join.alias.as_str(), Some(child));
                        if let Some(restriction) = &join.on_restriction {
                            if !is_true(&eval(restriction, std::slice::from_ref(&candidate))?) {
                                continue;
                            }
                        }
                        matched = true;
                        next.push(candidate);
                    }
                }

                if !matched && join.join_type == JoinType::Left {
                    let mut unmatched = row;
                    unmatched.insert(join.alias.as_str(), None);
                    next.push(unmatched);
                }
            }

            rows = next;
        }

        Ok(rows)
    }
}

#[async_trait]
impl QueryBackend for InMemoryBackend {
    async fn fetch(&self, plan: &QueryPlan) -> Result<FetchedRows> {
        self.evaluate(plan)
    }
}

fn group_rows<'a>(plan: &QueryPlan, rows: Vec<Scope<'a>>) -> Result<Vec<Vec<Scope<'a>>>> {
    let mut keys: Vec<Vec<Value>> = Vec::new();
    let mut groups: Vec<Vec<Scope<'a>>> = Vec::new();

    for row in rows {
        let key = plan
            .group_by
            .iter()
            .map(|expr| group_key(expr, &row))
            .collect::<Result<Vec<_>>>()?;
        match keys.iter().position(|existing| *existing == key) {
            Some(index) => groups[index].push(row),
            None => {
                keys.push(key);
                groups.push(vec![row]);
            }
        }
    }

    // Aggregating without GROUP BY always yields one row
    if groups.is_empty() && plan.group_by.is_empty() {
        groups.push(Vec::new());
    }

    Ok(groups)
}

fn group_key(expr: &Expr, row: &Scope<'_>) -> Result<Value> {
    match expr {
        Expr::Entity { alias, primary_key } => Ok(column(row, alias, primary_key)),
        other => eval(other, std::slice::from_ref(row)),
    }
}

fn column(row: &Scope<'_>, alias: &str, name: &str) -> Value {
    row.get(alias)
        .copied()
        .flatten()
        .and_then(|record| record.get(name))
        .cloned()
        .unwrap_or(Value::Null)
}

fn is_true(value: &Value) -> bool {
    value.as_bool() == Some(true)
}

fn not_boolean(value: &Value) -> QueryError {
    QueryError::Database(format!("expected boolean, got {value}"))
}

/// Evaluate `expr` over a group of rows. Non-aggregate expressions read the first row,
/// which is valid because grouping validation already guarantees they are constant
/// within the group.
fn eval(expr: &Expr, group: &[Scope<'_>]) -> Result<Value> {
    match expr {
        Expr::Column { alias, column: name } => {
            Ok(group.first().map_or(Value::Null, |row| column(row, alias, name)))
        }
        Expr::Entity { alias, .. } => {
            let record = group
                .first()
                .and_then(|row| row.get(alias.as_str()).copied().flatten());
            Ok(match record {
                Some(record) => Value::Json(serde_json::Value::Object(
                    record
                        .iter()
                        .map(|(name, value)| (name.clone(), value.to_json()))
                        .collect(),
                )),
                None => Value::Null,
            })
        }
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Comparison { op, lhs, rhs } => {
            let lhs = eval(lhs, group)?;
            let rhs = eval(rhs, group)?;
            Ok(match lhs.sql_cmp(&rhs) {
                Some(ordering) => Value::Bool(op.holds(ordering)),
                None => Value::Null,
            })
        }
        Expr::Membership { expr, values } => {
            let value = eval(expr, group)?;
            if value.is_null() {
                return Ok(Value::Null);
            }
            if values.iter().any(|candidate| value.sql_cmp(candidate) == Some(Ordering::Equal)) {
                Ok(Value::Bool(true))
            } else if values.iter().any(Value::is_null) {
                Ok(Value::Null)
            } else {
                Ok(Value::Bool(false))
            }
        }
        Expr::PatternMatch { expr, needle } => match eval(expr, group)? {
            Value::Null => Ok(Value::Null),
            Value::Text(text) => Ok(Value::Bool(text.to_lowercase().contains(needle.as_str()))),
            other => Err(QueryError::Database(format!("lower() applied to {other}"))),
        },
        Expr::IsNull(inner) => Ok(Value::Bool(eval(inner, group)?.is_null())),
        Expr::Conjunction(items) => {
            let mut unknown = false;
            for item in items {
                match eval(item, group)? {
                    Value::Bool(false) => return Ok(Value::Bool(false)),
                    Value::Bool(true) => {}
                    Value::Null => unknown = true,
                    other => return Err(not_boolean(&other)),
                }
            }
            Ok(if unknown { Value::Null } else { Value::Bool(true) })
        }
        Expr::Disjunction(items) => {
            let mut unknown = false;
            for item in items {
                match eval(item, group)? {
                    Value::Bool(true) => return Ok(Value::Bool(true)),
                    Value::Bool(false) => {}
                    Value::Null => unknown = true,
                    other => return Err(not_boolean(&other)),
                }
            }
            Ok(if unknown { Value::Null } else { Value::Bool(false) })
        }
        Expr::Negation(inner) => match eval(inner, group)? {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            Value::Null => Ok(Value::Null),
            other => Err(not_boolean(&other)),
        },
        Expr::Aggregate {
            func,
            arg,
            filter,
            order_by,
        } => aggregate(*func, arg, filter.as_deref(), order_by, group),
        Expr::Cast { expr, to } => cast(eval(expr, group)?, *to),
    }
}

fn aggregate(
    func: AggregateFn,
    arg: &Expr,
    filter: Option<&Expr>,
    order_by: &[Expr],
    group: &[Scope<'_>],
) -> Result<Value> {
    let mut contributing: Vec<(Vec<Value>, Value)> = Vec::new();
    for row in group {
        let single = std::slice::from_ref(row);
        if let Some(filter) = filter {
            if !is_true(&eval(filter, single)?) {
                continue;
            }
        }
        let keys = order_by
            .iter()
            .map(|key| eval(key, single))
            .collect::<Result<Vec<_>>>()?;
        contributing.push((keys, eval(arg, single)?));
    }

    match func {
        AggregateFn::ArrayAgg => {
            if contributing.is_empty() {
                return Ok(Value::Null);
            }
            contributing.sort_by(|(a, _), (b, _)| {
                a.iter()
                    .zip(b.iter())
                    .map(|(a, b)| compare_for_order(a, b, SortDirection::Asc, NullPlacement::Last))
                    .find(|ordering| *ordering != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
            Ok(Value::Array(contributing.into_iter().map(|(_, value)| value).collect()))
        }
        AggregateFn::Sum => {
            let mut sum: Option<i64> = None;
            for (_, value) in contributing {
                match value {
                    Value::Null => {}
                    Value::Int(i) => {
                        let total = sum.unwrap_or(0).checked_add(i).ok_or_else(|| {
                            QueryError::Database("bigint out of range in sum()".to_string())
                        })?;
                        sum = Some(total);
                    }
                    other => return Err(QueryError::Database(format!("sum() over {other}"))),
                }
            }
            Ok(sum.map_or(Value::Null, Value::Int))
        }
        AggregateFn::Count => {
            let count = contributing.iter().filter(|(_, value)| !value.is_null()).count();
            i64::try_from(count)
                .map(Value::Int)
                .map_err(|_| QueryError::Database("bigint out of range in count()".to_string()))
        }
    }
}

fn cast(value: Value, to: SqlType) -> Result<Value> {
    let cast = match (value, to) {
        (Value::Null, _) => Value::Null,
        (Value::Bool(b), SqlType::Integer | SqlType::BigInt) => Value::Int(i64::from(b)),
        (Value::Int(i), SqlType::Integer | SqlType::BigInt) => Value::Int(i),
        (Value::Int(i), SqlType::Bool) => Value::Bool(i != 0),
        (Value::Text(s), SqlType::Integer | SqlType::BigInt) => s
            .trim()
            .parse()
            .map(Value::Int)
            .map_err(|e| QueryError::Database(format!("invalid integer '{s}': {e}")))?,
        (Value::Text(s), SqlType::Text) => Value::Text(s),
        (Value::Int(i), SqlType::Text) => Value::Text(i.to_string()),
        (Value::Bool(b), SqlType::Text) => Value::Text(b.to_string()),
        (Value::Bool(b), SqlType::Bool) => Value::Bool(b),
        (Value::Timestamp(ts), SqlType::Timestamp) => Value::Timestamp(ts),
        (Value::Json(v), SqlType::Jsonb) => Value::Json(v),
        (value, to) => {
            return Err(QueryError::Database(format!(
                "cannot cast {value} to {}",
                to.sql_name()
            )))
        }
    };
    Ok(cast)
}

/// Order two values under a direction and an explicit null placement
fn compare_for_order(
    a: &Value,
    b: &Value,
    direction: SortDirection,
    nulls: NullPlacement,
) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => match nulls {
            NullPlacement::First => Ordering::Less,
            NullPlacement::Last => Ordering::Greater,
        },
        (false, true) => match nulls {
            NullPlacement::First => Ordering::Greater,
            NullPlacement::Last => Ordering::Less,
        },
        (false, false) => {
            let ordering = a.sql_cmp(b).unwrap_or(Ordering::Equal);
            if direction.is_descending() {
                ordering.reverse()
            } else {
                ordering
            }
        }
    }
}
