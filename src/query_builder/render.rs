//! # PostgreSQL Rendering
//!
//! Turns a [`QueryPlan`] into SQL text with positional `$n` parameters. Literal values
//! are always bound, never inlined, except booleans, NULL and LIMIT/OFFSET.
//!
//! Notable translations:
//! - whole entities become `CASE WHEN a.pk IS NULL THEN NULL ELSE to_jsonb(a.*) END`
//!   so an unmatched outer join yields NULL instead of an object of NULLs;
//!   grouping by an entity groups by its primary key
//! - membership becomes `= ANY($n)` with one array parameter; an empty list is `FALSE`
//! - case-insensitive matches become `lower(x) LIKE $n ESCAPE '\'` with `%`, `_` and `\`
//!   in the needle escaped
//! - the total count rides along as `COUNT(*) OVER ()` so a page and its total come
//!   from one statement

use super::context::QueryPlan;
use super::expression::{Expr, Value};
use chrono::NaiveDateTime;

/// Parameter value for a rendered statement
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Bool(bool),
    Int(i64),
    Text(String),
    Timestamp(NaiveDateTime),
    Json(serde_json::Value),
    BoolArray(Vec<bool>),
    IntArray(Vec<i64>),
    TextArray(Vec<String>),
    TimestampArray(Vec<NaiveDateTime>),
}

/// SQL text plus its parameters in `$n` order
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub binds: Vec<BindValue>,
}

/// Column alias of the window count appended by [`render_select`]
pub const TOTAL_COUNT_COLUMN: &str = "total_count";

#[derive(Default)]
struct SqlWriter {
    binds: Vec<BindValue>,
}

impl SqlWriter {
    fn push_bind(&mut self, value: BindValue) -> String {
        self.binds.push(value);
        format!("${}", self.binds.len())
    }

    fn literal(&mut self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::Int(i) => self.push_bind(BindValue::Int(*i)),
            Value::Text(s) => self.push_bind(BindValue::Text(s.clone())),
            Value::Timestamp(ts) => self.push_bind(BindValue::Timestamp(*ts)),
            Value::Json(v) => self.push_bind(BindValue::Json(v.clone())),
            Value::Array(items) => match array_bind(items) {
                Some(bind) => self.push_bind(bind),
                None => {
                    let parts: Vec<String> = items.iter().map(|item| self.literal(item)).collect();
                    format!("ARRAY[{}]", parts.join(", "))
                }
            },
        }
    }

    fn expr(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Column { alias, column } => format!("{alias}.{column}"),
            Expr::Entity { alias, primary_key } => format!(
                "CASE WHEN {alias}.{primary_key} IS NULL THEN NULL ELSE to_jsonb({alias}.*) END"
            ),
            Expr::Literal(value) => self.literal(value),
            Expr::Comparison { op, lhs, rhs } => {
                let lhs = self.expr(lhs);
                let rhs = self.expr(rhs);
                format!("({lhs} {} {rhs})", op.to_sql())
            }
            Expr::Membership { values, .. } if values.is_empty() => "FALSE".to_string(),
            Expr::Membership { expr, values } => {
                let target = self.expr(expr);
                match array_bind(values) {
                    Some(bind) => format!("({target} = ANY({}))", self.push_bind(bind)),
                    None => {
                        let parts: Vec<String> =
                            values.iter().map(|value| self.literal(value)).collect();
                        format!("({target} IN ({}))", parts.join(", "))
                    }
                }
            }
            Expr::PatternMatch { expr, needle } => {
                let target = self.expr(expr);
                let pattern = self.push_bind(BindValue::Text(format!("%{}%", escape_like(needle))));
                format!("(lower({target}) LIKE {pattern} ESCAPE '\\')")
            }
            Expr::IsNull(inner) => format!("({} IS NULL)", self.expr(inner)),
            Expr::Conjunction(items) if items.is_empty() => "TRUE".to_string(),
            Expr::Conjunction(items) => self.joined(items, " AND "),
            Expr::Disjunction(items) if items.is_empty() => "FALSE".to_string(),
            Expr::Disjunction(items) => self.joined(items, " OR "),
            Expr::Negation(inner) => format!("(NOT {})", self.expr(inner)),
            Expr::Aggregate {
                func,
                arg,
                filter,
                order_by,
            } => {
                let mut sql = format!("{}({}", func.name(), self.expr(arg));
                if !order_by.is_empty() {
                    let keys: Vec<String> = order_by.iter().map(|key| self.expr(key)).collect();
                    sql.push_str(" ORDER BY ");
                    sql.push_str(&keys.join(", "));
                }
                sql.push(')');
                if let Some(filter) = filter {
                    sql.push_str(&format!(" FILTER (WHERE {})", self.expr(filter)));
                }
                sql
            }
            Expr::Cast { expr, to } => format!("CAST({} AS {})", self.expr(expr), to.sql_name()),
        }
    }

    fn joined(&mut self, items: &[Expr], separator: &str) -> String {
        let parts: Vec<String> = items.iter().map(|item| self.expr(item)).collect();
        format!("({})", parts.join(separator))
    }

    fn group_key(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Entity { alias, primary_key } => format!("{alias}.{primary_key}"),
            other => self.expr(other),
        }
    }

    /// FROM .. JOIN .. WHERE .. GROUP BY .. HAVING
    fn body(&mut self, plan: &QueryPlan) -> String {
        let mut sql = format!(" FROM {} {}", plan.root_table, plan.root_alias);

        for join in &plan.joins {
            sql.push_str(&format!(
                " {} {} {} ON {}",
                join.join_type.to_sql(),
                join.table,
                join.alias,
                join.key_condition_sql()
            ));
            if let Some(restriction) = &join.on_restriction {
                sql.push_str(&format!(" AND {}", self.expr(restriction)));
            }
        }

        if let Some(predicate) = &plan.predicate {
            sql.push_str(&format!(" WHERE {}", self.expr(predicate)));
        }

        if !plan.group_by.is_empty() {
            let keys: Vec<String> = plan.group_by.iter().map(|key| self.group_key(key)).collect();
            sql.push_str(&format!(" GROUP BY {}", keys.join(", ")));
        }

        if let Some(having) = &plan.having {
            sql.push_str(&format!(" HAVING {}", self.expr(having)));
        }

        sql
    }

    fn finish(self, sql: String) -> Statement {
        Statement {
            sql,
            binds: self.binds,
        }
    }
}

/// Bind a homogeneous non-null list as one array parameter
fn array_bind(values: &[Value]) -> Option<BindValue> {
    fn collect<T>(values: &[Value], pick: impl Fn(&Value) -> Option<T>) -> Option<Vec<T>> {
        values.iter().map(pick).collect()
    }

    match values.first()? {
        Value::Bool(_) => collect(values, Value::as_bool).map(BindValue::BoolArray),
        Value::Int(_) => collect(values, |v| match v {
            Value::Int(i) => Some(*i),
            _ => None,
        })
        .map(BindValue::IntArray),
        Value::Text(_) => collect(values, |v| match v {
            Value::Text(s) => Some(s.clone()),
            _ => None,
        })
        .map(BindValue::TextArray),
        Value::Timestamp(_) => collect(values, |v| match v {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        })
        .map(BindValue::TimestampArray),
        _ => None,
    }
}

/// Escape LIKE metacharacters so the needle matches literally
pub fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// The page query. With `with_total` a `COUNT(*) OVER ()` column is appended after the
/// selections; it is evaluated before LIMIT/OFFSET and so counts every matching row (or
/// group).
pub fn render_select(plan: &QueryPlan, with_total: bool) -> Statement {
    let mut writer = SqlWriter::default();

    let mut columns: Vec<String> = plan.selections.iter().map(|expr| writer.expr(expr)).collect();
    if with_total {
        columns.push(format!("COUNT(*) OVER () AS {TOTAL_COUNT_COLUMN}"));
    }

    let mut sql = format!("SELECT {}", columns.join(", "));
    sql.push_str(&writer.body(plan));

    if !plan.order_by.is_empty() {
        let clauses: Vec<String> = plan
            .order_by
            .iter()
            .map(|clause| {
                format!(
                    "{} {} {}",
                    writer.expr(&clause.expr),
                    clause.direction.to_sql(),
                    clause.nulls.to_sql()
                )
            })
            .collect();
        sql.push_str(&format!(" ORDER BY {}", clauses.join(", ")));
    }

    if let Some(limit) = plan.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    if plan.offset > 0 {
        sql.push_str(&format!(" OFFSET {}", plan.offset));
    }

    writer.finish(sql)
}

/// Number of rows (or groups) the page query would return without LIMIT/OFFSET
pub fn render_count(plan: &QueryPlan) -> Statement {
    let mut writer = SqlWriter::default();
    let body = writer.body(plan);
    let sql = format!("SELECT COUNT(*) FROM (SELECT 1{body}) AS matched");
    writer.finish(sql)
}
