//! PostgreSQL backend over a sqlx connection pool.
//!
//! One statement per call: the page and its total come back together through
//! `COUNT(*) OVER ()`. Only when the page is empty and lies past the first row is the
//! total fetched with a separate count statement, since an empty page carries no window
//! value.

use super::{FetchedRows, QueryBackend};
use crate::config::QueryConfig;
use crate::error::{QueryError, Result};
use crate::query_builder::context::QueryPlan;
use crate::query_builder::expression::{SqlType, Value};
use crate::query_builder::render::{render_count, render_select, BindValue, Statement};
use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct PgBackend {
    pool: PgPool,
    statement_timeout: Duration,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
        }
    }

    pub fn from_config(pool: PgPool, config: &QueryConfig) -> Self {
        Self::new(pool).with_statement_timeout(config.statement_timeout())
    }

    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn run(&self, plan: &QueryPlan) -> Result<FetchedRows> {
        let Statement { sql, binds } = render_select(plan, true);
        debug!(sql = %sql, binds = binds.len(), "Rendered composed query");

        let rows = bind_all(sqlx::query(&sql), binds)
            .fetch_all(&self.pool)
            .await?;

        let total_index = plan.selections.len();
        let total = match rows.first() {
            Some(row) => {
                let total: i64 = row.try_get(total_index)?;
                u64::try_from(total).unwrap_or_default()
            }
            None if plan.offset > 0 => self.count(plan).await?,
            None => 0,
        };

        let decoded = rows
            .iter()
            .map(|row| decode_row(row, &plan.column_types))
            .collect::<Result<Vec<_>>>()?;

        Ok(FetchedRows {
            rows: decoded,
            total,
        })
    }

    async fn count(&self, plan: &QueryPlan) -> Result<u64> {
        let Statement { sql, binds } = render_count(plan);
        debug!(sql = %sql, "Page past the end, counting separately");

        let row = bind_all(sqlx::query(&sql), binds)
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = row.try_get(0)?;
        Ok(u64::try_from(total).unwrap_or_default())
    }
}

#[async_trait]
impl QueryBackend for PgBackend {
    async fn fetch(&self, plan: &QueryPlan) -> Result<FetchedRows> {
        let started = Instant::now();
        match tokio::time::timeout(self.statement_timeout, self.run(plan)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    timeout_ms = self.statement_timeout.as_millis() as u64,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    root = plan.root_table,
                    "Composed query exceeded its deadline"
                );
                Err(QueryError::Timeout(format!(
                    "query on {} exceeded {}ms",
                    plan.root_table,
                    self.statement_timeout.as_millis()
                )))
            }
        }
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    binds: Vec<BindValue>,
) -> Query<'q, Postgres, PgArguments> {
    for bind in binds {
        query = match bind {
            BindValue::Bool(v) => query.bind(v),
            BindValue::Int(v) => query.bind(v),
            BindValue::Text(v) => query.bind(v),
            BindValue::Timestamp(v) => query.bind(v),
            BindValue::Json(v) => query.bind(v),
            BindValue::BoolArray(v) => query.bind(v),
            BindValue::IntArray(v) => query.bind(v),
            BindValue::TextArray(v) => query.bind(v),
            BindValue::TimestampArray(v) => query.bind(v),
        };
    }
    query
}

fn decode_row(row: &PgRow, column_types: &[SqlType]) -> Result<Vec<Value>> {
    column_types
        .iter()
        .enumerate()
        .map(|(index, sql_type)| {
            decode_column(row, index, *sql_type).map_err(|e| QueryError::Decode {
                column: index,
                reason: e.to_string(),
            })
        })
        .collect()
}

fn array<T>(values: Option<Vec<Option<T>>>, element: impl Fn(T) -> Value) -> Value {
    match values {
        Some(values) => Value::Array(
            values
                .into_iter()
                .map(|value| value.map_or(Value::Null, &element))
                .collect(),
        ),
        None => Value::Null,
    }
}

fn decode_column(
    row: &PgRow,
    index: usize,
    sql_type: SqlType,
) -> std::result::Result<Value, sqlx::Error> {
    let value = match sql_type {
        SqlType::Bool => row.try_get::<Option<bool>, _>(index)?.map_or(Value::Null, Value::Bool),
        SqlType::Integer => row
            .try_get::<Option<i32>, _>(index)?
            .map_or(Value::Null, |v| Value::Int(i64::from(v))),
        SqlType::BigInt => row.try_get::<Option<i64>, _>(index)?.map_or(Value::Null, Value::Int),
        SqlType::Text => row.try_get::<Option<String>, _>(index)?.map_or(Value::Null, Value::Text),
        SqlType::Timestamp => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)?
            .map_or(Value::Null, Value::Timestamp),
        SqlType::Jsonb => row
            .try_get::<Option<serde_json::Value>, _>(index)?
            .map_or(Value::Null, Value::Json),
        SqlType::BoolArray => {
            array(row.try_get::<Option<Vec<Option<bool>>>, _>(index)?, Value::Bool)
        }
        SqlType::IntegerArray => array(row.try_get::<Option<Vec<Option<i32>>>, _>(index)?, |v| {
            Value::Int(i64::from(v))
        }),
        SqlType::BigIntArray => {
            array(row.try_get::<Option<Vec<Option<i64>>>, _>(index)?, Value::Int)
        }
        SqlType::TextArray => {
            array(row.try_get::<Option<Vec<Option<String>>>, _>(index)?, Value::Text)
        }
    };
    Ok(value)
}
