//! # Storage Backends
//!
//! A backend receives a validated [`QueryPlan`] and returns raw rows, one [`Value`] per
//! selection, plus the total number of matching rows or groups. The query engine never
//! sees anything backend-specific beyond this trait.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use crate::error::Result;
use crate::query_builder::context::QueryPlan;
use crate::query_builder::expression::Value;
use async_trait::async_trait;

pub use memory::{InMemoryBackend, Record};
#[cfg(feature = "postgres")]
pub use postgres::PgBackend;

/// Raw result of one composed query
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FetchedRows {
    /// Rows of the requested page; `rows[i][j]` is the value of selection `j`
    pub rows: Vec<Vec<Value>>,
    /// Matching rows (or groups) before LIMIT/OFFSET
    pub total: u64,
}

/// Executes query plans
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Run the plan as a single query
    async fn fetch(&self, plan: &QueryPlan) -> Result<FetchedRows>;
}
