//! Error types for query composition and execution.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("Selections already set for this query context")]
    SelectionsAlreadySet,
    #[error("Query context has no selections")]
    NoSelections,
    #[error("Unresolved sort field: {field}")]
    UnresolvedSortField { field: String },
    #[error("Grouping violation in {clause}: {expression} is neither grouped nor aggregated")]
    GroupingViolation { clause: String, expression: String },
    #[error("Aggregate not allowed in {clause}: {expression}")]
    AggregateNotAllowed { clause: String, expression: String },
    #[error("Column count mismatch: expected {expected}, got {actual}")]
    ColumnCountMismatch { expected: usize, actual: usize },
    #[error("Decode error in column {column}: {reason}")]
    Decode { column: usize, reason: String },
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Timeout error: {0}")]
    Timeout(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for QueryError {
    fn from(err: sqlx::Error) -> Self {
        QueryError::Database(err.to_string())
    }
}

impl From<config::ConfigError> for QueryError {
    fn from(err: config::ConfigError) -> Self {
        QueryError::Configuration(err.to_string())
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
