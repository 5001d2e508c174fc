#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Query Composer
//!
//! Dynamic query composition for filtered, paginated listings over relational data.
//!
//! ## Overview
//!
//! A caller describes at request time an arbitrary combination of optional filters,
//! joined sub-entities, array-aggregated child collections, custom sort keys and
//! post-aggregation conditions. The engine turns that description into one well-formed
//! query and folds the result rows into typed output objects, returning a page plus the
//! total count.
//!
//! ## Module Organization
//!
//! - [`query_builder`] - The composition engine: expressions, predicates, joins,
//!   selections, aggregation, ordering, paging and the query context
//! - [`backend`] - Storage backends (PostgreSQL via SQLx, in-memory evaluator)
//! - [`locations`] - The location distances listing built on the engine
//! - [`config`] - Layered configuration
//! - [`logging`] - Structured logging setup
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use query_composer::backend::PgBackend;
//! use query_composer::config::ComposerConfig;
//! use query_composer::database::DatabaseConnection;
//! use query_composer::locations::{GetLocationsDistances, SearchParams, StaticActiveContracts};
//! use query_composer::query_builder::PageRequest;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ComposerConfig::load()?;
//! let db = DatabaseConnection::new(&config.database).await?;
//! let backend = PgBackend::from_config(db.pool().clone(), &config.query);
//!
//! let feature = GetLocationsDistances::new(backend, StaticActiveContracts::new(vec![1, 2]))
//!     .with_config(config);
//! let search = SearchParams::new().with("cropLocation", ["true"]);
//! let page = feature.get(&search, PageRequest::new(0, 20)).await?;
//! println!("{} of {} locations", page.items.len(), page.total);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
#[cfg(feature = "postgres")]
pub mod database;
pub mod error;
pub mod locations;
pub mod logging;
pub mod query_builder;

pub use backend::{FetchedRows, InMemoryBackend, QueryBackend};
pub use config::ComposerConfig;
pub use error::{QueryError, Result};
pub use query_builder::{Page, PageRequest, QueryContext, QueryPlan};
