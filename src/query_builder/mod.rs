//! # Query Builder System
//!
//! Declarative composition of one SQL SELECT per call: joins (optionally restricted in
//! their ON clause), typed selections bound to setters, WHERE predicates, grouping with
//! array aggregates over child collections, HAVING, resolved ordering and pagination.
//!
//! ## Key Components
//!
//! - [`expression`] - Backend-neutral expression tree and typed wrappers
//! - [`conditions`] - Predicate builder and search-parameter helpers
//! - [`joins`] - Entity metadata and join records
//! - [`selections`] - Selection registry that maps result columns onto output rows
//! - [`aggregate`] - Aligned array aggregates over child collections
//! - [`ordering`] - Sort keys, order resolvers and null placement
//! - [`pagination`] - Page requests and result pages
//! - [`context`] - Per-call query context and the validated [`QueryPlan`]
//! - [`render`] - PostgreSQL SQL generation with positional parameters
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use query_composer::query_builder::{QueryContext, PageRequest};
//!
//! let mut context = QueryContext::<LocationRow>::new(&LOCATION);
//! let root = context.root().clone();
//! let company = context.join(&root, &LOCATION_COMPANY, JoinType::Inner);
//! context.set_selections(selections)?;
//! context.set_predicate(company.get(STATUS_CODE).is_in(["NORMAL".to_string()]));
//! context.set_page(PageRequest::new(0, 20));
//! let page = context.execute(&backend).await?;
//! ```

pub mod aggregate;
pub mod conditions;
pub mod context;
pub mod expression;
pub mod joins;
pub mod ordering;
pub mod pagination;
pub mod render;
pub mod selections;

pub use aggregate::{array_agg, array_agg_aligned, ChildCollection, CollectionFilter};
pub use conditions::{DateRange, PredicateBuilder, SearchMode};
pub use context::{QueryContext, QueryPlan};
pub use expression::{
    always_false, always_true, and, literal, or, CompareOp, Expr, FromValue, Json, Predicate,
    SqlType, TypedExpr, Value,
};
pub use joins::{Attribute, Cardinality, Entity, JoinHandle, JoinSpec, JoinType, Relation};
pub use ordering::{NullPlacement, OrderClause, OrderResolver, Sort, SortDirection, SortOrder};
pub use pagination::{Page, PageRequest};
pub use render::{render_count, render_select, BindValue, Statement};
pub use selections::{Selection, SelectionRegistry, TypedSelection};
