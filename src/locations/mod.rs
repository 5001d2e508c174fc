//! # Location Distances Listing
//!
//! Lists active locations with their address, company, customer managers, distances to
//! other locations in both directions, an active-contract flag and detected problems.
//! The listing is one composed query: joins, aggregated distance arrays, search filters,
//! HAVING filters over aggregates and custom sort keys.

pub mod contracts;
pub mod distances;
pub mod feature;
pub mod output;
pub mod schema;
pub mod search;

pub use contracts::{ActiveContractSource, StaticActiveContracts};
pub use distances::{DistanceDirection, DistanceDto, Distances, DistancesJoin};
pub use feature::{compose, render, GetLocationsDistances};
pub use output::{LocationDistances, LocationDistancesView, Problem};
pub use search::SearchParams;
