//! # Distances
//!
//! A location takes part in distances in two directions: as the start
//! (`fromDistances`, paired with the end location) and as the end (`toDistances`,
//! paired with the start location). Each direction is one aggregated child collection
//! producing three aligned arrays per location: the other location's id, its name and
//! the distance in kilometres.

use super::output::LocationDistances;
use super::schema::{
    columns, DISTANCE_FROM_LOCATION, DISTANCE_TO_LOCATION, LOCATION_FROM_DISTANCES,
    LOCATION_TO_DISTANCES,
};
use super::search::{SearchParams, DISTANCES};
use crate::query_builder::aggregate::{ChildCollection, CollectionFilter};
use crate::query_builder::context::QueryContext;
use crate::query_builder::expression::{and, Predicate, TypedExpr};
use crate::query_builder::joins::{JoinHandle, Relation};
use crate::query_builder::ordering::{OrderClause, SortDirection};
use crate::query_builder::selections::Selection;
use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;

/// One distance as exposed to callers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistanceDto {
    pub id: i64,
    pub name: Option<String>,
    pub distance_in_kilometres: Option<i32>,
}

/// The three parallel arrays of one direction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Distances {
    pub location_ids: Option<Vec<i64>>,
    pub location_names: Option<Vec<Option<String>>>,
    pub distances: Option<Vec<Option<i32>>>,
}

impl Distances {
    /// Zip the arrays into entries; nothing when the id array is absent or empty
    pub fn entries(&self) -> Vec<DistanceDto> {
        let Some(ids) = self.location_ids.as_deref().filter(|ids| !ids.is_empty()) else {
            return Vec::new();
        };
        let names = self.location_names.as_deref().unwrap_or_default();
        let metrics = self.distances.as_deref().unwrap_or_default();

        let len = ids.len().min(names.len()).min(metrics.len());
        if len != ids.len() {
            warn!(
                ids = ids.len(),
                names = names.len(),
                distances = metrics.len(),
                "Distance arrays differ in length, truncating"
            );
        }

        (0..len)
            .map(|i| DistanceDto {
                id: ids[i],
                name: names[i].clone(),
                distance_in_kilometres: metrics[i],
            })
            .collect()
    }

    /// Entries of both directions, duplicates removed, sorted by name
    pub fn merged(first: &Distances, second: &Distances) -> Vec<DistanceDto> {
        let mut seen = HashSet::new();
        let mut merged: Vec<DistanceDto> = first
            .entries()
            .into_iter()
            .chain(second.entries())
            .filter(|entry| seen.insert(entry.clone()))
            .collect();
        merged.sort_by(|a, b| a.name.cmp(&b.name));
        merged
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceDirection {
    /// The location is the start; the related location is the end
    From,
    /// The location is the end; the related location is the start
    To,
}

impl DistanceDirection {
    fn relations(self) -> (&'static Relation, &'static Relation) {
        match self {
            DistanceDirection::From => (&LOCATION_FROM_DISTANCES, &DISTANCE_TO_LOCATION),
            DistanceDirection::To => (&LOCATION_TO_DISTANCES, &DISTANCE_FROM_LOCATION),
        }
    }

    fn target(self, row: &mut LocationDistances) -> &mut Distances {
        match self {
            DistanceDirection::From => &mut row.from_distances,
            DistanceDirection::To => &mut row.to_distances,
        }
    }
}

/// One direction's joins and aggregates
#[derive(Debug, Clone)]
pub struct DistancesJoin {
    direction: DistanceDirection,
    collection: ChildCollection,
}

impl DistancesJoin {
    /// Join both directions from the root location
    pub fn join_all(
        context: &mut QueryContext<LocationDistances>,
        root: &JoinHandle,
        search: &SearchParams,
        empty_marker: &str,
    ) -> Vec<DistancesJoin> {
        [DistanceDirection::From, DistanceDirection::To]
            .into_iter()
            .map(|direction| {
                let (collection, related) = direction.relations();
                let filter = CollectionFilter {
                    values: search.get(DISTANCES),
                    column: columns::LOCATION_NAME,
                    mode: search.mode(),
                    empty_marker,
                };
                DistancesJoin {
                    direction,
                    collection: ChildCollection::join(context, root, collection, related, filter),
                }
            })
            .collect()
    }

    pub fn location_ids(&self) -> TypedExpr<Vec<i64>> {
        self.collection.keys()
    }

    /// No distance in this direction
    pub fn is_absent(&self) -> Predicate {
        self.collection.is_absent()
    }

    pub fn selections(&self) -> Vec<Selection<LocationDistances>> {
        let direction = self.direction;
        let names = self
            .collection
            .aggregate(&self.collection.related().get(columns::LOCATION_NAME).nullable());
        let metrics = self.collection.aggregate(
            &self
                .collection
                .collection()
                .get(columns::DISTANCE_IN_KILOMETRES)
                .nullable(),
        );

        vec![
            Selection::of(self.location_ids(), move |row: &mut LocationDistances, value| {
                direction.target(row).location_ids = value
            }),
            Selection::of(names, move |row: &mut LocationDistances, value| {
                direction.target(row).location_names = value
            }),
            Selection::of(metrics, move |row: &mut LocationDistances, value| {
                direction.target(row).distances = value
            }),
        ]
    }

    /// Both directions without any distance
    pub fn all_absent(joins: &[DistancesJoin]) -> Predicate {
        and(joins.iter().map(DistancesJoin::is_absent))
    }

    /// Name match over every direction, only in free-text mode
    pub fn location_name_predicate(joins: &[DistancesJoin]) -> Option<Predicate> {
        let collections: Vec<ChildCollection> =
            joins.iter().map(|join| join.collection.clone()).collect();
        ChildCollection::free_text_predicate(&collections)
    }

    /// One clause per direction over the id arrays; groups without distances come first
    /// descending and last ascending
    pub fn order_clauses(joins: &[DistancesJoin], direction: SortDirection) -> Vec<OrderClause> {
        joins
            .iter()
            .map(|join| OrderClause::new(&join.location_ids(), direction))
            .collect()
    }
}
