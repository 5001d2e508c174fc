//! Table metadata and row types for the location listing.
//!
//! Row types deserialize from the JSON form of a whole row (`to_jsonb`), so their field
//! names are column names. They serialize in camelCase for API output.

use crate::query_builder::joins::{Attribute, Cardinality, Entity, Relation};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const COMPANY_STATUS_NORMAL: &str = "NORMAL";
pub const COMPANY_STATUS_REVIEW_REQUIRED: &str = "REVIEW_REQUIRED";
pub const LOCATION_STATUS_ACTIVE: &str = "ACTIVE";

pub static LOCATION: Entity = Entity {
    name: "location",
    table: "locations",
    primary_key: "id",
    attributes: &[
        ("id", "id"),
        ("locationName", "location_name"),
        ("cropLocation", "crop_location"),
        ("status", "status_code"),
        ("dateCreated", "date_created"),
        ("dateModified", "date_modified"),
    ],
};

pub static ADDRESS: Entity = Entity {
    name: "address",
    table: "addresses",
    primary_key: "id",
    attributes: &[("id", "id"), ("formattedAddress", "formatted_address")],
};

pub static COMPANY: Entity = Entity {
    name: "company",
    table: "companies",
    primary_key: "id",
    attributes: &[("id", "id"), ("name", "name"), ("status", "status_code")],
};

pub static REPRESENTATIVE: Entity = Entity {
    name: "representative",
    table: "representatives",
    primary_key: "id",
    attributes: &[("id", "id")],
};

pub static PERSON: Entity = Entity {
    name: "person",
    table: "persons",
    primary_key: "id",
    attributes: &[("id", "id"), ("name", "name")],
};

pub static DISTANCE: Entity = Entity {
    name: "distance",
    table: "distances",
    primary_key: "id",
    attributes: &[("id", "id"), ("distanceInKilometres", "distance_in_kilometres")],
};

pub static LOCATION_ADDRESS: Relation = Relation {
    name: "address",
    target: &ADDRESS,
    parent_column: "address_id",
    child_column: "id",
    cardinality: Cardinality::ToOne,
};

pub static LOCATION_COMPANY: Relation = Relation {
    name: "company",
    target: &COMPANY,
    parent_column: "company_id",
    child_column: "id",
    cardinality: Cardinality::ToOne,
};

pub static COMPANY_CUSTOMER_MANAGER: Relation = Relation {
    name: "customerManager",
    target: &REPRESENTATIVE,
    parent_column: "customer_manager_id",
    child_column: "id",
    cardinality: Cardinality::ToOne,
};

pub static COMPANY_CUSTOMER_MANAGERS: Relation = Relation {
    name: "customerManagers",
    target: &REPRESENTATIVE,
    parent_column: "id",
    child_column: "company_id",
    cardinality: Cardinality::ToMany,
};

pub static REPRESENTATIVE_PERSON: Relation = Relation {
    name: "person",
    target: &PERSON,
    parent_column: "person_id",
    child_column: "id",
    cardinality: Cardinality::ToOne,
};

pub static COMPANY_LOCATIONS: Relation = Relation {
    name: "locations",
    target: &LOCATION,
    parent_column: "id",
    child_column: "company_id",
    cardinality: Cardinality::ToMany,
};

/// Distances starting at a location
pub static LOCATION_FROM_DISTANCES: Relation = Relation {
    name: "fromDistances",
    target: &DISTANCE,
    parent_column: "id",
    child_column: "from_location_id",
    cardinality: Cardinality::ToMany,
};

/// Distances ending at a location
pub static LOCATION_TO_DISTANCES: Relation = Relation {
    name: "toDistances",
    target: &DISTANCE,
    parent_column: "id",
    child_column: "to_location_id",
    cardinality: Cardinality::ToMany,
};

pub static DISTANCE_TO_LOCATION: Relation = Relation {
    name: "toLocation",
    target: &LOCATION,
    parent_column: "to_location_id",
    child_column: "id",
    cardinality: Cardinality::ToOne,
};

pub static DISTANCE_FROM_LOCATION: Relation = Relation {
    name: "fromLocation",
    target: &LOCATION,
    parent_column: "from_location_id",
    child_column: "id",
    cardinality: Cardinality::ToOne,
};

pub mod columns {
    use super::*;

    pub const ID: Attribute<i64> = Attribute::new("id");
    pub const LOCATION_NAME: Attribute<String> = Attribute::new("location_name");
    pub const CROP_LOCATION: Attribute<bool> = Attribute::new("crop_location");
    pub const STATUS_CODE: Attribute<String> = Attribute::new("status_code");
    pub const DATE_CREATED: Attribute<NaiveDateTime> = Attribute::new("date_created");
    pub const DATE_MODIFIED: Attribute<NaiveDateTime> = Attribute::new("date_modified");
    pub const FORMATTED_ADDRESS: Attribute<String> = Attribute::new("formatted_address");
    pub const NAME: Attribute<String> = Attribute::new("name");
    pub const DISTANCE_IN_KILOMETRES: Attribute<i32> = Attribute::new("distance_in_kilometres");
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Location {
    pub id: i64,
    pub location_name: Option<String>,
    pub crop_location: Option<bool>,
    pub status_code: Option<String>,
    pub address_id: Option<i64>,
    pub company_id: Option<i64>,
    pub date_created: Option<NaiveDateTime>,
    pub date_modified: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Address {
    pub id: i64,
    pub formatted_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Company {
    pub id: i64,
    pub name: Option<String>,
    pub status_code: Option<String>,
    pub customer_manager_id: Option<i64>,
}
