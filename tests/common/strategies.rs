//! Proptest strategies for search parameters.

use proptest::prelude::*;
use query_composer::locations::SearchParams;

/// Lower-case fragments of names present in the fixture data, plus misses
pub fn name_fragment_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("north".to_string()),
        Just("barn".to_string()),
        Just("e".to_string()),
        Just("acme".to_string()),
        Just("birch".to_string()),
        Just("main".to_string()),
        "[a-z]{1,4}",
    ]
}

pub fn tri_state_strategy() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("true".to_string())),
        Just(Some("false".to_string())),
        "[a-zA-Z]{0,5}".prop_map(Some),
    ]
}

pub fn id_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        (1i64..8).prop_map(|id| id.to_string()),
        "[a-z]{1,3}",
    ]
}

/// A subset of the text and flag filters the listing recognizes
#[derive(Debug, Clone)]
pub struct SearchFilters {
    pub location_name: Option<String>,
    pub company_name: Option<String>,
    pub address: Option<String>,
    pub crop_location: Option<String>,
    pub location_ids: Vec<String>,
}

impl SearchFilters {
    pub fn to_params(&self) -> SearchParams {
        let mut params = SearchParams::new();
        if let Some(name) = &self.location_name {
            params.push("locationName", name.clone());
        }
        if let Some(name) = &self.company_name {
            params.push("companyName", name.clone());
        }
        if let Some(address) = &self.address {
            params.push("address", address.clone());
        }
        if let Some(flag) = &self.crop_location {
            params.push("cropLocation", flag.clone());
        }
        for id in &self.location_ids {
            params.push("locationId", id.clone());
        }
        params
    }
}

pub fn search_filters_strategy() -> impl Strategy<Value = SearchFilters> {
    (
        proptest::option::of(name_fragment_strategy()),
        proptest::option::of(name_fragment_strategy()),
        proptest::option::of(name_fragment_strategy()),
        tri_state_strategy(),
        proptest::collection::vec(id_strategy(), 0..3),
    )
        .prop_map(
            |(location_name, company_name, address, crop_location, location_ids)| SearchFilters {
                location_name,
                company_name,
                address,
                crop_location,
                location_ids,
            },
        )
}
