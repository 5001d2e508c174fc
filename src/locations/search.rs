//! Multi-valued search parameters.

use crate::query_builder::conditions::{parse_tri_state, try_get_long, SearchMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const LOCATION_ID: &str = "locationId";
pub const COMPANY_ID: &str = "companyId";
pub const LOCATION_NAME: &str = "locationName";
pub const COMPANY_NAME: &str = "companyName";
pub const ADDRESS: &str = "address";
pub const CUSTOMER_MANAGERS: &str = "customerManagers";
pub const CROP_LOCATION: &str = "cropLocation";
pub const COMPANY_HAS_ACTIVE_CONTRACT: &str = "companyHasActiveContract";
pub const EXCLUDED_COMPANIES: &str = "excludedCompanies";
pub const DATE_CREATED: &str = "dateCreated";
pub const DATE_MODIFIED: &str = "dateModified";
pub const DISTANCES: &str = "distances";
pub const PROBLEM: &str = "problem";
pub const SEARCH: &str = "search";

/// Parameter name to values. A missing key means "no filter"; unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchParams {
    values: HashMap<String, Vec<String>>,
}

impl SearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert replacing any previous values of `key`
    pub fn with<I, S>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values
            .insert(key.to_string(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Append one value to `key`
    pub fn push(&mut self, key: &str, value: impl Into<String>) {
        self.values.entry(key.to_string()).or_default().push(value.into());
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.values.get(key).map(Vec::as_slice)
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Numeric values of `key`; malformed entries are dropped
    pub fn ids(&self, key: &str) -> Vec<i64> {
        self.get(key)
            .unwrap_or_default()
            .iter()
            .filter_map(|value| try_get_long(value))
            .collect()
    }

    /// Numeric values of `key` where each value may hold a comma-separated list
    pub fn comma_separated_ids(&self, key: &str) -> Vec<i64> {
        self.get(key)
            .unwrap_or_default()
            .iter()
            .flat_map(|value| value.split(','))
            .filter_map(try_get_long)
            .collect()
    }

    /// `Some(true)`/`Some(false)` for literal `true`/`false` as first value, else `None`
    pub fn flag(&self, key: &str) -> Option<bool> {
        parse_tri_state(self.first(key))
    }

    pub fn mode(&self) -> SearchMode {
        SearchMode::from_flag(self.first(SEARCH))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SearchParams {
    /// Collect query-string style pairs; repeated keys accumulate values
    fn from_iter<I: IntoIterator<Item = (K, V)>>(pairs: I) -> Self {
        let mut params = SearchParams::new();
        for (key, value) in pairs {
            params.values.entry(key.into()).or_default().push(value.into());
        }
        params
    }
}
