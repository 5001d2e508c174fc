//! Output rows of the location listing.

use super::distances::{DistanceDto, Distances};
use super::schema::{Address, Company, Location};
use serde::Serialize;
use std::fmt;

/// Data quality problems detected per location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Problem {
    /// The company has an active contract but none of its active locations is a crop location
    ActiveContractWithoutCropLocation,
    /// The company has an active contract but the location has no distances
    ActiveContractWithoutDistances,
    /// The location is a crop location without distances
    CropLocationWithoutDistances,
}

impl Problem {
    pub fn message(&self) -> &'static str {
        match self {
            Problem::ActiveContractWithoutCropLocation => {
                "Active contract, but crop location missing"
            }
            Problem::ActiveContractWithoutDistances => "Active contract, but distances missing",
            Problem::CropLocationWithoutDistances => "Crop location, but distances missing",
        }
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// One listed location, populated column by column from the composed query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationDistances {
    pub location: Option<Location>,
    pub address: Option<Address>,
    pub company: Option<Company>,
    pub customer_manager_name: Option<String>,
    pub customer_manager_names: Vec<String>,
    pub company_has_active_contract: Option<bool>,
    pub problems: Vec<Problem>,
    pub from_distances: Distances,
    pub to_distances: Distances,
}

impl LocationDistances {
    /// Distances of both directions, deduplicated and sorted by name
    pub fn distances(&self) -> Vec<DistanceDto> {
        Distances::merged(&self.to_distances, &self.from_distances)
    }

    /// Primary manager first, then the other managers; blanks and repeats skipped
    pub fn customer_managers(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self
            .customer_manager_name
            .iter()
            .chain(self.customer_manager_names.iter())
        {
            if !name.is_empty() && !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    pub fn view(&self) -> LocationDistancesView {
        LocationDistancesView {
            location: self.location.clone(),
            address: self.address.clone(),
            company: self.company.clone(),
            customer_manager_name: self.customer_manager_name.clone(),
            customer_managers: self.customer_managers(),
            distances: self.distances(),
            company_has_active_contract: self.company_has_active_contract,
            problems: self.problems.iter().map(|p| p.message().to_string()).collect(),
        }
    }
}

/// Serialisable form of [`LocationDistances`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationDistancesView {
    pub location: Option<Location>,
    pub address: Option<Address>,
    pub company: Option<Company>,
    pub customer_manager_name: Option<String>,
    pub customer_managers: Vec<String>,
    pub distances: Vec<DistanceDto>,
    pub company_has_active_contract: Option<bool>,
    pub problems: Vec<String>,
}
