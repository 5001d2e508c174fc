//! # Get Locations Distances
//!
//! Composes the listing query for one request and runs it.
//!
//! Always applied: company status NORMAL or REVIEW_REQUIRED, location status ACTIVE and
//! the `excludedCompanies` exclusion. Search filters are ANDed in exact mode and ORed in
//! free-text mode (`search=true`).
//!
//! Custom sort keys: `distances` (one clause per direction over the distance id arrays),
//! `companyHasActiveContract` and `problem`. Anything else sorts by attribute name.

use super::contracts::ActiveContractSource;
use super::distances::DistancesJoin;
use super::output::{LocationDistances, Problem};
use super::schema::{
    columns, Address, Company, Location, COMPANY_CUSTOMER_MANAGER, COMPANY_CUSTOMER_MANAGERS,
    COMPANY_LOCATIONS, COMPANY_STATUS_NORMAL, COMPANY_STATUS_REVIEW_REQUIRED, LOCATION,
    LOCATION_ADDRESS, LOCATION_COMPANY, LOCATION_STATUS_ACTIVE, REPRESENTATIVE_PERSON,
};
use super::search::{self as params, SearchParams};
use crate::backend::QueryBackend;
use crate::config::{ComposerConfig, QueryConfig};
use crate::error::{QueryError, Result};
use crate::logging::log_query_operation;
use crate::query_builder::context::QueryContext;
use crate::query_builder::expression::{and, or, Json, Predicate};
use crate::query_builder::joins::{JoinHandle, JoinType};
use crate::query_builder::ordering::{OrderClause, OrderResolver};
use crate::query_builder::pagination::{Page, PageRequest};
use crate::query_builder::render::{render_select, Statement};
use crate::query_builder::selections::{SelectionRegistry, TypedSelection};
use std::time::Instant;
use tracing::{error, info, instrument};

/// Listing service over a storage backend and the contract service
pub struct GetLocationsDistances<B, C> {
    backend: B,
    contracts: C,
    config: ComposerConfig,
}

impl<B: QueryBackend, C: ActiveContractSource> GetLocationsDistances<B, C> {
    pub fn new(backend: B, contracts: C) -> Self {
        Self {
            backend,
            contracts,
            config: ComposerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ComposerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[instrument(skip_all, fields(page = page.page, size = page.size))]
    pub async fn get(
        &self,
        search: &SearchParams,
        page: PageRequest,
    ) -> Result<Page<LocationDistances>> {
        info!("Getting locations distances");
        let started = Instant::now();

        let active_company_ids = self
            .contracts
            .companies_with_active_contracts()
            .await
            .map_err(|e| {
                error!(error = %e, "Active contract lookup failed");
                match e {
                    QueryError::ServiceUnavailable(_) => e,
                    other => QueryError::ServiceUnavailable(other.to_string()),
                }
            })?;

        let page = page.clamped(self.config.paging.max_page_size);
        let context = compose(search, page, &active_company_ids, &self.config.query)?;
        let result = context.execute(&self.backend).await;

        let duration_ms = Some(started.elapsed().as_millis() as u64);
        match &result {
            Ok(page) => log_query_operation(
                "get_locations_distances",
                LOCATION.table,
                "ok",
                duration_ms,
                Some(&format!("{} of {} rows", page.items.len(), page.total)),
            ),
            Err(e) => log_query_operation(
                "get_locations_distances",
                LOCATION.table,
                "failed",
                duration_ms,
                Some(&e.to_string()),
            ),
        }

        result
    }
}

fn add_problem(
    problem: Problem,
) -> impl Fn(&mut LocationDistances, Option<bool>) + Send + Sync + 'static {
    move |row, value| {
        if value == Some(true) {
            row.problems.push(problem);
        }
    }
}

fn excluded_companies(company: &JoinHandle, search: &SearchParams) -> Option<Predicate> {
    let ids = search.comma_separated_ids(params::EXCLUDED_COMPANIES);
    (!ids.is_empty()).then(|| company.get(columns::ID).is_in(ids).negate())
}

fn tri_state(flag: Option<bool>, predicate: &Predicate) -> Option<Predicate> {
    flag.map(|wanted| {
        if wanted {
            predicate.clone()
        } else {
            predicate.negate()
        }
    })
}

/// Build the listing query without running it
pub fn compose(
    search: &SearchParams,
    page: PageRequest,
    active_company_ids: &[i64],
    query: &QueryConfig,
) -> Result<QueryContext<LocationDistances>> {
    let mut context = QueryContext::<LocationDistances>::new(&LOCATION);
    let root = context.root().clone();

    let address = context.join(&root, &LOCATION_ADDRESS, JoinType::Left);
    let company = context.join(&root, &LOCATION_COMPANY, JoinType::Inner);
    let manager = context.join(&company, &COMPANY_CUSTOMER_MANAGER, JoinType::Left);
    let manager_person = context.join(&manager, &REPRESENTATIVE_PERSON, JoinType::Left);
    let managers = context.join(&company, &COMPANY_CUSTOMER_MANAGERS, JoinType::Left);
    let managers_person = context.join(&managers, &REPRESENTATIVE_PERSON, JoinType::Left);
    let active_locations = context.join_on(&company, &COMPANY_LOCATIONS, JoinType::Inner, |join| {
        join.get(columns::STATUS_CODE)
            .equal(LOCATION_STATUS_ACTIVE.to_string())
    });
    let distances = DistancesJoin::join_all(&mut context, &root, search, &query.empty_marker);

    let manager_name = manager_person.get(columns::NAME);
    let manager_names = managers_person.get(columns::NAME);
    let has_active_contract = company
        .get(columns::ID)
        .is_in(active_company_ids.iter().copied());
    let distances_empty = DistancesJoin::all_absent(&distances);

    let problems = vec![
        TypedSelection::of(
            and(vec![
                has_active_contract.clone(),
                active_locations
                    .get(columns::CROP_LOCATION)
                    .cast::<i32>()
                    .sum()
                    .equal(0),
            ]),
            add_problem(Problem::ActiveContractWithoutCropLocation),
        ),
        TypedSelection::of(
            and(vec![has_active_contract.clone(), distances_empty.clone()]),
            add_problem(Problem::ActiveContractWithoutDistances),
        ),
        TypedSelection::of(
            and(vec![root.get(columns::CROP_LOCATION).equal(true), distances_empty.clone()]),
            add_problem(Problem::CropLocationWithoutDistances),
        ),
    ];
    let any_problem = or(problems.iter().map(|problem| problem.expr().clone()));

    // Whole rows and the manager name are the grouping key; everything else aggregates
    let location_row = root.row::<Location>();
    let address_row = address.row::<Address>();
    let company_row = company.row::<Company>();

    let mut selections = SelectionRegistry::<LocationDistances>::new();
    selections
        .register(location_row.clone(), |row, value| {
            row.location = value.map(|Json(location)| location)
        })
        .register(address_row.clone(), |row, value| {
            row.address = value.map(|Json(address)| address)
        })
        .register(company_row.clone(), |row, value| {
            row.company = value.map(|Json(company)| company)
        })
        .register(manager_name.clone(), |row, value| row.customer_manager_name = value);
    for selection in distances.iter().flat_map(DistancesJoin::selections) {
        selections.push(selection);
    }
    for problem in problems {
        selections.push(problem.down_cast());
    }
    selections
        .register(context.array_agg(&manager_names), |row, value| {
            row.customer_manager_names = value.unwrap_or_default()
        })
        .register(has_active_contract.clone(), |row, value| {
            row.company_has_active_contract = value
        });
    context.set_selections(selections)?;

    let base = context
        .predicate_builder()
        .in_values(
            [
                COMPANY_STATUS_NORMAL.to_string(),
                COMPANY_STATUS_REVIEW_REQUIRED.to_string(),
            ],
            &company.get(columns::STATUS_CODE),
        )
        .in_values([LOCATION_STATUS_ACTIVE.to_string()], &root.get(columns::STATUS_CODE))
        .add(excluded_companies(&company, search))
        .and();

    let customer_managers = search
        .get(params::CUSTOMER_MANAGERS)
        .filter(|names| !names.is_empty())
        .map(|names| {
            or(names
                .iter()
                .flat_map(|name| [manager_name.lower_like(name), manager_names.lower_like(name)]))
        });

    let filters = context
        .predicate_builder()
        .in_values(search.ids(params::LOCATION_ID), &root.get(columns::ID))
        .in_values(search.ids(params::COMPANY_ID), &company.get(columns::ID))
        .lower_like(search.get(params::LOCATION_NAME), &root.get(columns::LOCATION_NAME))
        .lower_like(search.get(params::COMPANY_NAME), &company.get(columns::NAME))
        .lower_like(search.get(params::ADDRESS), &address.get(columns::FORMATTED_ADDRESS))
        .flag(search.flag(params::CROP_LOCATION), &root.get(columns::CROP_LOCATION))
        .add(tri_state(
            search.flag(params::COMPANY_HAS_ACTIVE_CONTRACT),
            &has_active_contract,
        ))
        .date_range(search.first(params::DATE_CREATED), &root.get(columns::DATE_CREATED))
        .date_range(search.first(params::DATE_MODIFIED), &root.get(columns::DATE_MODIFIED))
        .add(customer_managers)
        .add(DistancesJoin::location_name_predicate(&distances))
        .build(search.mode());

    context.set_predicate(and(vec![base, filters]));
    context.group_by(vec![
        location_row.into_expr(),
        address_row.into_expr(),
        company_row.into_expr(),
        manager_name.into_expr(),
    ]);

    let resolver = OrderResolver::new()
        .with("distances", |direction| {
            DistancesJoin::order_clauses(&distances, direction)
        })
        .with("companyHasActiveContract", |direction| {
            vec![OrderClause::new(&has_active_contract, direction)]
        })
        .with("problem", |direction| vec![OrderClause::new(&any_problem, direction)]);
    context.order_by_sort(&page.sort, &resolver)?;
    context.set_page(page);

    let wants_no_distances =
        search.first(params::DISTANCES) == Some(query.empty_marker.as_str());
    context.set_having(vec![
        wants_no_distances.then(|| distances_empty.clone()),
        tri_state(search.flag(params::PROBLEM), &any_problem),
    ]);

    Ok(context)
}

/// The listing query as PostgreSQL text with its parameters
pub fn render(
    search: &SearchParams,
    page: PageRequest,
    active_company_ids: &[i64],
    query: &QueryConfig,
) -> Result<Statement> {
    let (plan, _) = compose(search, page, active_company_ids, query)?.build()?;
    Ok(render_select(&plan, true))
}
