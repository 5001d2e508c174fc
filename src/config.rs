//! # Configuration
//!
//! Layered configuration: built-in defaults, then an optional TOML file, then
//! environment variables of the form `COMPOSER__SECTION__KEY`
//! (for example `COMPOSER__DATABASE__URL` or `COMPOSER__PAGING__MAX_PAGE_SIZE`).

use crate::error::{QueryError, Result};
use crate::query_builder::ordering::Sort;
use crate::query_builder::pagination::PageRequest;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Default location of the optional configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/query-composer.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ComposerConfig {
    pub database: DatabaseConfig,
    pub paging: PagingConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/query_composer_development".to_string(),
            max_connections: 10,
            acquire_timeout_ms: 5000,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 500,
        }
    }
}

impl PagingConfig {
    /// Page request with the size defaulted and clamped to `1..=max_page_size`
    pub fn page_request(&self, page: u32, size: Option<u32>, sort: Sort) -> PageRequest {
        PageRequest::new(page, size.unwrap_or(self.default_page_size))
            .with_sort(sort)
            .clamped(self.max_page_size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Deadline for the single storage round trip
    pub statement_timeout_ms: u64,
    /// Search value meaning "only rows without any child aggregate"
    pub empty_marker: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            statement_timeout_ms: 30_000,
            empty_marker: String::new(),
        }
    }
}

impl QueryConfig {
    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }
}

impl ComposerConfig {
    /// Load from [`DEFAULT_CONFIG_PATH`] (if present) and the process environment
    pub fn load() -> Result<Self> {
        Self::load_with_environment(
            Some(Path::new(DEFAULT_CONFIG_PATH)),
            false,
            Self::environment(),
        )
    }

    /// Load from a required TOML file and the process environment
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::load_with_environment(Some(path), true, Self::environment())
    }

    /// Environment source for `COMPOSER__SECTION__KEY` variables
    pub fn environment() -> Environment {
        Environment::with_prefix("COMPOSER").separator("__")
    }

    pub fn load_with_environment(
        path: Option<&Path>,
        required: bool,
        environment: Environment,
    ) -> Result<Self> {
        let mut builder =
            Config::builder().add_source(Config::try_from(&ComposerConfig::default())?);

        if let Some(path) = path {
            debug!(path = %path.display(), required, "Adding configuration file source");
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(required),
            );
        }

        let config: ComposerConfig = builder.add_source(environment).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(QueryError::Configuration(
                "database.url must not be empty".to_string(),
            ));
        }
        if self.paging.default_page_size == 0 || self.paging.max_page_size == 0 {
            return Err(QueryError::Configuration(
                "page sizes must be greater than zero".to_string(),
            ));
        }
        if self.paging.default_page_size > self.paging.max_page_size {
            return Err(QueryError::Configuration(format!(
                "paging.default_page_size ({}) exceeds paging.max_page_size ({})",
                self.paging.default_page_size, self.paging.max_page_size
            )));
        }
        Ok(())
    }
}
