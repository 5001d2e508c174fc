//! Location Distances Query Renderer
//!
//! Prints the SQL and parameters the location distances listing would run for a
//! given set of search parameters, without touching a database.
//!
//! ```bash
//! render-locations-query --param cropLocation=true --param distances=Berlin \
//!     --sort distances,desc --page 0 --size 20 --active-company 3 --active-company 7
//! ```

use anyhow::{anyhow, Context};
use clap::Parser;
use query_composer::config::ComposerConfig;
use query_composer::locations::{render, SearchParams};
use query_composer::logging::init_structured_logging;
use query_composer::query_builder::{Sort, SortOrder};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "render-locations-query")]
#[command(about = "Render the location distances listing query")]
#[command(version)]
struct Cli {
    /// Search parameter as key=value (repeatable; repeated keys collect values)
    #[arg(short = 'p', long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Zero-based page index
    #[arg(long, default_value_t = 0)]
    page: u32,

    /// Page size (defaults to paging.default_page_size)
    #[arg(long)]
    size: Option<u32>,

    /// Sort as field or field,asc|desc (repeatable)
    #[arg(short, long)]
    sort: Vec<String>,

    /// Company id holding an active contract (repeatable)
    #[arg(long = "active-company")]
    active_companies: Vec<i64>,

    /// Configuration file (defaults to config/query-composer.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_structured_logging();

    let config = match &cli.config {
        Some(path) => ComposerConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ComposerConfig::load().context("loading configuration")?,
    };

    let orders = cli
        .sort
        .iter()
        .map(|raw| SortOrder::parse(raw).ok_or_else(|| anyhow!("invalid sort '{raw}'")))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let page = config.paging.page_request(cli.page, cli.size, Sort::by(orders));
    let search: SearchParams = cli.params.into_iter().collect();

    info!(
        params = search.len(),
        page = page.page,
        size = page.size,
        "Rendering location distances query"
    );

    let statement = render(&search, page, &cli.active_companies, &config.query)?;
    println!("{}", statement.sql);
    for (index, bind) in statement.binds.iter().enumerate() {
        println!("  ${} = {:?}", index + 1, bind);
    }
    Ok(())
}
