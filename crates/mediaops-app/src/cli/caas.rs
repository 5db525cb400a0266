use std::path::PathBuf;

use clap::{ArgAction, Args, Subcommand, ValueEnum, ValueHint};

use crate::caas::Pagination;
use crate::cli::validators::{validate_page_cap, validate_workers};

/// Content-store command namespace.
#[derive(Debug, Args)]
pub struct CaasArgs {
    #[command(subcommand)]
    pub command: CaasCommands,
}

#[derive(Debug, Subcommand)]
pub enum CaasCommands {
    /// Run a stored Elasticsearch request and export every page as CSV.
    Query(CaasQueryArgs),
    /// Fetch entities by id and export them as CSV.
    Batch(CaasBatchArgs),
    /// Look up article URLs and write enriched NLP records as JSON.
    Enrich(CaasEnrichArgs),
    /// Fill CaaS and CMS ids into a worksheet of article URLs.
    LookupUrls(CaasLookupArgs),
}

/// How successive result pages are requested.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PaginationArg {
    /// `search_after` on the last hit's sort values.
    Cursor,
    /// `from` advanced by the page size.
    Offset,
}

impl From<PaginationArg> for Pagination {
    fn from(arg: PaginationArg) -> Self {
        match arg {
            PaginationArg::Cursor => Pagination::Cursor,
            PaginationArg::Offset => Pagination::Offset,
        }
    }
}

#[derive(Debug, Args)]
#[command(after_help = "\
EXAMPLES:
  # Export everything the configured request matches
  mediaops caas query --output articles.csv

  # First three pages of a custom request, offset paging
  mediaops caas query --request recipes.json --pagination offset --max-pages 3 --output recipes.csv
")]
pub struct CaasQueryArgs {
    /// Query configuration JSON (defaults to `caas.query_config_path`).
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub query_config: Option<PathBuf>,
    /// Elasticsearch request JSON (defaults to `caas.elastic_request_path`).
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub request: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = PaginationArg::Cursor)]
    pub pagination: PaginationArg,
    /// Stop after this many pages (1-10000).
    #[arg(long, value_parser = validate_page_cap)]
    pub max_pages: Option<usize>,
    /// Destination CSV.
    #[arg(long, value_name = "FILE")]
    pub output: PathBuf,
    /// Overwrite an existing file without asking.
    #[arg(long, action = ArgAction::SetTrue)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct CaasBatchArgs {
    /// Entity ids to fetch.
    pub ids: Vec<String>,
    /// File with one id per line, read in addition to positional ids.
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub ids_file: Option<PathBuf>,
    /// Destination CSV.
    #[arg(long, value_name = "FILE")]
    pub output: PathBuf,
    /// Overwrite an existing file without asking.
    #[arg(long, action = ArgAction::SetTrue)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct CaasEnrichArgs {
    /// File with one article URL per line.
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub urls: PathBuf,
    /// Directory receiving `{url_md5}.json` records.
    #[arg(long, value_name = "DIR")]
    pub output_dir: PathBuf,
    /// Leading lines to skip, blank ones included.
    #[arg(long, default_value_t = 0)]
    pub skip: usize,
    /// Maximum number of URLs to process.
    #[arg(long)]
    pub limit: Option<usize>,
    /// Number of concurrent lookup workers (1-64).
    #[arg(long, default_value_t = 4, value_parser = validate_workers)]
    pub workers: usize,
}

#[derive(Debug, Args)]
pub struct CaasLookupArgs {
    /// Spreadsheet key, URL or title.
    #[arg(long)]
    pub spreadsheet: String,
    /// Worksheet holding the URL rows.
    #[arg(long)]
    pub worksheet: String,
}
