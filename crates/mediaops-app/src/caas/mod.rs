//! Content-as-a-Service (CaaS) search client, record extraction, NLP
//! enrichment and the spreadsheet URL lookup.

mod client;
pub mod enrich;
pub mod lookup;
mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::config::AppConfigError;
use crate::http::HttpError;
use crate::report::{self, ReportError};
use crate::sheets::SheetsError;

pub use client::CaasClient;
pub use enrich::{CaasEnricher, EnrichEvent, EnrichOptions, EnrichSummary, EnrichedRecord};
pub use lookup::{LookupSummary, SourceTally, lookup_urls};
pub use types::{
    CaasRecord, DEFAULT_PAGE_SIZE, ElasticRequest, Pagination, QueryConfig, SearchPage,
    build_search_params, url_term_request,
};

#[derive(Debug, Error)]
pub enum CaasError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error(transparent)]
    Sheets(#[from] SheetsError),
    #[error(transparent)]
    Config(#[from] AppConfigError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },
    #[error("invalid JSON in {path}: {source}")]
    ParseFile {
        path: PathBuf,
        #[source]
        source: Arc<serde_json::Error>,
    },
    #[error("invalid Elasticsearch request: {0}")]
    InvalidRequest(String),
    #[error("failed to write record {path}: {source}")]
    WriteRecord {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },
    #[error("enrichment channel closed unexpectedly")]
    ChannelClosed,
    #[error("enrichment worker failed: {0}")]
    Worker(String),
}

/// Write extracted records as CSV, one row per entity.
pub fn write_records_csv(path: &Path, records: &[CaasRecord]) -> Result<usize, ReportError> {
    report::write_rows(
        path,
        &CaasRecord::CSV_HEADER,
        records.iter().map(CaasRecord::csv_row),
    )
}
