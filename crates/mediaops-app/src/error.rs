//! Application-level error type shared by the binary and integration tests.

use thiserror::Error;

use crate::brightcove::BrightcoveError;
use crate::caas::CaasError;
use crate::config;
use crate::files::FilesError;
use crate::http::HttpError;
use crate::ledger::LedgerError;
use crate::paths::PathError;
use crate::report::ReportError;
use crate::sheets::SheetsError;
use crate::vimeo::VimeoError;
use crate::youtube::YoutubeError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    ConfigLoad(#[from] config::AppConfigError),
    #[error(transparent)]
    Paths(#[from] PathError),
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error(transparent)]
    Caas(#[from] CaasError),
    #[error(transparent)]
    Brightcove(#[from] BrightcoveError),
    #[error(transparent)]
    Sheets(#[from] SheetsError),
    #[error(transparent)]
    Youtube(#[from] YoutubeError),
    #[error(transparent)]
    Vimeo(#[from] VimeoError),
    #[error(transparent)]
    Files(#[from] FilesError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("failed to read input file {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Usage(String),
    #[error("refusing to overwrite {path}")]
    OverwriteDeclined { path: std::path::PathBuf },
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("{what} stream ended without a completion event")]
    StreamEnded { what: &'static str },
}
