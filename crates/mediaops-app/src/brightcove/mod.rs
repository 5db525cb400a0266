//! Brightcove Video Cloud: OAuth, the CMS API, Dynamic Ingest, reference-id
//! maintenance and the local upload pipeline.

mod client;
pub mod refids;
mod types;
pub mod upload;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::config::AppConfigError;
use crate::http::HttpError;
use crate::report::ReportError;
use crate::sheets::SheetsError;

pub use client::BrightcoveClient;
pub use refids::{RefIdFix, is_improper_art_id, normalize_commas, propose_fix, repair_art_id};
pub use types::{
    CustomFields, Folder, IngestAsset, IngestRequest, Link, NewVideo, RefIdUpdate, UploadUrls,
    Video,
};
pub use upload::{LocalVideo, UploadEvent, UploadPlan, UploadSummary, Uploader};

#[derive(Debug, Error)]
pub enum BrightcoveError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error(transparent)]
    Config(#[from] AppConfigError),
    #[error(transparent)]
    Sheets(#[from] SheetsError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("failed to read metadata {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: Arc<csv::Error>,
    },
    #[error("metadata {path} has no `{column}` column")]
    MetadataColumn { path: PathBuf, column: &'static str },
    #[error("filesystem error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },
    #[error("upload preflight failed:\n{}", problems.join("\n"))]
    Preflight { problems: Vec<String> },
    #[error("no Brightcove folder for country `{country}`")]
    UnknownFolder { country: String },
    #[error("upload event channel closed unexpectedly")]
    ChannelClosed,
}

impl BrightcoveError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}

/// Video names per folder, keyed by lowercase folder name.
pub async fn snapshot_by_folder(
    client: &BrightcoveClient,
) -> Result<BTreeMap<String, Vec<String>>, BrightcoveError> {
    let folders = client.folders().await?;
    let mut snapshot = BTreeMap::new();
    for (name, folder_id) in folders {
        let videos = client.list_videos(Some(&folder_id)).await?;
        info!(folder = %name, videos = videos.len(), "collected folder videos");
        snapshot.insert(name, videos.into_iter().map(|video| video.name).collect());
    }
    Ok(snapshot)
}
