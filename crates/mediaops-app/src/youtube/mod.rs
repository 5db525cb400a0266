//! YouTube Data and Analytics pulls across the per-country channels.

mod client;
pub mod metrics;

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::{AppConfigError, HttpConfig, YoutubeConfig};
use crate::http::HttpError;
use crate::report::ReportError;

pub use client::{ChannelInfo, PlaylistItem, ResourceId, Snippet, YoutubeClient};
pub use metrics::{AnalyticsReport, ChannelMetrics, ColumnHeader, ReportQuery};

#[derive(Debug, Error)]
pub enum YoutubeError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error(transparent)]
    Config(#[from] AppConfigError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("channel `{0}` has no configured credentials")]
    UnknownChannel(String),
    #[error("no YouTube channels configured")]
    NoChannels,
}

/// One client per configured channel, ordered by country code.
pub fn channel_clients(
    cfg: &YoutubeConfig,
    http: &HttpConfig,
    only: Option<&str>,
) -> Result<Vec<YoutubeClient>, YoutubeError> {
    if let Some(country) = only {
        let key = country.to_lowercase();
        if !cfg.channels.contains_key(&key) {
            return Err(YoutubeError::UnknownChannel(country.to_string()));
        }
    }
    let clients = cfg
        .channels
        .keys()
        .filter(|country| only.is_none_or(|wanted| wanted.eq_ignore_ascii_case(country)))
        .map(|country| YoutubeClient::from_config(cfg, http, country))
        .collect::<Result<Vec<_>, _>>()?;
    if clients.is_empty() {
        return Err(YoutubeError::NoChannels);
    }
    Ok(clients)
}

/// First report row of every channel. Failing channels are logged and skipped.
pub async fn collect_metrics(clients: &[YoutubeClient], query: &ReportQuery) -> ChannelMetrics {
    let mut metrics = ChannelMetrics::new(&query.metrics);
    for client in clients {
        let country = client.country();
        let result = async {
            let channel = client.channel().await?;
            client.report(&channel.id, query).await
        }
        .await;
        match result {
            Ok(report) => {
                info!(country, rows = report.rows.len(), "fetched channel analytics");
                metrics.record(country, &report);
            }
            Err(err) => warn!(country, error = %err, "skipping channel analytics"),
        }
    }
    metrics
}

/// Upload playlist items per channel. Failing channels are logged and skipped.
pub async fn collect_uploads(clients: &[YoutubeClient]) -> BTreeMap<String, Vec<PlaylistItem>> {
    let mut snapshot = BTreeMap::new();
    for client in clients {
        let country = client.country();
        let result = async {
            let channel = client.channel().await?;
            client.uploads(&channel.uploads_playlist_id).await
        }
        .await;
        match result {
            Ok(items) => {
                info!(country, videos = items.len(), "collected channel uploads");
                snapshot.insert(country.to_string(), items);
            }
            Err(err) => warn!(country, error = %err, "skipping channel uploads"),
        }
    }
    snapshot
}
