use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::YoutubeError;
use super::metrics::{AnalyticsReport, ReportQuery};
use crate::config::{ChannelCredentials, HttpConfig, YoutubeConfig};
use crate::http::{HttpCore, HttpError, RetryPolicy, TokenCache, join_url, parse_base_url};

const PLAYLIST_PAGE_SIZE: &str = "50";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    pub uploads_playlist_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    #[serde(default)]
    pub id: Option<String>,
    pub snippet: Snippet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub resource_id: Option<ResourceId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    #[serde(default)]
    pub video_id: Option<String>,
}

impl PlaylistItem {
    pub fn video_id(&self) -> Option<&str> {
        self.snippet.resource_id.as_ref()?.video_id.as_deref()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistPage {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Data and Analytics API access for one channel, authorised by its
/// stored refresh token.
#[derive(Debug, Clone)]
pub struct YoutubeClient {
    core: HttpCore,
    country: String,
    data_url: Url,
    analytics_url: Url,
    token_url: Url,
    credentials: ChannelCredentials,
    cache: Arc<TokenCache>,
}

impl YoutubeClient {
    pub fn from_config(
        cfg: &YoutubeConfig,
        http: &HttpConfig,
        country: &str,
    ) -> Result<Self, YoutubeError> {
        let credentials = cfg
            .channels
            .get(&country.to_lowercase())
            .ok_or_else(|| YoutubeError::UnknownChannel(country.to_string()))?;
        Ok(Self {
            core: HttpCore::new("youtube", RetryPolicy::from_config(http))?,
            country: country.to_uppercase(),
            data_url: parse_base_url(&cfg.data_api_url)?,
            analytics_url: parse_base_url(&cfg.analytics_api_url)?,
            token_url: Url::parse(&cfg.token_url)
                .map_err(|_| HttpError::InvalidBaseUrl(cfg.token_url.clone()))?,
            credentials: credentials.clone(),
            cache: Arc::new(TokenCache::new()),
        })
    }

    /// Upper-case country code of the channel.
    pub fn country(&self) -> &str {
        &self.country
    }

    pub async fn access_token(&self) -> Result<String, YoutubeError> {
        self.cache
            .get_or_fetch(|| async {
                let creds = &self.credentials;
                let response: TokenResponse = self
                    .core
                    .get_json("youtube_token", |http| {
                        http.post(self.token_url.clone()).form(&[
                            ("client_id", creds.client_id.as_str()),
                            ("client_secret", creds.client_secret.as_str()),
                            ("refresh_token", creds.refresh_token.as_str()),
                            ("grant_type", "refresh_token"),
                        ])
                    })
                    .await?;
                debug!(country = %self.country, "refreshed YouTube access token");
                Ok::<_, YoutubeError>((response.access_token, response.expires_in))
            })
            .await
    }

    /// The authorised user's channel id and uploads playlist.
    pub async fn channel(&self) -> Result<ChannelInfo, YoutubeError> {
        let url = join_url(&self.data_url, "channels")?;
        let body = self
            .get("youtube_channels", url, &[("mine", "true"), ("part", "id,contentDetails")])
            .await?;
        let item = body
            .pointer("/items/0")
            .ok_or_else(|| HttpError::shape("youtube_channels", "no channel for credentials"))?;
        let id = item
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| HttpError::shape("youtube_channels", "missing channel id"))?;
        let uploads = item
            .pointer("/contentDetails/relatedPlaylists/uploads")
            .and_then(Value::as_str)
            .ok_or_else(|| HttpError::shape("youtube_channels", "missing uploads playlist"))?;
        Ok(ChannelInfo {
            id: id.to_string(),
            uploads_playlist_id: uploads.to_string(),
        })
    }

    /// Every item of a playlist, following `nextPageToken`.
    pub async fn uploads(&self, playlist_id: &str) -> Result<Vec<PlaylistItem>, YoutubeError> {
        let url = join_url(&self.data_url, "playlistItems")?;
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![
                ("playlistId", playlist_id),
                ("part", "snippet"),
                ("maxResults", PLAYLIST_PAGE_SIZE),
            ];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }
            let body = self.get("youtube_playlist_items", url.clone(), &query).await?;
            let page: PlaylistPage = serde_json::from_value(body)
                .map_err(|err| HttpError::json("youtube_playlist_items", err))?;
            debug!(country = %self.country, count = page.items.len(), "fetched playlist page");
            items.extend(page.items);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(items)
    }

    pub async fn report(
        &self,
        channel_id: &str,
        query: &ReportQuery,
    ) -> Result<AnalyticsReport, YoutubeError> {
        let url = join_url(&self.analytics_url, "reports")?;
        let ids = format!("channel=={channel_id}");
        let metrics = query.metrics.join(",");
        let body = self
            .get(
                "youtube_analytics_report",
                url,
                &[
                    ("ids", ids.as_str()),
                    ("metrics", metrics.as_str()),
                    ("startDate", query.start_date.as_str()),
                    ("endDate", query.end_date.as_str()),
                    ("sort", query.sort.as_str()),
                ],
            )
            .await?;
        Ok(serde_json::from_value(body)
            .map_err(|err| HttpError::json("youtube_analytics_report", err))?)
    }

    async fn get(
        &self,
        stage: &'static str,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<Value, YoutubeError> {
        let token = self.access_token().await?;
        Ok(self
            .core
            .get_json(stage, |http| {
                http.get(url.clone()).query(query).bearer_auth(&token)
            })
            .await?)
    }
}
