use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use reqwest::header::CONTENT_LENGTH;
use reqwest::{Body, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use url::Url;

use super::BrightcoveError;
use super::types::{Folder, IngestRequest, NewVideo, RefIdUpdate, UploadUrls, Video};
use crate::config::{BrightcoveConfig, HttpConfig};
use crate::http::{HttpCore, HttpError, Reply, RetryPolicy, TokenCache, parse_base_url};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    300
}

#[derive(Debug)]
struct Credentials {
    token_url: Url,
    client_id: String,
    client_secret: String,
    cache: TokenCache,
}

/// CMS and Dynamic Ingest client for one Video Cloud account.
#[derive(Debug, Clone)]
pub struct BrightcoveClient {
    core: HttpCore,
    credentials: Arc<Credentials>,
    cms_root: Url,
    ingest_root: Url,
    ingest_profile: String,
    page_size: usize,
}

impl BrightcoveClient {
    pub fn from_config(cfg: &BrightcoveConfig, http: &HttpConfig) -> Result<Self, BrightcoveError> {
        Self::new(cfg, RetryPolicy::from_config(http))
    }

    pub fn new(cfg: &BrightcoveConfig, policy: RetryPolicy) -> Result<Self, BrightcoveError> {
        let (account_id, client_id, client_secret) = cfg.credentials()?;
        let token_url = append_segments(&parse_base_url(&cfg.oauth_url)?, &["access_token"])?;
        let account = ["v1", "accounts", account_id];
        Ok(Self {
            core: HttpCore::new("brightcove", policy)?,
            credentials: Arc::new(Credentials {
                token_url,
                client_id: client_id.to_string(),
                client_secret: client_secret.to_string(),
                cache: TokenCache::new(),
            }),
            cms_root: append_segments(&parse_base_url(&cfg.cms_url)?, &account)?,
            ingest_root: append_segments(&parse_base_url(&cfg.ingest_url)?, &account)?,
            ingest_profile: cfg.ingest_profile.clone(),
            page_size: cfg.page_size.max(1),
        })
    }

    pub fn ingest_profile(&self) -> &str {
        &self.ingest_profile
    }

    /// Client-credentials token, reused until 30 s before it expires.
    pub async fn access_token(&self) -> Result<String, BrightcoveError> {
        let creds = &self.credentials;
        creds
            .cache
            .get_or_fetch(|| async {
                let response: TokenResponse = self
                    .core
                    .get_json("brightcove_token", |http| {
                        http.post(creds.token_url.clone())
                            .basic_auth(&creds.client_id, Some(&creds.client_secret))
                            .form(&[("grant_type", "client_credentials")])
                    })
                    .await?;
                debug!(expires_in = response.expires_in, "obtained Brightcove access token");
                Ok::<_, BrightcoveError>((response.access_token, response.expires_in))
            })
            .await
    }

    /// Folders keyed by lowercase name.
    pub async fn folders(&self) -> Result<BTreeMap<String, String>, BrightcoveError> {
        let url = self.cms_url(&["folders"])?;
        let folders: Vec<Folder> = self
            .send_json("brightcove_folders", Method::GET, url, |req| req)
            .await?;
        info!(folders = folders.len(), "listed Brightcove folders");
        Ok(folders
            .into_iter()
            .map(|folder| (folder.name.to_lowercase(), folder.id))
            .collect())
    }

    pub async fn find_by_reference_id(
        &self,
        reference_id: &str,
    ) -> Result<Option<Video>, BrightcoveError> {
        let reference_id = reference_id.trim();
        if reference_id.is_empty() {
            return Ok(None);
        }
        let segment = format!("ref:{reference_id}");
        let url = self.cms_url(&["videos", &segment])?;
        let reply = self
            .send("brightcove_find_reference", Method::GET, url, |req| req)
            .await?;
        if reply.status == StatusCode::NOT_FOUND {
            debug!(reference_id, "no video holds reference id");
            return Ok(None);
        }
        let video = reply
            .require("brightcove_find_reference", &[200])?
            .json("brightcove_find_reference")?;
        Ok(Some(video))
    }

    pub async fn create_video(&self, video: &NewVideo) -> Result<Video, BrightcoveError> {
        let url = self.cms_url(&["videos"])?;
        let created: Video = self
            .send("brightcove_create_video", Method::POST, url, |req| req.json(video))
            .await?
            .require("brightcove_create_video", &[201])?
            .json("brightcove_create_video")?;
        info!(video_id = %created.id, name = %created.name, "created Brightcove video");
        Ok(created)
    }

    pub async fn move_to_folder(&self, folder_id: &str, video_id: &str) -> Result<(), BrightcoveError> {
        let url = self.cms_url(&["folders", folder_id, "videos", video_id])?;
        self.send("brightcove_move_to_folder", Method::PUT, url, |req| req)
            .await?
            .require("brightcove_move_to_folder", &[204])?;
        debug!(folder_id, video_id, "moved video into folder");
        Ok(())
    }

    pub async fn delete_video(&self, video_id: &str) -> Result<(), BrightcoveError> {
        let url = self.cms_url(&["videos", video_id])?;
        self.send("brightcove_delete_video", Method::DELETE, url, |req| req)
            .await?
            .require("brightcove_delete_video", &[204])?;
        info!(video_id, "deleted Brightcove video");
        Ok(())
    }

    pub async fn upload_urls(
        &self,
        video_id: &str,
        source_name: &str,
    ) -> Result<UploadUrls, BrightcoveError> {
        let url = self.cms_url(&["videos", video_id, "upload-urls", source_name])?;
        self.send_json("brightcove_upload_urls", Method::GET, url, |req| req)
            .await
    }

    /// PUT a local file to a signed upload URL, streaming it from disk.
    /// The file is reopened for every attempt.
    pub async fn put_source(&self, signed_url: &str, path: &Path) -> Result<(), BrightcoveError> {
        let source_error = |err: std::io::Error| HttpError::Source {
            path: path.display().to_string(),
            source: Arc::new(err),
        };
        let size = tokio::fs::metadata(path).await.map_err(source_error)?.len();
        self.core
            .exchange_prepared("brightcove_put_source", |http| async move {
                let file = File::open(path).await.map_err(source_error)?;
                Ok(http
                    .put(signed_url)
                    .header(CONTENT_LENGTH, size)
                    .body(Body::wrap_stream(ReaderStream::new(file))))
            })
            .await?
            .require("brightcove_put_source", &[])?;
        info!(path = %path.display(), bytes = size, "uploaded source file");
        Ok(())
    }

    pub async fn ingest(&self, video_id: &str, request: &IngestRequest) -> Result<(), BrightcoveError> {
        let url = append_segments(&self.ingest_root, &["videos", video_id, "ingest-requests"])?;
        self.send("brightcove_ingest", Method::POST, url, |req| req.json(request))
            .await?
            .require("brightcove_ingest", &[])?;
        info!(video_id, profile = %request.profile, "submitted ingest request");
        Ok(())
    }

    /// Every video, or every video in one folder, one page at a time until a
    /// page comes back empty.
    pub async fn list_videos(&self, folder_id: Option<&str>) -> Result<Vec<Video>, BrightcoveError> {
        let mut url = match folder_id {
            Some(folder_id) => self.cms_url(&["folders", folder_id, "videos"])?,
            None => self.cms_url(&["videos"])?,
        };
        let mut videos = Vec::new();
        let mut offset = 0usize;
        loop {
            url.query_pairs_mut()
                .clear()
                .append_pair("limit", &self.page_size.to_string())
                .append_pair("offset", &offset.to_string());
            let page: Vec<Video> = self
                .send_json("brightcove_list_videos", Method::GET, url.clone(), |req| req)
                .await?;
            if page.is_empty() {
                break;
            }
            debug!(offset, count = page.len(), "fetched video page");
            videos.extend(page);
            offset += self.page_size;
        }
        info!(folder_id = folder_id.unwrap_or("*"), videos = videos.len(), "listed videos");
        Ok(videos)
    }

    pub async fn update_reference_id(
        &self,
        video_id: &str,
        reference_id: &str,
    ) -> Result<RefIdUpdate, BrightcoveError> {
        let url = self.cms_url(&["videos", video_id])?;
        let body = json!({ "reference_id": reference_id });
        let reply = self
            .send("brightcove_update_reference", Method::PATCH, url, |req| req.json(&body))
            .await?;
        if reply.status == StatusCode::CONFLICT {
            return Ok(RefIdUpdate::Conflict);
        }
        reply.require("brightcove_update_reference", &[200])?;
        Ok(RefIdUpdate::Updated)
    }

    fn cms_url(&self, segments: &[&str]) -> Result<Url, HttpError> {
        append_segments(&self.cms_root, segments)
    }

    async fn send<F>(
        &self,
        stage: &'static str,
        method: Method,
        url: Url,
        decorate: F,
    ) -> Result<Reply, BrightcoveError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let token = self.access_token().await?;
        let reply = self.authorized(stage, &method, &url, &token, &decorate).await?;
        if reply.status != StatusCode::UNAUTHORIZED {
            return Ok(reply);
        }
        warn!(stage, "access token rejected, fetching a new one");
        self.credentials.cache.clear().await;
        let token = self.access_token().await?;
        Ok(self.authorized(stage, &method, &url, &token, &decorate).await?)
    }

    async fn authorized<F>(
        &self,
        stage: &'static str,
        method: &Method,
        url: &Url,
        token: &str,
        decorate: &F,
    ) -> Result<Reply, HttpError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        self.core
            .exchange(stage, |http| {
                decorate(http.request(method.clone(), url.clone()).bearer_auth(token))
            })
            .await
    }

    async fn send_json<T, F>(
        &self,
        stage: &'static str,
        method: Method,
        url: Url,
        decorate: F,
    ) -> Result<T, BrightcoveError>
    where
        T: DeserializeOwned,
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let reply = self.send(stage, method, url, decorate).await?;
        Ok(reply.require(stage, &[])?.json(stage)?)
    }
}

/// Append path segments, percent-encoding each one.
fn append_segments(base: &Url, segments: &[&str]) -> Result<Url, HttpError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| HttpError::InvalidBaseUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
