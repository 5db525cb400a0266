//! Shared HTTP plumbing used by every upstream client.
//!
//! Each client owns one [`HttpCore`]: a pooled `reqwest` client, an optional
//! request-rate limiter, and an exponential backoff policy. Transport failures,
//! `429` and `5xx` responses are retried; every other status is handed back to
//! the caller as a [`Reply`] so endpoints can give `404`/`409` their own meaning.

use std::{
    future::Future,
    num::NonZeroU32,
    sync::Arc,
    time::{Duration, Instant},
};

use backon::{ExponentialBuilder, Retryable};
use bytes::Bytes;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::{sync::Mutex, time::sleep};
use tracing::{debug, warn};
use url::Url;

use crate::config::HttpConfig;

type GenericRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Error type shared by all HTTP-backed clients.
#[derive(Debug, Error, Clone)]
pub enum HttpError {
    #[error("invalid base URL `{0}`")]
    InvalidBaseUrl(String),
    #[error("failed to join `{path}` onto base URL: {source}")]
    UrlJoin {
        path: String,
        #[source]
        source: Arc<url::ParseError>,
    },
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] Arc<reqwest::Error>),
    #[error("request error during `{stage}`: {source}")]
    Request {
        stage: &'static str,
        #[source]
        source: Arc<reqwest::Error>,
    },
    #[error("unexpected HTTP status {status} during `{stage}`: {body}")]
    Status {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[error("failed to read HTTP body during `{stage}`: {source}")]
    Body {
        stage: &'static str,
        #[source]
        source: Arc<reqwest::Error>,
    },
    #[error("JSON decode error during `{stage}`: {source}")]
    Json {
        stage: &'static str,
        #[source]
        source: Arc<serde_json::Error>,
    },
    #[error("response during `{stage}` is missing expected data: {message}")]
    Shape {
        stage: &'static str,
        message: String,
    },
    #[error("failed to read upload source {path}: {source}")]
    Source {
        path: String,
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl HttpError {
    pub fn request(stage: &'static str, error: reqwest::Error) -> Self {
        Self::Request {
            stage,
            source: Arc::new(error),
        }
    }

    pub fn body(stage: &'static str, error: reqwest::Error) -> Self {
        Self::Body {
            stage,
            source: Arc::new(error),
        }
    }

    pub fn json(stage: &'static str, error: serde_json::Error) -> Self {
        Self::Json {
            stage,
            source: Arc::new(error),
        }
    }

    pub fn shape(stage: &'static str, message: impl Into<String>) -> Self {
        Self::Shape {
            stage,
            message: message.into(),
        }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::Request { .. } | HttpError::Body { .. } | HttpError::Shape { .. } => true,
            HttpError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Tunables for one upstream's retry and rate limiting.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub requests_per_second: Option<NonZeroU32>,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 6,
            min_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            requests_per_second: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &HttpConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            min_delay: Duration::from_millis(cfg.min_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            requests_per_second: None,
            timeout: Duration::from_secs(cfg.timeout_secs),
        }
    }

    pub fn with_rate(mut self, requests_per_second: Option<NonZeroU32>) -> Self {
        self.requests_per_second = requests_per_second;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Status and body of a completed exchange.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Bytes,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self, stage: &'static str) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body).map_err(|err| HttpError::json(stage, err))
    }

    /// Turn any status outside `accepted` into an [`HttpError::Status`].
    pub fn require(self, stage: &'static str, accepted: &[u16]) -> Result<Self, HttpError> {
        let ok = if accepted.is_empty() {
            self.status.is_success()
        } else {
            accepted.contains(&self.status.as_u16())
        };
        if ok {
            return Ok(self);
        }
        Err(self.into_status_error(stage))
    }

    pub fn into_status_error(self, stage: &'static str) -> HttpError {
        let mut body = self.text();
        if body.chars().count() > MAX_ERROR_BODY_CHARS {
            body = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        }
        HttpError::Status {
            stage,
            status: self.status.as_u16(),
            body,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpCore {
    service: &'static str,
    http: Client,
    rate_limiter: Option<Arc<GenericRateLimiter>>,
    backoff: ExponentialBuilder,
}

impl HttpCore {
    pub fn new(service: &'static str, policy: RetryPolicy) -> Result<Self, HttpError> {
        let http = Client::builder()
            .timeout(policy.timeout)
            .user_agent(user_agent(service))
            .build()
            .map_err(|err| HttpError::Build(Arc::new(err)))?;

        let rate_limiter = policy
            .requests_per_second
            .map(|rate| Arc::new(RateLimiter::direct(Quota::per_second(rate))));

        let backoff = ExponentialBuilder::default()
            .with_min_delay(policy.min_delay)
            .with_max_delay(policy.max_delay)
            .with_max_times(policy.max_retries)
            .with_jitter();

        Ok(Self {
            service,
            http,
            rate_limiter,
            backoff,
        })
    }

    pub fn client(&self) -> &Client {
        &self.http
    }

    /// Send a request, retrying transport failures, `429` and `5xx`.
    pub async fn exchange<B>(&self, stage: &'static str, build: B) -> Result<Reply, HttpError>
    where
        B: Fn(&Client) -> RequestBuilder,
    {
        self.exchange_with(stage, build, Ok).await
    }

    /// Like [`HttpCore::exchange`], but runs `parse` inside the retry loop so a
    /// parser can reject a reply with a retryable [`HttpError::Shape`].
    pub async fn exchange_with<T, B, P>(
        &self,
        stage: &'static str,
        build: B,
        parse: P,
    ) -> Result<T, HttpError>
    where
        B: Fn(&Client) -> RequestBuilder,
        P: Fn(Reply) -> Result<T, HttpError>,
    {
        let core = self;
        let build = &build;
        let parse = &parse;
        let attempt = move || async move {
            let reply = core.attempt(stage, build).await?;
            parse(reply)
        };

        attempt
            .retry(self.backoff)
            .sleep(sleep)
            .when(HttpError::is_retryable)
            .notify(|err: &HttpError, delay: Duration| self.log_retry(stage, err, delay))
            .await
    }

    /// Like [`HttpCore::exchange`] for requests that cannot be cloned, such as
    /// streamed uploads: `build` runs again before every attempt.
    pub async fn exchange_prepared<B, F>(&self, stage: &'static str, build: B) -> Result<Reply, HttpError>
    where
        B: Fn(Client) -> F,
        F: Future<Output = Result<RequestBuilder, HttpError>>,
    {
        let core = self;
        let build = &build;
        let attempt = move || async move {
            let request = build(core.http.clone()).await?;
            core.dispatch(stage, request).await
        };

        attempt
            .retry(self.backoff)
            .sleep(sleep)
            .when(HttpError::is_retryable)
            .notify(|err: &HttpError, delay: Duration| self.log_retry(stage, err, delay))
            .await
    }

    fn log_retry(&self, stage: &'static str, err: &HttpError, delay: Duration) {
        warn!(
            service = self.service,
            stage,
            delay_ms = delay.as_millis(),
            error = %err,
            "retrying request"
        );
    }

    /// Successful JSON request decoded into `T`.
    pub async fn get_json<T, B>(&self, stage: &'static str, build: B) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
        B: Fn(&Client) -> RequestBuilder,
    {
        self.exchange_with(stage, build, |reply| reply.require(stage, &[])?.json(stage))
            .await
    }

    async fn attempt<B>(&self, stage: &'static str, build: &B) -> Result<Reply, HttpError>
    where
        B: Fn(&Client) -> RequestBuilder,
    {
        self.dispatch(stage, build(&self.http)).await
    }

    async fn dispatch(&self, stage: &'static str, request: RequestBuilder) -> Result<Reply, HttpError> {
        if let Some(limiter) = self.rate_limiter.as_ref() {
            limiter.until_ready().await;
        }

        let response = request
            .send()
            .await
            .map_err(|err| HttpError::request(stage, err))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| HttpError::body(stage, err))?;
        debug!(
            service = self.service,
            stage,
            status = status.as_u16(),
            bytes = body.len(),
            "received response"
        );

        let reply = Reply { status, body };
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(reply.into_status_error(stage));
        }
        Ok(reply)
    }
}

/// Bearer token reused until shortly before it expires.
#[derive(Debug, Default)]
pub struct TokenCache {
    slot: Mutex<Option<(String, Instant)>>,
}

impl TokenCache {
    const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

    pub fn new() -> Self {
        Self::default()
    }

    /// Cached token, or the result of `fetch` stored for `expires_in` seconds.
    pub async fn get_or_fetch<F, Fut, E>(&self, fetch: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(String, u64), E>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some((token, expires_at)) = slot.as_ref() {
            if Instant::now() + Self::EXPIRY_MARGIN < *expires_at {
                return Ok(token.clone());
            }
        }
        let (token, expires_in) = fetch().await?;
        *slot = Some((
            token.clone(),
            Instant::now() + Duration::from_secs(expires_in),
        ));
        Ok(token)
    }

    pub async fn clear(&self) {
        *self.slot.lock().await = None;
    }
}

/// `mediaops/<version> (<service>)`.
pub fn user_agent(service: &str) -> String {
    format!("mediaops/{} ({service})", env!("CARGO_PKG_VERSION"))
}

/// Parse a base URL, forcing a trailing slash so relative joins append.
pub fn parse_base_url(raw: &str) -> Result<Url, HttpError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized).map_err(|_| HttpError::InvalidBaseUrl(raw.to_string()))
}

pub fn join_url(base: &Url, path: &str) -> Result<Url, HttpError> {
    base.join(path.trim_start_matches('/'))
        .map_err(|err| HttpError::UrlJoin {
            path: path.to_string(),
            source: Arc::new(err),
        })
}
