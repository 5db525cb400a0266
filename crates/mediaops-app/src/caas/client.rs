use async_stream::try_stream;
use futures_util::Stream;
use serde_json::{Value, json};
use tracing::{debug, info};
use url::Url;

use super::types::{ElasticRequest, Pagination, QueryConfig, SearchPage, build_search_params};
use super::CaasError;
use crate::config::{CaasConfig, HttpConfig};
use crate::http::{HttpCore, HttpError, Reply, RetryPolicy, join_url, parse_base_url};

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone)]
pub struct CaasClient {
    core: HttpCore,
    search_url: Url,
    batch_url: Url,
    api_key: String,
}

impl CaasClient {
    /// Client using the configured attempt budget and request rate.
    pub fn from_config(cfg: &CaasConfig, http: &HttpConfig) -> Result<Self, CaasError> {
        let policy = RetryPolicy::from_config(http)
            .with_max_retries(cfg.max_attempts.saturating_sub(1))
            .with_rate(Some(cfg.requests_per_second));
        Self::new(&cfg.base_url, cfg.require_api_key()?, policy)
    }

    pub fn new(base_url: &str, api_key: &str, policy: RetryPolicy) -> Result<Self, CaasError> {
        let base = parse_base_url(base_url)?;
        Ok(Self {
            core: HttpCore::new("caas", policy)?,
            search_url: join_url(&base, "search")?,
            batch_url: join_url(&base, "batch")?,
            api_key: api_key.to_string(),
        })
    }

    /// One search round-trip. `None` when nothing matched.
    ///
    /// Replies missing `found`, `entities` or `hits.hits` are retried like
    /// transport failures; any status other than 200 is returned as an error.
    pub async fn search(&self, params: &Value) -> Result<Option<SearchPage>, CaasError> {
        let page = self
            .core
            .exchange_with(
                "caas_search",
                |http| {
                    http.post(self.search_url.clone())
                        .header(API_KEY_HEADER, &self.api_key)
                        .json(params)
                },
                |reply: Reply| {
                    let body: Value = reply.require("caas_search", &[200])?.json("caas_search")?;
                    parse_search_response(&body)
                },
            )
            .await?;

        match page.as_ref() {
            Some(page) => info!(found = page.found, entities = page.entities.len(), "CaaS search returned results"),
            None => info!("CaaS search returned no results"),
        }
        Ok(page)
    }

    /// Stream every page of a query, advancing by cursor or offset.
    ///
    /// Stops when a search finds nothing, a page is empty, the cursor is
    /// missing, the offset passes `found`, or `max_pages` pages were yielded.
    pub fn pages<'a>(
        &'a self,
        query: &'a QueryConfig,
        request: ElasticRequest,
        pagination: Pagination,
        max_pages: Option<usize>,
    ) -> impl Stream<Item = Result<SearchPage, CaasError>> + 'a {
        try_stream! {
            let mut request = request;
            let mut fetched = 0usize;
            while max_pages.is_none_or(|max| fetched < max) {
                let params = build_search_params(query, &request, pagination);
                let page = match self.search(&params).await? {
                    Some(page) => page,
                    None => break,
                };
                fetched += 1;
                if page.entities.is_empty() {
                    break;
                }

                let advanced = match pagination {
                    Pagination::Cursor => match page.last_sort.clone() {
                        Some(sort) => {
                            debug!(cursor = ?sort, "searching after last sort values");
                            request.set_search_after(sort);
                            true
                        }
                        None => false,
                    },
                    Pagination::Offset => request.advance_offset(page.found),
                };

                yield page;

                if !advanced {
                    info!(pages = fetched, "query results exhausted");
                    break;
                }
            }
        }
    }

    /// Fetch entities by id (NLP annotations follow `$i_nlp_source_*` edges).
    pub async fn get_batch(&self, ids: &[String]) -> Result<Vec<Value>, CaasError> {
        let body = json!({ "batchRequest": { "Ids": ids } });
        let entities = self
            .core
            .exchange_with(
                "caas_batch",
                |http| {
                    http.post(self.batch_url.clone())
                        .header(API_KEY_HEADER, &self.api_key)
                        .json(&body)
                },
                |reply: Reply| {
                    let value: Value = reply.require("caas_batch", &[200])?.json("caas_batch")?;
                    match value {
                        Value::Array(items) => Ok(items),
                        _ => Err(HttpError::shape("caas_batch", "expected a JSON array")),
                    }
                },
            )
            .await?;
        debug!(requested = ids.len(), returned = entities.len(), "CaaS batch get");
        Ok(entities)
    }
}

fn parse_search_response(body: &Value) -> Result<Option<SearchPage>, HttpError> {
    let found = match body.get("found") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| HttpError::shape("caas_search", "missing `found`"))?;
    let entities = body
        .get("entities")
        .and_then(Value::as_array)
        .ok_or_else(|| HttpError::shape("caas_search", "missing `entities`"))?;
    let hits = body
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .ok_or_else(|| HttpError::shape("caas_search", "missing `hits.hits`"))?;

    if found == 0 {
        return Ok(None);
    }

    let last_sort = hits
        .last()
        .and_then(|hit| hit.get("sort"))
        .and_then(Value::as_array)
        .cloned();

    Ok(Some(SearchPage {
        found,
        entities: entities.clone(),
        last_sort,
    }))
}
