use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::CaasError;

/// Page size used when a request does not carry `size`.
pub const DEFAULT_PAGE_SIZE: u64 = 25;

/// Search parameters other than the Elasticsearch request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QueryConfig {
    pub fn load(path: &Path) -> Result<Self, CaasError> {
        serde_json::from_slice(&read_file(path)?).map_err(|source| CaasError::ParseFile {
            path: path.to_path_buf(),
            source: Arc::new(source),
        })
    }

    /// Web-article lookups against the article provider, following no edges.
    pub fn web_article() -> Self {
        Self {
            content_type: Some("web_article".to_string()),
            provider: Some("tardisnyc".to_string()),
            follow: Some(json!([])),
            fields: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// `search_after` on the last hit's sort values; reaches past 10 000 hits.
    Cursor,
    /// Classic `from`/`size` windows.
    Offset,
}

/// Elasticsearch request body, kept opaque apart from paging keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElasticRequest(Map<String, Value>);

impl ElasticRequest {
    pub fn from_value(value: Value) -> Result<Self, CaasError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(CaasError::InvalidRequest(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }

    pub fn load(path: &Path) -> Result<Self, CaasError> {
        let value: Value =
            serde_json::from_slice(&read_file(path)?).map_err(|source| CaasError::ParseFile {
                path: path.to_path_buf(),
                source: Arc::new(source),
            })?;
        Self::from_value(value)
    }

    pub fn size(&self) -> Option<u64> {
        self.0.get("size").and_then(Value::as_u64)
    }

    pub fn offset(&self) -> Option<u64> {
        self.0.get("from").and_then(Value::as_u64)
    }

    pub fn search_after(&self) -> Option<&Value> {
        self.0.get("search_after")
    }

    pub fn set_offset(&mut self, from: u64) {
        self.0.insert("from".to_string(), json!(from));
    }

    pub fn set_search_after(&mut self, sort: Vec<Value>) {
        self.0.insert("search_after".to_string(), Value::Array(sort));
    }

    /// Single `_uid` sort so `search_after` has a stable cursor.
    pub fn set_cursor_sort(&mut self) {
        self.0
            .insert("sort".to_string(), json!([{ "_uid": "desc" }]));
    }

    /// Move the offset window forward; `false` once `found` is exhausted.
    pub fn advance_offset(&mut self, found: u64) -> bool {
        let next = self.offset().unwrap_or(0) + self.size().unwrap_or(DEFAULT_PAGE_SIZE);
        if next < found {
            self.set_offset(next);
            true
        } else {
            false
        }
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

/// Full search body: every query-config key plus `elasticsearchRequest`.
pub fn build_search_params(
    query: &QueryConfig,
    request: &ElasticRequest,
    pagination: Pagination,
) -> Value {
    let mut request = request.clone();
    if pagination == Pagination::Cursor {
        request.set_cursor_sort();
    }
    let mut params = match serde_json::to_value(query) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    params.insert("elasticsearchRequest".to_string(), request.as_value());
    Value::Object(params)
}

/// Term lookup on the exact article URL.
pub fn url_term_request(url: &str) -> ElasticRequest {
    ElasticRequest(
        json!({
            "size": 50,
            "query": {
                "constant_score": {
                    "filter": { "term": { "web_article_url.raw": url } }
                }
            }
        })
        .as_object()
        .cloned()
        .unwrap_or_default(),
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    pub found: u64,
    pub entities: Vec<Value>,
    /// Sort values of the last hit, the cursor for the next page.
    pub last_sort: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaasRecord {
    pub title: Option<String>,
    pub url: Option<String>,
    pub caas_id: Option<String>,
    pub cms_id: Option<String>,
    pub content_type: Option<String>,
    pub tags: Vec<String>,
    pub google_nlp_id: Option<String>,
    pub watson_nlp_id: Option<String>,
}

impl CaasRecord {
    pub fn from_entity(entity: &Value) -> Self {
        let url = string_at(entity, &["web_article_url"]).or_else(|| string_at(entity, &["asset_url"]));
        let content_type = entity
            .pointer("/$type/0/$id")
            .and_then(Value::as_str)
            .and_then(|id| id.split('/').nth(1))
            .map(str::to_string);
        let tags = entity
            .pointer("/si/taxonomy/tags")
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(scalar_string).collect())
            .unwrap_or_default();

        Self {
            title: string_at(entity, &["$name"]),
            url,
            caas_id: string_at(entity, &["$", "id"]),
            cms_id: string_at(entity, &["cms_id"]),
            content_type,
            tags,
            google_nlp_id: entity
                .pointer("/$i_nlp_source_google/0/$id")
                .and_then(scalar_string),
            watson_nlp_id: entity.get("$i_nlp_source_watson").and_then(scalar_string),
        }
    }

    pub const CSV_HEADER: [&'static str; 8] = [
        "title",
        "url",
        "caas_id",
        "cms_id",
        "type",
        "tags",
        "google_nlp_id",
        "watson_nlp_id",
    ];

    pub fn csv_row(&self) -> [String; 8] {
        [
            self.title.clone().unwrap_or_default(),
            self.url.clone().unwrap_or_default(),
            self.caas_id.clone().unwrap_or_default(),
            self.cms_id.clone().unwrap_or_default(),
            self.content_type.clone().unwrap_or_default(),
            self.tags.join(", "),
            self.google_nlp_id.clone().unwrap_or_default(),
            self.watson_nlp_id.clone().unwrap_or_default(),
        ]
    }
}

/// Value under a chain of object keys, rendered as text.
pub(crate) fn string_at(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .try_fold(value, |current, key| current.get(*key))
        .and_then(scalar_string)
}

/// Strings verbatim, numbers and booleans via `Display`, anything else as JSON.
pub(crate) fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, CaasError> {
    std::fs::read(path).map_err(|source| CaasError::ReadFile {
        path: path.to_path_buf(),
        source: Arc::new(source),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ElasticRequest {
        ElasticRequest::from_value(json!({
            "size": 25,
            "from": 0,
            "query": { "match": { "_all": "hair" } },
            "sort": [{ "$date": { "unmapped_type": "long", "order": "desc" } }]
        }))
        .unwrap()
    }

    #[test]
    fn cursor_params_override_sort_and_keep_config_keys() {
        let mut query = QueryConfig::web_article();
        query.extra.insert("debug".to_string(), json!(true));

        let params = build_search_params(&query, &request(), Pagination::Cursor);
        assert_eq!(params["type"], "web_article");
        assert_eq!(params["provider"], "tardisnyc");
        assert_eq!(params["follow"], json!([]));
        assert_eq!(params["debug"], json!(true));
        assert_eq!(params["elasticsearchRequest"]["sort"], json!([{ "_uid": "desc" }]));
        assert_eq!(params["elasticsearchRequest"]["query"]["match"]["_all"], "hair");
    }

    #[test]
    fn offset_params_keep_original_sort() {
        let params = build_search_params(&QueryConfig::default(), &request(), Pagination::Offset);
        assert_eq!(
            params["elasticsearchRequest"]["sort"][0]["$date"]["order"],
            "desc"
        );
        assert!(params.get("type").is_none());
    }

    #[test]
    fn offset_advances_until_found_is_exhausted() {
        let mut req = request();
        assert!(req.advance_offset(60));
        assert_eq!(req.offset(), Some(25));
        assert!(req.advance_offset(60));
        assert_eq!(req.offset(), Some(50));
        assert!(!req.advance_offset(60));
        assert_eq!(req.offset(), Some(50));
    }

    #[test]
    fn non_object_requests_are_rejected() {
        assert!(ElasticRequest::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn term_request_targets_raw_url() {
        let req = url_term_request("http://www.instyle.com/hair");
        assert_eq!(req.size(), Some(50));
        assert_eq!(
            req.as_value()["query"]["constant_score"]["filter"]["term"]["web_article_url.raw"],
            "http://www.instyle.com/hair"
        );
    }

    #[test]
    fn record_extraction_reads_nested_fields() {
        let entity = json!({
            "$name": "Find the Perfect Cut",
            "$": { "id": "caas-1" },
            "cms_id": 4471,
            "$type": [{ "$id": "types/web_article" }],
            "web_article_url": "http://www.instyle.com/hair/cut",
            "si": { "taxonomy": { "tags": ["hair", "cut"] } },
            "$i_nlp_source_google": [{ "$id": "gnlp-9" }],
            "$i_nlp_source_watson": "wnlp-3"
        });
        let record = CaasRecord::from_entity(&entity);
        assert_eq!(record.title.as_deref(), Some("Find the Perfect Cut"));
        assert_eq!(record.caas_id.as_deref(), Some("caas-1"));
        assert_eq!(record.cms_id.as_deref(), Some("4471"));
        assert_eq!(record.content_type.as_deref(), Some("web_article"));
        assert_eq!(record.tags, vec!["hair", "cut"]);
        assert_eq!(record.google_nlp_id.as_deref(), Some("gnlp-9"));
        assert_eq!(record.watson_nlp_id.as_deref(), Some("wnlp-3"));
        assert_eq!(record.csv_row()[5], "hair, cut");
    }

    #[test]
    fn record_extraction_falls_back_and_tolerates_gaps() {
        let entity = json!({ "asset_url": "http://www.instyle.com/a" });
        let record = CaasRecord::from_entity(&entity);
        assert_eq!(record.url.as_deref(), Some("http://www.instyle.com/a"));
        assert!(record.title.is_none());
        assert!(record.tags.is_empty());
        assert!(record.content_type.is_none());
    }
}
