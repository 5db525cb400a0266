//! URL-driven enrichment: find each article in CaaS, pull its stored Google
//! NLP annotations and write one JSON record per article URL.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_stream::try_stream;
use bon::Builder;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinSet,
};
use tracing::{debug, info, warn};

use super::types::{
    Pagination, QueryConfig, build_search_params, scalar_string, string_at, url_term_request,
};
use super::{CaasClient, CaasError};

#[derive(Debug, Clone, Builder)]
pub struct EnrichOptions {
    #[builder(into)]
    pub output_dir: PathBuf,
    /// Leading input entries to skip, blank ones included.
    #[builder(default)]
    pub skip: usize,
    pub limit: Option<usize>,
    #[builder(default = NonZeroUsize::MIN.saturating_add(3))]
    pub worker_count: NonZeroUsize,
    #[builder(default = 64)]
    pub channel_capacity: usize,
}

#[derive(Debug, Clone)]
pub enum EnrichEvent {
    Started {
        total: usize,
    },
    Queued {
        ordinal: usize,
        url: String,
    },
    RecordWritten {
        url: String,
        url_md5: String,
        path: PathBuf,
    },
    /// The URL matched; one `RecordWritten` follows per record.
    Found {
        url: String,
        records: usize,
    },
    NotFound {
        url: String,
    },
    Failed {
        url: String,
        error: String,
    },
    Completed {
        summary: EnrichSummary,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub queued: usize,
    pub found: usize,
    pub written: usize,
    pub not_found: usize,
    pub failed: usize,
}

/// One article as written to `{url_md5}.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub url: Option<String>,
    pub content: Option<Value>,
    pub google_nlp_uid: Option<String>,
    pub watson_nlp_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_nlp_entities: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_nlp_categories: Option<Value>,
    #[serde(
        rename = "google_nlp_docSentiment",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub google_nlp_doc_sentiment: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_md5: Option<String>,
}

impl EnrichedRecord {
    pub fn from_entity(entity: &Value) -> Self {
        Self {
            url: string_at(entity, &["asset_url"]),
            content: entity.get("web_article_content").cloned(),
            google_nlp_uid: entity
                .pointer("/$i_nlp_source_google/0/$id")
                .and_then(scalar_string),
            watson_nlp_id: entity.get("$i_nlp_source_watson").cloned(),
            ..Self::default()
        }
    }

    /// Copy the NLP fields from a Google annotation entity. Fields the
    /// annotation lacks are written as `null`; records without an annotation
    /// omit them.
    pub fn apply_annotations(&mut self, annotation: &Value) {
        let field = |key: &str| Some(annotation.get(key).cloned().unwrap_or(Value::Null));
        self.google_nlp_entities = field("nlp_entities");
        self.google_nlp_categories = field("nlp_categories");
        self.google_nlp_doc_sentiment = field("nlp_docSentiment");
    }
}

/// Records keyed by `asset_url`; a later entity with the same URL wins.
pub fn extract_records(entities: &[Value]) -> Vec<EnrichedRecord> {
    let mut by_url: BTreeMap<Option<String>, EnrichedRecord> = BTreeMap::new();
    for entity in entities {
        let record = EnrichedRecord::from_entity(entity);
        by_url.insert(record.url.clone(), record);
    }
    by_url.into_values().collect()
}

/// Canonical lookup form: `http://www.` is prepended unless already present.
pub fn normalize_article_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains("http://www.") {
        Some(trimmed.to_string())
    } else {
        Some(format!("http://www.{trimmed}"))
    }
}

/// MD5 hex of the URL with `https://` removed; names the record file.
pub fn url_md5(url: &str) -> String {
    format!("{:x}", md5::compute(url.replace("https://", "")))
}

/// Apply skip (counted over raw entries), drop blanks, normalize, then limit.
pub fn prepare_urls(raw: &[String], skip: usize, limit: Option<usize>) -> Vec<String> {
    raw.iter()
        .skip(skip)
        .filter_map(|line| normalize_article_url(line))
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

enum EventMessage {
    Event(EnrichEvent),
    Error(CaasError),
}

type EventSender = mpsc::Sender<EventMessage>;

async fn send_event(sender: &EventSender, event: EnrichEvent) -> Result<(), CaasError> {
    sender
        .send(EventMessage::Event(event))
        .await
        .map_err(|_| CaasError::ChannelClosed)
}

#[derive(Clone)]
struct WorkerStats {
    found: Arc<AtomicUsize>,
    written: Arc<AtomicUsize>,
    not_found: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
    event_tx: EventSender,
}

enum UrlOutcome {
    NotFound,
    Found(Vec<WrittenRecord>),
}

struct WrittenRecord {
    url: String,
    url_md5: String,
    path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CaasEnricher {
    client: CaasClient,
}

impl CaasEnricher {
    pub fn new(client: CaasClient) -> Self {
        Self { client }
    }

    pub fn enrich_stream(
        &self,
        urls: Vec<String>,
        opts: EnrichOptions,
    ) -> impl Stream<Item = Result<EnrichEvent, CaasError>> + use<> {
        let capacity = opts.channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let enricher = self.clone();
        tokio::spawn(async move {
            if let Err(err) = enricher.run_enrich(urls, opts, event_tx.clone()).await {
                let _ = event_tx.send(EventMessage::Error(err)).await;
            }
        });

        try_stream! {
            let mut rx = event_rx;
            while let Some(message) = rx.recv().await {
                match message {
                    EventMessage::Event(event) => yield event,
                    EventMessage::Error(err) => Err(err)?,
                }
            }
        }
    }

    async fn run_enrich(
        &self,
        raw_urls: Vec<String>,
        opts: EnrichOptions,
        event_tx: EventSender,
    ) -> Result<(), CaasError> {
        tokio::fs::create_dir_all(&opts.output_dir)
            .await
            .map_err(|source| CaasError::WriteRecord {
                path: opts.output_dir.clone(),
                source: Arc::new(source),
            })?;

        let urls = prepare_urls(&raw_urls, opts.skip, opts.limit);
        info!(
            total = urls.len(),
            skip = opts.skip,
            workers = opts.worker_count.get(),
            "starting CaaS enrichment"
        );
        send_event(&event_tx, EnrichEvent::Started { total: urls.len() }).await?;

        let stats = WorkerStats {
            found: Arc::new(AtomicUsize::new(0)),
            written: Arc::new(AtomicUsize::new(0)),
            not_found: Arc::new(AtomicUsize::new(0)),
            failed: Arc::new(AtomicUsize::new(0)),
            event_tx: event_tx.clone(),
        };

        let (sender, receiver) = mpsc::channel::<String>(opts.channel_capacity.max(1));
        let mut join_set = spawn_workers(
            self.client.clone(),
            receiver,
            opts.output_dir.clone(),
            opts.worker_count.get(),
            stats.clone(),
        );

        let mut queued = 0usize;
        for url in urls {
            queued += 1;
            send_event(
                &event_tx,
                EnrichEvent::Queued {
                    ordinal: queued,
                    url: url.clone(),
                },
            )
            .await?;
            if sender.send(url).await.is_err() {
                break;
            }
        }
        drop(sender);

        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => return Err(err),
                Err(join_err) => return Err(CaasError::Worker(join_err.to_string())),
            }
        }

        let summary = EnrichSummary {
            queued,
            found: stats.found.load(Ordering::Relaxed),
            written: stats.written.load(Ordering::Relaxed),
            not_found: stats.not_found.load(Ordering::Relaxed),
            failed: stats.failed.load(Ordering::Relaxed),
        };
        send_event(&event_tx, EnrichEvent::Completed { summary }).await?;
        Ok(())
    }
}

fn spawn_workers(
    client: CaasClient,
    receiver: mpsc::Receiver<String>,
    output_dir: PathBuf,
    worker_count: usize,
    stats: WorkerStats,
) -> JoinSet<Result<(), CaasError>> {
    let shared_receiver = Arc::new(Mutex::new(receiver));
    let output_dir = Arc::new(output_dir);

    let mut join_set = JoinSet::new();
    for worker_idx in 0..worker_count {
        let rx = Arc::clone(&shared_receiver);
        let client = client.clone();
        let output_dir = Arc::clone(&output_dir);
        let stats = stats.clone();

        join_set.spawn(async move { run_worker(worker_idx, rx, client, output_dir, stats).await });
    }

    join_set
}

async fn run_worker(
    worker_idx: usize,
    receiver: Arc<Mutex<mpsc::Receiver<String>>>,
    client: CaasClient,
    output_dir: Arc<PathBuf>,
    stats: WorkerStats,
) -> Result<(), CaasError> {
    loop {
        let next = { receiver.lock().await.recv().await };
        let Some(url) = next else {
            debug!(
                stage = "worker_shutdown",
                worker = worker_idx,
                "worker terminating (channel closed)"
            );
            break;
        };

        match enrich_url(&client, &url, &output_dir).await {
            Ok(UrlOutcome::NotFound) => {
                stats.not_found.fetch_add(1, Ordering::Relaxed);
                send_event(&stats.event_tx, EnrichEvent::NotFound { url }).await?;
            }
            Ok(UrlOutcome::Found(records)) => {
                stats.found.fetch_add(1, Ordering::Relaxed);
                send_event(
                    &stats.event_tx,
                    EnrichEvent::Found {
                        url,
                        records: records.len(),
                    },
                )
                .await?;
                for record in records {
                    stats.written.fetch_add(1, Ordering::Relaxed);
                    send_event(
                        &stats.event_tx,
                        EnrichEvent::RecordWritten {
                            url: record.url,
                            url_md5: record.url_md5,
                            path: record.path,
                        },
                    )
                    .await?;
                }
            }
            Err(err @ CaasError::WriteRecord { .. }) => return Err(err),
            Err(err) => {
                warn!(
                    stage = "worker_error",
                    worker = worker_idx,
                    url = %url,
                    error = %err,
                    "enrichment failed for url"
                );
                stats.failed.fetch_add(1, Ordering::Relaxed);
                send_event(
                    &stats.event_tx,
                    EnrichEvent::Failed {
                        url,
                        error: err.to_string(),
                    },
                )
                .await?;
            }
        }
    }
    Ok(())
}

async fn enrich_url(
    client: &CaasClient,
    url: &str,
    output_dir: &Path,
) -> Result<UrlOutcome, CaasError> {
    let params = build_search_params(
        &QueryConfig::web_article(),
        &url_term_request(url),
        Pagination::Offset,
    );
    let Some(page) = client.search(&params).await? else {
        return Ok(UrlOutcome::NotFound);
    };

    let mut written = Vec::new();
    for mut record in extract_records(&page.entities) {
        let Some(record_url) = record.url.clone() else {
            debug!(lookup = %url, "entity without asset_url skipped");
            continue;
        };

        if let Some(nlp_id) = record.google_nlp_uid.clone() {
            match client.get_batch(std::slice::from_ref(&nlp_id)).await {
                Ok(annotations) => {
                    if let Some(first) = annotations.first() {
                        record.apply_annotations(first);
                    }
                }
                Err(err) => warn!(nlp_id = %nlp_id, error = %err, "annotation fetch failed"),
            }
        }

        let digest = url_md5(&record_url);
        record.url_md5 = Some(digest.clone());
        let path = output_dir.join(format!("{digest}.json"));
        write_record(&path, &record).await?;
        debug!(url = %record_url, path = %path.display(), "wrote enriched record");
        written.push(WrittenRecord {
            url: record_url,
            url_md5: digest,
            path,
        });
    }

    Ok(UrlOutcome::Found(written))
}

async fn write_record(path: &Path, record: &EnrichedRecord) -> Result<(), CaasError> {
    let bytes = serde_json::to_vec(record).map_err(|err| {
        CaasError::WriteRecord {
            path: path.to_path_buf(),
            source: Arc::new(std::io::Error::other(err)),
        }
    })?;
    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| CaasError::WriteRecord {
            path: path.to_path_buf(),
            source: Arc::new(source),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn urls_gain_scheme_and_www_once() {
        assert_eq!(
            normalize_article_url("instyle.com/hair").as_deref(),
            Some("http://www.instyle.com/hair")
        );
        assert_eq!(
            normalize_article_url("  http://www.instyle.com/hair ").as_deref(),
            Some("http://www.instyle.com/hair")
        );
        assert_eq!(normalize_article_url("   "), None);
    }

    #[test]
    fn md5_ignores_https_scheme() {
        assert_eq!(
            url_md5("https://www.instyle.com/a"),
            url_md5("www.instyle.com/a")
        );
        assert_eq!(url_md5("").len(), 32);
        assert_eq!(url_md5(""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn skip_counts_raw_entries_before_blank_filtering() {
        let raw = vec![
            "a.com/1".to_string(),
            "".to_string(),
            "b.com/2".to_string(),
            "c.com/3".to_string(),
        ];
        assert_eq!(
            prepare_urls(&raw, 1, None),
            vec!["http://www.b.com/2", "http://www.c.com/3"]
        );
        assert_eq!(prepare_urls(&raw, 0, Some(1)), vec!["http://www.a.com/1"]);
    }

    #[test]
    fn records_are_keyed_by_asset_url() {
        let entities = vec![
            json!({ "asset_url": "u1", "web_article_content": "first" }),
            json!({ "asset_url": "u1", "web_article_content": "second" }),
            json!({ "asset_url": "u2", "$i_nlp_source_google": [{ "$id": "g2" }] }),
        ];
        let records = extract_records(&entities);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].content, Some(json!("second")));
        assert_eq!(records[1].google_nlp_uid.as_deref(), Some("g2"));
    }

    #[test]
    fn annotation_gaps_are_written_as_null() {
        let mut record = EnrichedRecord::from_entity(&json!({ "asset_url": "u" }));
        record.apply_annotations(&json!({
            "nlp_entities": [{ "name": "hair" }],
            "nlp_docSentiment": { "score": 0.4 }
        }));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["google_nlp_docSentiment"]["score"], json!(0.4));
        assert_eq!(value.get("google_nlp_categories"), Some(&Value::Null));
        assert_eq!(value["content"], Value::Null);
    }

    #[test]
    fn unannotated_records_omit_nlp_keys() {
        let record = EnrichedRecord::from_entity(&json!({ "asset_url": "u" }));
        let value = serde_json::to_value(&record).unwrap();
        for key in [
            "google_nlp_entities",
            "google_nlp_categories",
            "google_nlp_docSentiment",
        ] {
            assert!(value.get(key).is_none(), "{key} should be omitted");
        }
        assert_eq!(value["url"], json!("u"));
    }
}
