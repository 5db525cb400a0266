//! Fill CaaS and CMS ids into a worksheet of article URLs.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use super::types::{
    Pagination, QueryConfig, build_search_params, scalar_string, string_at, url_term_request,
};
use super::{CaasClient, CaasError};
use crate::config::CaasLookupConfig;
use crate::sheets::Worksheet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceTally {
    pub searched: usize,
    pub found: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupSummary {
    pub per_source: BTreeMap<String, SourceTally>,
    pub totals: SourceTally,
    pub cells_updated: usize,
}

/// Search every `http…` URL row and write the ids found into the id columns.
///
/// Rows from excluded sources are skipped. When several distinct ids match,
/// they are written sorted and comma-joined.
pub async fn lookup_urls(
    client: &CaasClient,
    worksheet: &Worksheet,
    cfg: &CaasLookupConfig,
) -> Result<LookupSummary, CaasError> {
    let rows = worksheet.values().await?;
    let query = QueryConfig::web_article();
    let mut summary = LookupSummary::default();

    for (idx, row) in rows.iter().enumerate() {
        let row_number = idx as u32 + 1;
        let source = cell(row, cfg.source_column);
        let url = cell(row, cfg.url_column);
        if !url.starts_with("http") {
            continue;
        }
        if cfg.excluded_sources.iter().any(|excluded| excluded == source) {
            continue;
        }

        summary
            .per_source
            .entry(source.to_string())
            .or_default()
            .searched += 1;
        summary.totals.searched += 1;

        info!(row = row_number, url, "searching CaaS for url");
        let params = build_search_params(&query, &url_term_request(url), Pagination::Offset);
        let Some(page) = client.search(&params).await? else {
            continue;
        };

        summary
            .per_source
            .entry(source.to_string())
            .or_default()
            .found += 1;
        summary.totals.found += 1;

        let (cms_ids, caas_ids) = collect_ids(&page.entities);
        for (ids, column, key) in [
            (cms_ids, cfg.cms_id_column, "cms_id"),
            (caas_ids, cfg.caas_id_column, "caas_id"),
        ] {
            match join_ids(&ids) {
                Some(joined) => {
                    info!(row = row_number, key, ids = %joined, "updating spreadsheet");
                    worksheet.update_cell(row_number, column, &joined).await?;
                    summary.cells_updated += 1;
                }
                None => info!(row = row_number, key, "no ids found"),
            }
        }
    }

    Ok(summary)
}

fn cell(row: &[String], column: u32) -> &str {
    (column as usize)
        .checked_sub(1)
        .and_then(|idx| row.get(idx))
        .map(|value| value.trim())
        .unwrap_or("")
}

/// Distinct `cms_id` and `$.id` values across the matched entities.
pub fn collect_ids(entities: &[Value]) -> (BTreeSet<String>, BTreeSet<String>) {
    let usable = |id: &String| id != "None" && !id.is_empty();
    let cms_ids = entities
        .iter()
        .filter_map(|e| e.get("cms_id").and_then(scalar_string))
        .filter(usable)
        .collect();
    let caas_ids = entities
        .iter()
        .filter_map(|e| string_at(e, &["$", "id"]))
        .filter(usable)
        .collect();
    (cms_ids, caas_ids)
}

pub fn join_ids(ids: &BTreeSet<String>) -> Option<String> {
    if ids.is_empty() {
        None
    } else {
        Some(ids.iter().cloned().collect::<Vec<_>>().join(","))
    }
}
