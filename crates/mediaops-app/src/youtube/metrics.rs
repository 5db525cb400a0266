//! Channel-level analytics: one figure per metric per country.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Days, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::report::{self, ReportError};

pub const DEFAULT_METRICS: &str =
    "views,comments,likes,dislikes,shares,subscribersGained,subscribersLost";
pub const DEFAULT_START_DATE: &str = "2011-01-01";
pub const DEFAULT_SORT: &str = "-views";

/// Key under which [`ChannelMetrics::compute_totals`] stores the sum.
pub const TOTAL_KEY: &str = "total";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    pub metrics: Vec<String>,
    /// `YYYY-MM-DD`.
    pub start_date: String,
    pub end_date: String,
    pub sort: String,
}

impl Default for ReportQuery {
    /// All-time figures through yesterday, sorted by views.
    fn default() -> Self {
        let today = Local::now().date_naive();
        let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
        Self {
            metrics: split_metrics(DEFAULT_METRICS),
            start_date: DEFAULT_START_DATE.to_string(),
            end_date: yesterday.format("%Y-%m-%d").to_string(),
            sort: DEFAULT_SORT.to_string(),
        }
    }
}

pub fn split_metrics(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|metric| !metric.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnHeader {
    pub name: String,
    #[serde(default)]
    pub column_type: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    #[serde(default)]
    pub column_headers: Vec<ColumnHeader>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

impl AnalyticsReport {
    /// `(column, value)` pairs of the first row, values truncated to integers.
    pub fn first_row(&self) -> Vec<(String, i64)> {
        let Some(row) = self.rows.first() else {
            return Vec::new();
        };
        self.column_headers
            .iter()
            .zip(row)
            .filter_map(|(header, value)| Some((header.name.clone(), value.as_f64()? as i64)))
            .collect()
    }
}

/// `{metric: {country: value}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelMetrics(BTreeMap<String, BTreeMap<String, i64>>);

impl ChannelMetrics {
    pub fn new(metrics: &[String]) -> Self {
        Self(
            metrics
                .iter()
                .map(|metric| (metric.clone(), BTreeMap::new()))
                .collect(),
        )
    }

    /// Store the first report row under `country` for every requested metric.
    pub fn record(&mut self, country: &str, report: &AnalyticsReport) {
        for (metric, value) in report.first_row() {
            if let Some(by_country) = self.0.get_mut(&metric) {
                by_country.insert(country.to_string(), value);
            }
        }
    }

    pub fn compute_totals(&mut self) {
        for by_country in self.0.values_mut() {
            let total = by_country
                .iter()
                .filter(|(country, _)| country.as_str() != TOTAL_KEY)
                .map(|(_, value)| *value)
                .sum();
            by_country.insert(TOTAL_KEY.to_string(), total);
        }
    }

    pub fn metrics(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Countries for `metric`, largest value first.
    pub fn sorted(&self, metric: &str) -> Vec<(String, i64)> {
        let mut pairs: Vec<(String, i64)> = self
            .0
            .get(metric)
            .map(|by_country| {
                by_country
                    .iter()
                    .map(|(country, value)| (country.clone(), *value))
                    .collect()
            })
            .unwrap_or_default();
        pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        pairs
    }

    /// One `METRIC, CHANNEL, VALUE` row per figure, each metric sorted descending.
    pub fn write_csv(&self, path: &Path) -> Result<usize, ReportError> {
        let rows = self.metrics().flat_map(|metric| {
            self.sorted(metric)
                .into_iter()
                .map(move |(country, value)| vec![metric.to_string(), country, value.to_string()])
        });
        report::write_rows(path, &["METRIC", "CHANNEL", "VALUE"], rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(views: f64, likes: f64) -> AnalyticsReport {
        serde_json::from_value(json!({
            "columnHeaders": [
                { "name": "views", "columnType": "METRIC", "dataType": "INTEGER" },
                { "name": "likes", "columnType": "METRIC", "dataType": "INTEGER" }
            ],
            "rows": [[views, likes]]
        }))
        .unwrap()
    }

    #[test]
    fn default_query_runs_all_time_through_yesterday() {
        let query = ReportQuery::default();
        assert_eq!(query.metrics.len(), 7);
        assert_eq!(query.metrics[0], "views");
        assert_eq!(query.start_date, "2011-01-01");
        assert_eq!(query.sort, "-views");
        assert_eq!(query.end_date.len(), 10);
    }

    #[test]
    fn totals_and_sorting() {
        let mut metrics = ChannelMetrics::new(&split_metrics("views,likes"));
        metrics.record("UK", &report(1200.0, 40.0));
        metrics.record("DE", &report(3400.0, 10.0));
        metrics.record("FR", &AnalyticsReport::default());
        metrics.compute_totals();
        metrics.compute_totals();

        assert_eq!(
            metrics.sorted("views"),
            vec![
                ("total".to_string(), 4600),
                ("DE".to_string(), 3400),
                ("UK".to_string(), 1200),
            ]
        );
        assert_eq!(metrics.sorted("likes")[1], ("UK".to_string(), 40));
        assert!(metrics.sorted("shares").is_empty());
    }

    #[test]
    fn csv_lists_every_figure() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("metrics.csv");
        let mut metrics = ChannelMetrics::new(&split_metrics("views"));
        metrics.record("UK", &report(5.0, 1.0));
        metrics.compute_totals();
        assert_eq!(metrics.write_csv(&path).unwrap(), 2);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "METRIC,CHANNEL,VALUE\nviews,UK,5\nviews,total,5\n");
    }
}
