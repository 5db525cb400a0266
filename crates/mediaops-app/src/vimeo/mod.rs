//! Vimeo account listing with play/like stats and creation dates.

use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::config::{AppConfigError, HttpConfig, VimeoConfig};
use crate::http::{HttpCore, HttpError, RetryPolicy, parse_base_url};
use crate::report::{self, ReportError};

/// First page of the account's videos; later pages come from `paging.next`.
pub const VIDEOS_PATH: &str = "/me/videos?sort=alphabetical";

#[derive(Debug, Error)]
pub enum VimeoError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error(transparent)]
    Config(#[from] AppConfigError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("invalid paging link `{0}`")]
    Paging(String),
    #[error("video `{name}` has unreadable created_time `{created_time}`")]
    CreatedTime { name: String, created_time: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VimeoVideo {
    pub name: String,
    #[serde(default)]
    pub created_time: String,
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default)]
    pub metadata: Metadata,
}

impl VimeoVideo {
    pub fn plays(&self) -> u64 {
        self.stats.plays.unwrap_or(0)
    }

    pub fn likes(&self) -> u64 {
        self.metadata.connections.likes.total
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub plays: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub connections: Connections,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Connections {
    #[serde(default)]
    pub likes: Connection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Connection {
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Deserialize)]
struct VideoPage {
    #[serde(default)]
    data: Vec<VimeoVideo>,
    paging: Paging,
}

#[derive(Debug, Deserialize)]
struct Paging {
    next: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VimeoClient {
    core: HttpCore,
    base: Url,
    token: String,
}

impl VimeoClient {
    pub fn from_config(cfg: &VimeoConfig, http: &HttpConfig) -> Result<Self, VimeoError> {
        Self::new(&cfg.api_url, cfg.require_token()?, RetryPolicy::from_config(http))
    }

    pub fn new(api_url: &str, token: &str, policy: RetryPolicy) -> Result<Self, VimeoError> {
        Ok(Self {
            core: HttpCore::new("vimeo", policy)?,
            base: parse_base_url(api_url)?,
            token: token.to_string(),
        })
    }

    /// Every video on the account, following relative `paging.next` links.
    pub async fn videos(&self) -> Result<Vec<VimeoVideo>, VimeoError> {
        let mut next = Some(VIDEOS_PATH.to_string());
        let mut videos = Vec::new();
        while let Some(link) = next.take() {
            let url = self
                .base
                .join(&link)
                .map_err(|_| VimeoError::Paging(link.clone()))?;
            let page: VideoPage = self
                .core
                .get_json("vimeo_videos", |http| {
                    http.get(url.clone()).bearer_auth(&self.token)
                })
                .await?;
            debug!(page = %link, count = page.data.len(), "fetched Vimeo page");
            videos.extend(page.data);
            next = page.paging.next.filter(|link| !link.is_empty());
        }
        info!(videos = videos.len(), "listed Vimeo videos");
        Ok(videos)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRow {
    pub name: String,
    pub plays: u64,
    pub likes: u64,
    pub duration: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsReport {
    pub rows: Vec<StatsRow>,
    pub total_plays: u64,
    pub total_likes: u64,
    pub total_duration: u64,
}

pub fn stats_report(videos: &[VimeoVideo]) -> StatsReport {
    let mut report = StatsReport::default();
    for video in videos {
        let row = StatsRow {
            name: video.name.clone(),
            plays: video.plays(),
            likes: video.likes(),
            duration: video.duration,
        };
        report.total_plays += row.plays;
        report.total_likes += row.likes;
        report.total_duration += row.duration;
        report.rows.push(row);
    }
    report
}

impl StatsReport {
    /// Per-video rows, a blank row, then the totals with their own header.
    pub fn write_csv(&self, path: &Path) -> Result<(), ReportError> {
        let mut writer = report::flexible_csv_writer(path)?;
        let csv_err = |err| ReportError::csv(path, err);
        writer
            .write_record(["VIDEO", "PLAYS", "LIKES", "DURATION [seconds]"])
            .map_err(csv_err)?;
        for row in &self.rows {
            writer
                .write_record([
                    row.name.clone(),
                    row.plays.to_string(),
                    row.likes.to_string(),
                    row.duration.to_string(),
                ])
                .map_err(csv_err)?;
        }
        writer.write_record([""]).map_err(csv_err)?;
        writer
            .write_record(["TOTAL PLAYS", "TOTAL LIKES", "TOTAL DURATION [seconds]"])
            .map_err(csv_err)?;
        writer
            .write_record([
                self.total_plays.to_string(),
                self.total_likes.to_string(),
                self.total_duration.to_string(),
            ])
            .map_err(csv_err)?;
        writer.flush().map_err(|err| ReportError::io(path, err))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRow {
    pub name: String,
    /// `MM/DD/YYYY`.
    pub date: String,
    /// `MM/YYYY`.
    pub month_year: String,
}

pub fn created_dates_report(videos: &[VimeoVideo]) -> Result<Vec<CreatedRow>, VimeoError> {
    videos
        .iter()
        .map(|video| {
            let day = video.created_time.get(..10).unwrap_or(&video.created_time);
            let created = NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| {
                VimeoError::CreatedTime {
                    name: video.name.clone(),
                    created_time: video.created_time.clone(),
                }
            })?;
            Ok(CreatedRow {
                name: video.name.clone(),
                date: created.format("%m/%d/%Y").to_string(),
                month_year: created.format("%m/%Y").to_string(),
            })
        })
        .collect()
}

pub fn write_created_dates_csv(path: &Path, rows: &[CreatedRow]) -> Result<usize, ReportError> {
    report::write_rows(
        path,
        &["VIDEO", "DATE CREATED", "MONTH/YEAR CREATED"],
        rows.iter()
            .map(|row| [row.name.as_str(), row.date.as_str(), row.month_year.as_str()]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn video(name: &str, created: &str, plays: Option<u64>, likes: u64, duration: u64) -> VimeoVideo {
        serde_json::from_value(json!({
            "name": name,
            "created_time": created,
            "duration": duration,
            "stats": { "plays": plays },
            "metadata": { "connections": { "likes": { "total": likes } } }
        }))
        .unwrap()
    }

    #[test]
    fn stats_sum_every_video() {
        let videos = vec![
            video("Apple Pie", "2016-03-04T10:00:00+00:00", Some(10), 2, 60),
            video("Toast", "2017-01-02T10:00:00+00:00", None, 1, 30),
        ];
        let report = stats_report(&videos);
        assert_eq!(report.total_plays, 10);
        assert_eq!(report.total_likes, 3);
        assert_eq!(report.total_duration, 90);
        assert_eq!(report.rows[1].plays, 0);
    }

    #[test]
    fn stats_csv_has_totals_block() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stats.csv");
        stats_report(&[video("Toast", "2017-01-02", Some(4), 1, 30)])
            .write_csv(&path)
            .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "VIDEO,PLAYS,LIKES,DURATION [seconds]");
        assert_eq!(lines[1], "Toast,4,1,30");
        assert!(lines[2].trim_matches('"').is_empty());
        assert_eq!(lines[3], "TOTAL PLAYS,TOTAL LIKES,TOTAL DURATION [seconds]");
        assert_eq!(lines[4], "4,1,30");
    }

    #[test]
    fn created_dates_use_us_formats() {
        let rows =
            created_dates_report(&[video("Pie", "2016-03-04T10:00:00+00:00", None, 0, 0)]).unwrap();
        assert_eq!(rows[0].date, "03/04/2016");
        assert_eq!(rows[0].month_year, "03/2016");

        let err = created_dates_report(&[video("Bad", "yesterday", None, 0, 0)]).unwrap_err();
        assert!(matches!(err, VimeoError::CreatedTime { .. }));
    }
}
