//! Cross-platform checks between YouTube and Brightcove snapshots.

use std::path::Path;

use crate::report::{self, ReportError};
use crate::youtube::PlaylistItem;

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// Sorted titles of both platforms side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleComparison {
    pub rows: Vec<(Option<String>, Option<String>)>,
    pub youtube_count: usize,
    pub brightcove_count: usize,
}

impl TitleComparison {
    /// YouTube count minus Brightcove count.
    pub fn difference(&self) -> i64 {
        self.youtube_count as i64 - self.brightcove_count as i64
    }

    pub fn write_csv(&self, path: &Path) -> Result<usize, ReportError> {
        report::write_rows(
            path,
            &["YouTube", "Brightcove"],
            self.rows.iter().map(|(youtube, brightcove)| {
                [
                    youtube.as_deref().unwrap_or_default(),
                    brightcove.as_deref().unwrap_or_default(),
                ]
            }),
        )
    }
}

/// Zip both title lists, each sorted, padding the shorter one.
pub fn compare_titles(youtube: &[String], brightcove: &[String]) -> TitleComparison {
    let mut youtube = youtube.to_vec();
    let mut brightcove = brightcove.to_vec();
    youtube.sort();
    brightcove.sort();

    let len = youtube.len().max(brightcove.len());
    let rows = (0..len)
        .map(|idx| (youtube.get(idx).cloned(), brightcove.get(idx).cloned()))
        .collect();

    TitleComparison {
        rows,
        youtube_count: youtube.len(),
        brightcove_count: brightcove.len(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingVideoInfo {
    pub title: String,
    pub url: Option<String>,
    pub description: String,
}

/// YouTube items whose title occurs (case-insensitively) inside any of the
/// missing entries.
pub fn missing_video_info(missing: &[String], items: &[PlaylistItem]) -> Vec<MissingVideoInfo> {
    let missing: Vec<String> = missing
        .iter()
        .map(|entry| entry.trim().to_lowercase())
        .filter(|entry| !entry.is_empty())
        .collect();

    items
        .iter()
        .filter(|item| {
            let title = item.snippet.title.to_lowercase();
            missing.iter().any(|entry| entry.contains(&title))
        })
        .map(|item| MissingVideoInfo {
            title: item.snippet.title.to_uppercase(),
            url: item.video_id().map(|id| format!("{WATCH_URL}{id}")),
            description: item.snippet.description.clone(),
        })
        .collect()
}
