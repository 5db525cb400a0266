//! Reference-id hygiene for recipe videos.
//!
//! Well-formed ids look like `{recipe}-ART-{country}`. Two kinds of damage
//! are repaired: comma lists typed without a space after each comma, and
//! ids where `ART` was glued onto the recipe part without its dashes.

use tracing::{info, warn};

use super::types::{RefIdUpdate, Video};
use super::{BrightcoveClient, BrightcoveError};

/// Contains `art` (any case) but has fewer than three dash-separated parts.
pub fn is_improper_art_id(reference_id: &str) -> bool {
    reference_id.to_lowercase().contains("art") && reference_id.split('-').count() < 3
}

pub fn normalize_commas(reference_id: &str) -> String {
    reference_id
        .split(',')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Rebuild `{first minus its last 3 chars}-ART-{last}` for ids with fewer
/// than three parts; others are returned unchanged.
pub fn repair_art_id(reference_id: &str) -> String {
    let parts: Vec<&str> = reference_id.split('-').collect();
    if parts.len() >= 3 {
        return reference_id.to_string();
    }
    let first = parts.first().copied().unwrap_or_default();
    let last = parts.last().copied().unwrap_or_default();
    let keep = first.chars().count().saturating_sub(3);
    let trimmed: String = first.chars().take(keep).collect();
    [trimmed.as_str(), "ART", last].join("-")
}

/// Replacement id, if any. Comma normalisation wins over the ART repair.
pub fn propose_fix(reference_id: &str) -> Option<String> {
    let fixed = if reference_id.contains(',') {
        normalize_commas(reference_id)
    } else if is_improper_art_id(reference_id) {
        repair_art_id(reference_id)
    } else {
        return None;
    };
    (fixed != reference_id).then_some(fixed)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefIdFix {
    pub video_id: String,
    pub name: String,
    pub old: String,
    pub new: String,
}

/// Videos whose reference id fails the ART shape check.
pub fn improper_videos(videos: &[Video]) -> Vec<&Video> {
    videos
        .iter()
        .filter(|video| video.reference_id.as_deref().is_some_and(is_improper_art_id))
        .collect()
}

pub fn plan_fixes(videos: &[Video]) -> Vec<RefIdFix> {
    videos
        .iter()
        .filter_map(|video| {
            let old = video.reference_id.as_deref()?;
            let new = propose_fix(old)?;
            Some(RefIdFix {
                video_id: video.id.clone(),
                name: video.name.clone(),
                old: old.to_string(),
                new,
            })
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct FixOutcome {
    pub updated: Vec<RefIdFix>,
    pub conflicts: Vec<RefIdFix>,
}

/// Apply planned fixes; a conflicting id is reported and skipped.
pub async fn apply_fixes(
    client: &BrightcoveClient,
    fixes: Vec<RefIdFix>,
) -> Result<FixOutcome, BrightcoveError> {
    let mut outcome = FixOutcome::default();
    for fix in fixes {
        match client.update_reference_id(&fix.video_id, &fix.new).await? {
            RefIdUpdate::Updated => {
                info!(video_id = %fix.video_id, old = %fix.old, new = %fix.new, "updated reference id");
                outcome.updated.push(fix);
            }
            RefIdUpdate::Conflict => {
                warn!(video_id = %fix.video_id, new = %fix.new, "reference id already in use");
                outcome.conflicts.push(fix);
            }
        }
    }
    Ok(outcome)
}
