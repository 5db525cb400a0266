//! Zip and shelve localized projects once every market has signed off.
//!
//! Readiness comes from the pending worksheet: a row is ready when the set of
//! values in its status columns equals one of the configured ready sets.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::naming::archive_key;
use super::{FilesError, move_path, zip_dir};
use crate::config::ArchiverConfig;
use crate::sheets::Worksheet;

const NOT_MOVED_MARKER: &str = "*** not moved";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectMatch {
    /// Directory name, equal to the archive key of the worksheet title.
    pub name: String,
    /// 1-based worksheet row.
    pub row: u32,
    pub dir: PathBuf,
    pub us: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveOutcome {
    pub project: ProjectMatch,
    pub zip_path: PathBuf,
    pub moved: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveReport {
    pub ready: usize,
    pub found: Vec<ProjectMatch>,
    pub missing: Vec<String>,
    pub archived: Vec<ArchiveOutcome>,
}

/// Archive keys of ready rows, mapped to their 1-based row numbers.
pub fn ready_rows(values: &[Vec<String>], cfg: &ArchiverConfig) -> BTreeMap<String, u32> {
    let ready_sets: Vec<BTreeSet<&str>> = cfg
        .ready_sets
        .iter()
        .map(|set| set.iter().map(String::as_str).collect())
        .collect();

    let mut ready = BTreeMap::new();
    for (idx, row) in values.iter().enumerate() {
        let Some(title) = row.first().filter(|title| !title.trim().is_empty()) else {
            continue;
        };
        let statuses: BTreeSet<&str> = cfg
            .status_columns
            .iter()
            .map(|&col| row.get(col).map(String::as_str).unwrap_or(""))
            .collect();
        if ready_sets.contains(&statuses) {
            ready.insert(archive_key(title), idx as u32 + 1);
        }
    }
    ready
}

/// Ready projects present on the localization drive or among the US
/// projects. Localization wins when a name exists in both.
pub fn locate_projects(
    ready: &BTreeMap<String, u32>,
    cfg: &ArchiverConfig,
) -> Result<(Vec<ProjectMatch>, Vec<String>), FilesError> {
    let mut found: BTreeMap<String, ProjectMatch> = BTreeMap::new();
    for (root, us) in [(&cfg.localization_root, false), (&cfg.us_root, true)] {
        let entries = fs::read_dir(root).map_err(|err| FilesError::io(root, err))?;
        for entry in entries {
            let entry = entry.map_err(|err| FilesError::io(root, err))?;
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(&row) = ready.get(&name) else {
                continue;
            };
            if !entry.path().is_dir() || found.contains_key(&name) {
                continue;
            }
            found.insert(
                name.clone(),
                ProjectMatch {
                    name,
                    row,
                    dir: entry.path(),
                    us,
                },
            );
        }
    }
    let missing = ready
        .keys()
        .filter(|name| !found.contains_key(*name))
        .cloned()
        .collect();
    Ok((found.into_values().collect(), missing))
}

/// Zip the project, then move it aside unless the destination is taken.
/// Blocking.
pub fn archive_project(project: &ProjectMatch, cfg: &ArchiverConfig) -> Result<ArchiveOutcome, FilesError> {
    let (archive_dir, move_dir) = if project.us {
        (&cfg.archive_us_dir, &cfg.move_us_dir)
    } else {
        (&cfg.archive_dir, &cfg.move_dir)
    };
    let zip_path = archive_dir.join(format!("{}.zip", project.name));
    zip_dir(&project.dir, &zip_path)?;

    let target = move_dir.join(&project.name);
    let moved = if target.exists() {
        warn!(project = %project.name, target = %target.display(), "destination exists, leaving project in place");
        false
    } else {
        fs::create_dir_all(move_dir).map_err(|err| FilesError::io(move_dir, err))?;
        move_path(&project.dir, &target).map_err(|err| FilesError::io(&project.dir, err))?;
        info!(project = %project.name, target = %target.display(), "moved project");
        true
    };
    Ok(ArchiveOutcome {
        project: project.clone(),
        zip_path,
        moved,
    })
}

/// Find ready projects, archive them and log each one to `archived`.
/// With `dry_run` only the readiness report is produced.
pub async fn run_archive(
    pending: &Worksheet,
    archived: &Worksheet,
    cfg: &ArchiverConfig,
    dry_run: bool,
) -> Result<ArchiveReport, FilesError> {
    let values = pending.values().await?;
    let ready = ready_rows(&values, cfg);
    info!(ready = ready.len(), "ready rows in pending worksheet");

    let scan_cfg = cfg.clone();
    let scan_ready = ready.clone();
    let (found, missing) = tokio::task::spawn_blocking(move || locate_projects(&scan_ready, &scan_cfg))
        .await
        .map_err(|err| FilesError::Task(err.to_string()))??;

    let mut report = ArchiveReport {
        ready: ready.len(),
        found: found.clone(),
        missing,
        archived: Vec::new(),
    };
    if dry_run {
        return Ok(report);
    }

    for project in found {
        let task_cfg = cfg.clone();
        let outcome = tokio::task::spawn_blocking(move || archive_project(&project, &task_cfg))
            .await
            .map_err(|err| FilesError::Task(err.to_string()))??;

        let mut row = row_from(&values, outcome.project.row);
        if !outcome.moved {
            row.push(NOT_MOVED_MARKER.to_string());
        }
        archived.append_row(&row).await?;
        report.archived.push(outcome);
    }
    Ok(report)
}

fn row_from(values: &[Vec<String>], row: u32) -> Vec<String> {
    values
        .get(row.saturating_sub(1) as usize)
        .cloned()
        .unwrap_or_default()
}

/// Paths of a project's archive and move destinations, for reporting.
pub fn destinations(project: &ProjectMatch, cfg: &ArchiverConfig) -> (PathBuf, PathBuf) {
    let (archive_dir, move_dir): (&Path, &Path) = if project.us {
        (&cfg.archive_us_dir, &cfg.move_us_dir)
    } else {
        (&cfg.archive_dir, &cfg.move_dir)
    };
    (
        archive_dir.join(format!("{}.zip", project.name)),
        move_dir.join(&project.name),
    )
}
